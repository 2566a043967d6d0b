//! Streams normalized track documents into the document store.
//!
//! Documents are written in fixed-size unordered batches, so a duplicate or
//! otherwise rejected document costs only itself. After the load the fixed
//! index set is (re)built.

use crate::document_store::{
    DocumentStore, IndexKey, IndexOutcome, IndexSpec, InsertFailureKind, SortOrder,
};
use crate::track::TrackDocument;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub const DEFAULT_LOAD_BATCH_SIZE: usize = 1000;

/// Documents read back after a load for the operator to eyeball.
const LOAD_SAMPLE_SIZE: usize = 2;

const fn asc(path: &'static str) -> IndexKey {
    IndexKey {
        path,
        order: SortOrder::Ascending,
    }
}

const fn desc(path: &'static str) -> IndexKey {
    IndexKey {
        path,
        order: SortOrder::Descending,
    }
}

const fn index(name: &'static str, keys: &'static [IndexKey], unique: bool) -> IndexSpec {
    IndexSpec { name, keys, unique }
}

/// Indexes (re)built after every load.
pub const TRACK_INDEXES: &[IndexSpec] = &[
    index("idx_tracks_track_id_unique", &[asc("trackId")], true),
    index("idx_tracks_genre", &[asc("genre")], false),
    index("idx_tracks_popularity", &[desc("popularity")], false),
    index("idx_tracks_artists", &[asc("artists")], false),
    index("idx_tracks_audio_energy", &[asc("audioFeatures.energy")], false),
    index(
        "idx_tracks_audio_danceability",
        &[asc("audioFeatures.danceability")],
        false,
    ),
    index("idx_tracks_audio_valence", &[asc("audioFeatures.valence")], false),
    index("idx_tracks_audio_tempo", &[asc("audioFeatures.tempo")], false),
    index(
        "idx_tracks_genre_popularity",
        &[asc("genre"), desc("popularity")],
        false,
    ),
];

/// What to do when the collection already holds documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OnExistingData {
    /// Drop documents and indexes, then load from scratch.
    Replace,
    /// Keep the documents, only rebuild indexes.
    SkipLoad,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub batch_number: usize,
    pub attempted: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexStatus {
    Created,
    AlreadyExists,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexReport {
    pub name: &'static str,
    pub status: IndexStatus,
}

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Documents found in the collection before anything was done.
    pub existing_documents: u64,
    /// Policy applied to existing documents, `None` when there were none.
    pub policy: Option<OnExistingData>,
    pub batches: Vec<BatchReport>,
    pub indexes: Vec<IndexReport>,
    pub final_count: u64,
    /// First documents in storage order, read back after the load.
    pub samples: Vec<TrackDocument>,
    pub elapsed: Duration,
}

impl LoadReport {
    pub fn skipped_load(&self) -> bool {
        self.policy == Some(OnExistingData::SkipLoad)
    }

    pub fn attempted(&self) -> usize {
        self.batches.iter().map(|b| b.attempted).sum()
    }

    pub fn inserted(&self) -> usize {
        self.batches.iter().map(|b| b.inserted).sum()
    }

    pub fn duplicates(&self) -> usize {
        self.batches.iter().map(|b| b.duplicates).sum()
    }

    pub fn rejected(&self) -> usize {
        self.batches.iter().map(|b| b.rejected).sum()
    }

    pub fn failed_indexes(&self) -> usize {
        self.indexes
            .iter()
            .filter(|i| matches!(i.status, IndexStatus::Failed(_)))
            .count()
    }
}

pub struct BatchLoader<'a> {
    store: &'a dyn DocumentStore,
    batch_size: usize,
}

impl<'a> BatchLoader<'a> {
    pub fn new(store: &'a dyn DocumentStore, batch_size: usize) -> Self {
        BatchLoader {
            store,
            batch_size: batch_size.max(1),
        }
    }

    /// Runs a full load: applies `on_existing` to a non-empty collection,
    /// inserts `docs` unless the load is skipped, then rebuilds indexes.
    ///
    /// Fails without touching anything if the collection is not empty and no
    /// policy was given.
    pub fn load<I>(&self, docs: I, on_existing: Option<OnExistingData>) -> Result<LoadReport>
    where
        I: IntoIterator<Item = TrackDocument>,
    {
        let start = Instant::now();
        let mut report = LoadReport {
            existing_documents: self.store.count_tracks()?,
            ..Default::default()
        };

        if report.existing_documents > 0 {
            let Some(policy) = on_existing else {
                bail!(
                    "Track collection already holds {} documents and no policy for existing data was given",
                    report.existing_documents
                );
            };
            report.policy = Some(policy);
            match policy {
                OnExistingData::Replace => {
                    info!(
                        "Replacing {} existing documents",
                        report.existing_documents
                    );
                    self.store.drop_tracks()?;
                }
                OnExistingData::SkipLoad => {
                    info!(
                        "Keeping {} existing documents, rebuilding indexes only",
                        report.existing_documents
                    );
                }
            }
        }

        if !report.skipped_load() {
            report.batches = self.insert_all(docs)?;
        }
        report.indexes = self.ensure_indexes();
        report.final_count = self.store.count_tracks()?;
        report.samples = self.store.sample_tracks(LOAD_SAMPLE_SIZE)?;
        report.elapsed = start.elapsed();

        info!(
            "Load finished in {:.1}s: {} inserted, {} duplicates, {} rejected, {} documents total",
            report.elapsed.as_secs_f64(),
            report.inserted(),
            report.duplicates(),
            report.rejected(),
            report.final_count
        );
        Ok(report)
    }

    /// Inserts every document in batches of `batch_size`, reporting each one.
    pub fn insert_all<I>(&self, docs: I) -> Result<Vec<BatchReport>>
    where
        I: IntoIterator<Item = TrackDocument>,
    {
        let mut reports = Vec::new();
        let mut buffer = Vec::with_capacity(self.batch_size);

        for doc in docs {
            buffer.push(doc);
            if buffer.len() == self.batch_size {
                reports.push(self.insert_batch(reports.len() + 1, &buffer)?);
                buffer.clear();
            }
        }
        if !buffer.is_empty() {
            reports.push(self.insert_batch(reports.len() + 1, &buffer)?);
        }
        Ok(reports)
    }

    fn insert_batch(&self, batch_number: usize, docs: &[TrackDocument]) -> Result<BatchReport> {
        let outcome = self.store.insert_many_unordered(docs)?;
        let report = BatchReport {
            batch_number,
            attempted: docs.len(),
            inserted: outcome.inserted,
            duplicates: outcome.duplicates(),
            rejected: outcome.rejected(),
        };
        info!(
            "Batch {}: {} inserted, {} duplicates, {} rejected",
            batch_number, report.inserted, report.duplicates, report.rejected
        );
        for failure in outcome
            .failures
            .iter()
            .filter(|f| f.kind != InsertFailureKind::DuplicateKey)
        {
            warn!(
                "Batch {}: document {} rejected: {:?}",
                batch_number, failure.track_id, failure.kind
            );
        }
        Ok(report)
    }

    /// Creates every index in [`TRACK_INDEXES`]. A failing index is reported
    /// and the remaining ones are still attempted.
    pub fn ensure_indexes(&self) -> Vec<IndexReport> {
        TRACK_INDEXES
            .iter()
            .map(|spec| {
                let status = match self.store.create_index(spec) {
                    Ok(IndexOutcome::Created) => {
                        info!("Created index {}", spec.name);
                        IndexStatus::Created
                    }
                    Ok(IndexOutcome::AlreadyExists) => {
                        info!("Index {} already exists", spec.name);
                        IndexStatus::AlreadyExists
                    }
                    Err(e) => {
                        warn!("Failed to create index {}: {:#}", spec.name, e);
                        IndexStatus::Failed(format!("{:#}", e))
                    }
                };
                IndexReport {
                    name: spec.name,
                    status,
                }
            })
            .collect()
    }
}
