//! Derives the song/artist/genre graph from the track documents.
//!
//! Projections are paged out of the document store in storage order, cleaned,
//! fanned out to one row per artist and upserted in fixed-size batches. Each
//! batch is one graph transaction, so a rerun over the same documents leaves
//! the graph unchanged.

use crate::document_store::{DocumentStore, TrackProjection};
use crate::graph_store::{BatchWriteError, GraphRow, GraphStore};
use crate::track::clean_value;
use anyhow::{Context, Result};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

pub const DEFAULT_GRAPH_BATCH_SIZE: usize = 500;
pub const DEFAULT_PROJECTION_PAGE_SIZE: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingTrackId,
    MissingGenre,
    NoArtists,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipCounts {
    pub missing_track_id: usize,
    pub missing_genre: usize,
    pub no_artists: usize,
}

impl SkipCounts {
    fn record(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::MissingTrackId => self.missing_track_id += 1,
            SkipReason::MissingGenre => self.missing_genre += 1,
            SkipReason::NoArtists => self.no_artists += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.missing_track_id + self.missing_genre + self.no_artists
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedBatch {
    pub batch_number: usize,
    pub rows: usize,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct GraphBuildReport {
    pub documents_scanned: usize,
    pub documents_retained: usize,
    pub skipped: SkipCounts,
    pub rows_emitted: usize,
    pub batches_committed: usize,
    pub failed_batches: Vec<FailedBatch>,
    pub elapsed: Duration,
}

impl GraphBuildReport {
    pub fn rows_lost(&self) -> usize {
        self.failed_batches.iter().map(|b| b.rows).sum()
    }
}

/// Cleans one projection and fans it out to one row per artist.
pub fn fan_out(projection: &TrackProjection) -> std::result::Result<Vec<GraphRow>, SkipReason> {
    let track_id =
        clean_value(projection.track_id.as_deref()).ok_or(SkipReason::MissingTrackId)?;
    let genre = clean_value(projection.genre.as_deref()).ok_or(SkipReason::MissingGenre)?;
    let track_name = clean_value(projection.track_name.as_deref());

    let rows: Vec<GraphRow> = projection
        .artist_list
        .iter()
        .filter_map(|artist| clean_value(Some(artist)))
        .map(|artist| GraphRow {
            track_id: track_id.clone(),
            track_name: track_name.clone(),
            artist,
            genre: genre.clone(),
        })
        .collect();

    if rows.is_empty() {
        return Err(SkipReason::NoArtists);
    }
    Ok(rows)
}

pub struct GraphBuilder<'a> {
    documents: &'a dyn DocumentStore,
    graph: &'a dyn GraphStore,
    batch_size: usize,
    page_size: usize,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(
        documents: &'a dyn DocumentStore,
        graph: &'a dyn GraphStore,
        batch_size: usize,
        page_size: usize,
    ) -> Self {
        GraphBuilder {
            documents,
            graph,
            batch_size: batch_size.max(1),
            page_size: page_size.max(1),
        }
    }

    /// Scans every document and upserts the derived graph.
    ///
    /// A rolled back batch is recorded in the report and the scan goes on.
    /// An unavailable graph store aborts the run with an error.
    pub fn build(&self) -> Result<GraphBuildReport> {
        let start = Instant::now();
        let mut report = GraphBuildReport::default();
        let mut pending: Vec<GraphRow> = Vec::with_capacity(self.batch_size);
        let mut cursor = None;

        loop {
            let page = self
                .documents
                .projection_page(cursor, self.page_size)
                .context("Failed to read track projections")?;

            for projection in &page.rows {
                report.documents_scanned += 1;
                match fan_out(projection) {
                    Ok(rows) => {
                        report.documents_retained += 1;
                        report.rows_emitted += rows.len();
                        pending.extend(rows);
                    }
                    Err(reason) => report.skipped.record(reason),
                }
                if pending.len() >= self.batch_size {
                    self.flush(&mut pending, &mut report)?;
                }
            }

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        self.flush(&mut pending, &mut report)?;

        report.elapsed = start.elapsed();
        info!(
            "Graph build finished in {:.1}s: {} documents scanned, {} retained, {} skipped, {} rows in {} batches",
            report.elapsed.as_secs_f64(),
            report.documents_scanned,
            report.documents_retained,
            report.skipped.total(),
            report.rows_emitted,
            report.batches_committed
        );
        if !report.failed_batches.is_empty() {
            warn!(
                "{} batches rolled back, {} rows lost",
                report.failed_batches.len(),
                report.rows_lost()
            );
        }
        Ok(report)
    }

    fn flush(&self, pending: &mut Vec<GraphRow>, report: &mut GraphBuildReport) -> Result<()> {
        if pending.is_empty() {
            return Ok(());
        }
        let batch_number = report.batches_committed + report.failed_batches.len() + 1;

        match self.graph.upsert_batch(pending) {
            Ok(()) => {
                report.batches_committed += 1;
                info!("Batch {}: {} rows committed", batch_number, pending.len());
            }
            Err(BatchWriteError::RolledBack { rows, cause }) => {
                error!("Batch {}: rolled back {} rows: {:#}", batch_number, rows, cause);
                report.failed_batches.push(FailedBatch {
                    batch_number,
                    rows,
                    error: format!("{:#}", cause),
                });
            }
            Err(e @ BatchWriteError::Unavailable(_)) => {
                return Err(e).with_context(|| format!("Graph build aborted at batch {}", batch_number));
            }
        }
        pending.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document_store::SqliteDocumentStore;
    use crate::graph_store::{MockGraphStore, SqliteGraphStore};
    use crate::track::{normalize_row, RawRecord};
    use anyhow::anyhow;

    fn projection(track_id: Option<&str>, genre: Option<&str>, artists: &[&str]) -> TrackProjection {
        TrackProjection {
            track_id: track_id.map(str::to_string),
            track_name: Some("Name".to_string()),
            artist_list: artists.iter().map(|a| a.to_string()).collect(),
            genre: genre.map(str::to_string),
        }
    }

    fn load(store: &SqliteDocumentStore, rows: &[(&str, &str, &str)]) {
        let docs: Vec<_> = rows
            .iter()
            .map(|(track_id, artists, genre)| {
                normalize_row(
                    &RawRecord::new()
                        .with("track_id", track_id)
                        .with("track_name", &format!("Song {}", track_id))
                        .with("artists", artists)
                        .with("track_genre", genre),
                )
            })
            .collect();
        store.insert_many_unordered(&docs).unwrap();
    }

    #[test]
    fn test_fan_out_one_row_per_artist() {
        let rows = fan_out(&projection(Some(" t1 "), Some("pop"), &["X", "  ", "Y"])).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].track_id, "t1");
        assert_eq!(rows[0].artist, "X");
        assert_eq!(rows[1].artist, "Y");
        assert_eq!(rows[1].genre, "pop");
    }

    #[test]
    fn test_fan_out_skip_reasons() {
        assert_eq!(
            fan_out(&projection(None, Some("pop"), &["X"])),
            Err(SkipReason::MissingTrackId)
        );
        assert_eq!(
            fan_out(&projection(Some("t1"), Some("nan"), &["X"])),
            Err(SkipReason::MissingGenre)
        );
        assert_eq!(
            fan_out(&projection(Some("t1"), Some("pop"), &[])),
            Err(SkipReason::NoArtists)
        );
        assert_eq!(
            fan_out(&projection(Some("t1"), Some("pop"), &[" ", ""])),
            Err(SkipReason::NoArtists)
        );
    }

    #[test]
    fn test_build_is_idempotent() {
        let documents = SqliteDocumentStore::in_memory().unwrap();
        load(
            &documents,
            &[("t1", "A, B", "pop"), ("t2", "B", "rock"), ("t3", "C", "pop")],
        );
        let graph = SqliteGraphStore::in_memory().unwrap();
        let builder = GraphBuilder::new(&documents, &graph, 2, 2);

        let first = builder.build().unwrap();
        let counts = graph.counts().unwrap();
        let second = builder.build().unwrap();

        assert_eq!(first.documents_scanned, 3);
        assert_eq!(first.rows_emitted, 4);
        assert_eq!(first.batches_committed, 2);
        assert_eq!(second.rows_emitted, 4);
        assert_eq!(graph.counts().unwrap(), counts);
        assert_eq!(counts.songs, 3);
        assert_eq!(counts.artists, 3);
        assert_eq!(counts.by_artist, 4);
        assert_eq!(counts.plays_genre, 4);
    }

    #[test]
    fn test_document_without_genre_creates_no_song() {
        let documents = SqliteDocumentStore::in_memory().unwrap();
        load(&documents, &[("t1", "A", ""), ("t2", "", "pop"), ("t3", "B", "rock")]);
        let graph = SqliteGraphStore::in_memory().unwrap();

        let report = GraphBuilder::new(&documents, &graph, 500, 2000)
            .build()
            .unwrap();

        assert_eq!(report.skipped.missing_genre, 1);
        assert_eq!(report.skipped.no_artists, 1);
        assert_eq!(report.documents_retained, 1);
        let counts = graph.counts().unwrap();
        assert_eq!(counts.songs, 1);
        assert!(!graph.artist_exists("A").unwrap());
    }

    #[test]
    fn test_rolled_back_batch_is_reported_and_run_continues() {
        let documents = SqliteDocumentStore::in_memory().unwrap();
        load(&documents, &[("t1", "A", "pop"), ("t2", "B", "rock"), ("t3", "C", "jazz")]);

        let mut graph = MockGraphStore::new();
        let mut calls = 0;
        graph.expect_upsert_batch().times(3).returning(move |rows| {
            calls += 1;
            if calls == 1 {
                Err(BatchWriteError::RolledBack {
                    rows: rows.len(),
                    cause: anyhow!("constraint failed"),
                })
            } else {
                Ok(())
            }
        });

        let report = GraphBuilder::new(&documents, &graph, 1, 2000)
            .build()
            .unwrap();

        assert_eq!(report.batches_committed, 2);
        assert_eq!(
            report.failed_batches,
            vec![FailedBatch {
                batch_number: 1,
                rows: 1,
                error: "constraint failed".to_string(),
            }]
        );
        assert_eq!(report.rows_lost(), 1);
    }

    #[test]
    fn test_unavailable_store_aborts_the_run() {
        let documents = SqliteDocumentStore::in_memory().unwrap();
        load(&documents, &[("t1", "A", "pop"), ("t2", "B", "rock")]);

        let mut graph = MockGraphStore::new();
        graph
            .expect_upsert_batch()
            .times(1)
            .returning(|_| Err(BatchWriteError::Unavailable(anyhow!("database is locked"))));

        let err = GraphBuilder::new(&documents, &graph, 1, 2000)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("aborted at batch 1"));
    }
}
