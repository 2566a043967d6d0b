//! Temporary data directory with both stores open

use super::fixtures::{write_dataset, TrackRow};
use music_graph_recommender::batch_loader::{BatchLoader, LoadReport, OnExistingData};
use music_graph_recommender::graph_builder::{GraphBuildReport, GraphBuilder};
use music_graph_recommender::recommender::{HybridRecommender, RecommendationOutcome};
use music_graph_recommender::track::{normalize_row, CsvTrackSource};
use music_graph_recommender::{SqliteDocumentStore, SqliteGraphStore};
use rusqlite::Connection;
use std::path::PathBuf;
use tempfile::TempDir;

pub struct TestEnv {
    pub dir: TempDir,
    pub documents: SqliteDocumentStore,
    pub graph: SqliteGraphStore,
}

#[allow(dead_code)]
impl TestEnv {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let documents = SqliteDocumentStore::new(dir.path().join("tracks.db"))
            .expect("Failed to open document store");
        let graph =
            SqliteGraphStore::new(dir.path().join("graph.db")).expect("Failed to open graph store");
        TestEnv {
            dir,
            documents,
            graph,
        }
    }

    pub fn graph_db_path(&self) -> PathBuf {
        self.dir.path().join("graph.db")
    }

    /// Writes `rows` to the dataset file and loads it with the default batch size.
    pub fn load(&self, rows: &[TrackRow], policy: Option<OnExistingData>) -> LoadReport {
        self.load_with_batch_size(rows, policy, 1000)
    }

    pub fn load_with_batch_size(
        &self,
        rows: &[TrackRow],
        policy: Option<OnExistingData>,
        batch_size: usize,
    ) -> LoadReport {
        let path = write_dataset(self.dir.path(), rows);
        let mut source = CsvTrackSource::open(&path).expect("Failed to open dataset");
        let report = BatchLoader::new(&self.documents, batch_size)
            .load(source.by_ref().map(|r| normalize_row(&r)), policy)
            .expect("Load failed");
        source.finish().expect("Dataset read failed");
        report
    }

    pub fn build_graph(&self) -> GraphBuildReport {
        GraphBuilder::new(&self.documents, &self.graph, 500, 2000)
            .build()
            .expect("Graph build failed")
    }

    pub fn recommend(&self, seed: &str) -> RecommendationOutcome {
        HybridRecommender::new(&self.documents, &self.graph)
            .recommend(seed)
            .expect("Recommendation failed")
    }

    /// Runs a single-value count query on the graph database through a
    /// separate read connection.
    pub fn graph_count(&self, sql: &str) -> i64 {
        let conn = Connection::open(self.graph_db_path()).expect("Failed to open graph db");
        conn.query_row(sql, [], |r| r.get(0))
            .expect("Graph query failed")
    }
}
