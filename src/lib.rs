//! Music Graph Recommender Library
//!
//! Loads a tabular track dataset into a document store, derives a
//! song/artist/genre graph from it and answers "fans of X also like" queries
//! by combining both stores.

pub mod analysis;
pub mod batch_loader;
pub mod cli_style;
pub mod config;
pub mod document_store;
pub mod graph_builder;
pub mod graph_store;
pub mod recommender;
pub mod sqlite_persistence;
pub mod track;

// Re-export commonly used types for convenience
pub use batch_loader::{BatchLoader, LoadReport, OnExistingData};
pub use document_store::{DocumentStore, SqliteDocumentStore};
pub use graph_builder::{GraphBuildReport, GraphBuilder};
pub use graph_store::{GraphStore, SqliteGraphStore};
pub use recommender::{HybridRecommender, RecommendationOutcome};
