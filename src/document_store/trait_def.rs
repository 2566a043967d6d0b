//! DocumentStore trait definition.

use super::models::*;
use crate::track::TrackDocument;
use anyhow::Result;

/// Storage backend holding one document per track.
///
/// Errors returned from these methods mean the store itself failed
/// (unreachable, locked, corrupt). Per-document conflicts during inserts are
/// reported through [`InsertManyOutcome`] instead.
#[cfg_attr(test, mockall::automock)]
pub trait DocumentStore: Send + Sync {
    // =========================================================================
    // Collection Management
    // =========================================================================

    /// Number of documents in the collection.
    fn count_tracks(&self) -> Result<u64>;

    /// Drops every document and every secondary index.
    fn drop_tracks(&self) -> Result<()>;

    /// Inserts all documents, continuing past per-document failures.
    fn insert_many_unordered(&self, docs: &[TrackDocument]) -> Result<InsertManyOutcome>;

    /// Creates the index unless one with the same name exists already.
    fn create_index(&self, spec: &IndexSpec) -> Result<IndexOutcome>;

    /// Names of the secondary indexes on the collection.
    fn list_indexes(&self) -> Result<Vec<String>>;

    // =========================================================================
    // Reads
    // =========================================================================

    /// A page of graph projections in storage order, starting after `after`.
    fn projection_page(&self, after: Option<i64>, limit: usize) -> Result<ProjectionPage>;

    fn get_track(&self, track_id: &str) -> Result<Option<TrackDocument>>;

    /// The first `limit` documents in storage order.
    fn sample_tracks(&self, limit: usize) -> Result<Vec<TrackDocument>>;

    /// Most popular tracks whose `artists` field equals any of `artists`.
    fn top_tracks_for_artists(&self, artists: &[String], limit: usize)
        -> Result<Vec<TrackSummary>>;

    // =========================================================================
    // Aggregations
    // =========================================================================

    fn top_tracks_by_popularity(&self, limit: usize) -> Result<Vec<TrackSummary>>;

    /// Average of an audio feature per genre, highest first. Genres with no
    /// reported value for the feature are left out.
    fn average_feature_by_genre(&self, feature: &str, limit: usize) -> Result<Vec<GenreAverage>>;

    /// Document count per distinct value of `field`, largest first.
    fn count_by(&self, field: GroupField, limit: usize) -> Result<Vec<GroupCount>>;

    /// Version string of the underlying engine, used as a liveness probe.
    fn server_version(&self) -> Result<String>;
}
