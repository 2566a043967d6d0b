//! GraphStore trait definition.

use super::models::*;
use anyhow::Result;

/// Storage backend for the song/artist/genre property graph.
#[cfg_attr(test, mockall::automock)]
pub trait GraphStore: Send + Sync {
    // =========================================================================
    // Writes
    // =========================================================================

    /// Upserts every row in one transaction: nodes by key, edges only if
    /// missing. Either the whole batch lands or none of it does.
    fn upsert_batch(&self, rows: &[GraphRow]) -> std::result::Result<(), BatchWriteError>;

    // =========================================================================
    // Traversals
    // =========================================================================

    fn artist_exists(&self, name: &str) -> Result<bool>;

    /// Artists playing at least one genre the seed plays, with the shared
    /// genres. Highest match count first; ties keep store order. The seed
    /// itself is never returned.
    fn similar_artists(&self, seed: &str, limit: usize) -> Result<Vec<PeerArtist>>;

    /// Artists with the most songs.
    fn top_artists_by_songs(&self, limit: usize) -> Result<Vec<NamedCount>>;

    /// Genres with the most songs.
    fn top_genres_by_songs(&self, limit: usize) -> Result<Vec<NamedCount>>;

    /// Song names by the given artist, in store order.
    fn songs_by_artist(&self, artist: &str, limit: usize) -> Result<Vec<String>>;

    /// Song names in the given genre, in store order.
    fn songs_in_genre(&self, genre: &str, limit: usize) -> Result<Vec<String>>;

    // =========================================================================
    // Inventory
    // =========================================================================

    fn counts(&self) -> Result<GraphCounts>;

    fn server_version(&self) -> Result<String>;
}
