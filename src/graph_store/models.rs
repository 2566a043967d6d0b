use serde::Serialize;
use thiserror::Error;

/// One fan-out row of the graph projection: a single (song, artist, genre)
/// triple ready to be upserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphRow {
    pub track_id: String,
    /// `None` clears the stored name on upsert.
    pub track_name: Option<String>,
    pub artist: String,
    pub genre: String,
}

/// An artist sharing at least one genre with the seed artist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerArtist {
    pub artist: String,
    /// Distinct shared genre names, sorted.
    pub shared_genres: Vec<String>,
    pub match_count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphCounts {
    pub songs: u64,
    pub artists: u64,
    pub genres: u64,
    pub by_artist: u64,
    pub in_genre: u64,
    pub plays_genre: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedCount {
    pub name: String,
    pub total: u64,
}

/// Failure of one atomic batch write.
#[derive(Debug, Error)]
pub enum BatchWriteError {
    /// The store could not be reached or locked. Nothing later will succeed.
    #[error("Graph store unavailable: {0}")]
    Unavailable(anyhow::Error),

    /// The batch failed part way and every row in it was rolled back.
    #[error("Batch of {rows} rows rolled back: {cause}")]
    RolledBack { rows: usize, cause: anyhow::Error },
}
