use serde::Serialize;

/// Why a single document of an unordered insert was not written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertFailureKind {
    /// A document with the same `trackId` already exists.
    DuplicateKey,
    /// Any other per-document rejection, with the store's message.
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertFailure {
    /// Position of the document inside the submitted batch.
    pub index: usize,
    pub track_id: String,
    pub kind: InsertFailureKind,
}

/// Result of an unordered insert: documents that made it in, plus one entry
/// per document that did not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertManyOutcome {
    pub inserted: usize,
    pub failures: Vec<InsertFailure>,
}

impl InsertManyOutcome {
    pub fn duplicates(&self) -> usize {
        self.failures
            .iter()
            .filter(|f| f.kind == InsertFailureKind::DuplicateKey)
            .count()
    }

    pub fn rejected(&self) -> usize {
        self.failures.len() - self.duplicates()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// One key of an index, addressed by document path (`genre`,
/// `audioFeatures.energy`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexKey {
    pub path: &'static str,
    pub order: SortOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: &'static str,
    pub keys: &'static [IndexKey],
    pub unique: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    Created,
    AlreadyExists,
}

/// The slice of a track document the graph builder reads. Values are raw:
/// cleaning happens on the consumer side.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackProjection {
    pub track_id: Option<String>,
    pub track_name: Option<String>,
    pub artist_list: Vec<String>,
    pub genre: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectionPage {
    pub rows: Vec<TrackProjection>,
    /// Cursor to pass back for the next page, `None` once exhausted.
    pub next_cursor: Option<i64>,
}

/// Display projection of a track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSummary {
    pub track_name: String,
    pub artists: String,
    pub popularity: i64,
    pub genre: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupField {
    Artists,
    Genre,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupCount {
    pub value: String,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenreAverage {
    pub genre: String,
    pub average: f64,
}
