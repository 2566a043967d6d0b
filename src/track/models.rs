use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a raw audio feature column is coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    Float,
    Integer,
}

/// Audio feature columns carried over from the dataset, in column order.
pub const AUDIO_FEATURES: &[(&str, FeatureKind)] = &[
    ("danceability", FeatureKind::Float),
    ("energy", FeatureKind::Float),
    ("valence", FeatureKind::Float),
    ("tempo", FeatureKind::Float),
    ("loudness", FeatureKind::Float),
    ("speechiness", FeatureKind::Float),
    ("acousticness", FeatureKind::Float),
    ("instrumentalness", FeatureKind::Float),
    ("liveness", FeatureKind::Float),
    ("key", FeatureKind::Integer),
    ("mode", FeatureKind::Integer),
    ("time_signature", FeatureKind::Integer),
];

/// A single reported audio feature value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Integer(i64),
    Float(f64),
}

impl FeatureValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            FeatureValue::Integer(v) => *v as f64,
            FeatureValue::Float(v) => *v,
        }
    }
}

/// Reported audio features by name. A missing key means the dataset did not
/// report that feature, it is never zero-filled.
pub type AudioFeatures = BTreeMap<String, FeatureValue>;

/// Canonical track document as persisted in the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackDocument {
    pub track_id: String,
    pub track_name: String,
    /// Raw artists field, kept for display and exact-match lookups.
    pub artists: String,
    pub artist_list: Vec<String>,
    pub album_name: String,
    pub genre: String,
    pub popularity: i64,
    pub duration_ms: i64,
    pub explicit: bool,
    pub audio_features: AudioFeatures,
}
