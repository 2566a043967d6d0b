//! Raw dataset record to [`TrackDocument`] conversion.
//!
//! Everything here is a pure function of its input: no store access, no
//! logging. Values that cannot be coerced fall back to the documented
//! defaults instead of failing the row.

use super::models::{AudioFeatures, FeatureKind, FeatureValue, TrackDocument, AUDIO_FEATURES};
use std::collections::HashMap;

/// Placeholders that tabular exports use for "no value".
const MISSING_MARKERS: &[&str] = &["nan", "NaN", "NA", "N/A", "NULL", "null", "None", "<NA>"];

/// One raw dataset row: column name to the raw cell text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    values: HashMap<String, String>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &str, value: &str) -> Self {
        self.values.insert(column.to_string(), value.to_string());
        self
    }

    /// The raw value of `column`, or `None` when the column is absent or
    /// holds a missing-value marker.
    pub fn value(&self, column: &str) -> Option<&str> {
        self.values
            .get(column)
            .map(String::as_str)
            .filter(|v| !is_missing(v))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRecord {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        RawRecord {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Whether a raw cell counts as missing: blank, or one of [`MISSING_MARKERS`].
pub fn is_missing(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || MISSING_MARKERS.contains(&trimmed)
}

/// Trims a value and maps missing, NaN and empty values to `None`.
pub fn clean_value(value: Option<&str>) -> Option<String> {
    match value {
        Some(v) if !is_missing(v) => Some(v.trim().to_string()),
        _ => None,
    }
}

/// Splits a comma-joined artists field. Order and duplicates are preserved,
/// empty tokens are dropped.
pub fn split_artists(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_float(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Integers may come float-formatted ("5.0") out of spreadsheet exports.
fn parse_integer(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    trimmed
        .parse::<i64>()
        .ok()
        .or_else(|| parse_float(trimmed).map(|v| v.trunc() as i64))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Collects the reported audio features of a row.
pub fn extract_audio_features(record: &RawRecord) -> AudioFeatures {
    let mut features = AudioFeatures::new();
    for (column, kind) in AUDIO_FEATURES {
        let Some(raw) = record.value(column) else {
            continue;
        };
        let value = match kind {
            FeatureKind::Float => parse_float(raw).map(FeatureValue::Float),
            FeatureKind::Integer => parse_integer(raw).map(FeatureValue::Integer),
        };
        if let Some(value) = value {
            features.insert(column.to_string(), value);
        }
    }
    features
}

/// Converts one dataset row into its canonical document.
pub fn normalize_row(record: &RawRecord) -> TrackDocument {
    let text = |column: &str| record.value(column).unwrap_or_default().trim().to_string();
    let artists = text("artists");

    TrackDocument {
        track_id: text("track_id"),
        track_name: text("track_name"),
        artist_list: split_artists(&artists),
        artists,
        album_name: text("album_name"),
        genre: text("track_genre"),
        popularity: record
            .value("popularity")
            .and_then(parse_integer)
            .unwrap_or(0),
        duration_ms: record
            .value("duration_ms")
            .and_then(parse_integer)
            .unwrap_or(0),
        explicit: record.value("explicit").and_then(parse_bool).unwrap_or(false),
        audio_features: extract_audio_features(record),
    }
}
