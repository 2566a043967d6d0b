//! Dataset fixtures

use std::path::{Path, PathBuf};

/// One dataset line, with the columns the tests care about.
#[derive(Debug, Clone, Copy)]
pub struct TrackRow {
    pub track_id: &'static str,
    pub artists: &'static str,
    pub track_name: &'static str,
    pub genre: &'static str,
    pub popularity: i64,
}

impl TrackRow {
    pub const fn new(
        track_id: &'static str,
        artists: &'static str,
        track_name: &'static str,
        genre: &'static str,
        popularity: i64,
    ) -> Self {
        TrackRow {
            track_id,
            artists,
            track_name,
            genre,
            popularity,
        }
    }
}

const HEADER: &[&str] = &[
    "",
    "track_id",
    "artists",
    "album_name",
    "track_name",
    "popularity",
    "duration_ms",
    "explicit",
    "danceability",
    "energy",
    "key",
    "loudness",
    "mode",
    "speechiness",
    "acousticness",
    "instrumentalness",
    "liveness",
    "valence",
    "tempo",
    "time_signature",
    "track_genre",
];

/// Writes `rows` as a dataset CSV laid out like the public Spotify tracks
/// dataset (leading unnamed index column included).
pub fn write_dataset(dir: &Path, rows: &[TrackRow]) -> PathBuf {
    let path = dir.join("dataset.csv");
    let mut writer = csv::Writer::from_path(&path).expect("Failed to create dataset file");
    writer.write_record(HEADER).expect("Failed to write header");

    for (i, row) in rows.iter().enumerate() {
        let energy = format!("{:.2}", row.popularity as f64 / 100.0);
        writer
            .write_record([
                i.to_string().as_str(),
                row.track_id,
                row.artists,
                "Test Album",
                row.track_name,
                row.popularity.to_string().as_str(),
                "180000",
                "False",
                "0.5",
                energy.as_str(),
                "5.0",
                "-6.5",
                "1",
                "0.04",
                "0.1",
                "0.0",
                "0.12",
                "0.6",
                "120.0",
                "4",
                row.genre,
            ])
            .expect("Failed to write dataset row");
    }
    writer.flush().expect("Failed to flush dataset");
    path
}
