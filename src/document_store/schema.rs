//! SQLite schema for the track document collection.
//!
//! Nested document fields (`artistList`, `audioFeatures`) are kept as JSON
//! text and reached through the JSON1 functions. Secondary indexes are not
//! part of the schema: the batch loader (re)builds them after a load.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

pub const TRACKS_TABLE: Table = Table {
    name: "tracks",
    columns: &[
        sqlite_column!("rowid", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("track_id", &SqlType::Text, non_null = true),
        sqlite_column!("track_name", &SqlType::Text),
        sqlite_column!("artists", &SqlType::Text),
        sqlite_column!("artist_list", &SqlType::Text), // JSON array
        sqlite_column!("album_name", &SqlType::Text),
        sqlite_column!("genre", &SqlType::Text),
        sqlite_column!("popularity", &SqlType::Integer, non_null = true),
        sqlite_column!("duration_ms", &SqlType::Integer, non_null = true),
        sqlite_column!("explicit", &SqlType::Integer, non_null = true),
        sqlite_column!("audio_features", &SqlType::Text), // JSON object
    ],
    indices: &[],
    unique_constraints: &[&["track_id"]],
};

pub const DOCUMENT_SCHEMA: VersionedSchema = VersionedSchema {
    version: 0,
    tables: &[TRACKS_TABLE],
};
