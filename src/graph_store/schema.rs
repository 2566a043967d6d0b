//! SQLite schema for the song/artist/genre graph.
//!
//! Each node label is a table keyed by its natural key, each relationship
//! type a link table with a unique (from, to) pair.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, ForeignKey, SqlType, Table, VersionedSchema};

const SONG_FK: ForeignKey = ForeignKey {
    foreign_table: "songs",
    foreign_column: "rowid",
};

const ARTIST_FK: ForeignKey = ForeignKey {
    foreign_table: "artists",
    foreign_column: "rowid",
};

const GENRE_FK: ForeignKey = ForeignKey {
    foreign_table: "genres",
    foreign_column: "rowid",
};

pub const SONGS_TABLE: Table = Table {
    name: "songs",
    columns: &[
        sqlite_column!("rowid", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("track_id", &SqlType::Text, non_null = true),
        sqlite_column!("track_name", &SqlType::Text),
    ],
    indices: &[],
    unique_constraints: &[&["track_id"]],
};

pub const ARTISTS_TABLE: Table = Table {
    name: "artists",
    columns: &[
        sqlite_column!("rowid", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
    ],
    indices: &[],
    unique_constraints: &[&["name"]],
};

pub const GENRES_TABLE: Table = Table {
    name: "genres",
    columns: &[
        sqlite_column!("rowid", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
    ],
    indices: &[],
    unique_constraints: &[&["name"]],
};

/// Song -[BY_ARTIST]-> Artist
pub const BY_ARTIST_TABLE: Table = Table {
    name: "by_artist",
    columns: &[
        sqlite_column!(
            "song_rowid",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&SONG_FK)
        ),
        sqlite_column!(
            "artist_rowid",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ARTIST_FK)
        ),
    ],
    indices: &[("idx_by_artist_artist", "artist_rowid")],
    unique_constraints: &[&["song_rowid", "artist_rowid"]],
};

/// Song -[IN_GENRE]-> Genre
pub const IN_GENRE_TABLE: Table = Table {
    name: "in_genre",
    columns: &[
        sqlite_column!(
            "song_rowid",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&SONG_FK)
        ),
        sqlite_column!(
            "genre_rowid",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&GENRE_FK)
        ),
    ],
    indices: &[("idx_in_genre_genre", "genre_rowid")],
    unique_constraints: &[&["song_rowid", "genre_rowid"]],
};

/// Artist -[PLAYS_GENRE]-> Genre
pub const PLAYS_GENRE_TABLE: Table = Table {
    name: "plays_genre",
    columns: &[
        sqlite_column!(
            "artist_rowid",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ARTIST_FK)
        ),
        sqlite_column!(
            "genre_rowid",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&GENRE_FK)
        ),
    ],
    indices: &[("idx_plays_genre_genre", "genre_rowid")],
    unique_constraints: &[&["artist_rowid", "genre_rowid"]],
};

pub const GRAPH_SCHEMA: VersionedSchema = VersionedSchema {
    version: 0,
    tables: &[
        SONGS_TABLE,
        ARTISTS_TABLE,
        GENRES_TABLE,
        BY_ARTIST_TABLE,
        IN_GENRE_TABLE,
        PLAYS_GENRE_TABLE,
    ],
};
