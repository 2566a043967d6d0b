//! SQLite-backed document store for track documents.

use super::models::*;
use super::schema::{DOCUMENT_SCHEMA, TRACKS_TABLE};
use super::trait_def::DocumentStore;
use crate::sqlite_persistence::{index_exists, open_versioned_db};
use crate::track::{TrackDocument, AUDIO_FEATURES};
use anyhow::{anyhow, bail, Context, Result};
use rusqlite::{ffi, params, params_from_iter, Connection, ErrorCode, OpenFlags, OptionalExtension};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

const DOCUMENT_COLUMNS: &str = "track_id, track_name, artists, artist_list, album_name, genre, \
                                popularity, duration_ms, explicit, audio_features";

/// Document store persisted in a single SQLite file.
///
/// The connection is owned by the store and released either by
/// [`SqliteDocumentStore::close`] or on drop.
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
}

impl SqliteDocumentStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        let conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open document store at {:?}", db_path))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        open_versioned_db(&conn, &DOCUMENT_SCHEMA, "document")?;

        let track_count: i64 = conn.query_row("SELECT COUNT(*) FROM tracks", [], |r| r.get(0))?;
        info!("Opened document store {:?}: {} tracks", db_path, track_count);

        Ok(SqliteDocumentStore {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        open_versioned_db(&conn, &DOCUMENT_SCHEMA, "document")?;
        Ok(SqliteDocumentStore {
            conn: Mutex::new(conn),
        })
    }

    /// Closes the underlying connection, surfacing any error SQLite reports.
    pub fn close(self) -> Result<()> {
        let conn = self
            .conn
            .into_inner()
            .map_err(|_| anyhow!("Document store connection poisoned"))?;
        conn.close()
            .map_err(|(_, e)| e)
            .context("Failed to close document store")
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Document store connection poisoned"))
    }

    /// Maps a document path to the SQL expression that reads it.
    fn field_expression(path: &str) -> Result<String> {
        let column = match path {
            "trackId" => "track_id",
            "trackName" => "track_name",
            "artists" => "artists",
            "albumName" => "album_name",
            "genre" => "genre",
            "popularity" => "popularity",
            "durationMs" => "duration_ms",
            "explicit" => "explicit",
            _ => {
                if let Some(feature) = path.strip_prefix("audioFeatures.") {
                    if AUDIO_FEATURES.iter().any(|(name, _)| *name == feature) {
                        return Ok(format!("json_extract(audio_features, '$.{}')", feature));
                    }
                }
                bail!("Unknown document field: {}", path);
            }
        };
        Ok(column.to_string())
    }

    fn parse_track_row(row: &rusqlite::Row) -> rusqlite::Result<TrackDocument> {
        Ok(TrackDocument {
            track_id: row.get(0)?,
            track_name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            artists: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            artist_list: json_column(row, 3)?,
            album_name: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
            genre: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
            popularity: row.get(6)?,
            duration_ms: row.get(7)?,
            explicit: row.get(8)?,
            audio_features: json_column(row, 9)?,
        })
    }

    fn parse_summary_row(row: &rusqlite::Row) -> rusqlite::Result<TrackSummary> {
        Ok(TrackSummary {
            track_name: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
            artists: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            popularity: row.get(2)?,
            genre: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        })
    }
}

/// Reads a JSON text column, treating NULL as the type's default.
fn json_column<T: DeserializeOwned + Default>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T> {
    match row.get::<_, Option<String>>(idx)? {
        Some(text) => serde_json::from_str(&text).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        }),
        None => Ok(T::default()),
    }
}

fn classify_constraint_failure(err: &ffi::Error, message: Option<String>) -> InsertFailureKind {
    if err.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
        || err.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    {
        InsertFailureKind::DuplicateKey
    } else {
        InsertFailureKind::Rejected(message.unwrap_or_else(|| err.to_string()))
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn count_tracks(&self) -> Result<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM tracks", [], |r| r.get(0))?;
        Ok(count as u64)
    }

    fn drop_tracks(&self) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        TRACKS_TABLE.drop(&tx)?;
        TRACKS_TABLE.create(&tx)?;
        tx.commit()?;
        info!("Dropped track collection");
        Ok(())
    }

    fn insert_many_unordered(&self, docs: &[TrackDocument]) -> Result<InsertManyOutcome> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut outcome = InsertManyOutcome::default();
        {
            let mut stmt = tx.prepare_cached(&format!(
                "INSERT INTO tracks ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                DOCUMENT_COLUMNS
            ))?;
            for (index, doc) in docs.iter().enumerate() {
                let result = stmt.execute(params![
                    doc.track_id,
                    doc.track_name,
                    doc.artists,
                    serde_json::to_string(&doc.artist_list)?,
                    doc.album_name,
                    doc.genre,
                    doc.popularity,
                    doc.duration_ms,
                    doc.explicit,
                    serde_json::to_string(&doc.audio_features)?,
                ]);
                match result {
                    Ok(_) => outcome.inserted += 1,
                    Err(rusqlite::Error::SqliteFailure(err, message))
                        if err.code == ErrorCode::ConstraintViolation =>
                    {
                        let kind = classify_constraint_failure(&err, message);
                        debug!("Document {} not inserted: {:?}", doc.track_id, kind);
                        outcome.failures.push(InsertFailure {
                            index,
                            track_id: doc.track_id.clone(),
                            kind,
                        });
                    }
                    Err(e) => {
                        return Err(e)
                            .with_context(|| format!("Failed to insert document {}", doc.track_id))
                    }
                }
            }
        }
        tx.commit()?;
        Ok(outcome)
    }

    fn create_index(&self, spec: &IndexSpec) -> Result<IndexOutcome> {
        let conn = self.conn()?;
        if index_exists(&conn, spec.name)? {
            return Ok(IndexOutcome::AlreadyExists);
        }

        let keys = spec
            .keys
            .iter()
            .map(|key| {
                let expression = Self::field_expression(key.path)?;
                Ok(match key.order {
                    SortOrder::Ascending => expression,
                    SortOrder::Descending => format!("{} DESC", expression),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        if keys.is_empty() {
            bail!("Index {} has no keys", spec.name);
        }

        conn.execute(
            &format!(
                "CREATE {}INDEX {} ON tracks({})",
                if spec.unique { "UNIQUE " } else { "" },
                spec.name,
                keys.join(", ")
            ),
            [],
        )
        .with_context(|| format!("Failed to create index {}", spec.name))?;
        Ok(IndexOutcome::Created)
    }

    fn list_indexes(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'index' AND tbl_name = 'tracks' AND name NOT LIKE 'sqlite_autoindex%'
             ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |r| r.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    fn projection_page(&self, after: Option<i64>, limit: usize) -> Result<ProjectionPage> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT rowid, track_id, track_name, artist_list, genre FROM tracks
             WHERE rowid > ?1 ORDER BY rowid LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![after.unwrap_or(0), limit as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    TrackProjection {
                        track_id: row.get(1)?,
                        track_name: row.get(2)?,
                        artist_list: json_column(row, 3)?,
                        genre: row.get(4)?,
                    },
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let next_cursor = if limit > 0 && rows.len() == limit {
            rows.last().map(|(rowid, _)| *rowid)
        } else {
            None
        };
        Ok(ProjectionPage {
            rows: rows.into_iter().map(|(_, projection)| projection).collect(),
            next_cursor,
        })
    }

    fn get_track(&self, track_id: &str) -> Result<Option<TrackDocument>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM tracks WHERE track_id = ?1",
            DOCUMENT_COLUMNS
        ))?;
        Ok(stmt
            .query_row(params![track_id], Self::parse_track_row)
            .optional()?)
    }

    fn sample_tracks(&self, limit: usize) -> Result<Vec<TrackDocument>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM tracks ORDER BY rowid LIMIT ?1",
            DOCUMENT_COLUMNS
        ))?;
        let docs = stmt
            .query_map(params![limit as i64], Self::parse_track_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(docs)
    }

    fn top_tracks_for_artists(
        &self,
        artists: &[String],
        limit: usize,
    ) -> Result<Vec<TrackSummary>> {
        if artists.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let conn = self.conn()?;
        let placeholders = vec!["?"; artists.len()].join(", ");
        let mut stmt = conn.prepare(&format!(
            "SELECT track_name, artists, popularity, genre FROM tracks
             WHERE artists IN ({})
             ORDER BY popularity DESC, rowid
             LIMIT {}",
            placeholders, limit
        ))?;
        let tracks = stmt
            .query_map(params_from_iter(artists.iter()), Self::parse_summary_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tracks)
    }

    fn top_tracks_by_popularity(&self, limit: usize) -> Result<Vec<TrackSummary>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT track_name, artists, popularity, genre FROM tracks
             ORDER BY popularity DESC, rowid LIMIT ?1",
        )?;
        let tracks = stmt
            .query_map(params![limit as i64], Self::parse_summary_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tracks)
    }

    fn average_feature_by_genre(&self, feature: &str, limit: usize) -> Result<Vec<GenreAverage>> {
        let expression = Self::field_expression(&format!("audioFeatures.{}", feature))?;
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT genre, AVG({}) AS average FROM tracks
             GROUP BY genre
             HAVING average IS NOT NULL
             ORDER BY average DESC
             LIMIT ?1",
            expression
        ))?;
        let averages = stmt
            .query_map(params![limit as i64], |row| {
                Ok(GenreAverage {
                    genre: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                    average: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(averages)
    }

    fn count_by(&self, field: GroupField, limit: usize) -> Result<Vec<GroupCount>> {
        let column = match field {
            GroupField::Artists => "artists",
            GroupField::Genre => "genre",
        };
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {0}, COUNT(*) AS total FROM tracks
             GROUP BY {0}
             ORDER BY total DESC, {0}
             LIMIT ?1",
            column
        ))?;
        let counts = stmt
            .query_map(params![limit as i64], |row| {
                Ok(GroupCount {
                    value: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                    total: row.get::<_, i64>(1)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(counts)
    }

    fn server_version(&self) -> Result<String> {
        let conn = self.conn()?;
        Ok(conn.query_row("SELECT sqlite_version()", [], |r| r.get(0))?)
    }
}
