//! SQLite-backed graph store.

use super::models::*;
use super::schema::GRAPH_SCHEMA;
use super::trait_def::GraphStore;
use crate::sqlite_persistence::open_versioned_db;
use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, ErrorCode, OpenFlags, Transaction};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

const UPSERT_SONG: &str = "INSERT INTO songs (track_id, track_name) VALUES (?1, ?2)
     ON CONFLICT(track_id) DO UPDATE SET track_name = excluded.track_name";
const MERGE_ARTIST: &str = "INSERT OR IGNORE INTO artists (name) VALUES (?1)";
const MERGE_GENRE: &str = "INSERT OR IGNORE INTO genres (name) VALUES (?1)";
const MERGE_BY_ARTIST: &str = "INSERT OR IGNORE INTO by_artist (song_rowid, artist_rowid)
     SELECT s.rowid, a.rowid FROM songs s, artists a WHERE s.track_id = ?1 AND a.name = ?2";
const MERGE_IN_GENRE: &str = "INSERT OR IGNORE INTO in_genre (song_rowid, genre_rowid)
     SELECT s.rowid, g.rowid FROM songs s, genres g WHERE s.track_id = ?1 AND g.name = ?2";
const MERGE_PLAYS_GENRE: &str = "INSERT OR IGNORE INTO plays_genre (artist_rowid, genre_rowid)
     SELECT a.rowid, g.rowid FROM artists a, genres g WHERE a.name = ?1 AND g.name = ?2";

/// Property graph persisted as node and link tables in one SQLite file.
pub struct SqliteGraphStore {
    conn: Mutex<Connection>,
}

impl SqliteGraphStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        let conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open graph store at {:?}", db_path))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        open_versioned_db(&conn, &GRAPH_SCHEMA, "graph")?;
        info!("Opened graph store {:?}", db_path);

        Ok(SqliteGraphStore {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        open_versioned_db(&conn, &GRAPH_SCHEMA, "graph")?;
        Ok(SqliteGraphStore {
            conn: Mutex::new(conn),
        })
    }

    pub fn close(self) -> Result<()> {
        let conn = self
            .conn
            .into_inner()
            .map_err(|_| anyhow!("Graph store connection poisoned"))?;
        conn.close()
            .map_err(|(_, e)| e)
            .context("Failed to close graph store")
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Graph store connection poisoned"))
    }

    fn write_rows(tx: &Transaction, rows: &[GraphRow]) -> rusqlite::Result<()> {
        let mut upsert_song = tx.prepare_cached(UPSERT_SONG)?;
        let mut merge_artist = tx.prepare_cached(MERGE_ARTIST)?;
        let mut merge_genre = tx.prepare_cached(MERGE_GENRE)?;
        let mut merge_by_artist = tx.prepare_cached(MERGE_BY_ARTIST)?;
        let mut merge_in_genre = tx.prepare_cached(MERGE_IN_GENRE)?;
        let mut merge_plays_genre = tx.prepare_cached(MERGE_PLAYS_GENRE)?;

        for row in rows {
            upsert_song.execute(params![row.track_id, row.track_name])?;
            merge_artist.execute(params![row.artist])?;
            merge_genre.execute(params![row.genre])?;
            merge_by_artist.execute(params![row.track_id, row.artist])?;
            merge_in_genre.execute(params![row.track_id, row.genre])?;
            merge_plays_genre.execute(params![row.artist, row.genre])?;
        }
        Ok(())
    }

    fn named_counts(&self, sql: &str, limit: usize) -> Result<Vec<NamedCount>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(sql)?;
        let counts = stmt
            .query_map(params![limit as i64], |row| {
                Ok(NamedCount {
                    name: row.get(0)?,
                    total: row.get::<_, i64>(1)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(counts)
    }

    fn song_names(&self, sql: &str, key: &str, limit: usize) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(sql)?;
        let names = stmt
            .query_map(params![key, limit as i64], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }
}

/// Errors meaning the database cannot be used at all, as opposed to a
/// problem with the rows being written.
fn is_unavailable(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => matches!(
            e.code,
            ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::CannotOpen
                | ErrorCode::NotADatabase
                | ErrorCode::ReadOnly
                | ErrorCode::SystemIoFailure
                | ErrorCode::DatabaseCorrupt
        ),
        _ => false,
    }
}

fn batch_error(err: rusqlite::Error, rows: usize) -> BatchWriteError {
    if is_unavailable(&err) {
        BatchWriteError::Unavailable(err.into())
    } else {
        BatchWriteError::RolledBack {
            rows,
            cause: err.into(),
        }
    }
}

impl GraphStore for SqliteGraphStore {
    fn upsert_batch(&self, rows: &[GraphRow]) -> std::result::Result<(), BatchWriteError> {
        let mut conn = self.conn().map_err(BatchWriteError::Unavailable)?;
        let tx = conn.transaction().map_err(|e| {
            BatchWriteError::Unavailable(anyhow::Error::new(e).context("Failed to begin transaction"))
        })?;

        // An error drops `tx` uncommitted, which rolls the batch back.
        Self::write_rows(&tx, rows).map_err(|e| batch_error(e, rows.len()))?;
        tx.commit().map_err(|e| batch_error(e, rows.len()))?;

        debug!("Committed graph batch of {} rows", rows.len());
        Ok(())
    }

    fn artist_exists(&self, name: &str) -> Result<bool> {
        let conn = self.conn()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM artists WHERE name = ?1)",
            params![name],
            |r| r.get(0),
        )?;
        Ok(exists)
    }

    fn similar_artists(&self, seed: &str, limit: usize) -> Result<Vec<PeerArtist>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT DISTINCT other.rowid, other.name, g.name
             FROM artists seed
             JOIN plays_genre sp ON sp.artist_rowid = seed.rowid
             JOIN genres g ON g.rowid = sp.genre_rowid
             JOIN plays_genre op ON op.genre_rowid = g.rowid
             JOIN artists other ON other.rowid = op.artist_rowid
             WHERE seed.name = ?1 AND other.rowid <> seed.rowid
             ORDER BY other.rowid, g.name",
        )?;
        let pairs = stmt
            .query_map(params![seed], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut peers: Vec<(i64, PeerArtist)> = Vec::new();
        for (artist_rowid, artist, genre) in pairs {
            match peers.last_mut() {
                Some((rowid, peer)) if *rowid == artist_rowid => {
                    peer.shared_genres.push(genre);
                    peer.match_count = peer.shared_genres.len();
                }
                _ => peers.push((
                    artist_rowid,
                    PeerArtist {
                        artist,
                        shared_genres: vec![genre],
                        match_count: 1,
                    },
                )),
            }
        }

        // sort_by is stable: ties stay in store order
        let mut peers: Vec<PeerArtist> = peers.into_iter().map(|(_, peer)| peer).collect();
        peers.sort_by(|a, b| b.match_count.cmp(&a.match_count));
        peers.truncate(limit);
        Ok(peers)
    }

    fn top_artists_by_songs(&self, limit: usize) -> Result<Vec<NamedCount>> {
        self.named_counts(
            "SELECT a.name, COUNT(*) AS total
             FROM artists a JOIN by_artist b ON b.artist_rowid = a.rowid
             GROUP BY a.rowid
             ORDER BY total DESC, a.name
             LIMIT ?1",
            limit,
        )
    }

    fn top_genres_by_songs(&self, limit: usize) -> Result<Vec<NamedCount>> {
        self.named_counts(
            "SELECT g.name, COUNT(*) AS total
             FROM genres g JOIN in_genre i ON i.genre_rowid = g.rowid
             GROUP BY g.rowid
             ORDER BY total DESC, g.name
             LIMIT ?1",
            limit,
        )
    }

    fn songs_by_artist(&self, artist: &str, limit: usize) -> Result<Vec<String>> {
        self.song_names(
            "SELECT COALESCE(s.track_name, s.track_id)
             FROM songs s
             JOIN by_artist b ON b.song_rowid = s.rowid
             JOIN artists a ON a.rowid = b.artist_rowid
             WHERE a.name = ?1
             ORDER BY s.rowid
             LIMIT ?2",
            artist,
            limit,
        )
    }

    fn songs_in_genre(&self, genre: &str, limit: usize) -> Result<Vec<String>> {
        self.song_names(
            "SELECT COALESCE(s.track_name, s.track_id)
             FROM songs s
             JOIN in_genre i ON i.song_rowid = s.rowid
             JOIN genres g ON g.rowid = i.genre_rowid
             WHERE g.name = ?1
             ORDER BY s.rowid
             LIMIT ?2",
            genre,
            limit,
        )
    }

    fn counts(&self) -> Result<GraphCounts> {
        let conn = self.conn()?;
        let count = |table: &str| -> Result<u64> {
            let total: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))?;
            Ok(total as u64)
        };
        Ok(GraphCounts {
            songs: count("songs")?,
            artists: count("artists")?,
            genres: count("genres")?,
            by_artist: count("by_artist")?,
            in_genre: count("in_genre")?,
            plays_genre: count("plays_genre")?,
        })
    }

    fn server_version(&self) -> Result<String> {
        let conn = self.conn()?;
        Ok(conn.query_row("SELECT sqlite_version()", [], |r| r.get(0))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(track_id: &str, artist: &str, genre: &str) -> GraphRow {
        GraphRow {
            track_id: track_id.to_string(),
            track_name: Some(format!("Song {}", track_id)),
            artist: artist.to_string(),
            genre: genre.to_string(),
        }
    }

    fn seeded_store() -> SqliteGraphStore {
        // A{pop, rock}, B{rock, jazz}, C{pop}
        let store = SqliteGraphStore::in_memory().unwrap();
        store
            .upsert_batch(&[
                row("t1", "A", "pop"),
                row("t2", "A", "rock"),
                row("t3", "B", "rock"),
                row("t4", "B", "jazz"),
                row("t5", "C", "pop"),
            ])
            .unwrap();
        store
    }

    #[test]
    fn test_upsert_creates_nodes_and_edges() {
        let store = seeded_store();
        let counts = store.counts().unwrap();
        assert_eq!(
            counts,
            GraphCounts {
                songs: 5,
                artists: 3,
                genres: 3,
                by_artist: 5,
                in_genre: 5,
                plays_genre: 5,
            }
        );
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let store = seeded_store();
        let before = store.counts().unwrap();
        store
            .upsert_batch(&[row("t1", "A", "pop"), row("t3", "B", "rock")])
            .unwrap();
        assert_eq!(store.counts().unwrap(), before);
    }

    #[test]
    fn test_upsert_refreshes_song_name() {
        let store = SqliteGraphStore::in_memory().unwrap();
        store.upsert_batch(&[row("t1", "A", "pop")]).unwrap();

        let mut renamed = row("t1", "A", "pop");
        renamed.track_name = Some("Renamed".to_string());
        store.upsert_batch(&[renamed]).unwrap();
        assert_eq!(store.songs_by_artist("A", 10).unwrap(), vec!["Renamed"]);

        let mut cleared = row("t1", "A", "pop");
        cleared.track_name = None;
        store.upsert_batch(&[cleared]).unwrap();
        assert_eq!(store.songs_by_artist("A", 10).unwrap(), vec!["t1"]);
    }

    #[test]
    fn test_failing_row_rolls_back_whole_batch() {
        let store = SqliteGraphStore::in_memory().unwrap();
        store
            .conn()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_boom BEFORE INSERT ON songs
                 WHEN NEW.track_id = 'boom'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let result = store.upsert_batch(&[row("t1", "A", "pop"), row("boom", "B", "rock")]);
        match result {
            Err(BatchWriteError::RolledBack { rows, .. }) => assert_eq!(rows, 2),
            other => panic!("expected rolled back batch, got {:?}", other),
        }
        assert_eq!(store.counts().unwrap(), GraphCounts::default());

        store.upsert_batch(&[row("t2", "C", "jazz")]).unwrap();
        assert_eq!(store.counts().unwrap().songs, 1);
    }

    #[test]
    fn test_rolled_back_batch_keeps_earlier_commits() {
        let store = SqliteGraphStore::in_memory().unwrap();
        store.upsert_batch(&[row("t1", "A", "pop")]).unwrap();
        let committed = store.counts().unwrap();
        store
            .conn()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_boom BEFORE INSERT ON songs
                 WHEN NEW.track_id = 'boom'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let result = store.upsert_batch(&[row("t2", "A", "rock"), row("boom", "B", "rock")]);

        assert!(matches!(
            result,
            Err(BatchWriteError::RolledBack { rows: 2, .. })
        ));
        assert_eq!(
            store.counts().unwrap(),
            GraphCounts {
                songs: 1,
                artists: 1,
                genres: 1,
                by_artist: 1,
                in_genre: 1,
                plays_genre: 1,
            }
        );
        assert_eq!(store.counts().unwrap(), committed);
        assert_eq!(store.songs_by_artist("A", 10).unwrap(), vec!["Song t1"]);
    }

    #[test]
    fn test_similar_artists_shares_genres_and_excludes_seed() {
        let store = seeded_store();

        let peers = store.similar_artists("A", 20).unwrap();
        assert_eq!(peers.len(), 2);
        assert_eq!(peers[0].artist, "B");
        assert_eq!(peers[0].shared_genres, vec!["rock"]);
        assert_eq!(peers[0].match_count, 1);
        assert_eq!(peers[1].artist, "C");
        assert_eq!(peers[1].shared_genres, vec!["pop"]);
        assert!(peers.iter().all(|p| p.artist != "A"));
    }

    #[test]
    fn test_similar_artists_orders_by_match_count() {
        let store = seeded_store();
        store
            .upsert_batch(&[row("t6", "D", "pop"), row("t7", "D", "rock")])
            .unwrap();

        let peers = store.similar_artists("A", 20).unwrap();
        assert_eq!(peers[0].artist, "D");
        assert_eq!(peers[0].shared_genres, vec!["pop", "rock"]);
        assert_eq!(peers[0].match_count, 2);

        let capped = store.similar_artists("A", 1).unwrap();
        assert_eq!(capped.len(), 1);
        assert_eq!(capped[0].artist, "D");
    }

    #[test]
    fn test_similar_artists_for_unknown_seed_is_empty() {
        let store = seeded_store();
        assert!(!store.artist_exists("Nobody").unwrap());
        assert!(store.similar_artists("Nobody", 20).unwrap().is_empty());
        assert!(store.artist_exists("A").unwrap());
    }

    #[test]
    fn test_analysis_traversals() {
        let store = seeded_store();

        let artists = store.top_artists_by_songs(2).unwrap();
        assert_eq!(artists[0], NamedCount { name: "A".to_string(), total: 2 });
        assert_eq!(artists[1], NamedCount { name: "B".to_string(), total: 2 });

        let genres = store.top_genres_by_songs(1).unwrap();
        assert_eq!(genres[0].total, 2);

        assert_eq!(
            store.songs_in_genre("pop", 10).unwrap(),
            vec!["Song t1", "Song t5"]
        );
    }
}
