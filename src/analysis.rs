//! Read-only reports over both stores.

use crate::document_store::{DocumentStore, GenreAverage, GroupCount, GroupField, TrackSummary};
use crate::graph_store::{GraphCounts, GraphStore, NamedCount};
use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

pub const DEFAULT_ANALYSIS_LIMIT: usize = 10;

/// Songs listed under the top artist and the top genre.
const SAMPLE_SONGS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentAnalysis {
    pub top_tracks: Vec<TrackSummary>,
    pub energy_by_genre: Vec<GenreAverage>,
    pub top_artists: Vec<GroupCount>,
    pub top_genres: Vec<GroupCount>,
}

/// Songs belonging to the biggest artist or genre of the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SongSample {
    pub name: String,
    pub songs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphAnalysis {
    pub counts: GraphCounts,
    pub top_artists: Vec<NamedCount>,
    pub top_genres: Vec<NamedCount>,
    pub top_artist_songs: Option<SongSample>,
    pub top_genre_songs: Option<SongSample>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogAnalysis {
    pub documents: DocumentAnalysis,
    pub graph: GraphAnalysis,
}

pub fn analyze_documents(store: &dyn DocumentStore, limit: usize) -> Result<DocumentAnalysis> {
    Ok(DocumentAnalysis {
        top_tracks: store.top_tracks_by_popularity(limit)?,
        energy_by_genre: store.average_feature_by_genre("energy", limit)?,
        top_artists: store.count_by(GroupField::Artists, limit)?,
        top_genres: store.count_by(GroupField::Genre, limit)?,
    })
}

pub fn analyze_graph(store: &dyn GraphStore, limit: usize) -> Result<GraphAnalysis> {
    let top_artists = store.top_artists_by_songs(limit)?;
    let top_genres = store.top_genres_by_songs(limit)?;

    let top_artist_songs = match top_artists.first() {
        Some(artist) => Some(SongSample {
            name: artist.name.clone(),
            songs: store.songs_by_artist(&artist.name, SAMPLE_SONGS)?,
        }),
        None => None,
    };
    let top_genre_songs = match top_genres.first() {
        Some(genre) => Some(SongSample {
            name: genre.name.clone(),
            songs: store.songs_in_genre(&genre.name, SAMPLE_SONGS)?,
        }),
        None => None,
    };

    Ok(GraphAnalysis {
        counts: store.counts()?,
        top_artists,
        top_genres,
        top_artist_songs,
        top_genre_songs,
    })
}

pub fn analyze(
    documents: &dyn DocumentStore,
    graph: &dyn GraphStore,
    limit: usize,
) -> Result<CatalogAnalysis> {
    let analysis = CatalogAnalysis {
        documents: analyze_documents(documents, limit).context("Document analysis failed")?,
        graph: analyze_graph(graph, limit).context("Graph analysis failed")?,
    };
    info!(
        "Analysis done: {} genres averaged, {} songs in graph",
        analysis.documents.energy_by_genre.len(),
        analysis.graph.counts.songs
    );
    Ok(analysis)
}

/// Liveness and inventory of one store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreHealth<T> {
    Ok { version: String, inventory: T },
    Failed(String),
}

impl<T> StoreHealth<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, StoreHealth::Ok { .. })
    }

    fn from_result(result: Result<(String, T)>) -> Self {
        match result {
            Ok((version, inventory)) => StoreHealth::Ok { version, inventory },
            Err(e) => StoreHealth::Failed(format!("{:#}", e)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub documents: StoreHealth<u64>,
    pub graph: StoreHealth<GraphCounts>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.documents.is_ok() && self.graph.is_ok()
    }
}

fn check_document_store(store: &dyn DocumentStore) -> StoreHealth<u64> {
    StoreHealth::from_result(
        store
            .server_version()
            .and_then(|v| Ok((v, store.count_tracks()?))),
    )
}

fn check_graph_store(store: &dyn GraphStore) -> StoreHealth<GraphCounts> {
    StoreHealth::from_result(
        store
            .server_version()
            .and_then(|v| Ok((v, store.counts()?))),
    )
}

/// Probes every store that could be opened. Open and probe failures are
/// captured in the report rather than returned, so one broken store does not
/// hide the state of the other.
pub fn check_stores(
    documents: std::result::Result<&dyn DocumentStore, &anyhow::Error>,
    graph: std::result::Result<&dyn GraphStore, &anyhow::Error>,
) -> HealthReport {
    HealthReport {
        documents: match documents {
            Ok(store) => check_document_store(store),
            Err(e) => StoreHealth::Failed(format!("{:#}", e)),
        },
        graph: match graph {
            Ok(store) => check_graph_store(store),
            Err(e) => StoreHealth::Failed(format!("{:#}", e)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document_store::{MockDocumentStore, SqliteDocumentStore};
    use crate::graph_store::{GraphRow, MockGraphStore, SqliteGraphStore};
    use anyhow::anyhow;

    fn graph_row(track_id: &str, artist: &str, genre: &str) -> GraphRow {
        GraphRow {
            track_id: track_id.to_string(),
            track_name: Some(format!("Song {}", track_id)),
            artist: artist.to_string(),
            genre: genre.to_string(),
        }
    }

    #[test]
    fn test_graph_analysis_samples_top_artist_and_genre() {
        let graph = SqliteGraphStore::in_memory().unwrap();
        graph
            .upsert_batch(&[
                graph_row("t1", "A", "pop"),
                graph_row("t2", "A", "pop"),
                graph_row("t3", "B", "rock"),
            ])
            .unwrap();

        let analysis = analyze_graph(&graph, 10).unwrap();

        assert_eq!(analysis.counts.songs, 3);
        assert_eq!(analysis.top_artists[0].name, "A");
        assert_eq!(
            analysis.top_artist_songs,
            Some(SongSample {
                name: "A".to_string(),
                songs: vec!["Song t1".to_string(), "Song t2".to_string()],
            })
        );
        assert_eq!(analysis.top_genre_songs.unwrap().name, "pop");
    }

    #[test]
    fn test_empty_stores_analyze_cleanly() {
        let documents = SqliteDocumentStore::in_memory().unwrap();
        let graph = SqliteGraphStore::in_memory().unwrap();

        let analysis = analyze(&documents, &graph, 10).unwrap();

        assert!(analysis.documents.top_tracks.is_empty());
        assert!(analysis.documents.energy_by_genre.is_empty());
        assert!(analysis.graph.top_artist_songs.is_none());
        assert_eq!(analysis.graph.counts, GraphCounts::default());
    }

    #[test]
    fn test_check_reports_each_store_independently() {
        let mut documents = MockDocumentStore::new();
        documents
            .expect_server_version()
            .returning(|| Err(anyhow!("unable to open database file")));
        let mut graph = MockGraphStore::new();
        graph
            .expect_server_version()
            .returning(|| Ok("3.45.0".to_string()));
        graph.expect_counts().returning(|| Ok(GraphCounts::default()));

        let report = check_stores(Ok(&documents), Ok(&graph));

        assert!(!report.is_healthy());
        assert_eq!(
            report.documents,
            StoreHealth::Failed("unable to open database file".to_string())
        );
        assert!(report.graph.is_ok());
    }

    #[test]
    fn test_store_that_failed_to_open_does_not_mask_the_other() {
        let open_error = anyhow!("Failed to open document store");
        let graph = SqliteGraphStore::in_memory().unwrap();
        graph
            .upsert_batch(&[graph_row("t1", "A", "pop")])
            .unwrap();

        let report = check_stores(Err(&open_error), Ok(&graph));

        assert!(!report.is_healthy());
        assert_eq!(
            report.documents,
            StoreHealth::Failed("Failed to open document store".to_string())
        );
        match report.graph {
            StoreHealth::Ok { inventory, .. } => assert_eq!(inventory.songs, 1),
            StoreHealth::Failed(e) => panic!("unexpected failure: {}", e),
        }
    }

    #[test]
    fn test_check_healthy_stores() {
        let documents = SqliteDocumentStore::in_memory().unwrap();
        let graph = SqliteGraphStore::in_memory().unwrap();

        let report = check_stores(Ok(&documents), Ok(&graph));

        assert!(report.is_healthy());
        match report.documents {
            StoreHealth::Ok { inventory, .. } => assert_eq!(inventory, 0),
            StoreHealth::Failed(e) => panic!("unexpected failure: {}", e),
        }
    }
}
