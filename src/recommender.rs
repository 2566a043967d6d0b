//! Hybrid recommendations: graph neighbourhood first, document ranking second.

use crate::document_store::{DocumentStore, TrackSummary};
use crate::graph_store::{GraphStore, PeerArtist};
use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};

pub const DEFAULT_PEER_LIMIT: usize = 20;
pub const DEFAULT_TRACK_LIMIT: usize = 15;

/// Result of a recommendation query. Empty outcomes are values so callers can
/// tell the operator why nothing came back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum RecommendationOutcome {
    /// The seed artist is not in the graph.
    UnknownSeed,
    /// The seed shares no genre with any other artist.
    NoPeers,
    /// Peers were found but none of them has tracks in the document store.
    NoTracks {
        #[serde(rename = "peerArtists")]
        peers: Vec<PeerArtist>,
    },
    Found {
        #[serde(rename = "peerArtists")]
        peers: Vec<PeerArtist>,
        tracks: Vec<TrackSummary>,
    },
}

impl RecommendationOutcome {
    pub fn peers(&self) -> &[PeerArtist] {
        match self {
            RecommendationOutcome::NoTracks { peers }
            | RecommendationOutcome::Found { peers, .. } => peers,
            _ => &[],
        }
    }

    pub fn tracks(&self) -> &[TrackSummary] {
        match self {
            RecommendationOutcome::Found { tracks, .. } => tracks,
            _ => &[],
        }
    }
}

pub struct HybridRecommender<'a> {
    documents: &'a dyn DocumentStore,
    graph: &'a dyn GraphStore,
    peer_limit: usize,
    track_limit: usize,
}

impl<'a> HybridRecommender<'a> {
    pub fn new(documents: &'a dyn DocumentStore, graph: &'a dyn GraphStore) -> Self {
        HybridRecommender {
            documents,
            graph,
            peer_limit: DEFAULT_PEER_LIMIT,
            track_limit: DEFAULT_TRACK_LIMIT,
        }
    }

    pub fn with_limits(mut self, peer_limit: usize, track_limit: usize) -> Self {
        self.peer_limit = peer_limit;
        self.track_limit = track_limit;
        self
    }

    /// Recommends tracks for fans of `seed_artist`. The name is matched
    /// exactly, case and whitespace included.
    pub fn recommend(&self, seed_artist: &str) -> Result<RecommendationOutcome> {
        if !self.graph.artist_exists(seed_artist)? {
            info!("Seed artist {:?} not found in graph", seed_artist);
            return Ok(RecommendationOutcome::UnknownSeed);
        }

        let peers = self.graph.similar_artists(seed_artist, self.peer_limit)?;
        if peers.is_empty() {
            info!("Seed artist {:?} shares no genre with other artists", seed_artist);
            return Ok(RecommendationOutcome::NoPeers);
        }
        debug!("{} peer artists for {:?}", peers.len(), seed_artist);

        let names: Vec<String> = peers.iter().map(|p| p.artist.clone()).collect();
        let tracks = self
            .documents
            .top_tracks_for_artists(&names, self.track_limit)?;
        if tracks.is_empty() {
            return Ok(RecommendationOutcome::NoTracks { peers });
        }

        info!(
            "Recommended {} tracks from {} peers of {:?}",
            tracks.len(),
            peers.len(),
            seed_artist
        );
        Ok(RecommendationOutcome::Found { peers, tracks })
    }
}
