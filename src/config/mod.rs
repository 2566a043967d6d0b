mod file_config;

pub use file_config::{BatchingConfig, FileConfig, QueriesConfig};

use crate::analysis::DEFAULT_ANALYSIS_LIMIT;
use crate::batch_loader::{OnExistingData, DEFAULT_LOAD_BATCH_SIZE};
use crate::graph_builder::{DEFAULT_GRAPH_BATCH_SIZE, DEFAULT_PROJECTION_PAGE_SIZE};
use crate::recommender::{DEFAULT_PEER_LIMIT, DEFAULT_TRACK_LIMIT};
use anyhow::{anyhow, bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub data_dir: Option<PathBuf>,
    pub dataset_path: Option<PathBuf>,
    pub on_existing: Option<OnExistingData>,
    pub load_batch_size: Option<usize>,
    pub graph_batch_size: Option<usize>,
    pub peer_limit: Option<usize>,
    pub track_limit: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub dataset_path: PathBuf,
    pub on_existing: Option<OnExistingData>,
    pub batching: BatchingSettings,
    pub queries: QueriesSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchingSettings {
    pub load_batch_size: usize,
    pub graph_batch_size: usize,
    pub projection_page_size: usize,
}

impl Default for BatchingSettings {
    fn default() -> Self {
        Self {
            load_batch_size: DEFAULT_LOAD_BATCH_SIZE,
            graph_batch_size: DEFAULT_GRAPH_BATCH_SIZE,
            projection_page_size: DEFAULT_PROJECTION_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueriesSettings {
    pub peer_limit: usize,
    pub track_limit: usize,
    pub analysis_limit: usize,
}

impl Default for QueriesSettings {
    fn default() -> Self {
        Self {
            peer_limit: DEFAULT_PEER_LIMIT,
            track_limit: DEFAULT_TRACK_LIMIT,
            analysis_limit: DEFAULT_ANALYSIS_LIMIT,
        }
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .or_else(|| cli.data_dir.clone())
            .ok_or_else(|| anyhow!("data_dir must be specified via --data-dir or in config file"))?;

        if !data_dir.exists() {
            bail!("Data directory does not exist: {:?}", data_dir);
        }
        if !data_dir.is_dir() {
            bail!("data_dir is not a directory: {:?}", data_dir);
        }

        let dataset_path = file
            .dataset_path
            .map(PathBuf::from)
            .or_else(|| cli.dataset_path.clone())
            .unwrap_or_else(|| data_dir.join("dataset.csv"));

        let on_existing = match file.on_existing {
            Some(s) => Some(
                parse_on_existing(&s)
                    .ok_or_else(|| anyhow!("Invalid on_existing value in config file: {:?}", s))?,
            ),
            None => cli.on_existing,
        };

        let batching_file = file.batching.unwrap_or_default();
        let batching_defaults = BatchingSettings::default();
        let batching = BatchingSettings {
            load_batch_size: batching_file
                .load_batch_size
                .or(cli.load_batch_size)
                .unwrap_or(batching_defaults.load_batch_size),
            graph_batch_size: batching_file
                .graph_batch_size
                .or(cli.graph_batch_size)
                .unwrap_or(batching_defaults.graph_batch_size),
            projection_page_size: batching_file
                .projection_page_size
                .unwrap_or(batching_defaults.projection_page_size),
        };

        let queries_file = file.queries.unwrap_or_default();
        let queries_defaults = QueriesSettings::default();
        let queries = QueriesSettings {
            peer_limit: queries_file
                .peer_limit
                .or(cli.peer_limit)
                .unwrap_or(queries_defaults.peer_limit),
            track_limit: queries_file
                .track_limit
                .or(cli.track_limit)
                .unwrap_or(queries_defaults.track_limit),
            analysis_limit: queries_file
                .analysis_limit
                .unwrap_or(queries_defaults.analysis_limit),
        };

        for (name, value) in [
            ("load_batch_size", batching.load_batch_size),
            ("graph_batch_size", batching.graph_batch_size),
            ("projection_page_size", batching.projection_page_size),
            ("peer_limit", queries.peer_limit),
            ("track_limit", queries.track_limit),
            ("analysis_limit", queries.analysis_limit),
        ] {
            if value == 0 {
                bail!("{} must be greater than zero", name);
            }
        }

        Ok(Self {
            data_dir,
            dataset_path,
            on_existing,
            batching,
            queries,
        })
    }

    pub fn document_db_path(&self) -> PathBuf {
        self.data_dir.join("tracks.db")
    }

    pub fn graph_db_path(&self) -> PathBuf {
        self.data_dir.join("graph.db")
    }
}

/// Uses clap's ValueEnum trait for parsing.
fn parse_on_existing(s: &str) -> Option<OnExistingData> {
    OnExistingData::from_str(s, true).ok()
}
