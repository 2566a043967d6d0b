use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub data_dir: Option<String>,
    pub dataset_path: Option<String>,
    /// "replace" or "skip-load"
    pub on_existing: Option<String>,

    // Tuning
    pub batching: Option<BatchingConfig>,
    pub queries: Option<QueriesConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct BatchingConfig {
    pub load_batch_size: Option<usize>,
    pub graph_batch_size: Option<usize>,
    pub projection_page_size: Option<usize>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct QueriesConfig {
    pub peer_limit: Option<usize>,
    pub track_limit: Option<usize>,
    pub analysis_limit: Option<usize>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_parses_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
data_dir = "/data"
on_existing = "skip-load"

[batching]
graph_batch_size = 250

[queries]
peer_limit = 5
"#
        )
        .unwrap();

        let config = FileConfig::load(file.path()).unwrap();

        assert_eq!(config.data_dir.as_deref(), Some("/data"));
        assert_eq!(config.on_existing.as_deref(), Some("skip-load"));
        let batching = config.batching.unwrap();
        assert_eq!(batching.graph_batch_size, Some(250));
        assert_eq!(batching.load_batch_size, None);
        assert_eq!(config.queries.unwrap().peer_limit, Some(5));
    }

    #[test]
    fn test_load_rejects_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "data_dir = ").unwrap();

        let err = FileConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
