use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const CONFIG_FILE: &str = "config.yml";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Origin the timestamp file is served from.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_timestamps_path")]
    pub timestamps_path: String,

    /// JSON map of node id to node.
    #[serde(default)]
    pub nodes_file: Option<String>,

    #[serde(default = "default_storage_file")]
    pub storage_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timestamps_path: default_timestamps_path(),
            nodes_file: None,
            storage_file: default_storage_file(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}
fn default_timestamps_path() -> String {
    "/timestamps.txt".to_string()
}
fn default_storage_file() -> String {
    "local_storage.json".to_string()
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Falls back to defaults when the file does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("{} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_yaml_ng::to_string(self)?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let config = Config::load_from(&temp_dir.path().join("config.yml"))?;
        assert_eq!(config, Config::default());
        assert_eq!(config.timestamps_path, "/timestamps.txt");
        Ok(())
    }

    #[test]
    fn test_partial_file_fills_defaults() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().join("config.yml");
        fs::write(&path, "base_url: https://example.org\nnodes_file: nodes.json\n")?;

        let config = Config::load_from(&path)?;
        assert_eq!(config.base_url, "https://example.org");
        assert_eq!(config.nodes_file.as_deref(), Some("nodes.json"));
        assert_eq!(config.storage_file, "local_storage.json");
        Ok(())
    }

    #[test]
    fn test_save_then_load() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().join("config.yml");
        let config = Config {
            storage_file: "state.json".to_string(),
            ..Config::default()
        };
        config.save_to(&path)?;
        assert_eq!(Config::load_from(&path)?, config);
        Ok(())
    }

    #[test]
    fn test_malformed_file_is_error() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().join("config.yml");
        fs::write(&path, "base_url: [unterminated")?;
        assert!(Config::load_from(&path).is_err());
        Ok(())
    }
}
