//! File-based configuration
//!
//! ```toml
//! [storage]
//! base_dir = "/var/lib/agentlens"
//! compression = true
//! retention_days = 14
//! flush_interval = "10s"
//!
//! [analyzer]
//! baseline_success_rate = 0.9
//! ```
//!
//! Every key is optional. `AGENTLENS_STORAGE_DIR` overrides `storage.base_dir`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

use crate::analytics::AnalyzerConfig;
use crate::storage::{StoreConfig, STORAGE_DIR_ENV};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StoreConfig,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Read a config file and apply environment overrides
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env();
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults
    pub async fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match fs::try_exists(path).await {
            Ok(true) => Self::load(path).await,
            _ => {
                let mut config = Self::default();
                config.apply_env();
                Ok(config)
            }
        }
    }

    pub fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var(STORAGE_DIR_ENV) {
            if !dir.trim().is_empty() {
                self.storage.base_dir = PathBuf::from(dir);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_sections_and_defaults() {
        let config = Config::from_toml_str(
            r#"
            [storage]
            base_dir = "/data/lens"
            compression = true
            flush_interval = "10s"

            [analyzer]
            std_dev_threshold = 3.0
            "#,
        )
        .unwrap();

        assert_eq!(config.storage.base_dir, PathBuf::from("/data/lens"));
        assert!(config.storage.compression);
        assert_eq!(config.storage.flush_interval, Duration::from_secs(10));
        assert_eq!(config.storage.buffer_size, 100);
        assert_eq!(config.analyzer.std_dev_threshold, 3.0);
        assert_eq!(config.analyzer.baseline_success_rate, 0.85);
    }

    #[test]
    fn test_empty_document_is_default() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.analyzer, AnalyzerConfig::default());
        assert_eq!(config.storage.retention_days, 30);
    }

    #[test]
    fn test_parse_error() {
        let err = Config::from_toml_str("[storage\nbroken").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("absent.toml");

        assert!(matches!(
            Config::load(&path).await,
            Err(ConfigError::Read { .. })
        ));
        let config = Config::load_or_default(&path).await.unwrap();
        assert_eq!(config.analyzer, AnalyzerConfig::default());
    }
}
