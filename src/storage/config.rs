//! Store configuration types and defaults

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable overriding the storage root
pub const STORAGE_DIR_ENV: &str = "AGENTLENS_STORAGE_DIR";

/// Configuration for a [`Store`](super::Store)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory holding sessions, activities, indexes and backups
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    /// Gzip record files on disk
    #[serde(default)]
    pub compression: bool,

    /// Encryption at rest. Key management is not provided by this crate;
    /// the flag is accepted and reported, data stays plaintext.
    #[serde(default)]
    pub encryption: bool,

    /// Maximum size of a single encoded record (bytes)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Records whose files are older than this are removed by the retention sweep
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Number of buffered writes that triggers an automatic flush
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Maintain the on-disk lookup index
    #[serde(default = "default_true")]
    pub indexing: bool,

    /// Period of the background flush task
    #[serde(with = "humantime_serde", default = "default_flush_interval")]
    pub flush_interval: Duration,

    /// Period of the background retention sweep
    #[serde(with = "humantime_serde", default = "default_cleanup_interval")]
    pub cleanup_interval: Duration,

    /// Capacity of the lifecycle event channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            compression: false,
            encryption: false,
            max_file_size: default_max_file_size(),
            retention_days: default_retention_days(),
            buffer_size: default_buffer_size(),
            indexing: true,
            flush_interval: default_flush_interval(),
            cleanup_interval: default_cleanup_interval(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl StoreConfig {
    /// Create config with a custom base directory and defaults elsewhere
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }

    /// Default config, with the base directory taken from the environment if set
    pub fn from_env() -> Self {
        match std::env::var(STORAGE_DIR_ENV) {
            Ok(dir) if !dir.trim().is_empty() => Self::with_base_dir(dir),
            _ => Self::default(),
        }
    }

    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    pub fn with_indexing(mut self, enabled: bool) -> Self {
        self.indexing = enabled;
        self
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    /// Retention window as a chrono duration
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.retention_days))
    }
}

// Default value functions for serde
fn default_base_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".agentlens"))
        .unwrap_or_else(|| PathBuf::from(".agentlens"))
}

fn default_true() -> bool {
    true
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024 // 10MB
}

fn default_retention_days() -> u32 {
    30
}

fn default_buffer_size() -> usize {
    100
}

fn default_flush_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_cleanup_interval() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_event_capacity() -> usize {
    256
}
