//! Error types for the session store

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::model::ValidationError;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage error types
#[derive(Error, Debug)]
pub enum StorageError {
    /// The storage root could not be prepared
    #[error("Failed to initialize storage at {path}: {source}")]
    Initialization {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Record rejected at the write boundary
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Encoded record exceeds the configured maximum file size
    #[error("Record {id} is {size} bytes, exceeding the {limit} byte limit")]
    RecordTooLarge { id: String, size: u64, limit: u64 },

    /// Some buffered records could not be persisted; they were re-queued
    #[error("Flush persisted {persisted} records but failed {failed}")]
    PartialFlush { persisted: usize, failed: usize },

    /// Operation issued before `initialize()`
    #[error("Store has not been initialized")]
    NotInitialized,

    /// Operation issued after `shutdown()`
    #[error("Store has been shut down")]
    Closed,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic error wrapper
    #[error("Storage error: {0}")]
    Other(#[from] anyhow::Error),
}

impl StorageError {
    /// Create a serialization error
    pub fn serialization<E: fmt::Display>(err: E) -> Self {
        Self::Serialization(err.to_string())
    }

    /// Create a configuration error
    pub fn configuration<E: fmt::Display>(msg: E) -> Self {
        Self::Configuration(msg.to_string())
    }

    /// Check if this error comes from the store's lifecycle state rather than the data
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::NotInitialized | Self::Closed)
    }

    /// Check if the operation may succeed when retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::PartialFlush { .. })
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err)
    }
}
