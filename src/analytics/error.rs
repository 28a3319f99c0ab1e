use thiserror::Error;

use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum AnalysisError {
    /// The session query behind an analysis failed
    #[error("Failed to load sessions: {0}")]
    Storage(#[from] StorageError),

    /// A statistic could not be computed from the sample
    #[error("Statistics error: {0}")]
    Statistics(String),
}

impl AnalysisError {
    pub fn statistics<E: std::fmt::Display>(msg: E) -> Self {
        Self::Statistics(msg.to_string())
    }
}
