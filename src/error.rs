use thiserror::Error;

use crate::analytics::AnalysisError;
use crate::config::ConfigError;
use crate::model::ValidationError;
use crate::storage::StorageError;

/// Any error this crate can return
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

pub type Result<T> = std::result::Result<T, Error>;
