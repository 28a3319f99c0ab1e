//! Durable, indexed storage for sessions and activities
//!
//! Records live as one JSON file each under a storage root (see [`layout`]).
//! A persistent index maps session ids, agent ids and days to files and is
//! rebuilt from disk whenever it cannot be loaded.

pub mod buffer;
pub mod codec;
pub mod config;
pub mod error;
pub mod events;
pub mod index;
pub mod layout;
pub mod metrics;
pub mod query;
pub mod retention;
pub mod store;

pub use config::{StoreConfig, STORAGE_DIR_ENV};
pub use error::{StorageError, StorageResult};
pub use events::StoreEvent;
pub use index::{RebuildStats, StoreIndex};
pub use metrics::StorageMetrics;
pub use query::{ActivityFilter, SessionFilter, TimeRange};
pub use retention::CleanupStats;
pub use store::{BackupReport, Store};
