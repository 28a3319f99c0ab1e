//! # AgentLens
//!
//! Durable storage and statistical analysis for multi-agent activity records.
//!
//! ## Modules
//!
//! - `model` - Session and activity records, validation and lenient ingestion
//! - `storage` - Buffered, indexed file store with retention and backups
//! - `analytics` - Summaries, efficiency scoring, trends, anomalies and insights
//! - `config` - TOML configuration for the store and analyzer
//! - `logging` - Tracing subscriber setup
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use agentlens::analytics::{Analyzer, AnalyzerConfig};
//! use agentlens::storage::{SessionFilter, Store, StoreConfig};
//!
//! # async fn run() -> agentlens::Result<()> {
//! let store = Arc::new(Store::new(StoreConfig::from_env()));
//! store.initialize().await?;
//!
//! let analyzer = Analyzer::new(store.clone(), AnalyzerConfig::default());
//! let result = analyzer.analyze(&SessionFilter::default(), None).await?;
//! println!("{} sessions analyzed", result.summary.session_count);
//!
//! store.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod analytics;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod storage;

pub use config::{Config, ConfigError};
pub use error::{Error, Result};
