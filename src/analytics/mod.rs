//! Statistical analysis of stored agent sessions
//!
//! Derives session summaries, per-agent performance, trends, anomalies and
//! ranked insights. Nothing here mutates stored records.

pub mod anomaly;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod insights;
pub mod metrics;
pub mod models;
pub mod source;
pub mod stats;
pub mod trends;

pub use config::{AnalyzerConfig, EfficiencyWeights};
pub use engine::Analyzer;
pub use error::AnalysisError;
pub use models::*;
pub use source::SessionSource;
