//! Storage counters and the metrics snapshot handed to presenters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageMetrics {
    pub total_files: u64,
    pub total_size: u64,
    pub average_file_size: f64,
    pub read_operations: u64,
    pub write_operations: u64,
    pub errors: u64,
    pub last_cleanup: Option<DateTime<Utc>>,
}

/// Live counters updated from any task
#[derive(Debug, Default)]
pub struct Counters {
    reads: AtomicU64,
    writes: AtomicU64,
    errors: AtomicU64,
    last_cleanup: Mutex<Option<DateTime<Utc>>>,
}

impl Counters {
    pub fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_errors(&self, n: u64) {
        self.errors.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_cleanup(&self, at: DateTime<Utc>) {
        if let Ok(mut last) = self.last_cleanup.lock() {
            *last = Some(at);
        }
    }

    /// Combine counters with the on-disk file totals
    pub fn snapshot(&self, total_files: u64, total_size: u64) -> StorageMetrics {
        let average_file_size = if total_files == 0 {
            0.0
        } else {
            total_size as f64 / total_files as f64
        };
        StorageMetrics {
            total_files,
            total_size,
            average_file_size,
            read_operations: self.reads.load(Ordering::Relaxed),
            write_operations: self.writes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            last_cleanup: self.last_cleanup.lock().ok().and_then(|l| *l),
        }
    }
}
