//! In-memory write buffer keyed by destination path
//!
//! Writes are staged here until a flush persists them. A flush moves the
//! pending set into an in-flight set so that readers still see those
//! records while they are being written, and so that a write arriving
//! during the flush lands in a fresh pending set instead of being lost.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::model::{Activity, Session};

#[derive(Debug, Clone, PartialEq)]
pub enum BufferedRecord {
    Session(Session),
    Activity(Activity),
}

/// A validated, already-encoded record awaiting persistence
#[derive(Debug, Clone)]
pub struct PendingWrite {
    pub record: BufferedRecord,
    pub bytes: Vec<u8>,
    pub queued_at: DateTime<Utc>,
}

impl PendingWrite {
    pub fn new(record: BufferedRecord, bytes: Vec<u8>) -> Self {
        Self {
            record,
            bytes,
            queued_at: Utc::now(),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn is_session(&self, session_id: &str) -> bool {
        matches!(&self.record, BufferedRecord::Session(s) if s.id == session_id)
    }
}

#[derive(Debug, Default)]
pub struct WriteBuffer {
    pending: HashMap<PathBuf, PendingWrite>,
    in_flight: HashMap<PathBuf, PendingWrite>,
}

impl WriteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a write. A later write to the same path replaces the earlier one,
    /// and a session write also drops pending copies of that session staged
    /// under another path.
    pub fn insert(&mut self, path: PathBuf, write: PendingWrite) -> bool {
        if let BufferedRecord::Session(session) = &write.record {
            self.pending.retain(|p, w| p == &path || !w.is_session(&session.id));
        }
        self.pending.insert(path, write).is_some()
    }

    /// Number of writes waiting for the next flush
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Move every pending write into the in-flight set and return copies to persist
    pub fn begin_flush(&mut self) -> Vec<(PathBuf, PendingWrite)> {
        let batch: Vec<(PathBuf, PendingWrite)> = self.pending.drain().collect();
        for (path, write) in &batch {
            self.in_flight.insert(path.clone(), write.clone());
        }
        batch
    }

    /// A flushed write reached disk
    pub fn complete(&mut self, path: &Path) {
        self.in_flight.remove(path);
    }

    /// A flushed write failed; put it back unless a newer write superseded it
    pub fn requeue(&mut self, path: PathBuf) -> bool {
        let Some(write) = self.in_flight.remove(&path) else {
            return false;
        };
        let superseded = self.pending.contains_key(&path)
            || match &write.record {
                BufferedRecord::Session(session) => {
                    self.pending.values().any(|w| w.is_session(&session.id))
                }
                BufferedRecord::Activity(_) => false,
            };
        if superseded {
            return false;
        }
        self.pending.insert(path, write);
        true
    }

    /// Buffered sessions, newest staging wins over in-flight copies
    pub fn sessions(&self) -> Vec<Session> {
        let mut by_id: HashMap<&str, (&DateTime<Utc>, &Session)> = HashMap::new();
        for write in self.in_flight.values().chain(self.pending.values()) {
            if let BufferedRecord::Session(session) = &write.record {
                let newer = by_id
                    .get(session.id.as_str())
                    .map_or(true, |(queued, _)| write.queued_at >= **queued);
                if newer {
                    by_id.insert(session.id.as_str(), (&write.queued_at, session));
                }
            }
        }
        by_id.into_values().map(|(_, s)| s.clone()).collect()
    }

    pub fn session(&self, session_id: &str) -> Option<Session> {
        self.sessions().into_iter().find(|s| s.id == session_id)
    }

    /// Buffered standalone activities keyed by destination path
    pub fn activities(&self) -> Vec<(PathBuf, Activity)> {
        let mut by_path: HashMap<&PathBuf, &Activity> = HashMap::new();
        for (path, write) in self.in_flight.iter().chain(self.pending.iter()) {
            if let BufferedRecord::Activity(activity) = &write.record {
                by_path.insert(path, activity);
            }
        }
        by_path
            .into_iter()
            .map(|(p, a)| (p.clone(), a.clone()))
            .collect()
    }
}
