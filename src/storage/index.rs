//! Persistent lookup index over stored sessions
//!
//! Three structures are kept: session id → location, agent id → session ids,
//! and day bucket → earliest/latest start time seen that day. The index is a
//! cache of what is on disk; if it is missing or unreadable it is rebuilt
//! by scanning the session tree.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::codec;
use super::error::{StorageError, StorageResult};
use super::layout::{day_bucket, is_record_file, Layout};
use crate::model::Session;

const REBUILD_CONCURRENCY: usize = 16;

/// Where a session lives on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionIndexEntry {
    /// Path relative to the storage root
    pub path: PathBuf,
    /// Session start time
    pub timestamp: DateTime<Utc>,
    /// Encoded size in bytes
    pub size: u64,
}

/// Earliest and latest session start seen within one day bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRange {
    pub earliest: DateTime<Utc>,
    pub latest: DateTime<Utc>,
}

impl DayRange {
    fn include(&mut self, timestamp: DateTime<Utc>) {
        self.earliest = self.earliest.min(timestamp);
        self.latest = self.latest.max(timestamp);
    }

    pub fn overlaps(&self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> bool {
        start.map_or(true, |s| self.latest >= s) && end.map_or(true, |e| self.earliest <= e)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreIndex {
    pub sessions: HashMap<String, SessionIndexEntry>,
    pub agents: HashMap<String, BTreeSet<String>>,
    pub time_range: BTreeMap<String, DayRange>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Outcome of a rebuild scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildStats {
    pub files_scanned: usize,
    pub sessions_indexed: usize,
    pub files_skipped: usize,
}

impl StoreIndex {
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn get(&self, session_id: &str) -> Option<&SessionIndexEntry> {
        self.sessions.get(session_id)
    }

    /// Insert or replace a session, returning the entry it replaced
    pub fn record_session(
        &mut self,
        session: &Session,
        path: PathBuf,
        size: u64,
    ) -> Option<SessionIndexEntry> {
        self.detach_agents(&session.id);
        for agent_id in session.agent_ids() {
            self.agents
                .entry(agent_id)
                .or_default()
                .insert(session.id.clone());
        }

        self.time_range
            .entry(day_bucket(session.start_time))
            .and_modify(|range| range.include(session.start_time))
            .or_insert(DayRange {
                earliest: session.start_time,
                latest: session.start_time,
            });

        self.last_updated = Some(Utc::now());
        self.sessions.insert(
            session.id.clone(),
            SessionIndexEntry {
                path,
                timestamp: session.start_time,
                size,
            },
        )
    }

    /// Drop every session whose file is in `paths` (relative to the root)
    pub fn remove_paths(&mut self, paths: &HashSet<PathBuf>) -> usize {
        let doomed: Vec<String> = self
            .sessions
            .iter()
            .filter(|(_, entry)| paths.contains(&entry.path))
            .map(|(id, _)| id.clone())
            .collect();

        for id in &doomed {
            self.detach_agents(id);
            self.sessions.remove(id);
        }
        if !doomed.is_empty() {
            self.recompute_time_range();
            self.last_updated = Some(Utc::now());
        }
        doomed.len()
    }

    /// Session ids that contain any of the given agents
    pub fn sessions_for_agents<'a>(
        &'a self,
        agent_ids: impl IntoIterator<Item = &'a String>,
    ) -> BTreeSet<&'a str> {
        agent_ids
            .into_iter()
            .filter_map(|agent| self.agents.get(agent))
            .flat_map(|ids| ids.iter().map(String::as_str))
            .collect()
    }

    /// Whether any indexed day could hold a session inside the window
    pub fn any_day_overlaps(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> bool {
        self.time_range.values().any(|r| r.overlaps(start, end))
    }

    fn detach_agents(&mut self, session_id: &str) {
        self.agents.retain(|_, ids| {
            ids.remove(session_id);
            !ids.is_empty()
        });
    }

    fn recompute_time_range(&mut self) {
        let mut ranges: BTreeMap<String, DayRange> = BTreeMap::new();
        for entry in self.sessions.values() {
            ranges
                .entry(day_bucket(entry.timestamp))
                .and_modify(|r| r.include(entry.timestamp))
                .or_insert(DayRange {
                    earliest: entry.timestamp,
                    latest: entry.timestamp,
                });
        }
        self.time_range = ranges;
    }

    /// Load the persisted index
    pub async fn load(path: &Path) -> StorageResult<Self> {
        let bytes = tokio::fs::read(path).await?;
        serde_json::from_slice(&bytes).map_err(StorageError::serialization)
    }

    /// Persist the index atomically
    pub async fn persist(&self, path: &Path) -> StorageResult<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        codec::write_atomic(path, &bytes).await
    }

    /// Load the index, falling back to a full rebuild when it is missing or corrupt
    pub async fn load_or_rebuild(layout: &Layout) -> StorageResult<Self> {
        let path = layout.index_file();
        match Self::load(&path).await {
            Ok(index) => {
                debug!(sessions = index.len(), "Loaded session index");
                Ok(index)
            }
            Err(e) => {
                if path.exists() {
                    warn!(error = %e, path = %path.display(), "Session index unreadable, rebuilding");
                } else {
                    info!("No session index found, rebuilding from disk");
                }
                let (index, stats) = Self::rebuild(layout).await?;
                info!(
                    scanned = stats.files_scanned,
                    indexed = stats.sessions_indexed,
                    skipped = stats.files_skipped,
                    "Session index rebuilt"
                );
                if let Err(e) = index.persist(&path).await {
                    warn!(error = %e, "Failed to persist rebuilt session index");
                }
                Ok(index)
            }
        }
    }

    /// Scan the session tree and build a fresh index. Unreadable files are skipped.
    pub async fn rebuild(layout: &Layout) -> StorageResult<(Self, RebuildStats)> {
        let files = list_record_files(layout.sessions_dir()).await?;
        let mut stats = RebuildStats {
            files_scanned: files.len(),
            ..RebuildStats::default()
        };

        let loaded: Vec<(PathBuf, StorageResult<(Session, u64)>)> = stream::iter(files)
            .map(|path| async move {
                let result = read_session_file(&path).await;
                (path, result)
            })
            .buffer_unordered(REBUILD_CONCURRENCY)
            .collect()
            .await;

        let mut index = StoreIndex::default();
        for (path, result) in loaded {
            match result {
                Ok((session, size)) => {
                    let relative = layout.relative(&path);
                    // Two files claiming the same id: keep the most recent start time
                    let newer = index
                        .get(&session.id)
                        .map_or(true, |existing| session.start_time >= existing.timestamp);
                    if newer {
                        index.record_session(&session, relative, size);
                    }
                    stats.sessions_indexed += 1;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable session file");
                    stats.files_skipped += 1;
                }
            }
        }
        index.last_updated = Some(Utc::now());

        Ok((index, stats))
    }
}

async fn read_session_file(path: &Path) -> StorageResult<(Session, u64)> {
    let size = tokio::fs::metadata(path).await?.len();
    let session: Session = codec::read_record(path).await?;
    Ok((session, size))
}

/// Recursively list record files below `dir` on the blocking pool
pub async fn list_record_files(dir: PathBuf) -> StorageResult<Vec<PathBuf>> {
    tokio::task::spawn_blocking(move || {
        if !dir.exists() {
            return Vec::new();
        }
        walkdir::WalkDir::new(&dir)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable directory entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && is_record_file(entry.path()))
            .map(|entry| entry.into_path())
            .collect()
    })
    .await
    .map_err(|e| StorageError::Other(anyhow::anyhow!("directory scan task failed: {e}")))
}
