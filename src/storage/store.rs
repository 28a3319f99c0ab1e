//! File-backed session store
//!
//! Writes are validated and encoded immediately, staged in a [`WriteBuffer`]
//! and persisted by [`Store::flush`], by a periodic background task, or when
//! the buffer reaches its configured threshold. Reads merge the buffer with
//! what is on disk so callers always see their own writes.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::buffer::{BufferedRecord, PendingWrite, WriteBuffer};
use super::codec;
use super::config::StoreConfig;
use super::error::{StorageError, StorageResult};
use super::events::{EventPublisher, StoreEvent};
use super::index::{list_record_files, RebuildStats, SessionIndexEntry, StoreIndex};
use super::layout::{sanitize_id, Layout};
use super::metrics::{Counters, StorageMetrics};
use super::query::{finalize_activities, finalize_sessions, ActivityFilter, SessionFilter};
use super::retention::{self, CleanupStats};
use crate::model::{self, Activity, Session, ValidationError};

const IO_CONCURRENCY: usize = 16;

const STATE_NEW: u8 = 0;
const STATE_RUNNING: u8 = 1;
const STATE_CLOSED: u8 = 2;

/// Where a backup was written and how much it holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupReport {
    pub path: PathBuf,
    pub files: usize,
    pub bytes: u64,
}

/// Durable, indexed store for sessions and activities
pub struct Store {
    inner: Arc<StoreInner>,
    init_lock: Mutex<()>,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
}

struct StoreInner {
    config: StoreConfig,
    layout: Layout,
    state: AtomicU8,
    buffer: Mutex<WriteBuffer>,
    index: RwLock<StoreIndex>,
    events: Mutex<EventPublisher>,
    counters: Counters,
    flushing: AtomicBool,
    sweeping: AtomicBool,
}

/// Clears a busy flag when dropped
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Store {
    /// Create a store for `config.base_dir`. Nothing touches disk until [`initialize`](Self::initialize).
    pub fn new(config: StoreConfig) -> Self {
        let layout = Layout::new(config.base_dir.clone(), config.compression);
        let (shutdown_tx, _) = watch::channel(false);
        let events = EventPublisher::new(config.event_capacity);

        Self {
            inner: Arc::new(StoreInner {
                config,
                layout,
                state: AtomicU8::new(STATE_NEW),
                buffer: Mutex::new(WriteBuffer::new()),
                index: RwLock::new(StoreIndex::default()),
                events: Mutex::new(events),
                counters: Counters::default(),
                flushing: AtomicBool::new(false),
                sweeping: AtomicBool::new(false),
            }),
            init_lock: Mutex::new(()),
            tasks: std::sync::Mutex::new(Vec::new()),
            shutdown_tx,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn root(&self) -> &Path {
        self.inner.layout.root()
    }

    /// Create the directory tree, load (or rebuild) the index and start background tasks
    pub async fn initialize(&self) -> StorageResult<()> {
        let _init = self.init_lock.lock().await;
        match self.inner.state.load(Ordering::Acquire) {
            STATE_RUNNING => return Ok(()),
            STATE_CLOSED => return Err(StorageError::Closed),
            _ => {}
        }

        let config = &self.inner.config;
        if config.flush_interval.is_zero() || config.cleanup_interval.is_zero() {
            return Err(StorageError::configuration(
                "flush and cleanup intervals must be non-zero",
            ));
        }
        if config.encryption {
            warn!("Encryption requested but not supported; records are stored as plaintext");
        }

        for dir in self.inner.layout.required_dirs() {
            fs::create_dir_all(&dir)
                .await
                .map_err(|source| StorageError::Initialization {
                    path: dir.clone(),
                    source,
                })?;
        }

        if config.indexing {
            let index = StoreIndex::load_or_rebuild(&self.inner.layout).await?;
            *self.inner.index.write().await = index;
        }

        self.inner.state.store(STATE_RUNNING, Ordering::Release);
        self.spawn_background_tasks();

        info!(
            root = %self.root().display(),
            compression = config.compression,
            indexing = config.indexing,
            "Session store initialized"
        );
        Ok(())
    }

    fn spawn_background_tasks(&self) {
        let flush = spawn_periodic(
            "flush",
            self.inner.config.flush_interval,
            self.shutdown_tx.subscribe(),
            Arc::clone(&self.inner),
            |inner| async move {
                if let Err(e) = inner.flush(false).await {
                    error!(error = %e, "Background flush failed");
                }
            },
        );
        let cleanup = spawn_periodic(
            "cleanup",
            self.inner.config.cleanup_interval,
            self.shutdown_tx.subscribe(),
            Arc::clone(&self.inner),
            |inner| async move {
                if let Err(e) = inner.cleanup().await {
                    error!(error = %e, "Background retention sweep failed");
                }
            },
        );

        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.push(flush);
            tasks.push(cleanup);
        }
    }

    /// Buffer a session for persistence. Writing an existing id replaces it.
    pub async fn write_session(&self, session: Session) -> StorageResult<()> {
        self.inner.ensure_running()?;
        if let Err(e) = session.validate() {
            self.inner.counters.record_error();
            return Err(e.into());
        }

        let path = self.inner.layout.session_path(&session);
        let bytes = self.inner.encode(&session.id, &session)?;

        self.inner.events.lock().await.observe_session(&session);
        debug!(session_id = %session.id, "Buffered session");
        self.inner
            .stage(path, PendingWrite::new(BufferedRecord::Session(session), bytes))
            .await
    }

    /// Buffer a standalone activity record
    pub async fn write_activity(&self, activity: Activity) -> StorageResult<()> {
        self.inner.ensure_running()?;
        if let Err(e) = activity.validate() {
            self.inner.counters.record_error();
            return Err(e.into());
        }

        let path = self.inner.layout.activity_path(&activity);
        let bytes = self.inner.encode(&activity.task_id, &activity)?;

        debug!(agent_id = %activity.agent_id, task_id = %activity.task_id, "Buffered activity");
        self.inner
            .stage(path, PendingWrite::new(BufferedRecord::Activity(activity), bytes))
            .await
    }

    /// Normalize loosely-typed input into a session and write it.
    /// Input that does not normalize or validate is quarantined.
    pub async fn ingest_session(&self, value: Value) -> StorageResult<Session> {
        self.inner.ensure_running()?;
        let session = match model::session_from_value(&value)
            .and_then(|s| s.validate().map(|_| s))
        {
            Ok(session) => session,
            Err(e) => return Err(self.inner.quarantine("session", &value, e).await),
        };
        self.write_session(session.clone()).await?;
        Ok(session)
    }

    /// Normalize loosely-typed input into an activity and write it
    pub async fn ingest_activity(&self, value: Value) -> StorageResult<Activity> {
        self.inner.ensure_running()?;
        let activity = match model::activity_from_value(&value)
            .and_then(|a| a.validate().map(|_| a))
        {
            Ok(activity) => activity,
            Err(e) => return Err(self.inner.quarantine("activity", &value, e).await),
        };
        self.write_activity(activity.clone()).await?;
        Ok(activity)
    }

    /// Sessions matching `filter`, newest first, including unflushed writes
    pub async fn query_sessions(&self, filter: &SessionFilter) -> StorageResult<Vec<Session>> {
        self.inner.ensure_running()?;
        let inner = &self.inner;

        let buffered = inner.buffer.lock().await.sessions();
        let shadowed: HashSet<&str> = buffered.iter().map(|s| s.id.as_str()).collect();

        let on_disk = if inner.config.indexing {
            let paths: Vec<PathBuf> = {
                let index = inner.index.read().await;
                let entries: Vec<(&str, &SessionIndexEntry)> = if filter
                    .time_range
                    .is_some_and(|r| !index.any_day_overlaps(Some(r.start), Some(r.end)))
                {
                    debug!("No indexed day overlaps the query window");
                    Vec::new()
                } else if filter.has_agent_filter() {
                    index
                        .sessions_for_agents(&filter.agent_ids)
                        .into_iter()
                        .filter_map(|id| index.get(id).map(|entry| (id, entry)))
                        .collect()
                } else {
                    index
                        .sessions
                        .iter()
                        .map(|(id, entry)| (id.as_str(), entry))
                        .collect()
                };
                entries
                    .into_iter()
                    .filter(|(id, entry)| {
                        !shadowed.contains(id) && filter.admits_start(entry.timestamp)
                    })
                    .map(|(_, entry)| inner.layout.absolute(&entry.path))
                    .collect()
            };
            inner.read_all::<Session>(paths).await
        } else {
            let files = list_record_files(inner.layout.sessions_dir()).await?;
            dedupe_sessions(inner.read_all::<Session>(files).await)
        };

        let mut sessions: Vec<Session> = on_disk
            .into_iter()
            .map(|(_, session)| session)
            .filter(|s| !shadowed.contains(s.id.as_str()))
            .chain(buffered.iter().cloned())
            .filter(|s| filter.matches(s))
            .collect();
        sessions = finalize_sessions(sessions, filter.limit);

        debug!(count = sessions.len(), "Session query completed");
        Ok(sessions)
    }

    /// Look up one session by id
    pub async fn get_session(&self, session_id: &str) -> StorageResult<Option<Session>> {
        self.inner.ensure_running()?;
        self.inner.get_session(session_id).await
    }

    /// Activities for a session, for an agent, or across the store
    ///
    /// With a session id, the session's own activities are merged with
    /// standalone activity records carrying that session id; a standalone
    /// record replaces the embedded copy of the same agent and task.
    pub async fn query_activities(
        &self,
        session_id: Option<&str>,
        agent_id: Option<&str>,
        filter: Option<&ActivityFilter>,
    ) -> StorageResult<Vec<Activity>> {
        self.inner.ensure_running()?;
        let inner = &self.inner;

        let dir = match agent_id {
            Some(agent) => inner.layout.agent_activities_dir(agent),
            None => inner.layout.activities_dir(),
        };
        let files = list_record_files(dir).await?;
        let mut standalone: HashMap<PathBuf, Activity> =
            inner.read_all::<Activity>(files).await.into_iter().collect();
        for (path, activity) in inner.buffer.lock().await.activities() {
            standalone.insert(path, activity);
        }

        let mut activities: Vec<Activity> = match session_id {
            Some(session_id) => {
                let mut by_task: HashMap<(String, String), Activity> = HashMap::new();
                if let Some(session) = inner.get_session(session_id).await? {
                    for activity in session.activities {
                        by_task.insert((activity.agent_id.clone(), activity.task_id.clone()), activity);
                    }
                }
                for activity in standalone.into_values() {
                    if activity.session_id.as_deref() == Some(session_id) {
                        by_task.insert((activity.agent_id.clone(), activity.task_id.clone()), activity);
                    }
                }
                by_task.into_values().collect()
            }
            None => standalone.into_values().collect(),
        };

        activities.retain(|a| {
            agent_id.map_or(true, |agent| a.agent_id == agent)
                && filter.map_or(true, |f| f.matches(a))
        });
        Ok(finalize_activities(activities, filter.and_then(|f| f.limit)))
    }

    /// Persist every buffered write, returning how many reached disk
    pub async fn flush(&self) -> StorageResult<usize> {
        self.inner.ensure_running()?;
        self.inner.flush(false).await
    }

    /// Run the retention sweep now
    pub async fn cleanup(&self) -> StorageResult<CleanupStats> {
        self.inner.ensure_running()?;
        self.inner.cleanup().await
    }

    /// Flush, then copy sessions, activities and indexes into a timestamped backup directory
    pub async fn backup(&self) -> StorageResult<BackupReport> {
        self.inner.ensure_running()?;
        let inner = &self.inner;

        match inner.flush(true).await {
            Ok(_) => {}
            Err(e @ StorageError::PartialFlush { .. }) => {
                warn!(error = %e, "Backing up with records still buffered")
            }
            Err(e) => return Err(e),
        }
        if inner.config.indexing {
            inner.persist_index().await;
        }

        let stamp = Utc::now().format("%Y%m%d-%H%M%S").to_string();
        let mut dest = inner.layout.backups_dir().join(&stamp);
        let mut attempt = 1;
        while fs::try_exists(&dest).await? {
            attempt += 1;
            dest = inner.layout.backups_dir().join(format!("{stamp}-{attempt}"));
        }

        let mut report = BackupReport {
            path: dest.clone(),
            files: 0,
            bytes: 0,
        };
        let sources = [
            inner.layout.sessions_dir(),
            inner.layout.activities_dir(),
            inner.layout.indexes_dir(),
        ];
        for source in sources {
            for file in list_record_files(source).await? {
                let target = dest.join(inner.layout.relative(&file));
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent).await?;
                }
                report.bytes += fs::copy(&file, &target).await?;
                report.files += 1;
            }
        }

        info!(
            path = %report.path.display(),
            files = report.files,
            bytes = report.bytes,
            "Backup completed"
        );
        Ok(report)
    }

    /// Discard the index and rebuild it from the session tree
    pub async fn rebuild_index(&self) -> StorageResult<RebuildStats> {
        self.inner.ensure_running()?;
        let (index, stats) = StoreIndex::rebuild(&self.inner.layout).await?;
        {
            let mut current = self.inner.index.write().await;
            *current = index;
            if let Err(e) = current.persist(&self.inner.layout.index_file()).await {
                self.inner.counters.record_error();
                return Err(e);
            }
        }
        info!(
            scanned = stats.files_scanned,
            indexed = stats.sessions_indexed,
            skipped = stats.files_skipped,
            "Session index rebuilt"
        );
        Ok(stats)
    }

    /// Snapshot of file totals and operation counters
    pub async fn metrics(&self) -> StorageResult<StorageMetrics> {
        self.inner.ensure_running()?;
        let dirs = vec![
            self.inner.layout.sessions_dir(),
            self.inner.layout.activities_dir(),
        ];
        let (files, bytes) = tokio::task::spawn_blocking(move || tree_totals(&dirs))
            .await
            .map_err(|e| StorageError::Other(anyhow::anyhow!("metrics scan task failed: {e}")))?;
        Ok(self.inner.counters.snapshot(files, bytes))
    }

    /// Writes waiting for the next flush
    pub async fn pending_writes(&self) -> StorageResult<usize> {
        self.inner.ensure_open()?;
        Ok(self.inner.buffer.lock().await.len())
    }

    /// Receive lifecycle events. Slow receivers lag rather than block writers.
    /// Subscribing before [`initialize`](Self::initialize) sees every event.
    pub async fn subscribe(&self) -> StorageResult<broadcast::Receiver<StoreEvent>> {
        self.inner.ensure_open()?;
        Ok(self.inner.events.lock().await.subscribe())
    }

    /// Flush, stop background tasks, persist the index and close the store.
    /// A store that was never initialized is simply marked closed.
    pub async fn shutdown(&self) -> StorageResult<()> {
        let _init = self.init_lock.lock().await;
        match self.inner.state.swap(STATE_CLOSED, Ordering::AcqRel) {
            STATE_RUNNING => {}
            STATE_CLOSED => return Err(StorageError::Closed),
            _ => return Ok(()),
        }

        self.shutdown_tx.send_replace(true);
        let tasks: Vec<JoinHandle<()>> = match self.tasks.lock() {
            Ok(mut tasks) => tasks.drain(..).collect(),
            Err(_) => Vec::new(),
        };
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }

        let flushed = self.inner.flush(true).await;
        if self.inner.config.indexing {
            self.inner.persist_index().await;
        }
        info!(root = %self.root().display(), "Session store shut down");
        flushed.map(|_| ())
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
    }
}

impl StoreInner {
    fn ensure_running(&self) -> StorageResult<()> {
        match self.state.load(Ordering::Acquire) {
            STATE_RUNNING => Ok(()),
            STATE_NEW => Err(StorageError::NotInitialized),
            _ => Err(StorageError::Closed),
        }
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.state.load(Ordering::Acquire) == STATE_CLOSED {
            Err(StorageError::Closed)
        } else {
            Ok(())
        }
    }

    fn encode<T: Serialize>(&self, id: &str, record: &T) -> StorageResult<Vec<u8>> {
        let bytes = codec::encode(record, self.config.compression).inspect_err(|_| {
            self.counters.record_error();
        })?;
        let size = bytes.len() as u64;
        if size > self.config.max_file_size {
            self.counters.record_error();
            return Err(StorageError::RecordTooLarge {
                id: id.to_string(),
                size,
                limit: self.config.max_file_size,
            });
        }
        Ok(bytes)
    }

    async fn stage(&self, path: PathBuf, write: PendingWrite) -> StorageResult<()> {
        let pending = {
            let mut buffer = self.buffer.lock().await;
            buffer.insert(path, write);
            buffer.len()
        };
        self.counters.record_write();

        if pending >= self.config.buffer_size {
            debug!(pending, "Write buffer threshold reached");
            // Failed records stay buffered for the next flush; this write is already staged
            if let Err(e) = self.flush(false).await {
                warn!(error = %e, "Threshold flush did not persist every record");
            }
        }
        Ok(())
    }

    async fn quarantine(&self, kind: &str, value: &Value, reason: ValidationError) -> StorageError {
        self.counters.record_error();
        let now = Utc::now();
        let path = self.layout.quarantine_dir().join(format!(
            "{}-{}.json",
            now.format("%Y%m%dT%H%M%S%.3fZ"),
            Uuid::new_v4()
        ));
        let entry = serde_json::json!({
            "kind": kind,
            "reason": reason.to_string(),
            "receivedAt": now,
            "payload": value,
        });

        match serde_json::to_vec_pretty(&entry) {
            Ok(bytes) => match codec::write_atomic(&path, &bytes).await {
                Ok(()) => warn!(kind, reason = %reason, path = %path.display(), "Quarantined invalid record"),
                Err(e) => error!(kind, error = %e, "Failed to quarantine invalid record"),
            },
            Err(e) => error!(kind, error = %e, "Failed to encode quarantine entry"),
        }
        reason.into()
    }

    async fn get_session(&self, session_id: &str) -> StorageResult<Option<Session>> {
        if let Some(session) = self.buffer.lock().await.session(session_id) {
            return Ok(Some(session));
        }

        let paths = if self.config.indexing {
            match self.index.read().await.get(session_id) {
                Some(entry) => vec![self.layout.absolute(&entry.path)],
                None => return Ok(None),
            }
        } else {
            let file_stem = sanitize_id(session_id);
            list_record_files(self.layout.sessions_dir())
                .await?
                .into_iter()
                .filter(|p| {
                    p.file_name()
                        .and_then(|n| n.to_str())
                        .and_then(|n| n.split('.').next())
                        == Some(file_stem.as_str())
                })
                .collect()
        };

        Ok(dedupe_sessions(self.read_all::<Session>(paths).await)
            .into_iter()
            .map(|(_, session)| session)
            .find(|s| s.id == session_id))
    }

    /// Read records concurrently, skipping (and counting) unreadable files
    async fn read_all<T: DeserializeOwned>(&self, paths: Vec<PathBuf>) -> Vec<(PathBuf, T)> {
        let results: Vec<(PathBuf, StorageResult<T>)> = stream::iter(paths)
            .map(|path| async move {
                let result = codec::read_record::<T>(&path).await;
                (path, result)
            })
            .buffer_unordered(IO_CONCURRENCY)
            .collect()
            .await;

        let mut records = Vec::with_capacity(results.len());
        for (path, result) in results {
            self.counters.record_read();
            match result {
                Ok(record) => records.push((path, record)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable record file");
                    self.counters.record_error();
                }
            }
        }
        records
    }

    /// Persist buffered writes. Returns immediately when another flush is running,
    /// unless `wait` is set.
    async fn flush(&self, wait: bool) -> StorageResult<usize> {
        let _guard = match BusyGuard::try_acquire(&self.flushing) {
            Some(guard) => guard,
            None if wait => loop {
                tokio::time::sleep(Duration::from_millis(5)).await;
                if let Some(guard) = BusyGuard::try_acquire(&self.flushing) {
                    break guard;
                }
            },
            None => {
                debug!("Flush already in progress");
                return Ok(0);
            }
        };

        let batch = self.buffer.lock().await.begin_flush();
        if batch.is_empty() {
            return Ok(0);
        }

        let results: Vec<(PathBuf, PendingWrite, StorageResult<()>)> = stream::iter(batch)
            .map(|(path, write)| async move {
                let result = codec::write_atomic(&path, &write.bytes).await;
                (path, write, result)
            })
            .buffer_unordered(IO_CONCURRENCY)
            .collect()
            .await;

        let mut persisted = Vec::new();
        let mut failed = Vec::new();
        for (path, write, result) in results {
            match result {
                Ok(()) => persisted.push((path, write)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to persist buffered record");
                    self.counters.record_error();
                    failed.push(path);
                }
            }
        }

        // Index before releasing the in-flight copies so readers never miss a record
        if self.config.indexing {
            self.index_persisted(&persisted).await;
        }

        {
            let mut buffer = self.buffer.lock().await;
            for (path, _) in &persisted {
                buffer.complete(path);
            }
            for path in &failed {
                buffer.requeue(path.clone());
            }
        }

        let (persisted, failed) = (persisted.len(), failed.len());
        self.events
            .lock()
            .await
            .publish(StoreEvent::Flushed { persisted, failed });

        if failed > 0 {
            return Err(StorageError::PartialFlush { persisted, failed });
        }
        debug!(persisted, "Flushed write buffer");
        Ok(persisted)
    }

    async fn index_persisted(&self, persisted: &[(PathBuf, PendingWrite)]) {
        let mut sessions: Vec<(&PathBuf, &PendingWrite, &Session)> = persisted
            .iter()
            .filter_map(|(path, write)| match &write.record {
                BufferedRecord::Session(session) => Some((path, write, session)),
                BufferedRecord::Activity(_) => None,
            })
            .collect();
        // Oldest first so the latest write of a session id is indexed last
        sessions.sort_by_key(|(_, write, _)| write.queued_at);

        let mut index = self.index.write().await;
        let mut changed = false;

        for (path, write, session) in sessions {
            let relative = self.layout.relative(path);
            let previous = index.record_session(session, relative.clone(), write.size());
            changed = true;

            // The session moved to another day directory; drop the stale copy
            if let Some(previous) = previous.filter(|p| p.path != relative) {
                let stale = self.layout.absolute(&previous.path);
                match fs::remove_file(&stale).await {
                    Ok(()) => debug!(path = %stale.display(), "Removed stale session file"),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => {
                        warn!(path = %stale.display(), error = %e, "Failed to remove stale session file");
                        self.counters.record_error();
                    }
                }
            }
        }

        if changed {
            if let Err(e) = index.persist(&self.layout.index_file()).await {
                warn!(error = %e, "Failed to persist session index");
                self.counters.record_error();
            }
        }
    }

    async fn persist_index(&self) {
        if let Err(e) = self.index.read().await.persist(&self.layout.index_file()).await {
            warn!(error = %e, "Failed to persist session index");
            self.counters.record_error();
        }
    }

    async fn cleanup(&self) -> StorageResult<CleanupStats> {
        let Some(_guard) = BusyGuard::try_acquire(&self.sweeping) else {
            debug!("Retention sweep already in progress");
            return Ok(CleanupStats::default());
        };

        let outcome = retention::sweep(&self.layout, self.config.retention()).await?;
        let mut stats = outcome.stats;

        if self.config.indexing && !outcome.removed_sessions.is_empty() {
            let mut index = self.index.write().await;
            stats.index_entries_removed = index.remove_paths(&outcome.removed_sessions);
            if let Err(e) = index.persist(&self.layout.index_file()).await {
                warn!(error = %e, "Failed to persist session index after sweep");
                self.counters.record_error();
            }
        }

        self.counters.record_errors(stats.errors.len() as u64);
        self.counters.record_cleanup(Utc::now());
        {
            let mut events = self.events.lock().await;
            let forgotten = events.forget_ended();
            debug!(forgotten, "Released ended session markers");
            events.publish(StoreEvent::CleanupCompleted {
                stats: stats.clone(),
            });
        }

        info!(
            scanned = stats.files_scanned,
            removed = stats.files_removed,
            bytes = stats.bytes_reclaimed,
            errors = stats.errors.len(),
            "Retention sweep completed"
        );
        Ok(stats)
    }
}

/// Run `tick` every `period` until the shutdown signal fires
fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    inner: Arc<StoreInner>,
    tick: F,
) -> JoinHandle<()>
where
    F: Fn(Arc<StoreInner>) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => tick(Arc::clone(&inner)).await,
                _ = shutdown.changed() => break,
            }
        }
        debug!(task = name, "Background task stopped");
    })
}

/// Keep one record per session id, preferring the latest start time
fn dedupe_sessions(records: Vec<(PathBuf, Session)>) -> Vec<(PathBuf, Session)> {
    let mut by_id: HashMap<String, (PathBuf, Session)> = HashMap::new();
    for (path, session) in records {
        let newer = by_id
            .get(&session.id)
            .map_or(true, |(_, existing)| session.start_time > existing.start_time);
        if newer {
            by_id.insert(session.id.clone(), (path, session));
        }
    }
    by_id.into_values().collect()
}

fn tree_totals(dirs: &[PathBuf]) -> (u64, u64) {
    let mut files = 0;
    let mut bytes = 0;
    for dir in dirs {
        for entry in walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file() && super::layout::is_record_file(e.path()))
        {
            files += 1;
            bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
        }
    }
    (files, bytes)
}
