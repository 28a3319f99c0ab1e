//! Retention sweep: age-based removal of persisted files

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use super::error::{StorageError, StorageResult};
use super::layout::Layout;

/// Statistics from a retention sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupStats {
    /// Number of files examined
    pub files_scanned: usize,
    /// Number of files removed
    pub files_removed: usize,
    /// Bytes reclaimed
    pub bytes_reclaimed: u64,
    /// Empty directories pruned after removal
    pub dirs_pruned: usize,
    /// Session index entries dropped
    pub index_entries_removed: usize,
    /// Per-file failures; a failure never aborts the sweep
    pub errors: Vec<String>,
}

impl CleanupStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add another stats instance to this one
    pub fn merge(&mut self, other: &CleanupStats) {
        self.files_scanned += other.files_scanned;
        self.files_removed += other.files_removed;
        self.bytes_reclaimed += other.bytes_reclaimed;
        self.dirs_pruned += other.dirs_pruned;
        self.index_entries_removed += other.index_entries_removed;
        self.errors.extend(other.errors.iter().cloned());
    }
}

/// Result of sweeping the storage tree
#[derive(Debug, Default)]
pub struct SweepOutcome {
    pub stats: CleanupStats,
    /// Removed session files, relative to the storage root
    pub removed_sessions: HashSet<PathBuf>,
}

/// Delete every file below the swept trees whose mtime is older than `retention`
pub async fn sweep(layout: &Layout, retention: Duration) -> StorageResult<SweepOutcome> {
    let cutoff = Utc::now() - retention;
    let sessions_dir = layout.sessions_dir();
    let mut outcome = SweepOutcome::default();

    let swept = [
        layout.sessions_dir(),
        layout.activities_dir(),
        layout.backups_dir(),
        layout.quarantine_dir(),
    ];

    for dir in swept {
        let stats = clean_directory_by_age(&dir, cutoff, |removed| {
            if removed.starts_with(&sessions_dir) {
                outcome.removed_sessions.insert(layout.relative(removed));
            }
        })
        .await?;
        outcome.stats.merge(&stats);

        outcome.stats.dirs_pruned += prune_empty_dirs(dir).await?;
    }

    Ok(outcome)
}

/// Remove files older than `cutoff`, reporting each removal to `on_removed`
async fn clean_directory_by_age(
    dir: &Path,
    cutoff: DateTime<Utc>,
    mut on_removed: impl FnMut(&Path),
) -> StorageResult<CleanupStats> {
    let mut stats = CleanupStats::new();

    for path in list_files(dir.to_path_buf()).await? {
        stats.files_scanned += 1;

        let metadata = match fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to stat file during sweep");
                stats
                    .errors
                    .push(format!("Failed to stat {}: {}", path.display(), e));
                continue;
            }
        };

        let modified: DateTime<Utc> = match metadata.modified() {
            Ok(time) => time.into(),
            Err(_) => continue,
        };
        if modified >= cutoff {
            continue;
        }

        if let Err(e) = fs::remove_file(&path).await {
            warn!(path = %path.display(), error = %e, "Failed to remove expired file");
            stats
                .errors
                .push(format!("Failed to remove {}: {}", path.display(), e));
            continue;
        }

        debug!(path = %path.display(), "Removed expired file");
        stats.files_removed += 1;
        stats.bytes_reclaimed += metadata.len();
        on_removed(&path);
    }

    Ok(stats)
}

async fn list_files(dir: PathBuf) -> StorageResult<Vec<PathBuf>> {
    tokio::task::spawn_blocking(move || {
        if !dir.exists() {
            return Vec::new();
        }
        walkdir::WalkDir::new(&dir)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .collect()
    })
    .await
    .map_err(|e| StorageError::Other(anyhow::anyhow!("directory scan task failed: {e}")))
}

/// Remove empty directories below `root`, deepest first. `root` itself is kept.
async fn prune_empty_dirs(root: PathBuf) -> StorageResult<usize> {
    tokio::task::spawn_blocking(move || {
        if !root.exists() {
            return 0;
        }
        let mut pruned = 0;
        for entry in walkdir::WalkDir::new(&root)
            .min_depth(1)
            .contents_first(true)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_dir())
        {
            // remove_dir refuses non-empty directories
            if std::fs::remove_dir(entry.path()).is_ok() {
                pruned += 1;
            }
        }
        pruned
    })
    .await
    .map_err(|e| StorageError::Other(anyhow::anyhow!("directory prune task failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn age_file(path: &Path, days: u64) {
        let then = SystemTime::now() - std::time::Duration::from_secs(days * 24 * 3600);
        filetime::set_file_mtime(path, FileTime::from_system_time(then)).unwrap();
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired_files() {
        let temp_dir = TempDir::new().unwrap();
        let layout = Layout::new(temp_dir.path(), false);

        let old = layout.sessions_dir().join("2020-01-01/old.json");
        let fresh = layout.sessions_dir().join("2020-01-02/fresh.json");
        let old_activity = layout.activities_dir().join("a/2020-01-01/t.json");
        for path in [&old, &fresh, &old_activity] {
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, "{}").unwrap();
        }
        age_file(&old, 31);
        age_file(&old_activity, 40);
        age_file(&fresh, 29);

        let outcome = sweep(&layout, Duration::days(30)).await.unwrap();

        assert_eq!(outcome.stats.files_scanned, 3);
        assert_eq!(outcome.stats.files_removed, 2);
        assert_eq!(outcome.stats.bytes_reclaimed, 4);
        assert!(outcome.stats.errors.is_empty());
        assert!(!old.exists());
        assert!(fresh.exists());
        assert!(outcome
            .removed_sessions
            .contains(Path::new("sessions/2020-01-01/old.json")));
        assert_eq!(outcome.removed_sessions.len(), 1);

        // Emptied day and agent directories are pruned, roots are kept
        assert!(!old.parent().unwrap().exists());
        assert!(!layout.activities_dir().join("a").exists());
        assert!(layout.activities_dir().exists());
        assert!(outcome.stats.dirs_pruned >= 3);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_undeletable_file_does_not_abort_sweep() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let layout = Layout::new(temp_dir.path(), false);

        let locked_dir = layout.sessions_dir().join("2020-01-01");
        let stuck = locked_dir.join("stuck.json");
        let loose = layout.sessions_dir().join("2020-01-02/loose.json");
        for path in [&stuck, &loose] {
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, "{}").unwrap();
            age_file(path, 60);
        }
        std::fs::set_permissions(&locked_dir, std::fs::Permissions::from_mode(0o555)).unwrap();
        let unlock =
            || std::fs::set_permissions(&locked_dir, std::fs::Permissions::from_mode(0o755)).unwrap();

        // Privileged users ignore directory permissions
        if std::fs::write(locked_dir.join("check"), "").is_ok() {
            unlock();
            return;
        }

        let outcome = sweep(&layout, Duration::days(30)).await.unwrap();
        unlock();

        assert_eq!(outcome.stats.files_scanned, 2);
        assert_eq!(outcome.stats.files_removed, 1);
        assert_eq!(outcome.stats.errors.len(), 1);
        assert!(outcome.stats.errors[0].contains("stuck.json"));
        assert!(stuck.exists());
        assert!(!loose.exists());
        assert_eq!(outcome.removed_sessions.len(), 1);
        assert!(outcome
            .removed_sessions
            .contains(Path::new("sessions/2020-01-02/loose.json")));
    }

    #[tokio::test]
    async fn test_sweep_of_missing_tree_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let layout = Layout::new(temp_dir.path().join("nothing-here"), false);
        let outcome = sweep(&layout, Duration::days(1)).await.unwrap();
        assert_eq!(outcome.stats, CleanupStats::default());
    }

    #[test]
    fn test_merge() {
        let mut total = CleanupStats {
            files_scanned: 1,
            files_removed: 1,
            bytes_reclaimed: 10,
            ..CleanupStats::default()
        };
        total.merge(&CleanupStats {
            files_scanned: 2,
            errors: vec!["boom".into()],
            ..CleanupStats::default()
        });
        assert_eq!(total.files_scanned, 3);
        assert_eq!(total.files_removed, 1);
        assert_eq!(total.errors.len(), 1);
    }
}
