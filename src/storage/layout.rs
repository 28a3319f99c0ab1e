//! On-disk directory layout
//!
//! ```text
//! root/
//!   sessions/<yyyy-mm-dd>/<session-id>.<ext>
//!   activities/<agent-id>/<yyyy-mm-dd>/<task-id>.<ext>
//!   indexes/index.json
//!   backups/<yyyymmdd-hhmmss>/...
//!   quarantine/<timestamp>-<uuid>.json
//! ```
//!
//! Names are stable so external tooling can inspect the tree directly.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::model::{Activity, Session};

pub const SESSIONS_DIR: &str = "sessions";
pub const ACTIVITIES_DIR: &str = "activities";
pub const INDEXES_DIR: &str = "indexes";
pub const BACKUPS_DIR: &str = "backups";
pub const QUARANTINE_DIR: &str = "quarantine";
pub const INDEX_FILE: &str = "index.json";

const PLAIN_EXT: &str = "json";
const GZIP_EXT: &str = "json.gz";

/// Resolves record locations under a storage root
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
    compressed: bool,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>, compressed: bool) -> Self {
        Self {
            root: root.into(),
            compressed,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.root.join(SESSIONS_DIR)
    }

    pub fn activities_dir(&self) -> PathBuf {
        self.root.join(ACTIVITIES_DIR)
    }

    pub fn indexes_dir(&self) -> PathBuf {
        self.root.join(INDEXES_DIR)
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.root.join(BACKUPS_DIR)
    }

    pub fn quarantine_dir(&self) -> PathBuf {
        self.root.join(QUARANTINE_DIR)
    }

    pub fn index_file(&self) -> PathBuf {
        self.indexes_dir().join(INDEX_FILE)
    }

    /// Every directory `initialize()` must create
    pub fn required_dirs(&self) -> [PathBuf; 5] {
        [
            self.sessions_dir(),
            self.activities_dir(),
            self.indexes_dir(),
            self.backups_dir(),
            self.quarantine_dir(),
        ]
    }

    fn extension(&self) -> &'static str {
        if self.compressed {
            GZIP_EXT
        } else {
            PLAIN_EXT
        }
    }

    pub fn session_path(&self, session: &Session) -> PathBuf {
        self.sessions_dir()
            .join(day_bucket(session.start_time))
            .join(format!("{}.{}", sanitize_id(&session.id), self.extension()))
    }

    pub fn activity_path(&self, activity: &Activity) -> PathBuf {
        self.agent_activities_dir(&activity.agent_id)
            .join(day_bucket(activity.start_time))
            .join(format!("{}.{}", sanitize_id(&activity.task_id), self.extension()))
    }

    pub fn agent_activities_dir(&self, agent_id: &str) -> PathBuf {
        self.activities_dir().join(sanitize_id(agent_id))
    }

    /// Path relative to the root, as stored in the index
    pub fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf())
    }

    pub fn absolute(&self, relative: &Path) -> PathBuf {
        if relative.is_absolute() {
            relative.to_path_buf()
        } else {
            self.root.join(relative)
        }
    }
}

/// Whether a file name looks like a record written by this crate
pub fn is_record_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|name| name.ends_with(".json") || name.ends_with(".json.gz"))
        .unwrap_or(false)
}

pub fn is_compressed(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("gz")
}

/// Replace every character outside `[A-Za-z0-9_-]` with `_`
pub fn sanitize_id(id: &str) -> String {
    let sanitized: String = id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        "_".to_string()
    } else {
        sanitized
    }
}

/// Day bucket name (`yyyy-mm-dd`, UTC) for a timestamp
pub fn day_bucket(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AgentType;
    use chrono::TimeZone;

    #[test]
    fn test_sanitize_id() {
        assert_eq!(sanitize_id("abc-123_x"), "abc-123_x");
        assert_eq!(sanitize_id("../etc/passwd"), "___etc_passwd");
        assert_eq!(sanitize_id("a b:c"), "a_b_c");
        assert_eq!(sanitize_id(""), "_");
    }

    #[test]
    fn test_session_and_activity_paths() {
        let layout = Layout::new("/root", false);
        let start = Utc.with_ymd_and_hms(2024, 3, 9, 23, 59, 0).unwrap();
        let session = Session::new("sess/1", start);
        assert_eq!(
            layout.session_path(&session),
            PathBuf::from("/root/sessions/2024-03-09/sess_1.json")
        );

        let mut activity = Activity::new("backend-developer", AgentType::BackendDeveloper, "t.1");
        activity.start_time = start;
        assert_eq!(
            layout.activity_path(&activity),
            PathBuf::from("/root/activities/backend-developer/2024-03-09/t_1.json")
        );
    }

    #[test]
    fn test_compressed_extension() {
        let layout = Layout::new("/root", true);
        let session = Session::new("s", Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let path = layout.session_path(&session);
        assert!(path.to_string_lossy().ends_with("s.json.gz"));
        assert!(is_compressed(&path));
        assert!(is_record_file(&path));
    }

    #[test]
    fn test_relative_round_trip() {
        let layout = Layout::new("/root", false);
        let abs = PathBuf::from("/root/sessions/2024-01-01/s.json");
        let rel = layout.relative(&abs);
        assert_eq!(rel, PathBuf::from("sessions/2024-01-01/s.json"));
        assert_eq!(layout.absolute(&rel), abs);
    }
}
