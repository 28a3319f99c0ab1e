//! Activity records: one agent's execution of a single task

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::ValidationError;

/// Role an agent plays inside a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentType {
    Architect,
    BackendDeveloper,
    FrontendDeveloper,
    FullstackDeveloper,
    DevopsEngineer,
    QaEngineer,
    SecurityAuditor,
    CodeReviewer,
    DocumentationWriter,
    DataEngineer,
    /// Fallback for roles this crate does not know about
    #[serde(other)]
    General,
}

impl AgentType {
    pub const ALL: [AgentType; 11] = [
        AgentType::Architect,
        AgentType::BackendDeveloper,
        AgentType::FrontendDeveloper,
        AgentType::FullstackDeveloper,
        AgentType::DevopsEngineer,
        AgentType::QaEngineer,
        AgentType::SecurityAuditor,
        AgentType::CodeReviewer,
        AgentType::DocumentationWriter,
        AgentType::DataEngineer,
        AgentType::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::Architect => "architect",
            AgentType::BackendDeveloper => "backend-developer",
            AgentType::FrontendDeveloper => "frontend-developer",
            AgentType::FullstackDeveloper => "fullstack-developer",
            AgentType::DevopsEngineer => "devops-engineer",
            AgentType::QaEngineer => "qa-engineer",
            AgentType::SecurityAuditor => "security-auditor",
            AgentType::CodeReviewer => "code-reviewer",
            AgentType::DocumentationWriter => "documentation-writer",
            AgentType::DataEngineer => "data-engineer",
            AgentType::General => "general",
        }
    }

    /// Parse a role name leniently. Unknown names map to [`AgentType::General`].
    pub fn parse_lenient(value: &str) -> Self {
        let normalized = normalize_token(value);
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .unwrap_or(AgentType::General)
    }
}

impl Default for AgentType {
    fn default() -> Self {
        Self::General
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution status of an activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl ActivityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityStatus::Pending => "pending",
            ActivityStatus::InProgress => "in_progress",
            ActivityStatus::Completed => "completed",
            ActivityStatus::Failed => "failed",
            ActivityStatus::Cancelled => "cancelled",
        }
    }

    /// Parse a status string, accepting any casing and `-`, `_` or space separators
    pub fn parse(value: &str) -> Option<Self> {
        match normalize_token(value).as_str() {
            "pending" => Some(ActivityStatus::Pending),
            "in-progress" | "inprogress" | "running" => Some(ActivityStatus::InProgress),
            "completed" | "complete" | "done" => Some(ActivityStatus::Completed),
            "failed" | "failure" | "error" => Some(ActivityStatus::Failed),
            "cancelled" | "canceled" => Some(ActivityStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ActivityStatus::Completed | ActivityStatus::Failed | ActivityStatus::Cancelled
        )
    }
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of file operation an activity performed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileOperationType {
    Read,
    Write,
    Create,
    Delete,
    Rename,
}

impl FileOperationType {
    pub fn parse(value: &str) -> Option<Self> {
        match normalize_token(value).as_str() {
            "read" => Some(FileOperationType::Read),
            "write" | "edit" | "update" => Some(FileOperationType::Write),
            "create" => Some(FileOperationType::Create),
            "delete" | "remove" => Some(FileOperationType::Delete),
            "rename" | "move" => Some(FileOperationType::Rename),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOperation {
    #[serde(rename = "type")]
    pub op_type: FileOperationType,
    pub path: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    #[serde(default)]
    pub size: u64,
}

/// One agent's execution of a single task within a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub agent_id: String,
    #[serde(default)]
    pub agent_type: AgentType,
    pub task_id: String,
    /// Owning session, set when the activity is written on its own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub status: ActivityStatus,
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub tools_used: BTreeSet<String>,
    #[serde(default)]
    pub file_operations: Vec<FileOperation>,
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Activity {
    /// Create a pending activity starting now
    pub fn new(
        agent_id: impl Into<String>,
        agent_type: AgentType,
        task_id: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            agent_type,
            task_id: task_id.into(),
            session_id: None,
            start_time: Utc::now(),
            end_time: None,
            status: ActivityStatus::Pending,
            input_tokens: 0,
            output_tokens: 0,
            tools_used: BTreeSet::new(),
            file_operations: Vec::new(),
            success: false,
            error_message: None,
        }
    }

    /// Elapsed time, defined only once the activity has ended
    pub fn duration(&self) -> Option<Duration> {
        self.end_time.map(|end| end - self.start_time)
    }

    /// Duration in fractional seconds
    pub fn duration_secs(&self) -> Option<f64> {
        self.duration()
            .map(|d| d.num_milliseconds() as f64 / 1000.0)
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }

    /// Mark the activity finished at `end_time` with the given outcome
    pub fn finish(&mut self, end_time: DateTime<Utc>, status: ActivityStatus) {
        self.end_time = Some(end_time);
        self.status = status;
        self.success = status == ActivityStatus::Completed;
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.agent_id.trim().is_empty() {
            return Err(ValidationError::MissingField("agentId"));
        }
        if self.task_id.trim().is_empty() {
            return Err(ValidationError::MissingField("taskId"));
        }
        if let Some(end) = self.end_time {
            if end < self.start_time {
                return Err(ValidationError::EndBeforeStart {
                    record: format!("activity {}", self.task_id),
                });
            }
        }
        Ok(())
    }
}

/// Lowercase and unify separators so `In Progress`, `in_progress` and `IN-PROGRESS` compare equal
fn normalize_token(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|c| match c {
            '_' | ' ' => '-',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}
