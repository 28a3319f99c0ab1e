//! Session records: a bounded unit of multi-task work

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use super::{Activity, ActivityStatus, ValidationError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Working context the agents operated in, usually a project path
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub total_tasks: u32,
    #[serde(default)]
    pub completed_tasks: u32,
    #[serde(default)]
    pub activities: Vec<Activity>,
}

impl Session {
    pub fn new(id: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            start_time,
            end_time: None,
            context: String::new(),
            total_tasks: 0,
            completed_tasks: 0,
            activities: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// Elapsed time, defined iff the session has ended
    pub fn duration(&self) -> Option<Duration> {
        self.end_time.map(|end| end - self.start_time)
    }

    pub fn duration_secs(&self) -> Option<f64> {
        self.duration()
            .map(|d| d.num_milliseconds() as f64 / 1000.0)
    }

    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Completed ÷ total tasks, 0 when no tasks were recorded
    pub fn success_rate(&self) -> f64 {
        if self.total_tasks == 0 {
            0.0
        } else {
            f64::from(self.completed_tasks) / f64::from(self.total_tasks)
        }
    }

    /// Distinct agent ids appearing in this session's activities
    pub fn agent_ids(&self) -> BTreeSet<String> {
        self.activities
            .iter()
            .map(|a| a.agent_id.clone())
            .collect()
    }

    pub fn has_agent(&self, agent_id: &str) -> bool {
        self.activities.iter().any(|a| a.agent_id == agent_id)
    }

    pub fn has_status(&self, status: ActivityStatus) -> bool {
        self.activities.iter().any(|a| a.status == status)
    }

    /// Insert or replace an activity by task id, keeping activity order stable
    pub fn upsert_activity(&mut self, activity: Activity) {
        match self
            .activities
            .iter_mut()
            .find(|a| a.task_id == activity.task_id)
        {
            Some(existing) => *existing = activity,
            None => self.activities.push(activity),
        }
    }

    /// Recompute task counters from the owned activities
    pub fn recount_tasks(&mut self) {
        self.total_tasks = self.activities.len() as u32;
        self.completed_tasks = self
            .activities
            .iter()
            .filter(|a| a.status == ActivityStatus::Completed)
            .count() as u32;
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::MissingField("id"));
        }
        if self.completed_tasks > self.total_tasks {
            return Err(ValidationError::TaskCountMismatch {
                completed: self.completed_tasks,
                total: self.total_tasks,
            });
        }
        if let Some(end) = self.end_time {
            if end < self.start_time {
                return Err(ValidationError::EndBeforeStart {
                    record: format!("session {}", self.id),
                });
            }
        }

        let mut seen = HashSet::with_capacity(self.activities.len());
        for activity in &self.activities {
            activity.validate()?;
            if !seen.insert(activity.task_id.as_str()) {
                return Err(ValidationError::DuplicateTask(activity.task_id.clone()));
            }
        }
        Ok(())
    }
}
