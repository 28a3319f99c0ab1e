//! Query filters for sessions and activities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::model::{Activity, ActivityStatus, AgentType, Session};

/// Inclusive time window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }
}

/// Predicates for [`Store::query_sessions`](super::Store::query_sessions)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionFilter {
    /// Inclusive window on session start time
    pub time_range: Option<TimeRange>,
    /// Match sessions where any activity belongs to one of these agents
    #[serde(default)]
    pub agent_ids: BTreeSet<String>,
    /// Match sessions where any activity has one of these statuses
    #[serde(default)]
    pub statuses: Vec<ActivityStatus>,
    pub limit: Option<usize>,
}

impl SessionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_time_range(mut self, range: TimeRange) -> Self {
        self.time_range = Some(range);
        self
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_ids.insert(agent_id.into());
        self
    }

    pub fn with_agents<I, S>(mut self, agent_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.agent_ids.extend(agent_ids.into_iter().map(Into::into));
        self
    }

    pub fn with_status(mut self, status: ActivityStatus) -> Self {
        if !self.statuses.contains(&status) {
            self.statuses.push(status);
        }
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn has_agent_filter(&self) -> bool {
        !self.agent_ids.is_empty()
    }

    /// Cheap check against an index entry's start time
    pub fn admits_start(&self, start: DateTime<Utc>) -> bool {
        self.time_range.map_or(true, |r| r.contains(start))
    }

    pub fn matches(&self, session: &Session) -> bool {
        if !self.admits_start(session.start_time) {
            return false;
        }
        if self.has_agent_filter() && !self.agent_ids.iter().any(|a| session.has_agent(a)) {
            return false;
        }
        if !self.statuses.is_empty() && !self.statuses.iter().any(|s| session.has_status(*s)) {
            return false;
        }
        true
    }
}

/// Predicates for [`Store::query_activities`](super::Store::query_activities)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityFilter {
    pub time_range: Option<TimeRange>,
    #[serde(default)]
    pub statuses: Vec<ActivityStatus>,
    #[serde(default)]
    pub agent_types: Vec<AgentType>,
    pub limit: Option<usize>,
}

impl ActivityFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_time_range(mut self, range: TimeRange) -> Self {
        self.time_range = Some(range);
        self
    }

    pub fn with_status(mut self, status: ActivityStatus) -> Self {
        if !self.statuses.contains(&status) {
            self.statuses.push(status);
        }
        self
    }

    pub fn with_agent_type(mut self, agent_type: AgentType) -> Self {
        if !self.agent_types.contains(&agent_type) {
            self.agent_types.push(agent_type);
        }
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, activity: &Activity) -> bool {
        self.time_range
            .map_or(true, |r| r.contains(activity.start_time))
            && (self.statuses.is_empty() || self.statuses.contains(&activity.status))
            && (self.agent_types.is_empty() || self.agent_types.contains(&activity.agent_type))
    }
}

/// Order newest first and apply an optional limit
pub fn finalize_sessions(mut sessions: Vec<Session>, limit: Option<usize>) -> Vec<Session> {
    sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time).then_with(|| a.id.cmp(&b.id)));
    if let Some(limit) = limit {
        sessions.truncate(limit);
    }
    sessions
}

pub fn finalize_activities(mut activities: Vec<Activity>, limit: Option<usize>) -> Vec<Activity> {
    activities.sort_by(|a, b| {
        b.start_time
            .cmp(&a.start_time)
            .then_with(|| a.task_id.cmp(&b.task_id))
    });
    if let Some(limit) = limit {
        activities.truncate(limit);
    }
    activities
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session_with(agent: &str, status: ActivityStatus, start: DateTime<Utc>) -> Session {
        let mut session = Session::new(format!("s-{agent}"), start);
        let mut activity = Activity::new(agent, AgentType::General, "t");
        activity.status = status;
        session.activities.push(activity);
        session
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let session = session_with("a", ActivityStatus::Pending, Utc::now());
        assert!(SessionFilter::new().matches(&session));
    }

    #[test]
    fn test_time_range_is_inclusive() {
        let now = Utc::now();
        let session = session_with("a", ActivityStatus::Pending, now);
        let exact = SessionFilter::new().with_time_range(TimeRange::new(now, now));
        assert!(exact.matches(&session));

        let before = SessionFilter::new()
            .with_time_range(TimeRange::new(now - Duration::hours(2), now - Duration::hours(1)));
        assert!(!before.matches(&session));
    }

    #[test]
    fn test_agent_and_status_predicates_match_any_activity() {
        let session = session_with("backend-developer", ActivityStatus::Failed, Utc::now());

        assert!(SessionFilter::new()
            .with_agents(["architect", "backend-developer"])
            .matches(&session));
        assert!(!SessionFilter::new().with_agent("architect").matches(&session));
        assert!(SessionFilter::new()
            .with_status(ActivityStatus::Completed)
            .with_status(ActivityStatus::Failed)
            .matches(&session));
        assert!(!SessionFilter::new()
            .with_status(ActivityStatus::Completed)
            .matches(&session));
    }

    #[test]
    fn test_finalize_orders_newest_first() {
        let now = Utc::now();
        let sessions = vec![
            Session::new("old", now - Duration::hours(2)),
            Session::new("new", now),
            Session::new("mid", now - Duration::hours(1)),
        ];
        let ordered = finalize_sessions(sessions, Some(2));
        let ids: Vec<_> = ordered.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid"]);
    }

    #[test]
    fn test_activity_filter() {
        let mut activity = Activity::new("a", AgentType::QaEngineer, "t");
        activity.status = ActivityStatus::Completed;

        assert!(ActivityFilter::new().matches(&activity));
        assert!(ActivityFilter::new()
            .with_agent_type(AgentType::QaEngineer)
            .with_status(ActivityStatus::Completed)
            .matches(&activity));
        assert!(!ActivityFilter::new()
            .with_agent_type(AgentType::Architect)
            .matches(&activity));
    }
}
