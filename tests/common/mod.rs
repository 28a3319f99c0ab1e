//! Common test utilities and helpers

#![allow(dead_code)]

use agentlens::model::{Activity, ActivityStatus, AgentType, Session};
use agentlens::storage::{Store, StoreConfig};
use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;

/// Noon on a fixed weekday, clear of the off-hours window
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
}

pub async fn open_store(temp_dir: &TempDir) -> Store {
    open_store_with(StoreConfig::with_base_dir(temp_dir.path())).await
}

pub async fn open_store_with(config: StoreConfig) -> Store {
    let store = Store::new(config);
    store.initialize().await.unwrap();
    store
}

/// Builder for sessions with a controlled task outcome mix
pub struct SessionBuilder {
    id: String,
    start: DateTime<Utc>,
    duration_secs: Option<i64>,
    agents: Vec<(String, AgentType)>,
    total: u32,
    completed: u32,
    tokens_per_task: u64,
}

impl SessionBuilder {
    pub fn new(id: &str, start: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            start,
            duration_secs: Some(120),
            agents: vec![("architect".to_string(), AgentType::Architect)],
            total: 1,
            completed: 1,
            tokens_per_task: 1000,
        }
    }

    pub fn duration_secs(mut self, secs: i64) -> Self {
        self.duration_secs = Some(secs);
        self
    }

    pub fn open(mut self) -> Self {
        self.duration_secs = None;
        self
    }

    pub fn agent(mut self, agent_id: &str, agent_type: AgentType) -> Self {
        self.agents = vec![(agent_id.to_string(), agent_type)];
        self
    }

    pub fn tasks(mut self, completed: u32, total: u32) -> Self {
        self.completed = completed;
        self.total = total;
        self
    }

    pub fn tokens_per_task(mut self, tokens: u64) -> Self {
        self.tokens_per_task = tokens;
        self
    }

    pub fn build(self) -> Session {
        let mut session = Session::new(&self.id, self.start);
        session.end_time = self
            .duration_secs
            .map(|secs| self.start + Duration::seconds(secs));

        for i in 0..self.total {
            let (agent_id, agent_type) = &self.agents[i as usize % self.agents.len()];
            let mut activity =
                Activity::new(agent_id.as_str(), *agent_type, format!("{}-task-{i}", self.id));
            activity.start_time = self.start;
            activity.input_tokens = self.tokens_per_task / 2;
            activity.output_tokens = self.tokens_per_task - self.tokens_per_task / 2;
            let status = if i < self.completed {
                ActivityStatus::Completed
            } else {
                ActivityStatus::Failed
            };
            activity.finish(self.start + Duration::seconds(30), status);
            session.activities.push(activity);
        }
        session.recount_tasks();
        session
    }
}
