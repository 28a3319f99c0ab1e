//! Aggregates produced by the analyzer
//!
//! Everything here is plain serializable data for presenters; none of it is
//! persisted as a primary record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::AgentType;

/// Per-tool usage across every activity's tool list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolStat {
    pub name: String,
    pub usage_count: u64,
    pub success_rate: f64,
    pub average_duration_secs: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_count: usize,
    /// Mean over sessions whose end time is known
    pub average_duration_secs: f64,
    pub total_tasks: u64,
    pub completed_tasks: u64,
    /// `completed_tasks / total_tasks`, 0 when there are no tasks
    pub completion_rate: f64,
    pub most_active_agent: Option<String>,
    pub tool_stats: BTreeMap<String, ToolStat>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPerformance {
    pub agent_id: String,
    pub agent_type: AgentType,
    pub total_activities: u64,
    pub tasks_completed: u64,
    pub success_rate: f64,
    pub average_duration_secs: f64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    /// Composite score in `[0, 100]`
    pub efficiency_score: f64,
}

impl AgentPerformance {
    /// Performance entry for an agent with no recorded activity
    pub fn empty(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            agent_type: AgentType::General,
            total_activities: 0,
            tasks_completed: 0,
            success_rate: 0.0,
            average_duration_secs: 0.0,
            input_tokens: 0,
            output_tokens: 0,
            total_tokens: 0,
            efficiency_score: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightType {
    PerformanceIssue,
    EfficiencyPattern,
    Anomaly,
    Comparison,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightSeverity {
    Info,
    Warning,
    Critical,
}

impl InsightSeverity {
    pub fn rank(&self) -> u8 {
        match self {
            Self::Info => 1,
            Self::Warning => 2,
            Self::Critical => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    #[serde(rename = "type")]
    pub insight_type: InsightType,
    pub severity: InsightSeverity,
    pub title: String,
    pub description: String,
    pub affected_agents: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    Statistical,
    Performance,
    Behavioral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalySeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    #[serde(rename = "type")]
    pub kind: AnomalyKind,
    pub severity: AnomalySeverity,
    /// How sure the detector is, in `[0, 1]`
    pub confidence: f64,
    pub description: String,
    pub session_ids: Vec<String>,
    pub detected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Improving,
    Declining,
    Stable,
}

/// Least-squares fit of a series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendLine {
    pub slope: f64,
    pub intercept: f64,
    /// Pearson correlation coefficient
    pub correlation: f64,
    /// `|correlation|`, how closely the series follows the line
    pub strength: f64,
    /// Coefficient of determination
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trend {
    pub metric: String,
    pub direction: TrendDirection,
    /// Relative change from first to last value, as a fraction
    pub change: f64,
    pub first: f64,
    pub last: f64,
    pub points: usize,
    pub line: Option<TrendLine>,
}

/// Bundle returned by `Analyzer::analyze`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub summary: SessionSummary,
    /// Sorted by efficiency descending
    pub agent_performance: Vec<AgentPerformance>,
    pub anomalies: Vec<Anomaly>,
    pub insights: Vec<Insight>,
    pub recommendations: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentAnalysis {
    pub current_metrics: SessionSummary,
    pub trends: Vec<Trend>,
    pub anomalies: Vec<Anomaly>,
    /// Insights of warning severity or above
    pub alerts: Vec<Insight>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRanking {
    pub rank: usize,
    pub agent_id: String,
    pub efficiency_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentComparison {
    /// One entry per requested agent, in request order
    pub comparison: Vec<AgentPerformance>,
    pub rankings: Vec<AgentRanking>,
    pub insights: Vec<Insight>,
}
