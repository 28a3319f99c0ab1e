//! Session summaries, per-agent performance and the efficiency score

use std::collections::{BTreeMap, HashMap};

use super::config::AnalyzerConfig;
use super::models::{AgentPerformance, SessionSummary, ToolStat};
use super::stats;
use crate::model::{Activity, ActivityStatus, Session};

/// Inputs to the efficiency score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EfficiencyInput {
    pub success_rate: f64,
    /// Mean task duration, if any task has finished
    pub average_duration_secs: Option<f64>,
    pub total_tokens: u64,
    pub completed_tasks: u64,
}

/// Composite score in `[0, 100]`: success, speed, token economy and volume
pub fn efficiency_score(input: &EfficiencyInput, config: &AnalyzerConfig) -> f64 {
    if input.completed_tasks == 0 {
        return 0.0;
    }
    let weights = &config.efficiency_weights;

    let success = if config.baseline_success_rate > 0.0 {
        (input.success_rate.max(0.0) / config.baseline_success_rate).min(1.0)
    } else {
        1.0
    };

    let speed = match input.average_duration_secs {
        Some(avg) if avg > 0.0 => (config.baseline_duration_secs / avg).min(1.0),
        Some(_) => 1.0,
        None => 0.0,
    };

    let tokens_per_task = input.total_tokens as f64 / input.completed_tasks as f64;
    let tokens = if tokens_per_task > 0.0 {
        (config.baseline_tokens_per_task / tokens_per_task).min(1.0)
    } else {
        1.0
    };

    let volume = if config.volume_target == 0 {
        1.0
    } else {
        (input.completed_tasks as f64 / config.volume_target as f64).min(1.0)
    };

    let score = success * weights.success
        + speed * weights.speed
        + tokens * weights.tokens
        + volume * weights.volume;
    if score.is_finite() {
        score.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

pub fn summarize_sessions(sessions: &[Session]) -> SessionSummary {
    if sessions.is_empty() {
        return SessionSummary::default();
    }

    let durations: Vec<f64> = sessions.iter().filter_map(Session::duration_secs).collect();
    let total_tasks: u64 = sessions.iter().map(|s| u64::from(s.total_tasks)).sum();
    let completed_tasks: u64 = sessions.iter().map(|s| u64::from(s.completed_tasks)).sum();

    SessionSummary {
        session_count: sessions.len(),
        average_duration_secs: stats::mean(&durations).unwrap_or(0.0),
        total_tasks,
        completed_tasks,
        completion_rate: if total_tasks == 0 {
            0.0
        } else {
            completed_tasks as f64 / total_tasks as f64
        },
        most_active_agent: most_active_agent(sessions),
        tool_stats: tool_stats(sessions.iter().flat_map(|s| &s.activities)),
    }
}

/// Agent with the most activities; ties go to the lexically smallest id
fn most_active_agent(sessions: &[Session]) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for activity in sessions.iter().flat_map(|s| &s.activities) {
        *counts.entry(activity.agent_id.as_str()).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by(|(a_id, a), (b_id, b)| a.cmp(b).then_with(|| b_id.cmp(a_id)))
        .map(|(id, _)| id.to_string())
}

#[derive(Default)]
struct ToolAccumulator {
    uses: u64,
    successes: u64,
    duration_total: f64,
    timed: u64,
}

fn tool_stats<'a>(activities: impl Iterator<Item = &'a Activity>) -> BTreeMap<String, ToolStat> {
    let mut acc: BTreeMap<&str, ToolAccumulator> = BTreeMap::new();
    for activity in activities {
        for tool in &activity.tools_used {
            let entry = acc.entry(tool.as_str()).or_default();
            entry.uses += 1;
            if activity.success {
                entry.successes += 1;
            }
            if let Some(secs) = activity.duration_secs() {
                entry.duration_total += secs;
                entry.timed += 1;
            }
        }
    }

    acc.into_iter()
        .map(|(name, a)| {
            let stat = ToolStat {
                name: name.to_string(),
                usage_count: a.uses,
                success_rate: a.successes as f64 / a.uses as f64,
                average_duration_secs: if a.timed == 0 {
                    0.0
                } else {
                    a.duration_total / a.timed as f64
                },
            };
            (name.to_string(), stat)
        })
        .collect()
}

/// Performance of every agent appearing in `sessions`, best efficiency first
pub fn agent_performance(sessions: &[Session], config: &AnalyzerConfig) -> Vec<AgentPerformance> {
    let mut by_agent: BTreeMap<&str, Vec<&Activity>> = BTreeMap::new();
    for activity in sessions.iter().flat_map(|s| &s.activities) {
        by_agent
            .entry(activity.agent_id.as_str())
            .or_default()
            .push(activity);
    }

    let mut performance: Vec<AgentPerformance> = by_agent
        .into_iter()
        .map(|(agent_id, activities)| performance_for(agent_id, &activities, config))
        .collect();
    sort_by_efficiency(&mut performance);
    performance
}

pub fn sort_by_efficiency(performance: &mut [AgentPerformance]) {
    performance.sort_by(|a, b| {
        b.efficiency_score
            .total_cmp(&a.efficiency_score)
            .then_with(|| a.agent_id.cmp(&b.agent_id))
    });
}

fn performance_for(
    agent_id: &str,
    activities: &[&Activity],
    config: &AnalyzerConfig,
) -> AgentPerformance {
    let total = activities.len() as u64;
    let completed = activities
        .iter()
        .filter(|a| a.status == ActivityStatus::Completed)
        .count() as u64;
    let successful = activities.iter().filter(|a| a.success).count() as u64;
    let durations: Vec<f64> = activities.iter().filter_map(|a| a.duration_secs()).collect();
    let input_tokens: u64 = activities.iter().map(|a| a.input_tokens).sum();
    let output_tokens: u64 = activities.iter().map(|a| a.output_tokens).sum();
    let success_rate = if total == 0 {
        0.0
    } else {
        successful as f64 / total as f64
    };
    let average_duration = stats::mean(&durations);

    let efficiency = efficiency_score(
        &EfficiencyInput {
            success_rate,
            average_duration_secs: average_duration,
            total_tokens: input_tokens + output_tokens,
            completed_tasks: completed,
        },
        config,
    );

    AgentPerformance {
        agent_id: agent_id.to_string(),
        agent_type: activities
            .first()
            .map(|a| a.agent_type)
            .unwrap_or_default(),
        total_activities: total,
        tasks_completed: completed,
        success_rate,
        average_duration_secs: average_duration.unwrap_or(0.0),
        input_tokens,
        output_tokens,
        total_tokens: input_tokens + output_tokens,
        efficiency_score: efficiency,
    }
}
