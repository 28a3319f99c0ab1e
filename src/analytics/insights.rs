//! Insight and recommendation synthesis

use std::collections::{BTreeSet, HashSet};

use super::config::AnalyzerConfig;
use super::error::AnalysisError;
use super::models::{
    AgentPerformance, Anomaly, AnomalySeverity, Insight, InsightSeverity, InsightType,
    SessionSummary,
};
use crate::model::Session;

const SMALL_SAMPLE: usize = 10;
const LONG_SESSION_SECS: f64 = 3600.0;

pub const INSUFFICIENT_DATA: &str =
    "Insufficient data: no sessions matched the query. Record more sessions before drawing conclusions.";

/// Agents below the success threshold and activities far slower than baseline
pub fn performance_issues(
    sessions: &[Session],
    performance: &[AgentPerformance],
    config: &AnalyzerConfig,
) -> Result<Vec<Insight>, AnalysisError> {
    let mut insights = Vec::new();

    for agent in performance
        .iter()
        .filter(|p| p.total_activities > 0 && p.success_rate < config.low_success_threshold)
    {
        let severity = if agent.success_rate < config.low_success_threshold / 2.0 {
            InsightSeverity::Critical
        } else {
            InsightSeverity::Warning
        };
        insights.push(Insight {
            insight_type: InsightType::PerformanceIssue,
            severity,
            title: format!("Low success rate for {}", agent.agent_id),
            description: format!(
                "{} succeeded in {:.0}% of {} activities, below the {:.0}% threshold",
                agent.agent_id,
                agent.success_rate * 100.0,
                agent.total_activities,
                config.low_success_threshold * 100.0
            ),
            affected_agents: vec![agent.agent_id.clone()],
            recommendations: vec![format!(
                "Review failed tasks for {} and adjust its instructions or tool access",
                agent.agent_id
            )],
        });
    }

    let slow_limit = config.baseline_duration_secs * 2.0;
    let mut slow_agents = BTreeSet::new();
    let mut slow_count = 0usize;
    for activity in sessions.iter().flat_map(|s| &s.activities) {
        if activity.duration_secs().is_some_and(|d| d > slow_limit) {
            slow_count += 1;
            slow_agents.insert(activity.agent_id.clone());
        }
    }
    if slow_count > 0 {
        insights.push(Insight {
            insight_type: InsightType::PerformanceIssue,
            severity: InsightSeverity::Warning,
            title: "Slow activities detected".to_string(),
            description: format!(
                "{} activities took longer than {:.0}s, twice the baseline duration",
                slow_count, slow_limit
            ),
            affected_agents: slow_agents.into_iter().collect(),
            recommendations: vec![
                "Break long-running tasks into smaller steps".to_string(),
            ],
        });
    }

    Ok(insights)
}

/// Agents whose efficiency makes their setup worth copying
pub fn efficiency_patterns(
    performance: &[AgentPerformance],
    config: &AnalyzerConfig,
) -> Result<Vec<Insight>, AnalysisError> {
    Ok(performance
        .iter()
        .filter(|p| p.efficiency_score > config.high_efficiency_threshold)
        .map(|agent| Insight {
            insight_type: InsightType::EfficiencyPattern,
            severity: InsightSeverity::Info,
            title: format!("{} is highly efficient", agent.agent_id),
            description: format!(
                "{} scored {:.1} efficiency over {} completed tasks",
                agent.agent_id, agent.efficiency_score, agent.tasks_completed
            ),
            affected_agents: vec![agent.agent_id.clone()],
            recommendations: vec![format!(
                "Replicate the configuration of {} for similar agents",
                agent.agent_id
            )],
        })
        .collect())
}

/// Promote confident anomalies to insights
pub fn promote_anomalies(
    anomalies: &[Anomaly],
    sessions: &[Session],
    config: &AnalyzerConfig,
) -> Result<Vec<Insight>, AnalysisError> {
    Ok(anomalies
        .iter()
        .filter(|a| a.confidence > config.anomaly_confidence_threshold)
        .map(|anomaly| {
            let flagged: HashSet<&str> = anomaly.session_ids.iter().map(String::as_str).collect();
            let affected: BTreeSet<String> = sessions
                .iter()
                .filter(|s| flagged.contains(s.id.as_str()))
                .flat_map(|s| s.agent_ids())
                .collect();

            Insight {
                insight_type: InsightType::Anomaly,
                severity: if anomaly.severity == AnomalySeverity::Critical {
                    InsightSeverity::Critical
                } else {
                    InsightSeverity::Warning
                },
                title: format!("{:?} anomaly", anomaly.kind),
                description: anomaly.description.clone(),
                affected_agents: affected.into_iter().collect(),
                recommendations: vec![format!(
                    "Investigate sessions {}",
                    preview_ids(&anomaly.session_ids)
                )],
            }
        })
        .collect())
}

fn preview_ids(ids: &[String]) -> String {
    const SHOWN: usize = 5;
    if ids.len() <= SHOWN {
        ids.join(", ")
    } else {
        format!("{} and {} more", ids[..SHOWN].join(", "), ids.len() - SHOWN)
    }
}

/// Most severe first, at most `limit`
pub fn rank_insights(mut insights: Vec<Insight>, limit: usize) -> Vec<Insight> {
    // stable: equal severities keep discovery order
    insights.sort_by(|a, b| b.severity.rank().cmp(&a.severity.rank()));
    insights.truncate(limit);
    insights
}

/// Insight recommendations plus sample-level heuristics, de-duplicated
pub fn recommendations(
    insights: &[Insight],
    summary: &SessionSummary,
    config: &AnalyzerConfig,
) -> Vec<String> {
    if summary.session_count == 0 {
        return vec![INSUFFICIENT_DATA.to_string()];
    }

    let mut all: Vec<String> = insights
        .iter()
        .flat_map(|i| i.recommendations.iter().cloned())
        .collect();

    if summary.session_count < SMALL_SAMPLE {
        all.push(format!(
            "Only {} sessions analyzed; collect at least {} for reliable statistics",
            summary.session_count, SMALL_SAMPLE
        ));
    }
    if summary.average_duration_secs > LONG_SESSION_SECS {
        all.push(format!(
            "Sessions average {:.0} minutes; consider splitting work into shorter sessions",
            summary.average_duration_secs / 60.0
        ));
    }
    if summary.total_tasks > 0 && summary.completion_rate < config.baseline_success_rate {
        all.push(format!(
            "Overall completion rate {:.0}% is below the {:.0}% baseline; review failing tasks",
            summary.completion_rate * 100.0,
            config.baseline_success_rate * 100.0
        ));
    }

    let mut seen = HashSet::new();
    all.retain(|r| seen.insert(r.clone()));
    all.truncate(config.max_recommendations);
    all
}
