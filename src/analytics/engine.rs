//! Analysis engine: metrics, anomalies and insights over stored sessions

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::anomaly;
use super::cache::FifoCache;
use super::config::AnalyzerConfig;
use super::error::AnalysisError;
use super::insights;
use super::metrics;
use super::models::{
    AgentComparison, AgentPerformance, AgentRanking, AnalysisResult, Anomaly, Insight,
    InsightSeverity, InsightType, RecentAnalysis,
};
use super::source::SessionSource;
use super::trends;
use crate::model::Session;
use crate::storage::{SessionFilter, TimeRange};

/// Efficiency gap between best and worst compared agents worth calling out
const COMPARISON_GAP: f64 = 20.0;

pub struct Analyzer {
    source: Arc<dyn SessionSource>,
    config: AnalyzerConfig,
    cache: FifoCache<String, AnalysisResult>,
}

impl Analyzer {
    pub fn new(source: Arc<dyn SessionSource>, config: AnalyzerConfig) -> Self {
        let cache = FifoCache::new(config.cache_capacity);
        Self {
            source,
            config,
            cache,
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Analyze the sessions matching `filter`.
    ///
    /// With a `cache_key`, a cached result is returned when present and a
    /// fresh result is stored under that key. Only the session query can fail.
    pub async fn analyze(
        &self,
        filter: &SessionFilter,
        cache_key: Option<&str>,
    ) -> Result<AnalysisResult, AnalysisError> {
        if let Some(key) = cache_key {
            if let Some(cached) = self.cache.get(&key.to_string()).await {
                debug!(key, "Analysis cache hit");
                return Ok(cached);
            }
        }

        let sessions = self.source.query_sessions(filter).await?;
        let result = self.analyze_sessions(&sessions);

        if let Some(key) = cache_key {
            self.cache.insert(key.to_string(), result.clone()).await;
        }
        Ok(result)
    }

    /// Analyze an already-loaded set of sessions
    pub fn analyze_sessions(&self, sessions: &[Session]) -> AnalysisResult {
        let summary = metrics::summarize_sessions(sessions);
        let agent_performance = metrics::agent_performance(sessions, &self.config);
        let anomalies = self.detect_anomalies(sessions);
        let insights = self.generate_insights(sessions, &agent_performance, &anomalies);
        let recommendations = insights::recommendations(&insights, &summary, &self.config);

        info!(
            sessions = summary.session_count,
            agents = agent_performance.len(),
            anomalies = anomalies.len(),
            insights = insights.len(),
            "Analysis completed"
        );

        AnalysisResult {
            summary,
            agent_performance,
            anomalies,
            insights,
            recommendations,
            generated_at: Utc::now(),
        }
    }

    /// Metrics, trends and alerts for the most recent `window_size` sessions
    pub fn analyze_recent(&self, sessions: &[Session], window_size: usize) -> RecentAnalysis {
        let mut window: Vec<Session> = sessions.to_vec();
        window.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        window.truncate(window_size);
        window.reverse();

        let current_metrics = metrics::summarize_sessions(&window);
        let trends = trends::session_trends(&window, self.config.trend_threshold);
        let performance = metrics::agent_performance(&window, &self.config);
        let anomalies = self.detect_anomalies(&window);
        let alerts = self
            .generate_insights(&window, &performance, &anomalies)
            .into_iter()
            .filter(|i| i.severity.rank() >= InsightSeverity::Warning.rank())
            .collect();

        RecentAnalysis {
            current_metrics,
            trends,
            anomalies,
            alerts,
        }
    }

    /// Side-by-side performance of the given agents
    pub async fn compare_agents(
        &self,
        agent_ids: &[String],
        time_range: Option<TimeRange>,
    ) -> Result<AgentComparison, AnalysisError> {
        let mut requested: Vec<String> = Vec::with_capacity(agent_ids.len());
        for id in agent_ids {
            if !requested.contains(id) {
                requested.push(id.clone());
            }
        }
        if requested.is_empty() {
            return Ok(AgentComparison {
                comparison: Vec::new(),
                rankings: Vec::new(),
                insights: Vec::new(),
            });
        }

        let mut filter = SessionFilter::new().with_agents(requested.iter().cloned());
        if let Some(range) = time_range {
            filter = filter.with_time_range(range);
        }
        let sessions = self.source.query_sessions(&filter).await?;
        let performance = metrics::agent_performance(&sessions, &self.config);

        let comparison: Vec<AgentPerformance> = requested
            .iter()
            .map(|id| {
                performance
                    .iter()
                    .find(|p| &p.agent_id == id)
                    .cloned()
                    .unwrap_or_else(|| AgentPerformance::empty(id.clone()))
            })
            .collect();

        let mut ranked = comparison.clone();
        metrics::sort_by_efficiency(&mut ranked);
        let rankings: Vec<AgentRanking> = ranked
            .iter()
            .enumerate()
            .map(|(i, p)| AgentRanking {
                rank: i + 1,
                agent_id: p.agent_id.clone(),
                efficiency_score: p.efficiency_score,
            })
            .collect();

        let mut found = self.collect(
            "efficiency_patterns",
            insights::efficiency_patterns(&comparison, &self.config),
        );
        found.extend(self.collect(
            "performance_issues",
            insights::performance_issues(&[], &comparison, &self.config),
        ));
        if let (Some(best), Some(worst)) = (ranked.first(), ranked.last()) {
            let gap = best.efficiency_score - worst.efficiency_score;
            if ranked.len() > 1 && gap > COMPARISON_GAP {
                found.push(Insight {
                    insight_type: InsightType::Comparison,
                    severity: InsightSeverity::Info,
                    title: format!("{} outperforms {}", best.agent_id, worst.agent_id),
                    description: format!(
                        "Efficiency {:.1} vs {:.1}, a gap of {:.1} points",
                        best.efficiency_score, worst.efficiency_score, gap
                    ),
                    affected_agents: vec![best.agent_id.clone(), worst.agent_id.clone()],
                    recommendations: vec![format!(
                        "Compare the task mix and configuration of {} with {}",
                        worst.agent_id, best.agent_id
                    )],
                });
            }
        }

        Ok(AgentComparison {
            comparison,
            rankings,
            insights: insights::rank_insights(found, self.config.max_insights),
        })
    }

    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    pub async fn cached_results(&self) -> usize {
        self.cache.len().await
    }

    fn detect_anomalies(&self, sessions: &[Session]) -> Vec<Anomaly> {
        let mut anomalies = self.collect(
            "statistical",
            anomaly::detect_statistical(sessions, &self.config),
        );
        anomalies.extend(self.collect(
            "performance",
            anomaly::detect_performance(sessions, &self.config),
        ));
        anomalies.extend(self.collect("behavioral", anomaly::detect_behavioral(sessions)));
        anomalies
    }

    fn generate_insights(
        &self,
        sessions: &[Session],
        performance: &[AgentPerformance],
        anomalies: &[Anomaly],
    ) -> Vec<Insight> {
        let mut found = self.collect(
            "performance_issues",
            insights::performance_issues(sessions, performance, &self.config),
        );
        found.extend(self.collect(
            "efficiency_patterns",
            insights::efficiency_patterns(performance, &self.config),
        ));
        found.extend(self.collect(
            "anomalies",
            insights::promote_anomalies(anomalies, sessions, &self.config),
        ));
        insights::rank_insights(found, self.config.max_insights)
    }

    /// A failed category contributes nothing; the rest of the analysis goes on
    fn collect<T>(&self, category: &str, result: Result<Vec<T>, AnalysisError>) -> Vec<T> {
        match result {
            Ok(items) => items,
            Err(e) => {
                warn!(category, error = %e, "Analysis category failed");
                Vec::new()
            }
        }
    }
}
