mod common;

use agentlens::analytics::{
    AnalysisError, Analyzer, AnalyzerConfig, AnomalyKind, AnomalySeverity, InsightSeverity,
    TrendDirection,
};
use agentlens::model::AgentType;
use agentlens::storage::{SessionFilter, Store};
use chrono::Duration;
use common::{base_time, open_store, SessionBuilder};
use std::sync::Arc;
use tempfile::TempDir;

async fn store_with(temp_dir: &TempDir, sessions: Vec<agentlens::model::Session>) -> Arc<Store> {
    let store = Arc::new(open_store(temp_dir).await);
    for session in sessions {
        store.write_session(session).await.unwrap();
    }
    store.flush().await.unwrap();
    store
}

fn durations(secs: &[i64]) -> Vec<agentlens::model::Session> {
    secs.iter()
        .enumerate()
        .map(|(i, d)| {
            SessionBuilder::new(&format!("s{i}"), base_time() + Duration::hours(i as i64))
                .duration_secs(*d)
                .build()
        })
        .collect()
}

#[tokio::test]
async fn test_low_success_rate_is_critical() {
    let temp_dir = TempDir::new().unwrap();
    let sessions = (0..10)
        .map(|i| {
            SessionBuilder::new(&format!("s{i}"), base_time() + Duration::hours(i))
                .agent("backend-developer", AgentType::BackendDeveloper)
                .tasks(3, 10)
                .build()
        })
        .collect();
    let store = store_with(&temp_dir, sessions).await;
    let analyzer = Analyzer::new(store.clone(), AnalyzerConfig::default());

    let result = analyzer.analyze(&SessionFilter::new(), None).await.unwrap();

    assert_eq!(result.summary.session_count, 10);
    assert!((result.summary.completion_rate - 0.3).abs() < 1e-9);

    let performance = result
        .anomalies
        .iter()
        .find(|a| a.kind == AnomalyKind::Performance)
        .unwrap();
    assert_eq!(performance.severity, AnomalySeverity::Critical);
    assert!(performance.confidence > 0.9);
    assert_eq!(performance.session_ids.len(), 10);

    assert_eq!(result.insights[0].severity, InsightSeverity::Critical);
    assert!(result
        .insights
        .iter()
        .any(|i| i.affected_agents == vec!["backend-developer".to_string()]));
    assert!(!result.recommendations.is_empty());

    store.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_long_session_is_a_statistical_outlier() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_with(&temp_dir, durations(&[100, 105, 98, 102, 900])).await;
    let analyzer = Analyzer::new(store.clone(), AnalyzerConfig::default());

    let result = analyzer.analyze(&SessionFilter::new(), None).await.unwrap();
    let statistical: Vec<_> = result
        .anomalies
        .iter()
        .filter(|a| a.kind == AnomalyKind::Statistical)
        .collect();

    assert_eq!(statistical.len(), 1);
    assert_eq!(statistical[0].session_ids, vec!["s4".to_string()]);
    assert_eq!(statistical[0].severity, AnomalySeverity::High);
    assert!(result
        .anomalies
        .iter()
        .all(|a| a.kind != AnomalyKind::Performance));

    store.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_small_samples_are_not_tested_for_outliers() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_with(&temp_dir, durations(&[100, 105, 98, 900])).await;
    let analyzer = Analyzer::new(store.clone(), AnalyzerConfig::default());

    let result = analyzer.analyze(&SessionFilter::new(), None).await.unwrap();
    assert!(result
        .anomalies
        .iter()
        .all(|a| a.kind != AnomalyKind::Statistical));

    store.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_cached_result_is_reused() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_with(&temp_dir, durations(&[100, 120])).await;
    let analyzer = Analyzer::new(store.clone(), AnalyzerConfig::default());

    let first = analyzer
        .analyze(&SessionFilter::new(), Some("daily"))
        .await
        .unwrap();
    store
        .write_session(SessionBuilder::new("late", base_time() + Duration::days(1)).build())
        .await
        .unwrap();
    let second = analyzer
        .analyze(&SessionFilter::new(), Some("daily"))
        .await
        .unwrap();
    assert_eq!(first, second);

    let fresh = analyzer.analyze(&SessionFilter::new(), None).await.unwrap();
    assert_eq!(fresh.summary.session_count, 3);

    analyzer.clear_cache().await;
    let recomputed = analyzer
        .analyze(&SessionFilter::new(), Some("daily"))
        .await
        .unwrap();
    assert_eq!(recomputed.summary.session_count, 3);

    store.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_cache_evicts_oldest_key() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_with(&temp_dir, durations(&[100])).await;
    let analyzer = Analyzer::new(store.clone(), AnalyzerConfig::default());

    for i in 0..101 {
        analyzer
            .analyze(&SessionFilter::new(), Some(&format!("key-{i}")))
            .await
            .unwrap();
    }
    assert_eq!(analyzer.cached_results().await, 100);

    store.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_compare_agents_ranks_by_efficiency() {
    let temp_dir = TempDir::new().unwrap();
    let mut sessions = Vec::new();
    for i in 0..4 {
        sessions.push(
            SessionBuilder::new(&format!("fast{i}"), base_time() + Duration::hours(i))
                .agent("architect", AgentType::Architect)
                .tasks(4, 4)
                .build(),
        );
        sessions.push(
            SessionBuilder::new(&format!("slow{i}"), base_time() + Duration::hours(i))
                .agent("qa", AgentType::QaEngineer)
                .tasks(1, 4)
                .tokens_per_task(20_000)
                .build(),
        );
    }
    let store = store_with(&temp_dir, sessions).await;
    let analyzer = Analyzer::new(store.clone(), AnalyzerConfig::default());

    let agents = vec!["qa".to_string(), "architect".to_string(), "ghost".to_string()];
    let comparison = analyzer.compare_agents(&agents, None).await.unwrap();

    let order: Vec<&str> = comparison
        .comparison
        .iter()
        .map(|p| p.agent_id.as_str())
        .collect();
    assert_eq!(order, vec!["qa", "architect", "ghost"]);
    assert_eq!(comparison.rankings[0].agent_id, "architect");
    assert_eq!(comparison.rankings[0].rank, 1);
    assert_eq!(comparison.rankings[2].agent_id, "ghost");
    assert_eq!(comparison.comparison[2].efficiency_score, 0.0);
    assert!(!comparison.insights.is_empty());

    store.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_recent_window_reports_trends() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_with(&temp_dir, durations(&[600, 500, 400, 300, 200, 100])).await;
    let analyzer = Analyzer::new(store.clone(), AnalyzerConfig::default());

    let sessions = store.query_sessions(&SessionFilter::new()).await.unwrap();
    let recent = analyzer.analyze_recent(&sessions, 4);

    assert_eq!(recent.current_metrics.session_count, 4);
    let duration = recent
        .trends
        .iter()
        .find(|t| t.metric == "session_duration")
        .unwrap();
    assert_eq!(duration.direction, TrendDirection::Improving);
    assert_eq!(duration.points, 4);

    store.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_query_failure_surfaces_storage_error() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_with(&temp_dir, durations(&[100])).await;
    let analyzer = Analyzer::new(store.clone(), AnalyzerConfig::default());
    store.shutdown().await.unwrap();

    let err = analyzer
        .analyze(&SessionFilter::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::Storage(_)));
}
