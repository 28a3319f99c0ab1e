//! Anomaly detectors
//!
//! Each detector looks at one aspect of a sample and is independent of the
//! others; the engine unions their findings.

use chrono::{Timelike, Utc};

use super::config::AnalyzerConfig;
use super::error::AnalysisError;
use super::models::{Anomaly, AnomalyKind, AnomalySeverity};
use super::stats;
use crate::model::Session;

/// Sessions starting before this hour (UTC) are off-hours
const OFF_HOURS_END: u32 = 6;
/// Sessions starting at or after this hour (UTC) are off-hours
const OFF_HOURS_START: u32 = 22;
/// Share of outliers or off-hours sessions that escalates severity
const SIGNIFICANT_SHARE: f64 = 0.1;

/// Sessions whose duration is far from the rest of the sample.
/// Returns nothing below `min_statistical_sample` sessions with a duration.
pub fn detect_statistical(
    sessions: &[Session],
    config: &AnalyzerConfig,
) -> Result<Vec<Anomaly>, AnalysisError> {
    let timed: Vec<(&Session, f64)> = sessions
        .iter()
        .filter_map(|s| s.duration_secs().map(|d| (s, d)))
        .collect();
    if timed.len() < config.min_statistical_sample {
        return Ok(Vec::new());
    }

    let durations: Vec<f64> = timed.iter().map(|(_, d)| *d).collect();
    stats::ensure_finite(&durations)?;

    let outliers = stats::leave_one_out_outliers(&durations, config.std_dev_threshold);
    if outliers.is_empty() {
        return Ok(Vec::new());
    }

    let share = outliers.len() as f64 / timed.len() as f64;
    let max_z = outliers.iter().map(|(_, z)| *z).fold(0.0, f64::max);
    let session_ids: Vec<String> = outliers
        .iter()
        .map(|(i, _)| timed[*i].0.id.clone())
        .collect();
    let mean = stats::mean(&durations).unwrap_or(0.0);

    Ok(vec![Anomaly {
        kind: AnomalyKind::Statistical,
        severity: if share > SIGNIFICANT_SHARE {
            AnomalySeverity::High
        } else {
            AnomalySeverity::Medium
        },
        confidence: (1.0 - 1.0 / max_z).clamp(0.0, 0.99),
        description: format!(
            "{} of {} sessions have durations more than {} standard deviations from the rest (sample mean {:.0}s)",
            outliers.len(),
            timed.len(),
            config.std_dev_threshold,
            mean
        ),
        session_ids,
        detected_at: Utc::now(),
    }])
}

/// Mean session success rate well below the configured baseline
pub fn detect_performance(
    sessions: &[Session],
    config: &AnalyzerConfig,
) -> Result<Vec<Anomaly>, AnalysisError> {
    let rated: Vec<&Session> = sessions.iter().filter(|s| s.total_tasks > 0).collect();
    let rates: Vec<f64> = rated.iter().map(|s| s.success_rate()).collect();
    let Some(mean_rate) = stats::mean(&rates) else {
        return Ok(Vec::new());
    };
    if config.baseline_success_rate <= 0.0 {
        return Err(AnalysisError::statistics(
            "baseline success rate must be positive",
        ));
    }

    let ratio = mean_rate / config.baseline_success_rate;
    let severity = if ratio < 0.5 {
        AnomalySeverity::Critical
    } else if ratio < 0.7 {
        AnomalySeverity::High
    } else {
        return Ok(Vec::new());
    };

    let mut struggling: Vec<&Session> = rated
        .into_iter()
        .filter(|s| s.success_rate() < config.baseline_success_rate)
        .collect();
    struggling.sort_by(|a, b| a.success_rate().total_cmp(&b.success_rate()));

    Ok(vec![Anomaly {
        kind: AnomalyKind::Performance,
        severity,
        confidence: (0.5 + 0.05 * rates.len() as f64).min(0.95),
        description: format!(
            "Mean success rate {:.0}% is {:.0}% of the {:.0}% baseline",
            mean_rate * 100.0,
            ratio * 100.0,
            config.baseline_success_rate * 100.0
        ),
        session_ids: struggling.iter().map(|s| s.id.clone()).collect(),
        detected_at: Utc::now(),
    }])
}

/// An unusual share of sessions starting at night
pub fn detect_behavioral(sessions: &[Session]) -> Result<Vec<Anomaly>, AnalysisError> {
    if sessions.is_empty() {
        return Ok(Vec::new());
    }

    let off_hours: Vec<&Session> = sessions
        .iter()
        .filter(|s| {
            let hour = s.start_time.hour();
            hour < OFF_HOURS_END || hour >= OFF_HOURS_START
        })
        .collect();
    let share = off_hours.len() as f64 / sessions.len() as f64;
    if share <= SIGNIFICANT_SHARE {
        return Ok(Vec::new());
    }

    Ok(vec![Anomaly {
        kind: AnomalyKind::Behavioral,
        severity: AnomalySeverity::Medium,
        confidence: (0.6 + share).min(0.9),
        description: format!(
            "{} of {} sessions ({:.0}%) started between {:02}:00 and {:02}:00 UTC",
            off_hours.len(),
            sessions.len(),
            share * 100.0,
            OFF_HOURS_START,
            OFF_HOURS_END
        ),
        session_ids: off_hours.iter().map(|s| s.id.clone()).collect(),
        detected_at: Utc::now(),
    }])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Activity, ActivityStatus, AgentType};
    use chrono::{DateTime, Duration, TimeZone};

    fn timed_session(id: &str, start: DateTime<Utc>, secs: i64) -> Session {
        let mut session = Session::new(id, start);
        session.end_time = Some(start + Duration::seconds(secs));
        session
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap()
    }

    fn with_success(id: &str, completed: usize, total: usize) -> Session {
        let mut session = Session::new(id, noon());
        for i in 0..total {
            let mut activity = Activity::new("agent", AgentType::General, format!("t{i}"));
            if i < completed {
                activity.status = ActivityStatus::Completed;
            }
            session.activities.push(activity);
        }
        session.recount_tasks();
        session
    }

    #[test]
    fn test_statistical_detector_needs_five_sessions() {
        let sessions: Vec<Session> = [100, 105, 98, 900]
            .iter()
            .enumerate()
            .map(|(i, secs)| timed_session(&format!("s{i}"), noon(), *secs))
            .collect();
        let found = detect_statistical(&sessions, &AnalyzerConfig::default()).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_statistical_detector_flags_long_session() {
        let sessions: Vec<Session> = [100, 105, 98, 102, 900]
            .iter()
            .enumerate()
            .map(|(i, secs)| timed_session(&format!("s{i}"), noon(), *secs))
            .collect();
        let found = detect_statistical(&sessions, &AnalyzerConfig::default()).unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].session_ids, vec!["s4".to_string()]);
        // one outlier in five is over 10%
        assert_eq!(found[0].severity, AnomalySeverity::High);
        assert!(found[0].confidence > 0.7);
    }

    #[test]
    fn test_statistical_detector_ignores_one_second_jitter() {
        let sessions: Vec<Session> = [60, 60, 60, 60, 61]
            .iter()
            .enumerate()
            .map(|(i, secs)| timed_session(&format!("s{i}"), noon(), *secs))
            .collect();
        let found = detect_statistical(&sessions, &AnalyzerConfig::default()).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_performance_critical_below_half_baseline() {
        let sessions: Vec<Session> = (0..10).map(|i| with_success(&format!("s{i}"), 3, 10)).collect();
        let found = detect_performance(&sessions, &AnalyzerConfig::default()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].severity, AnomalySeverity::Critical);
        assert_eq!(found[0].session_ids.len(), 10);
    }

    #[test]
    fn test_performance_high_below_seventy_percent() {
        // 0.5 / 0.85 ≈ 0.59
        let sessions = vec![with_success("s", 5, 10)];
        let found = detect_performance(&sessions, &AnalyzerConfig::default()).unwrap();
        assert_eq!(found[0].severity, AnomalySeverity::High);
    }

    #[test]
    fn test_performance_near_baseline_is_quiet() {
        let sessions = vec![with_success("s", 8, 10)];
        assert!(detect_performance(&sessions, &AnalyzerConfig::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_behavioral_flags_night_sessions() {
        let mut sessions: Vec<Session> = (0..8)
            .map(|i| timed_session(&format!("day{i}"), noon(), 60))
            .collect();
        let night = Utc.with_ymd_and_hms(2024, 6, 3, 23, 30, 0).unwrap();
        let early = Utc.with_ymd_and_hms(2024, 6, 3, 5, 59, 0).unwrap();
        sessions.push(timed_session("night", night, 60));
        sessions.push(timed_session("early", early, 60));

        let found = detect_behavioral(&sessions).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].severity, AnomalySeverity::Medium);
        assert_eq!(found[0].session_ids, vec!["night", "early"]);
    }

    #[test]
    fn test_behavioral_ignores_small_share() {
        let mut sessions: Vec<Session> = (0..9)
            .map(|i| timed_session(&format!("day{i}"), noon(), 60))
            .collect();
        let night = Utc.with_ymd_and_hms(2024, 6, 3, 22, 0, 0).unwrap();
        sessions.push(timed_session("night", night, 60));
        // exactly 10% is not above the threshold
        assert!(detect_behavioral(&sessions).unwrap().is_empty());
    }
}
