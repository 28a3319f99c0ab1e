//! Trend classification for time-ordered metric series

use chrono::{DateTime, Utc};

use super::models::{Trend, TrendDirection};
use super::stats;
use crate::model::Session;

pub const SESSION_DURATION: &str = "session_duration";
pub const SUCCESS_RATE: &str = "success_rate";
pub const TOKENS_PER_SESSION: &str = "tokens_per_session";

/// Classify a series by comparing its first and last values.
///
/// `lower_is_better` flips the direction for metrics such as duration. A
/// least-squares line is attached whenever the timestamps are distinct.
pub fn classify(
    metric: &str,
    series: &[(DateTime<Utc>, f64)],
    lower_is_better: bool,
    threshold: f64,
) -> Trend {
    let mut points: Vec<(DateTime<Utc>, f64)> = series
        .iter()
        .copied()
        .filter(|(_, v)| v.is_finite())
        .collect();
    points.sort_by_key(|(t, _)| *t);

    let (first, last) = match (points.first(), points.last()) {
        (Some(first), Some(last)) if points.len() >= 2 => (first.1, last.1),
        _ => {
            let value = points.first().map_or(0.0, |p| p.1);
            return Trend {
                metric: metric.to_string(),
                direction: TrendDirection::Stable,
                change: 0.0,
                first: value,
                last: value,
                points: points.len(),
                line: None,
            };
        }
    };

    let change = stats::relative_change(first, last);
    let direction = if change.abs() <= threshold {
        TrendDirection::Stable
    } else if (change > 0.0) != lower_is_better {
        TrendDirection::Improving
    } else {
        TrendDirection::Declining
    };

    let origin = points[0].0;
    let xy: Vec<(f64, f64)> = points
        .iter()
        .map(|(t, v)| ((*t - origin).num_milliseconds() as f64 / 1000.0, *v))
        .collect();

    Trend {
        metric: metric.to_string(),
        direction,
        change,
        first,
        last,
        points: points.len(),
        line: stats::linear_regression(&xy),
    }
}

/// Duration, success rate and token trends across sessions
pub fn session_trends(sessions: &[Session], threshold: f64) -> Vec<Trend> {
    let durations: Vec<(DateTime<Utc>, f64)> = sessions
        .iter()
        .filter_map(|s| s.duration_secs().map(|d| (s.start_time, d)))
        .collect();
    let success: Vec<(DateTime<Utc>, f64)> = sessions
        .iter()
        .filter(|s| s.total_tasks > 0)
        .map(|s| (s.start_time, s.success_rate()))
        .collect();
    let tokens: Vec<(DateTime<Utc>, f64)> = sessions
        .iter()
        .map(|s| {
            let total: u64 = s.activities.iter().map(|a| a.total_tokens()).sum();
            (s.start_time, total as f64)
        })
        .collect();

    vec![
        classify(SESSION_DURATION, &durations, true, threshold),
        classify(SUCCESS_RATE, &success, false, threshold),
        classify(TOKENS_PER_SESSION, &tokens, true, threshold),
    ]
}
