//! Descriptive statistics and least-squares fitting

use super::error::AnalysisError;
use super::models::TrendLine;

/// Reject samples containing NaN or infinities
pub fn ensure_finite(values: &[f64]) -> Result<(), AnalysisError> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(i) => Err(AnalysisError::statistics(format!(
            "non-finite value {} at position {}",
            values[i], i
        ))),
        None => Ok(()),
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Population standard deviation
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let mean = mean(values)?;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// Smallest departure from a spread-free sample, relative to its mean, that
/// counts as an outlier
pub const MIN_RELATIVE_DEVIATION: f64 = 0.1;

/// Indices of values lying more than `threshold` standard deviations from
/// the mean of the *other* values, paired with their z-score.
///
/// Comparing each value against the rest keeps a single extreme value from
/// inflating the spread it is measured against. When the rest of the sample
/// has no spread at all, a value is an outlier only if it differs from the
/// rest by more than [`MIN_RELATIVE_DEVIATION`] of their mean.
pub fn leave_one_out_outliers(values: &[f64], threshold: f64) -> Vec<(usize, f64)> {
    if values.len() < 3 {
        return Vec::new();
    }

    let mut outliers = Vec::new();
    let mut rest = Vec::with_capacity(values.len() - 1);
    for (i, &value) in values.iter().enumerate() {
        rest.clear();
        rest.extend(
            values
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, v)| *v),
        );
        let (Some(mean), Some(std)) = (mean(&rest), std_dev(&rest)) else {
            continue;
        };

        let deviation = (value - mean).abs();
        if std == 0.0 {
            if deviation > MIN_RELATIVE_DEVIATION * mean.abs() {
                outliers.push((i, f64::INFINITY));
            }
        } else {
            let z = deviation / std;
            if z > threshold {
                outliers.push((i, z));
            }
        }
    }
    outliers
}

/// Least-squares fit of `y` against `x`. Needs two points with distinct `x`.
pub fn linear_regression(points: &[(f64, f64)]) -> Option<TrendLine> {
    if points.len() < 2 {
        return None;
    }

    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut sxx = 0.0;
    let mut syy = 0.0;
    let mut sxy = 0.0;
    for (x, y) in points {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    if sxx == 0.0 {
        return None;
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    // No spread in y leaves nothing to correlate
    let correlation = if syy == 0.0 {
        0.0
    } else {
        (sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0)
    };

    Some(TrendLine {
        slope,
        intercept,
        correlation,
        strength: correlation.abs(),
        confidence: correlation * correlation,
    })
}

/// Relative change from `first` to `last`. A move away from zero counts as 100%.
pub fn relative_change(first: f64, last: f64) -> f64 {
    if first == 0.0 {
        if last == 0.0 {
            0.0
        } else {
            last.signum()
        }
    } else {
        (last - first) / first.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_std_dev() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[2.0, 4.0]), Some(3.0));
        let std = std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((std - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_long_session_flagged_against_remaining_sample() {
        let outliers = leave_one_out_outliers(&[100.0, 105.0, 98.0, 900.0], 2.0);
        assert_eq!(outliers.len(), 1);
        assert_eq!(outliers[0].0, 3);
        assert!(outliers[0].1 > 100.0);
    }

    #[test]
    fn test_uniform_sample_has_no_outliers() {
        assert!(leave_one_out_outliers(&[5.0; 6], 2.0).is_empty());
    }

    #[test]
    fn test_zero_spread_rest_ignores_small_difference() {
        assert!(leave_one_out_outliers(&[60.0, 60.0, 60.0, 60.0, 61.0], 2.0).is_empty());
        assert!(leave_one_out_outliers(&[10.0, 10.0, 10.0, 11.0], 2.0).is_empty());
    }

    #[test]
    fn test_zero_spread_rest_flags_large_difference() {
        let outliers = leave_one_out_outliers(&[100.0, 100.0, 100.0, 100.0, 900.0], 2.0);
        assert_eq!(outliers, vec![(4, f64::INFINITY)]);

        let outliers = leave_one_out_outliers(&[0.0, 0.0, 0.0, 5.0], 2.0);
        assert_eq!(outliers, vec![(3, f64::INFINITY)]);
    }

    #[test]
    fn test_regression_on_perfect_line() {
        let line = linear_regression(&[(0.0, 1.0), (1.0, 3.0), (2.0, 5.0)]).unwrap();
        assert!((line.slope - 2.0).abs() < 1e-9);
        assert!((line.intercept - 1.0).abs() < 1e-9);
        assert!((line.correlation - 1.0).abs() < 1e-9);
        assert!((line.confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_regression_needs_distinct_x() {
        assert!(linear_regression(&[(1.0, 1.0)]).is_none());
        assert!(linear_regression(&[(1.0, 1.0), (1.0, 2.0)]).is_none());
    }

    #[test]
    fn test_relative_change() {
        assert_eq!(relative_change(100.0, 110.0), 0.1);
        assert_eq!(relative_change(0.0, 0.0), 0.0);
        assert_eq!(relative_change(0.0, 3.0), 1.0);
        assert_eq!(relative_change(-10.0, -5.0), 0.5);
    }

    #[test]
    fn test_ensure_finite() {
        assert!(ensure_finite(&[1.0, 2.0]).is_ok());
        assert!(ensure_finite(&[1.0, f64::NAN]).is_err());
    }
}
