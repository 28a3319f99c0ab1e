//! Analyzer baselines and thresholds

use serde::{Deserialize, Serialize};

/// Point split of the efficiency score. The four parts sum to the score's maximum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyWeights {
    #[serde(default = "default_success_weight")]
    pub success: f64,
    #[serde(default = "default_speed_weight")]
    pub speed: f64,
    #[serde(default = "default_token_weight")]
    pub tokens: f64,
    #[serde(default = "default_volume_weight")]
    pub volume: f64,
}

impl Default for EfficiencyWeights {
    fn default() -> Self {
        Self {
            success: default_success_weight(),
            speed: default_speed_weight(),
            tokens: default_token_weight(),
            volume: default_volume_weight(),
        }
    }
}

impl EfficiencyWeights {
    pub fn total(&self) -> f64 {
        self.success + self.speed + self.tokens + self.volume
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Expected fraction of tasks that succeed
    #[serde(default = "default_baseline_success_rate")]
    pub baseline_success_rate: f64,

    /// Expected task duration in seconds
    #[serde(default = "default_baseline_duration_secs")]
    pub baseline_duration_secs: f64,

    /// Expected tokens spent per completed task
    #[serde(default = "default_baseline_tokens_per_task")]
    pub baseline_tokens_per_task: f64,

    /// Standard deviations from the mean before a duration is an outlier
    #[serde(default = "default_std_dev_threshold")]
    pub std_dev_threshold: f64,

    /// Smallest sample the statistical detector will examine
    #[serde(default = "default_min_statistical_sample")]
    pub min_statistical_sample: usize,

    /// Agents below this success rate are reported as performance issues
    #[serde(default = "default_low_success_threshold")]
    pub low_success_threshold: f64,

    /// Agents above this efficiency score are reported as patterns to replicate
    #[serde(default = "default_high_efficiency_threshold")]
    pub high_efficiency_threshold: f64,

    /// Anomalies above this confidence become insights
    #[serde(default = "default_anomaly_confidence_threshold")]
    pub anomaly_confidence_threshold: f64,

    /// Relative change that separates a trend from noise
    #[serde(default = "default_trend_threshold")]
    pub trend_threshold: f64,

    /// Completed tasks that earn the full volume bonus
    #[serde(default = "default_volume_target")]
    pub volume_target: u64,

    #[serde(default)]
    pub efficiency_weights: EfficiencyWeights,

    /// Distinct cache keys retained before the oldest is evicted
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    #[serde(default = "default_max_insights")]
    pub max_insights: usize,

    #[serde(default = "default_max_recommendations")]
    pub max_recommendations: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            baseline_success_rate: default_baseline_success_rate(),
            baseline_duration_secs: default_baseline_duration_secs(),
            baseline_tokens_per_task: default_baseline_tokens_per_task(),
            std_dev_threshold: default_std_dev_threshold(),
            min_statistical_sample: default_min_statistical_sample(),
            low_success_threshold: default_low_success_threshold(),
            high_efficiency_threshold: default_high_efficiency_threshold(),
            anomaly_confidence_threshold: default_anomaly_confidence_threshold(),
            trend_threshold: default_trend_threshold(),
            volume_target: default_volume_target(),
            efficiency_weights: EfficiencyWeights::default(),
            cache_capacity: default_cache_capacity(),
            max_insights: default_max_insights(),
            max_recommendations: default_max_recommendations(),
        }
    }
}

fn default_success_weight() -> f64 {
    40.0
}

fn default_speed_weight() -> f64 {
    30.0
}

fn default_token_weight() -> f64 {
    20.0
}

fn default_volume_weight() -> f64 {
    10.0
}

fn default_baseline_success_rate() -> f64 {
    0.85
}

fn default_baseline_duration_secs() -> f64 {
    300.0
}

fn default_baseline_tokens_per_task() -> f64 {
    5000.0
}

fn default_std_dev_threshold() -> f64 {
    2.0
}

fn default_min_statistical_sample() -> usize {
    5
}

fn default_low_success_threshold() -> f64 {
    0.7
}

fn default_high_efficiency_threshold() -> f64 {
    80.0
}

fn default_anomaly_confidence_threshold() -> f64 {
    0.7
}

fn default_trend_threshold() -> f64 {
    0.05
}

fn default_volume_target() -> u64 {
    10
}

fn default_cache_capacity() -> usize {
    100
}

fn default_max_insights() -> usize {
    20
}

fn default_max_recommendations() -> usize {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_sum_to_hundred() {
        assert_eq!(EfficiencyWeights::default().total(), 100.0);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AnalyzerConfig = toml::from_str(
            r#"
            baseline_success_rate = 0.9
            [efficiency_weights]
            speed = 20.0
            "#,
        )
        .unwrap();
        assert_eq!(config.baseline_success_rate, 0.9);
        assert_eq!(config.std_dev_threshold, 2.0);
        assert_eq!(config.efficiency_weights.speed, 20.0);
        assert_eq!(config.efficiency_weights.success, 40.0);
        assert_eq!(config.cache_capacity, 100);
    }
}
