//! Engine configuration and per-request options.
//!
//! Every section deserializes with defaults, so a config file only needs the
//! keys it overrides.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};
use crate::models::TimeRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierMethod {
    Iqr,
    ZScore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsConfig {
    /// Minimum |r| for a correlation to count as significant
    pub correlation_threshold: f64,
    pub outlier_method: OutlierMethod,
    /// `k` in `Q1 - k * IQR` / `Q3 + k * IQR`
    pub iqr_multiplier: f64,
    /// `k` in `|z| > k`
    pub zscore_threshold: f64,
    /// Confidence level for intervals: 0.90, 0.95 or 0.99
    pub confidence_level: f64,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            correlation_threshold: 0.3,
            outlier_method: OutlierMethod::Iqr,
            iqr_multiplier: 1.5,
            zscore_threshold: 3.0,
            confidence_level: 0.95,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    pub min_data_points: usize,
    /// Standard deviations from the mean before a day is anomalous
    pub anomaly_threshold: f64,
    pub max_anomalies: usize,
    pub seasonality_threshold: f64,
    pub forecast_horizons: Vec<usize>,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            min_data_points: 7,
            anomaly_threshold: 2.0,
            max_anomalies: 10,
            seasonality_threshold: 0.3,
            forecast_horizons: vec![7, 30, 90],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioWeights {
    pub baseline: f64,
    pub optimistic: f64,
    pub pessimistic: f64,
}

impl Default for ScenarioWeights {
    fn default() -> Self {
        Self {
            baseline: 0.5,
            optimistic: 0.25,
            pessimistic: 0.25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictiveConfig {
    pub min_historical_data: usize,
    pub forecast_horizon: usize,
    pub smoothing_alpha: f64,
    pub moving_average_window: usize,
    pub diversity_bonus_cap: f64,
    pub scenario_weights: ScenarioWeights,
    pub max_risk_factors: usize,
}

impl Default for PredictiveConfig {
    fn default() -> Self {
        Self {
            min_historical_data: 14,
            forecast_horizon: 90,
            smoothing_alpha: 0.3,
            moving_average_window: 7,
            diversity_bonus_cap: 0.1,
            scenario_weights: ScenarioWeights::default(),
            max_risk_factors: 10,
        }
    }
}

/// Time-to-live per cache, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub statistics_ttl_secs: u64,
    pub trend_ttl_secs: u64,
    pub predictive_ttl_secs: u64,
    pub composite_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            statistics_ttl_secs: 15 * 60,
            trend_ttl_secs: 10 * 60,
            predictive_ttl_secs: 30 * 60,
            composite_ttl_secs: 5 * 60,
        }
    }
}

impl CacheConfig {
    pub fn statistics_ttl(&self) -> Duration {
        Duration::from_secs(self.statistics_ttl_secs)
    }

    pub fn trend_ttl(&self) -> Duration {
        Duration::from_secs(self.trend_ttl_secs)
    }

    pub fn predictive_ttl(&self) -> Duration {
        Duration::from_secs(self.predictive_ttl_secs)
    }

    pub fn composite_ttl(&self) -> Duration {
        Duration::from_secs(self.composite_ttl_secs)
    }
}

/// The narrative service gets one retry at most before the computed fallback.
pub const MAX_NARRATIVE_RETRIES: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrativeConfig {
    pub timeout_ms: u64,
    /// Extra attempts after the first failure
    pub max_retries: u32,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_retries: 1,
        }
    }
}

impl NarrativeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub statistics: StatisticsConfig,
    pub trend: TrendConfig,
    pub predictive: PredictiveConfig,
    pub cache: CacheConfig,
    pub narrative: NarrativeConfig,
}

impl EngineConfig {
    /// Load a JSON config file; missing keys keep their defaults.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.statistics.correlation_threshold) {
            return Err(invalid("statistics.correlation_threshold", "must be within [0, 1]"));
        }
        if self.statistics.iqr_multiplier <= 0.0 || self.statistics.zscore_threshold <= 0.0 {
            return Err(invalid("statistics.outliers", "thresholds must be positive"));
        }
        if !(0.5..1.0).contains(&self.statistics.confidence_level) {
            return Err(invalid("statistics.confidence_level", "must be within [0.5, 1)"));
        }
        if self.trend.min_data_points < 2 {
            return Err(invalid("trend.min_data_points", "must be at least 2"));
        }
        if self.trend.anomaly_threshold <= 0.0 {
            return Err(invalid("trend.anomaly_threshold", "must be positive"));
        }
        if self.predictive.min_historical_data < 2 {
            return Err(invalid("predictive.min_historical_data", "must be at least 2"));
        }
        if self.predictive.forecast_horizon == 0 {
            return Err(invalid("predictive.forecast_horizon", "must be positive"));
        }
        if !(0.0..=1.0).contains(&self.predictive.smoothing_alpha)
            || self.predictive.smoothing_alpha == 0.0
        {
            return Err(invalid("predictive.smoothing_alpha", "must be within (0, 1]"));
        }
        if self.predictive.moving_average_window == 0 {
            return Err(invalid("predictive.moving_average_window", "must be positive"));
        }
        if self.narrative.max_retries > MAX_NARRATIVE_RETRIES {
            return Err(invalid("narrative.max_retries", "must be 0 or 1"));
        }
        let weights = &self.predictive.scenario_weights;
        if weights.baseline < 0.0 || weights.optimistic < 0.0 || weights.pessimistic < 0.0 {
            return Err(invalid("predictive.scenario_weights", "must not be negative"));
        }
        Ok(())
    }
}

fn invalid(name: &str, reason: &str) -> AnalyticsError {
    AnalyticsError::InvalidParameter {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisDepth {
    /// Core metrics and trends only
    Basic,
    Standard,
    /// Required for predictive insights
    Advanced,
}

impl std::str::FromStr for AnalysisDepth {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "basic" => Ok(AnalysisDepth::Basic),
            "standard" => Ok(AnalysisDepth::Standard),
            "advanced" => Ok(AnalysisDepth::Advanced),
            other => Err(format!("unknown analysis depth '{other}'")),
        }
    }
}

/// Per-request options accepted by the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsOptions {
    pub analysis_depth: AnalysisDepth,
    pub enable_predictive_insights: bool,
    pub enable_trend_analysis: bool,
    pub enable_ai_insights: bool,
    /// Minimum confidence for a trend or forecast to be reported as reliable
    pub confidence_threshold: f64,
    pub max_data_points: usize,
    pub time_range: Option<TimeRange>,
}

impl Default for AnalyticsOptions {
    fn default() -> Self {
        Self {
            analysis_depth: AnalysisDepth::Standard,
            enable_predictive_insights: true,
            enable_trend_analysis: true,
            enable_ai_insights: true,
            confidence_threshold: 0.7,
            max_data_points: 100_000,
            time_range: None,
        }
    }
}

impl AnalyticsOptions {
    pub fn runs_statistics(&self) -> bool {
        self.analysis_depth != AnalysisDepth::Basic
    }

    pub fn runs_predictive(&self) -> bool {
        self.analysis_depth == AnalysisDepth::Advanced
            && self.enable_predictive_insights
            && self.enable_trend_analysis
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_data_points == 0 {
            return Err(invalid("max_data_points", "must be positive"));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(invalid("confidence_threshold", "must be within [0, 1]"));
        }
        if let Some(range) = &self.time_range {
            if range.start > range.end {
                return Err(invalid("time_range", "start must not be after end"));
            }
        }
        Ok(())
    }
}
