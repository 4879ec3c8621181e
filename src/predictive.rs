//! Forward-looking analysis built on top of the trend report.
//!
//! Everything here needs at least `min_historical_data` days of feedback.
//! Short histories get a report naming the shortfall instead of projections
//! extrapolated from too little data.

use serde::Serialize;
use tracing::debug;

use crate::config::PredictiveConfig;
use crate::forecast::{self, SentimentForecast, VolumeForecast};
use crate::math::{self, Regression};
use crate::models::FeedbackRecord;
use crate::opportunity::{self, Opportunities};
use crate::risk::{self, RiskAssessment};
use crate::scenario::{self, ScenarioAnalysis};
use crate::statistics::DataQuality;
use crate::timeseries;
use crate::trend::TrendReport;

const BACKTEST_DAYS: usize = 7;
const SCENARIO_HORIZON: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictiveStatus {
    Sufficient,
    InsufficientData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLabel {
    High,
    Medium,
    Low,
}

impl ConfidenceLabel {
    pub fn from_score(score: f64) -> Self {
        if score > 0.8 {
            ConfidenceLabel::High
        } else if score > 0.5 {
            ConfidenceLabel::Medium
        } else {
            ConfidenceLabel::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceScore {
    pub overall: f64,
    pub label: ConfidenceLabel,
    pub data_quality: f64,
    pub trend_stability: f64,
    /// `1 - CV` of daily volume, so higher is calmer
    pub volatility: f64,
    pub historical_accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictiveReport {
    pub status: PredictiveStatus,
    pub data_points: usize,
    pub required_data_points: usize,
    pub message: Option<String>,
    pub volume_forecast: Option<VolumeForecast>,
    pub sentiment_forecast: Option<SentimentForecast>,
    pub risk: Option<RiskAssessment>,
    pub opportunities: Option<Opportunities>,
    pub scenarios: Option<ScenarioAnalysis>,
    pub confidence: Option<ConfidenceScore>,
}

impl PredictiveReport {
    fn insufficient(observed: usize, required: usize) -> Self {
        Self {
            status: PredictiveStatus::InsufficientData,
            data_points: observed,
            required_data_points: required,
            message: Some(format!(
                "Predictive analysis needs at least {required} days of history, found {observed}"
            )),
            volume_forecast: None,
            sentiment_forecast: None,
            risk: None,
            opportunities: None,
            scenarios: None,
            confidence: None,
        }
    }

    pub fn is_sufficient(&self) -> bool {
        self.status == PredictiveStatus::Sufficient
    }
}

#[derive(Debug, Clone, Default)]
pub struct PredictiveInsights {
    config: PredictiveConfig,
}

impl PredictiveInsights {
    pub fn new(config: PredictiveConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PredictiveConfig {
        &self.config
    }

    /// Buckets the records over the trend report's window, so both views
    /// describe the same days.
    pub fn predict(&self, records: &[FeedbackRecord], trend: &TrendReport) -> PredictiveReport {
        let buckets = timeseries::prepare(records, trend.time_range.as_ref());
        let required = self.config.min_historical_data;
        if buckets.len() < required {
            debug!(observed = buckets.len(), required, "predictive analysis short-circuited");
            return PredictiveReport::insufficient(buckets.len(), required);
        }

        let counts = timeseries::counts(&buckets);
        let sentiment = timeseries::sentiment_series(&buckets);
        let quality = DataQuality::measure(records);

        let volume_forecast = VolumeForecast::build(
            &counts,
            self.config.forecast_horizon,
            self.config.smoothing_alpha,
            self.config.moving_average_window,
            self.config.diversity_bonus_cap,
            trend.seasonality.as_ref(),
        );
        let sentiment_forecast = forecast::sentiment_forecast(&sentiment, required);
        let risk = risk::assess(
            records,
            &buckets,
            trend,
            &quality,
            self.config.max_risk_factors,
        );
        let opportunities = opportunity::identify(records, trend);

        let current_sentiment = sentiment_forecast
            .as_ref()
            .map(|f| f.current)
            .unwrap_or_else(|| math::mean(&sentiment));
        let scenarios = scenario::analyze(
            &trend.overall,
            counts.len(),
            current_sentiment,
            SCENARIO_HORIZON.min(self.config.forecast_horizon),
            &self.config.scenario_weights,
        );
        let confidence = confidence_score(&counts, trend, &quality);

        debug!(
            days = counts.len(),
            recommended = volume_forecast.recommended.as_str(),
            risk = risk.overall_score,
            confidence = confidence.overall,
            "predictive analysis complete"
        );

        PredictiveReport {
            status: PredictiveStatus::Sufficient,
            data_points: counts.len(),
            required_data_points: required,
            message: None,
            volume_forecast: Some(volume_forecast),
            sentiment_forecast,
            risk: Some(risk),
            opportunities: Some(opportunities),
            scenarios: Some(scenarios),
            confidence: Some(confidence),
        }
    }
}

fn confidence_score(counts: &[f64], trend: &TrendReport, quality: &DataQuality) -> ConfidenceScore {
    let data_quality = quality.quality_score;
    let trend_stability = trend.overall.confidence;
    let volatility = 1.0 - math::coefficient_of_variation(counts).min(1.0);
    let historical_accuracy = backtest_accuracy(counts);
    let overall = (0.3 * data_quality
        + 0.3 * trend_stability
        + 0.2 * volatility
        + 0.2 * historical_accuracy)
        .clamp(0.0, 1.0);

    ConfidenceScore {
        overall,
        label: ConfidenceLabel::from_score(overall),
        data_quality,
        trend_stability,
        volatility,
        historical_accuracy,
    }
}

/// `1 - MAPE` of a linear fit on everything but the last week, scored
/// against that week.
pub fn backtest_accuracy(counts: &[f64]) -> f64 {
    if counts.len() < 2 * BACKTEST_DAYS {
        return 0.5;
    }
    let split = counts.len() - BACKTEST_DAYS;
    let fit = Regression::fit(&counts[..split]);
    let errors: Vec<f64> = counts[split..]
        .iter()
        .enumerate()
        .filter(|(_, actual)| **actual != 0.0)
        .map(|(offset, actual)| ((actual - fit.predict((split + offset) as f64)) / actual).abs())
        .collect();
    if errors.is_empty() {
        return 0.5;
    }
    (1.0 - math::mean(&errors)).clamp(0.0, 1.0)
}
