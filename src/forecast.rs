//! Volume and sentiment forecasting.
//!
//! Four independent methods project daily volume; the ensemble blends them by
//! confidence. Each method is a pure function of the history it is handed.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::math::{self, Regression};
use crate::trend::Seasonality;

/// Minimum history for the seasonal method before it falls back to linear.
const SEASONAL_MIN_POINTS: usize = 14;
const EXPONENTIAL_ERROR_WINDOW: usize = 5;
const VOLUME_HORIZONS: [usize; 3] = [7, 30, 90];
const SENTIMENT_HORIZONS: [usize; 4] = [7, 30, 60, 90];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastMethod {
    Linear,
    Exponential,
    Seasonal,
    MovingAverage,
    Ensemble,
}

impl ForecastMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForecastMethod::Linear => "linear",
            ForecastMethod::Exponential => "exponential",
            ForecastMethod::Seasonal => "seasonal",
            ForecastMethod::MovingAverage => "moving_average",
            ForecastMethod::Ensemble => "ensemble",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastResult {
    pub method: ForecastMethod,
    pub predictions: Vec<f64>,
    pub confidence: f64,
    pub parameters: BTreeMap<String, f64>,
}

impl ForecastResult {
    fn new(method: ForecastMethod, predictions: Vec<f64>, confidence: f64) -> Self {
        Self {
            method,
            predictions,
            confidence: math::finite_or_zero(confidence).clamp(0.0, 1.0),
            parameters: BTreeMap::new(),
        }
    }

    fn with(mut self, name: &str, value: f64) -> Self {
        self.parameters.insert(name.to_string(), math::finite_or_zero(value));
        self
    }
}

/// Least-squares line over the whole history, extrapolated forward.
pub fn linear_forecast(history: &[f64], horizon: usize) -> ForecastResult {
    let fit = Regression::fit(history);
    let n = history.len();
    let predictions = (0..horizon)
        .map(|step| fit.predict((n + step) as f64).max(0.0))
        .collect();
    ForecastResult::new(ForecastMethod::Linear, predictions, fit.r_squared)
        .with("slope", fit.slope)
        .with("intercept", fit.intercept)
}

/// Single exponential smoothing; the forecast stays at the last level.
pub fn exponential_forecast(history: &[f64], horizon: usize, alpha: f64) -> ForecastResult {
    let Some(first) = history.first() else {
        return ForecastResult::new(ForecastMethod::Exponential, Vec::new(), 0.0);
    };

    let mut levels = Vec::with_capacity(history.len());
    let mut level = *first;
    levels.push(level);
    for value in &history[1..] {
        level = alpha * value + (1.0 - alpha) * level;
        levels.push(level);
    }

    // One-step-ahead errors: the level after t-1 forecasts the value at t.
    let start = history.len().saturating_sub(EXPONENTIAL_ERROR_WINDOW).max(1);
    let errors: Vec<f64> = (start..history.len())
        .filter(|t| history[*t] != 0.0)
        .map(|t| ((history[t] - levels[t - 1]) / history[t]).abs())
        .collect();
    let confidence = if errors.is_empty() {
        0.0
    } else {
        1.0 - math::mean(&errors)
    };

    ForecastResult::new(
        ForecastMethod::Exponential,
        vec![level.max(0.0); horizon],
        confidence,
    )
    .with("alpha", alpha)
    .with("level", level)
    .with("mape", math::mean(&errors))
}

/// Repeat the last observed cycle, scaled by the week-over-week change.
///
/// Without detected seasonality or enough history this is the linear
/// forecast, flagged with a `fallback` parameter.
pub fn seasonal_forecast(
    history: &[f64],
    horizon: usize,
    seasonality: Option<&Seasonality>,
) -> ForecastResult {
    let n = history.len();
    let usable = seasonality.filter(|s| s.detected && s.period >= 2 && n >= SEASONAL_MIN_POINTS && s.period <= n);
    let Some(season) = usable else {
        let linear = linear_forecast(history, horizon);
        return ForecastResult::new(ForecastMethod::Seasonal, linear.predictions, linear.confidence)
            .with("fallback", 1.0);
    };

    let period = season.period;
    let recent = math::mean(&history[n - 7..]);
    let previous = math::mean(&history[n.saturating_sub(14)..n - 7]);
    let trend_factor = if previous > 0.0 {
        (recent / previous).clamp(0.5, 1.5)
    } else {
        1.0
    };

    let predictions = (0..horizon)
        .map(|step| (history[n - period + step % period] * trend_factor).max(0.0))
        .collect();

    ForecastResult::new(ForecastMethod::Seasonal, predictions, season.strength)
        .with("period", period as f64)
        .with("trend_factor", trend_factor)
        .with("seasonal_strength", season.strength)
        .with("fallback", 0.0)
}

/// Flat forecast at the mean of the most recent window.
pub fn moving_average_forecast(history: &[f64], horizon: usize, window: usize) -> ForecastResult {
    if history.is_empty() {
        return ForecastResult::new(ForecastMethod::MovingAverage, Vec::new(), 0.0);
    }
    let window = window.clamp(1, history.len());
    let recent = &history[history.len() - window..];
    let level = math::mean(recent);
    let confidence = 1.0 - math::coefficient_of_variation(recent).min(1.0);

    ForecastResult::new(
        ForecastMethod::MovingAverage,
        vec![level.max(0.0); horizon],
        confidence,
    )
    .with("window", window as f64)
    .with("level", level)
}

/// Confidence-weighted blend of the component forecasts.
///
/// Every ensemble value lies between the smallest and largest component
/// prediction at that step.
pub fn ensemble_forecast(components: &[&ForecastResult], diversity_bonus_cap: f64) -> ForecastResult {
    let included: Vec<&ForecastResult> = components
        .iter()
        .copied()
        .filter(|c| !c.predictions.is_empty())
        .collect();
    if included.is_empty() {
        return ForecastResult::new(ForecastMethod::Ensemble, Vec::new(), 0.0);
    }

    let total_confidence: f64 = included.iter().map(|c| c.confidence).sum();
    let weights: Vec<f64> = if total_confidence > 0.0 {
        included
            .iter()
            .map(|c| c.confidence / total_confidence)
            .collect()
    } else {
        vec![1.0 / included.len() as f64; included.len()]
    };

    let steps = included
        .iter()
        .map(|c| c.predictions.len())
        .min()
        .unwrap_or(0);
    let predictions = (0..steps)
        .map(|step| {
            let values = included.iter().map(|c| c.predictions[step]);
            let low = values.clone().fold(f64::INFINITY, f64::min);
            let high = values.clone().fold(f64::NEG_INFINITY, f64::max);
            let blended: f64 = values.zip(&weights).map(|(v, w)| v * w).sum();
            blended.clamp(low, high)
        })
        .collect();

    let weighted_confidence: f64 = included
        .iter()
        .zip(&weights)
        .map(|(c, w)| c.confidence * w)
        .sum();
    let diversity_bonus = (0.025 * included.len() as f64).min(diversity_bonus_cap);

    let mut ensemble = ForecastResult::new(
        ForecastMethod::Ensemble,
        predictions,
        weighted_confidence + diversity_bonus,
    )
    .with("diversity_bonus", diversity_bonus)
    .with("methods", included.len() as f64);
    for (component, weight) in included.iter().zip(&weights) {
        ensemble = ensemble.with(&format!("weight_{}", component.method.as_str()), *weight);
    }
    ensemble
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HorizonSummary {
    pub horizon_days: usize,
    pub expected_total: f64,
    pub daily_average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumeForecast {
    pub linear: ForecastResult,
    pub exponential: ForecastResult,
    pub seasonal: ForecastResult,
    pub moving_average: ForecastResult,
    pub ensemble: ForecastResult,
    pub recommended: ForecastMethod,
    pub horizons: Vec<HorizonSummary>,
}

impl VolumeForecast {
    pub fn build(
        history: &[f64],
        horizon: usize,
        alpha: f64,
        moving_average_window: usize,
        diversity_bonus_cap: f64,
        seasonality: Option<&Seasonality>,
    ) -> Self {
        let linear = linear_forecast(history, horizon);
        let exponential = exponential_forecast(history, horizon, alpha);
        let seasonal = seasonal_forecast(history, horizon, seasonality);
        let moving_average = moving_average_forecast(history, horizon, moving_average_window);
        let ensemble = ensemble_forecast(
            &[&linear, &exponential, &seasonal, &moving_average],
            diversity_bonus_cap,
        );

        let recommended = [&linear, &exponential, &seasonal, &ensemble]
            .into_iter()
            .fold(None::<&ForecastResult>, |best, candidate| match best {
                Some(b) if b.confidence >= candidate.confidence => Some(b),
                _ => Some(candidate),
            })
            .map_or(ForecastMethod::Ensemble, |best| best.method);

        let mut forecast = Self {
            linear,
            exponential,
            seasonal,
            moving_average,
            ensemble,
            recommended,
            horizons: Vec::new(),
        };
        forecast.horizons = VOLUME_HORIZONS
            .iter()
            .filter(|days| **days <= horizon)
            .map(|days| {
                let expected_total: f64 = forecast
                    .result(recommended)
                    .predictions
                    .iter()
                    .take(*days)
                    .sum();
                HorizonSummary {
                    horizon_days: *days,
                    expected_total,
                    daily_average: expected_total / *days as f64,
                }
            })
            .collect();
        forecast
    }

    pub fn result(&self, method: ForecastMethod) -> &ForecastResult {
        match method {
            ForecastMethod::Linear => &self.linear,
            ForecastMethod::Exponential => &self.exponential,
            ForecastMethod::Seasonal => &self.seasonal,
            ForecastMethod::MovingAverage => &self.moving_average,
            ForecastMethod::Ensemble => &self.ensemble,
        }
    }

    pub fn recommended_result(&self) -> &ForecastResult {
        self.result(self.recommended)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentOutlook {
    Improving,
    Declining,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentPoint {
    pub horizon_days: usize,
    pub predicted: f64,
    pub confidence: f64,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentForecast {
    pub current: f64,
    pub slope: f64,
    pub volatility: f64,
    pub outlook: SentimentOutlook,
    pub points: Vec<SentimentPoint>,
}

/// Trend and volatility extrapolation of the daily average sentiment.
///
/// `None` when fewer than `min_points` days carry a sentiment score.
pub fn sentiment_forecast(series: &[f64], min_points: usize) -> Option<SentimentForecast> {
    if series.len() < min_points.max(2) {
        return None;
    }
    let fit = Regression::fit(series);
    let last = (series.len() - 1) as f64;
    let residuals: Vec<f64> = series
        .iter()
        .enumerate()
        .map(|(i, value)| value - fit.predict(i as f64))
        .collect();
    let volatility = math::std_dev(&residuals);
    let base_confidence =
        0.5 * fit.r_squared + 0.5 * (1.0 - (volatility * 4.0).min(1.0));

    let points = SENTIMENT_HORIZONS
        .iter()
        .map(|days| {
            let h = *days as f64;
            let predicted = fit.predict(last + h).clamp(0.0, 1.0);
            let spread = 1.96 * volatility.max(0.01) * math::safe_sqrt(h / 7.0);
            SentimentPoint {
                horizon_days: *days,
                predicted,
                confidence: (base_confidence / (1.0 + h / 90.0)).clamp(0.0, 1.0),
                lower: (predicted - spread).clamp(0.0, 1.0),
                upper: (predicted + spread).clamp(0.0, 1.0),
            }
        })
        .collect();

    let outlook = if fit.slope > 0.001 {
        SentimentOutlook::Improving
    } else if fit.slope < -0.001 {
        SentimentOutlook::Declining
    } else {
        SentimentOutlook::Stable
    };

    Some(SentimentForecast {
        current: fit.predict(last).clamp(0.0, 1.0),
        slope: fit.slope,
        volatility,
        outlook,
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::assert_close;

    fn detected(period: usize, strength: f64) -> Seasonality {
        Seasonality {
            detected: true,
            strength,
            period,
            trend_window: 7,
            seasonal_indices: vec![0.0; period],
            peak_phase: 0,
        }
    }

    #[test]
    fn linear_extrapolates_the_line() {
        let history: Vec<f64> = (0..14).map(|i| 10.0 + i as f64).collect();
        let forecast = linear_forecast(&history, 3);
        assert_close(forecast.predictions[0], 24.0, 1e-9);
        assert_close(forecast.predictions[2], 26.0, 1e-9);
        assert_close(forecast.confidence, 1.0, 1e-9);
    }

    #[test]
    fn linear_never_predicts_negative_volume() {
        let history: Vec<f64> = (0..14).map(|i| 14.0 - i as f64).collect();
        let forecast = linear_forecast(&history, 30);
        assert!(forecast.predictions.iter().all(|p| *p >= 0.0));
    }

    #[test]
    fn exponential_smoothing_is_flat_at_last_level() {
        let forecast = exponential_forecast(&[10.0, 20.0], 4, 0.3);
        assert_close(forecast.predictions[0], 13.0, 1e-12);
        assert!(forecast.predictions.windows(2).all(|w| w[0] == w[1]));
        assert_close(forecast.parameters["mape"], 0.5, 1e-12);
        assert_close(forecast.confidence, 0.5, 1e-12);
    }

    #[test]
    fn exponential_confidence_is_perfect_on_flat_history() {
        let forecast = exponential_forecast(&[8.0; 20], 5, 0.3);
        assert_close(forecast.confidence, 1.0, 1e-12);
    }

    #[test]
    fn seasonal_repeats_matching_phase() {
        let history: Vec<f64> = (0..21).map(|i| if i % 7 == 0 { 30.0 } else { 10.0 }).collect();
        let forecast = seasonal_forecast(&history, 14, Some(&detected(7, 0.9)));
        // Step 0 is day 21, which shares a phase with day 14.
        assert_close(forecast.predictions[0], 30.0, 1e-9);
        assert_close(forecast.predictions[1], 10.0, 1e-9);
        assert_close(forecast.predictions[7], 30.0, 1e-9);
        assert_eq!(forecast.parameters["fallback"], 0.0);
        assert_close(forecast.confidence, 0.9, 1e-12);
    }

    #[test]
    fn seasonal_falls_back_to_linear() {
        let history: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let forecast = seasonal_forecast(&history, 5, None);
        let linear = linear_forecast(&history, 5);
        assert_eq!(forecast.method, ForecastMethod::Seasonal);
        assert_eq!(forecast.predictions, linear.predictions);
        assert_eq!(forecast.parameters["fallback"], 1.0);

        let mut undetected = detected(7, 0.1);
        undetected.detected = false;
        let forecast = seasonal_forecast(&history, 5, Some(&undetected));
        assert_eq!(forecast.parameters["fallback"], 1.0);
    }

    #[test]
    fn moving_average_uses_recent_window() {
        let history = [100.0, 100.0, 1.0, 2.0, 3.0];
        let forecast = moving_average_forecast(&history, 2, 3);
        assert_eq!(forecast.predictions, vec![2.0, 2.0]);
        assert!(forecast.confidence < 1.0);
    }

    #[test]
    fn ensemble_stays_within_component_range() {
        let history: Vec<f64> = [12, 15, 9, 20, 14, 11, 18, 25, 13, 16, 22, 10, 19, 24, 17, 21]
            .iter()
            .map(|v| *v as f64)
            .collect();
        let linear = linear_forecast(&history, 30);
        let exponential = exponential_forecast(&history, 30, 0.3);
        let seasonal = seasonal_forecast(&history, 30, Some(&detected(7, 0.6)));
        let moving = moving_average_forecast(&history, 30, 7);
        let components = [&linear, &exponential, &seasonal, &moving];
        let ensemble = ensemble_forecast(&components, 0.1);

        assert_eq!(ensemble.predictions.len(), 30);
        for (step, value) in ensemble.predictions.iter().enumerate() {
            let values: Vec<f64> = components.iter().map(|c| c.predictions[step]).collect();
            let low = values.iter().copied().fold(f64::INFINITY, f64::min);
            let high = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            assert!(*value >= low && *value <= high, "step {step}: {value} outside [{low}, {high}]");
        }
        assert!(ensemble.confidence <= 1.0);
    }

    #[test]
    fn ensemble_skips_empty_components_and_caps_bonus() {
        let a = ForecastResult::new(ForecastMethod::Linear, vec![10.0, 10.0], 0.0);
        let b = ForecastResult::new(ForecastMethod::MovingAverage, vec![20.0, 20.0], 0.0);
        let empty = ForecastResult::new(ForecastMethod::Exponential, Vec::new(), 0.9);
        let ensemble = ensemble_forecast(&[&a, &b, &empty], 0.04);
        assert_eq!(ensemble.predictions, vec![15.0, 15.0]);
        assert_close(ensemble.parameters["diversity_bonus"], 0.04, 1e-12);
        assert_close(ensemble.confidence, 0.04, 1e-12);
    }

    #[test]
    fn recommended_method_has_highest_confidence() {
        let history: Vec<f64> = (0..30).map(|i| 5.0 + 2.0 * i as f64).collect();
        let forecast = VolumeForecast::build(&history, 90, 0.3, 7, 0.1, None);
        let best = [
            &forecast.linear,
            &forecast.exponential,
            &forecast.seasonal,
            &forecast.ensemble,
        ]
        .iter()
        .map(|f| f.confidence)
        .fold(0.0, f64::max);
        assert_eq!(forecast.recommended_result().confidence, best);
        assert_eq!(forecast.horizons.len(), 3);
        assert_eq!(forecast.horizons[0].horizon_days, 7);
    }

    #[test]
    fn sentiment_forecast_is_gated_and_bounded() {
        assert!(sentiment_forecast(&[0.5; 5], 14).is_none());

        let rising: Vec<f64> = (0..20).map(|i| 0.4 + 0.02 * i as f64).collect();
        let forecast = sentiment_forecast(&rising, 14).expect("forecast");
        assert_eq!(forecast.outlook, SentimentOutlook::Improving);
        assert_eq!(forecast.points.len(), 4);
        for point in &forecast.points {
            assert!((0.0..=1.0).contains(&point.predicted));
            assert!(point.lower <= point.predicted && point.predicted <= point.upper);
        }
        assert!(forecast.points[0].confidence >= forecast.points[3].confidence);
        assert_eq!(forecast.points[3].predicted, 1.0);
    }
}
