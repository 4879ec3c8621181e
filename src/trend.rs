//! Trend, seasonality and anomaly detection over the daily feedback series.
//!
//! Analysis runs only once the series passes the sufficiency gate; empty and
//! short series get a report naming the shortfall and nothing else.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use tracing::debug;

use crate::config::TrendConfig;
use crate::math::{self, Regression};
use crate::models::{FeedbackRecord, TimeRange};
use crate::timeseries::{self, DailyBucket};

const SEASONAL_NOISE_FLOOR: f64 = 1e-9;

const WEEKDAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSufficiency {
    Empty,
    Insufficient,
    Analyzable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
    InsufficientData,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Increasing => "increasing",
            TrendDirection::Decreasing => "decreasing",
            TrendDirection::Stable => "stable",
            TrendDirection::InsufficientData => "insufficient_data",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendResult {
    pub direction: TrendDirection,
    /// `|slope|` relative to the largest observed value
    pub strength: f64,
    /// R² of the fit
    pub confidence: f64,
    pub slope: f64,
    pub intercept: f64,
    pub data_points: usize,
}

impl TrendResult {
    pub fn insufficient(data_points: usize) -> Self {
        Self {
            direction: TrendDirection::InsufficientData,
            strength: 0.0,
            confidence: 0.0,
            slope: 0.0,
            intercept: 0.0,
            data_points,
        }
    }

    /// Regression of `values` against their index.
    pub fn from_series(values: &[f64]) -> Self {
        let xs: Vec<f64> = (0..values.len()).map(|i| i as f64).collect();
        Self::from_points(&xs, values)
    }

    pub fn from_points(xs: &[f64], ys: &[f64]) -> Self {
        if xs.len().min(ys.len()) < 2 {
            return Self::insufficient(xs.len().min(ys.len()));
        }
        let fit = Regression::fit_points(xs, ys);
        let peak = ys.iter().copied().fold(0.0_f64, f64::max);
        let direction = if fit.slope > 0.0 {
            TrendDirection::Increasing
        } else if fit.slope < 0.0 {
            TrendDirection::Decreasing
        } else {
            TrendDirection::Stable
        };

        Self {
            direction,
            strength: math::safe_divide(fit.slope.abs(), peak),
            confidence: fit.r_squared,
            slope: fit.slope,
            intercept: fit.intercept,
            data_points: xs.len().min(ys.len()),
        }
    }

    pub fn regression(&self) -> Regression {
        Regression {
            slope: self.slope,
            intercept: self.intercept,
            r_squared: self.confidence,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowthRates {
    pub daily: f64,
    pub weekly: f64,
    pub monthly: f64,
}

/// Mean period-over-period change in percent, skipping zero bases.
pub fn growth_rate(values: &[f64]) -> f64 {
    let changes: Vec<f64> = values
        .windows(2)
        .filter(|pair| pair[0] != 0.0)
        .map(|pair| math::safe_divide(pair[1] - pair[0], pair[0]) * 100.0)
        .collect();
    math::mean(&changes)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityLevel {
    VeryLow,
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl VolatilityLevel {
    pub fn from_coefficient(cv: f64) -> Self {
        match cv {
            v if v < 0.1 => VolatilityLevel::VeryLow,
            v if v < 0.2 => VolatilityLevel::Low,
            v if v < 0.3 => VolatilityLevel::Moderate,
            v if v < 0.5 => VolatilityLevel::High,
            _ => VolatilityLevel::VeryHigh,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Volatility {
    pub coefficient_of_variation: f64,
    pub std_dev: f64,
    pub mean: f64,
    pub level: VolatilityLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodRollup {
    pub start: NaiveDate,
    pub label: String,
    /// Days in the period that had feedback
    pub active_days: usize,
    pub count: usize,
    /// Average over every scored record in the period
    pub avg_sentiment: f64,
    pub change_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekdayAverage {
    pub day: String,
    pub average_count: f64,
    pub observations: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WeeklyPattern {
    WeekdayHeavy,
    WeekendHeavy,
    Balanced,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayOfWeekPattern {
    pub averages: Vec<WeekdayAverage>,
    pub peak_day: String,
    pub low_day: String,
    pub weekday_average: f64,
    pub weekend_average: f64,
    pub pattern: WeeklyPattern,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Seasonality {
    pub detected: bool,
    /// `Var(seasonal) / (Var(seasonal) + Var(residual))`
    pub strength: f64,
    pub period: usize,
    pub trend_window: usize,
    /// Centered seasonal offset for each phase of the period
    pub seasonal_indices: Vec<f64>,
    pub peak_phase: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleKind {
    Weekly,
    Biweekly,
    Monthly,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CyclicPattern {
    pub kind: CycleKind,
    pub lag: usize,
    pub autocorrelation: f64,
    pub threshold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    Spike,
    Drop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalySeverity {
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    pub date: NaiveDate,
    pub index: usize,
    pub count: usize,
    pub expected: f64,
    /// Signed distance from the mean in standard deviations
    pub deviation: f64,
    pub kind: AnomalyKind,
    pub severity: AnomalySeverity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HorizonProjection {
    pub horizon_days: usize,
    pub linear: f64,
    pub exponential: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendForecast {
    pub daily_growth_factor: f64,
    pub projections: Vec<HorizonProjection>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days_spanned: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendReport {
    pub status: DataSufficiency,
    pub data_points: usize,
    pub required_data_points: usize,
    pub message: Option<String>,
    pub time_range: Option<TimeRange>,
    pub period: Option<TrendPeriod>,
    pub overall: TrendResult,
    pub growth: Option<GrowthRates>,
    pub volatility: Option<Volatility>,
    pub weekly: Vec<PeriodRollup>,
    pub monthly: Vec<PeriodRollup>,
    pub day_of_week: Option<DayOfWeekPattern>,
    pub seasonality: Option<Seasonality>,
    pub cycles: Vec<CyclicPattern>,
    pub anomalies: Vec<Anomaly>,
    pub category_trends: BTreeMap<String, TrendResult>,
    pub source_trends: BTreeMap<String, TrendResult>,
    pub sentiment_trend: Option<TrendResult>,
    pub forecast: Option<TrendForecast>,
}

impl TrendReport {
    fn short_circuit(
        status: DataSufficiency,
        observed: usize,
        required: usize,
        time_range: Option<TimeRange>,
    ) -> Self {
        let message = match status {
            DataSufficiency::Empty => "No feedback records to analyze".to_string(),
            _ => format!(
                "Trend analysis needs at least {required} days with feedback, found {observed}"
            ),
        };
        Self {
            status,
            data_points: observed,
            required_data_points: required,
            message: Some(message),
            time_range,
            period: None,
            overall: TrendResult::insufficient(observed),
            growth: None,
            volatility: None,
            weekly: Vec::new(),
            monthly: Vec::new(),
            day_of_week: None,
            seasonality: None,
            cycles: Vec::new(),
            anomalies: Vec::new(),
            category_trends: BTreeMap::new(),
            source_trends: BTreeMap::new(),
            sentiment_trend: None,
            forecast: None,
        }
    }

    pub fn is_analyzable(&self) -> bool {
        self.status == DataSufficiency::Analyzable
    }

    pub fn seasonality_detected(&self) -> bool {
        self.seasonality.as_ref().is_some_and(|s| s.detected)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TrendAnalyzer {
    config: TrendConfig,
}

impl TrendAnalyzer {
    pub fn new(config: TrendConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrendConfig {
        &self.config
    }

    pub fn analyze(&self, records: &[FeedbackRecord], range: Option<&TimeRange>) -> TrendReport {
        let buckets = timeseries::prepare(records, range);
        self.analyze_buckets(&buckets, range.copied())
    }

    pub fn analyze_buckets(
        &self,
        buckets: &[DailyBucket],
        time_range: Option<TimeRange>,
    ) -> TrendReport {
        let required = self.config.min_data_points;
        let observed = buckets.len();
        if observed == 0 {
            return TrendReport::short_circuit(DataSufficiency::Empty, 0, required, time_range);
        }
        if observed < required {
            debug!(observed, required, "trend analysis short-circuited");
            return TrendReport::short_circuit(
                DataSufficiency::Insufficient,
                observed,
                required,
                time_range,
            );
        }

        let counts = timeseries::counts(buckets);
        let overall = TrendResult::from_series(&counts);
        let weekly = weekly_rollups(buckets);
        let monthly = monthly_rollups(buckets);
        let growth = GrowthRates {
            daily: growth_rate(&counts),
            weekly: growth_rate(&rollup_counts(&weekly)),
            monthly: growth_rate(&rollup_counts(&monthly)),
        };
        let cv = math::coefficient_of_variation(&counts);
        let volatility = Volatility {
            coefficient_of_variation: cv,
            std_dev: math::std_dev(&counts),
            mean: math::mean(&counts),
            level: VolatilityLevel::from_coefficient(cv),
        };

        let sentiment = timeseries::sentiment_series(buckets);
        let sentiment_trend = (sentiment.len() >= 2).then(|| TrendResult::from_series(&sentiment));

        let first = buckets[0].date;
        let last = buckets[observed - 1].date;
        let forecast = self.forecast_stub(&counts, &overall, growth.daily);

        let report = TrendReport {
            status: DataSufficiency::Analyzable,
            data_points: observed,
            required_data_points: required,
            message: None,
            time_range,
            period: Some(TrendPeriod {
                start: first,
                end: last,
                days_spanned: (last - first).num_days() + 1,
            }),
            overall,
            growth: Some(growth),
            volatility: Some(volatility),
            weekly,
            monthly,
            day_of_week: Some(day_of_week_pattern(buckets)),
            seasonality: Some(self.seasonality(&counts)),
            cycles: cyclic_patterns(&counts),
            anomalies: self.anomalies(buckets, &counts),
            category_trends: sub_trends(timeseries::category_series(buckets)),
            source_trends: sub_trends(timeseries::source_series(buckets)),
            sentiment_trend,
            forecast: Some(forecast),
        };

        debug!(
            days = observed,
            direction = report.overall.direction.as_str(),
            anomalies = report.anomalies.len(),
            "trend analysis complete"
        );
        report
    }

    /// Additive decomposition with a centered moving-average trend. Only
    /// positions where the full window fits are scored, so a straight line
    /// leaves no edge residue behind.
    pub fn seasonality(&self, counts: &[f64]) -> Seasonality {
        let n = counts.len();
        let trend_window = (n / 4).min(7).max(1);
        let period = if n >= 14 { 7 } else { (n / 2).max(2) };
        let half = trend_window / 2;
        let after = trend_window - 1 - half;

        let trend = math::centered_moving_average(counts, trend_window);
        let detrended: Vec<(usize, f64)> = (half..n.saturating_sub(after))
            .map(|i| (i, counts[i] - trend[i]))
            .collect();

        let raw_indices: Vec<f64> = (0..period)
            .map(|phase| {
                let phase_values: Vec<f64> = detrended
                    .iter()
                    .filter(|(i, _)| i % period == phase)
                    .map(|(_, d)| *d)
                    .collect();
                math::mean(&phase_values)
            })
            .collect();
        let offset = math::mean(&raw_indices);
        let seasonal_indices: Vec<f64> = raw_indices.iter().map(|i| i - offset).collect();

        let seasonal: Vec<f64> = detrended
            .iter()
            .map(|(i, _)| seasonal_indices[i % period])
            .collect();
        let residual: Vec<f64> = detrended
            .iter()
            .zip(&seasonal)
            .map(|((_, d), s)| d - s)
            .collect();

        let seasonal_variance = math::variance(&seasonal);
        let total_variance = seasonal_variance + math::variance(&residual);
        // Rounding noise on an exact fit is not a component.
        let strength = if total_variance < SEASONAL_NOISE_FLOOR {
            0.0
        } else {
            math::safe_divide(seasonal_variance, total_variance)
        };
        let peak_phase = seasonal_indices
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map_or(0, |(phase, _)| phase);

        Seasonality {
            detected: strength > self.config.seasonality_threshold,
            strength,
            period,
            trend_window,
            seasonal_indices,
            peak_phase,
        }
    }

    pub fn anomalies(&self, buckets: &[DailyBucket], counts: &[f64]) -> Vec<Anomaly> {
        let mean = math::mean(counts);
        let std_dev = math::std_dev(counts);
        if std_dev == 0.0 {
            return Vec::new();
        }
        let threshold = self.config.anomaly_threshold;

        let mut anomalies: Vec<Anomaly> = buckets
            .iter()
            .zip(counts)
            .enumerate()
            .filter_map(|(index, (bucket, count))| {
                let deviation = math::safe_divide(count - mean, std_dev);
                if deviation.abs() <= threshold {
                    return None;
                }
                Some(Anomaly {
                    date: bucket.date,
                    index,
                    count: bucket.count,
                    expected: mean,
                    deviation,
                    kind: if deviation > 0.0 {
                        AnomalyKind::Spike
                    } else {
                        AnomalyKind::Drop
                    },
                    severity: if deviation.abs() > 2.0 * threshold {
                        AnomalySeverity::High
                    } else {
                        AnomalySeverity::Medium
                    },
                })
            })
            .collect();

        anomalies.sort_by(|a, b| b.deviation.abs().total_cmp(&a.deviation.abs()));
        anomalies.truncate(self.config.max_anomalies);
        anomalies
    }

    fn forecast_stub(&self, counts: &[f64], overall: &TrendResult, daily_growth: f64) -> TrendForecast {
        let n = counts.len();
        let recent = &counts[n.saturating_sub(7)..];
        let level = math::mean(recent);
        let factor = 1.0 + (daily_growth / 100.0).clamp(-0.05, 0.05);
        let fit = overall.regression();

        let projections = self
            .config
            .forecast_horizons
            .iter()
            .map(|horizon| HorizonProjection {
                horizon_days: *horizon,
                linear: fit.predict((n - 1 + horizon) as f64).max(0.0),
                exponential: math::finite_or_zero(level * factor.powi(*horizon as i32)),
            })
            .collect();

        TrendForecast {
            daily_growth_factor: factor,
            projections,
        }
    }
}

fn sub_trends(series: BTreeMap<String, Vec<(f64, f64)>>) -> BTreeMap<String, TrendResult> {
    series
        .into_iter()
        .filter(|(_, points)| points.len() >= 2)
        .map(|(name, points)| {
            let (xs, ys): (Vec<f64>, Vec<f64>) = points.into_iter().unzip();
            (name, TrendResult::from_points(&xs, &ys))
        })
        .collect()
}

/// Autocorrelation at weekly, bi-weekly and monthly lags.
pub fn cyclic_patterns(counts: &[f64]) -> Vec<CyclicPattern> {
    [
        (CycleKind::Weekly, 7, 0.3),
        (CycleKind::Biweekly, 14, 0.3),
        (CycleKind::Monthly, 30, 0.2),
    ]
    .into_iter()
    .filter(|(_, lag, _)| counts.len() >= 2 * lag)
    .filter_map(|(kind, lag, threshold)| {
        let autocorrelation = math::autocorrelation(counts, lag);
        (autocorrelation.abs() > threshold).then_some(CyclicPattern {
            kind,
            lag,
            autocorrelation,
            threshold,
        })
    })
    .collect()
}

#[derive(Default)]
struct RollupAccumulator {
    active_days: usize,
    count: usize,
    sentiment_total: f64,
    scored: usize,
}

fn rollups<F, L>(buckets: &[DailyBucket], period_start: F, label: L) -> Vec<PeriodRollup>
where
    F: Fn(NaiveDate) -> NaiveDate,
    L: Fn(NaiveDate) -> String,
{
    let mut periods: BTreeMap<NaiveDate, RollupAccumulator> = BTreeMap::new();
    for bucket in buckets {
        let entry = periods.entry(period_start(bucket.date)).or_default();
        entry.active_days += 1;
        entry.count += bucket.count;
        entry.sentiment_total += bucket.sentiment_scores.iter().sum::<f64>();
        entry.scored += bucket.sentiment_scores.len();
    }

    let mut previous: Option<usize> = None;
    periods
        .into_iter()
        .map(|(start, acc)| {
            let change_pct = previous
                .filter(|prev| *prev > 0)
                .map(|prev| math::safe_divide(acc.count as f64 - prev as f64, prev as f64) * 100.0);
            previous = Some(acc.count);
            PeriodRollup {
                start,
                label: label(start),
                active_days: acc.active_days,
                count: acc.count,
                avg_sentiment: math::safe_divide(acc.sentiment_total, acc.scored as f64),
                change_pct,
            }
        })
        .collect()
}

/// Calendar weeks starting on Sunday.
pub fn weekly_rollups(buckets: &[DailyBucket]) -> Vec<PeriodRollup> {
    rollups(
        buckets,
        |date| date - Duration::days(i64::from(date.weekday().num_days_from_sunday())),
        |start| format!("week of {start}"),
    )
}

pub fn monthly_rollups(buckets: &[DailyBucket]) -> Vec<PeriodRollup> {
    rollups(
        buckets,
        |date| date.with_day(1).unwrap_or(date),
        |start| start.format("%Y-%m").to_string(),
    )
}

fn rollup_counts(rollups: &[PeriodRollup]) -> Vec<f64> {
    rollups.iter().map(|r| r.count as f64).collect()
}

pub fn day_of_week_pattern(buckets: &[DailyBucket]) -> DayOfWeekPattern {
    let mut per_day: [Vec<f64>; 7] = Default::default();
    for bucket in buckets {
        let slot = bucket.date.weekday().num_days_from_sunday() as usize;
        per_day[slot].push(bucket.count as f64);
    }

    let averages: Vec<WeekdayAverage> = per_day
        .iter()
        .enumerate()
        .map(|(slot, counts)| WeekdayAverage {
            day: WEEKDAY_NAMES[slot].to_string(),
            average_count: math::mean(counts),
            observations: counts.len(),
        })
        .collect();

    let observed = || averages.iter().filter(|a| a.observations > 0);
    let peak_day = observed()
        .fold(None::<&WeekdayAverage>, |best, a| match best {
            Some(b) if b.average_count >= a.average_count => Some(b),
            _ => Some(a),
        })
        .map(|a| a.day.clone())
        .unwrap_or_default();
    let low_day = observed()
        .fold(None::<&WeekdayAverage>, |best, a| match best {
            Some(b) if b.average_count <= a.average_count => Some(b),
            _ => Some(a),
        })
        .map(|a| a.day.clone())
        .unwrap_or_default();

    let weekend: Vec<f64> = [0, 6].iter().flat_map(|slot| per_day[*slot].clone()).collect();
    let weekday: Vec<f64> = (1..=5).flat_map(|slot| per_day[slot].clone()).collect();
    let weekday_average = math::mean(&weekday);
    let weekend_average = math::mean(&weekend);

    let pattern = if weekday_average > weekend_average * 1.2 {
        WeeklyPattern::WeekdayHeavy
    } else if weekend_average > weekday_average * 1.2 {
        WeeklyPattern::WeekendHeavy
    } else {
        WeeklyPattern::Balanced
    };

    DayOfWeekPattern {
        averages,
        peak_day,
        low_day,
        weekday_average,
        weekend_average,
        pattern,
    }
}
