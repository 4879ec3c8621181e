//! What-if projections around the fitted volume trend.

use serde::Serialize;

use crate::config::ScenarioWeights;
use crate::math;
use crate::trend::TrendResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    Baseline,
    Optimistic,
    Pessimistic,
    StressTest,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scenario {
    pub kind: ScenarioKind,
    pub probability: f64,
    pub slope_multiplier: f64,
    /// Relative shift applied to the starting level
    pub level_shift: f64,
    pub sentiment_shift: f64,
    pub projected_daily_volume: f64,
    pub projected_total_volume: f64,
    pub projected_sentiment: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioAnalysis {
    pub horizon_days: usize,
    pub scenarios: Vec<Scenario>,
    pub weighted_total_volume: f64,
    pub weighted_daily_volume: f64,
    pub weighted_sentiment: f64,
}

struct Perturbation {
    kind: ScenarioKind,
    probability: f64,
    slope_multiplier: f64,
    level_shift: f64,
    sentiment_shift: f64,
}

/// Project `horizon` days past the end of a series of `data_points` days.
///
/// The stress test is reported alongside the others but carries no
/// probability, so it never moves the weighted outcome.
pub fn analyze(
    trend: &TrendResult,
    data_points: usize,
    current_sentiment: f64,
    horizon: usize,
    weights: &ScenarioWeights,
) -> ScenarioAnalysis {
    let total_weight = weights.baseline + weights.optimistic + weights.pessimistic;
    let normalize = |w: f64| {
        if total_weight > 0.0 {
            w / total_weight
        } else {
            1.0 / 3.0
        }
    };
    let rising = trend.slope >= 0.0;

    let perturbations = [
        Perturbation {
            kind: ScenarioKind::Baseline,
            probability: normalize(weights.baseline),
            slope_multiplier: 1.0,
            level_shift: 0.0,
            sentiment_shift: 0.0,
        },
        Perturbation {
            kind: ScenarioKind::Optimistic,
            probability: normalize(weights.optimistic),
            slope_multiplier: if rising { 1.5 } else { 0.5 },
            level_shift: 0.1,
            sentiment_shift: 0.1,
        },
        Perturbation {
            kind: ScenarioKind::Pessimistic,
            probability: normalize(weights.pessimistic),
            slope_multiplier: if rising { 0.5 } else { 1.5 },
            level_shift: -0.1,
            sentiment_shift: -0.1,
        },
        Perturbation {
            kind: ScenarioKind::StressTest,
            probability: 0.0,
            slope_multiplier: 1.0,
            level_shift: 0.5,
            sentiment_shift: -0.25,
        },
    ];

    let fit = trend.regression();
    let level = fit.predict(data_points.saturating_sub(1) as f64).max(0.0);
    let scenarios: Vec<Scenario> = perturbations
        .iter()
        .map(|p| project(p, level, trend.slope, current_sentiment, horizon))
        .collect();

    let weighted = |value: fn(&Scenario) -> f64| -> f64 {
        scenarios.iter().map(|s| s.probability * value(s)).sum()
    };
    let weighted_total_volume = weighted(|s| s.projected_total_volume);
    let weighted_daily_volume = weighted(|s| s.projected_daily_volume);
    let weighted_sentiment = weighted(|s| s.projected_sentiment);

    ScenarioAnalysis {
        horizon_days: horizon,
        scenarios,
        weighted_total_volume,
        weighted_daily_volume,
        weighted_sentiment,
    }
}

fn project(
    perturbation: &Perturbation,
    level: f64,
    slope: f64,
    current_sentiment: f64,
    horizon: usize,
) -> Scenario {
    let start = level * (1.0 + perturbation.level_shift);
    let adjusted_slope = slope * perturbation.slope_multiplier;
    let total: f64 = (1..=horizon)
        .map(|step| (start + adjusted_slope * step as f64).max(0.0))
        .sum();

    Scenario {
        kind: perturbation.kind,
        probability: perturbation.probability,
        slope_multiplier: perturbation.slope_multiplier,
        level_shift: perturbation.level_shift,
        sentiment_shift: perturbation.sentiment_shift,
        projected_daily_volume: math::safe_divide(total, horizon as f64),
        projected_total_volume: total,
        projected_sentiment: (current_sentiment + perturbation.sentiment_shift).clamp(0.0, 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::assert_close;

    fn rising() -> TrendResult {
        let counts: Vec<f64> = (0..14).map(|i| 10.0 + i as f64).collect();
        TrendResult::from_series(&counts)
    }

    fn find(analysis: &ScenarioAnalysis, kind: ScenarioKind) -> &Scenario {
        analysis
            .scenarios
            .iter()
            .find(|s| s.kind == kind)
            .expect("scenario present")
    }

    #[test]
    fn baseline_follows_the_fitted_line() {
        let analysis = analyze(&rising(), 14, 0.6, 2, &ScenarioWeights::default());
        // Level 23 at the last day, then 24 and 25.
        let baseline = find(&analysis, ScenarioKind::Baseline);
        assert_close(baseline.projected_total_volume, 49.0, 1e-9);
        assert_close(baseline.projected_daily_volume, 24.5, 1e-9);
        assert_close(baseline.projected_sentiment, 0.6, 1e-12);
    }

    #[test]
    fn optimistic_exceeds_pessimistic() {
        let analysis = analyze(&rising(), 14, 0.95, 30, &ScenarioWeights::default());
        let optimistic = find(&analysis, ScenarioKind::Optimistic);
        let pessimistic = find(&analysis, ScenarioKind::Pessimistic);
        assert!(optimistic.projected_total_volume > pessimistic.projected_total_volume);
        assert_eq!(optimistic.projected_sentiment, 1.0);
        assert_eq!(analysis.scenarios.len(), 4);
    }

    #[test]
    fn stress_test_does_not_move_weighted_outcome() {
        let analysis = analyze(&rising(), 14, 0.5, 30, &ScenarioWeights::default());
        let probabilities: f64 = analysis.scenarios.iter().map(|s| s.probability).sum();
        assert_close(probabilities, 1.0, 1e-12);
        assert_eq!(find(&analysis, ScenarioKind::StressTest).probability, 0.0);

        let expected: f64 = analysis
            .scenarios
            .iter()
            .filter(|s| s.kind != ScenarioKind::StressTest)
            .map(|s| s.probability * s.projected_total_volume)
            .sum();
        assert_close(analysis.weighted_total_volume, expected, 1e-9);
    }

    #[test]
    fn weights_are_normalized() {
        let weights = ScenarioWeights {
            baseline: 2.0,
            optimistic: 1.0,
            pessimistic: 1.0,
        };
        let analysis = analyze(&rising(), 14, 0.5, 7, &weights);
        assert_close(find(&analysis, ScenarioKind::Baseline).probability, 0.5, 1e-12);
    }

    #[test]
    fn volume_never_goes_negative() {
        let falling: Vec<f64> = (0..14).map(|i| 14.0 - i as f64).collect();
        let trend = TrendResult::from_series(&falling);
        let analysis = analyze(&trend, 14, 0.5, 90, &ScenarioWeights::default());
        assert!(analysis
            .scenarios
            .iter()
            .all(|s| s.projected_total_volume >= 0.0));
    }
}
