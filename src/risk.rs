use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::math;
use crate::models::{FeedbackRecord, SentimentLabel};
use crate::statistics::DataQuality;
use crate::timeseries::DailyBucket;
use crate::trend::{AnomalyKind, AnomalySeverity, TrendDirection, TrendReport};

const VOLUME_WEIGHT: f64 = 0.25;
const SENTIMENT_WEIGHT: f64 = 0.30;
const CONCENTRATION_WEIGHT: f64 = 0.15;
const STABILITY_WEIGHT: f64 = 0.15;
const QUALITY_WEIGHT: f64 = 0.15;

/// Components below this score do not produce a factor.
const FACTOR_FLOOR: f64 = 0.3;
/// Components at or above this score get a mitigation.
const MITIGATION_FLOOR: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score < 0.4 {
            RiskLevel::Low
        } else if score < 0.7 {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskDimension {
    Volume,
    Sentiment,
    CategoryConcentration,
    TrendStability,
    DataQuality,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskComponent {
    pub dimension: RiskDimension,
    pub score: f64,
    pub weight: f64,
    pub weighted_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskFactor {
    pub dimension: RiskDimension,
    pub description: String,
    pub severity: f64,
    pub level: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    pub overall_score: f64,
    pub level: RiskLevel,
    pub components: Vec<RiskComponent>,
    pub factors: Vec<RiskFactor>,
    pub mitigations: Vec<String>,
}

pub fn assess(
    records: &[FeedbackRecord],
    buckets: &[DailyBucket],
    trend: &TrendReport,
    quality: &DataQuality,
    max_factors: usize,
) -> RiskAssessment {
    let components = vec![
        component(RiskDimension::Volume, VOLUME_WEIGHT, volume_risk(buckets, trend)),
        component(RiskDimension::Sentiment, SENTIMENT_WEIGHT, sentiment_risk(records, trend)),
        component(
            RiskDimension::CategoryConcentration,
            CONCENTRATION_WEIGHT,
            herfindahl(buckets),
        ),
        component(RiskDimension::TrendStability, STABILITY_WEIGHT, stability_risk(trend)),
        component(
            RiskDimension::DataQuality,
            QUALITY_WEIGHT,
            1.0 - quality.quality_score,
        ),
    ];

    let overall_score = components
        .iter()
        .map(|c| c.weighted_score)
        .sum::<f64>()
        .clamp(0.0, 1.0);

    let mut factors: Vec<RiskFactor> = components
        .iter()
        .filter(|c| c.score >= FACTOR_FLOOR)
        .map(|c| factor(c.dimension, describe(c.dimension, c.score), c.score))
        .collect();
    factors.extend(anomaly_factors(trend));
    factors.extend(category_factors(records));
    factors.sort_by(|a, b| b.severity.total_cmp(&a.severity));
    factors.truncate(max_factors);

    let mitigations = components
        .iter()
        .filter(|c| c.score >= MITIGATION_FLOOR)
        .map(|c| mitigation(c.dimension).to_string())
        .collect();

    RiskAssessment {
        overall_score,
        level: RiskLevel::from_score(overall_score),
        components,
        factors,
        mitigations,
    }
}

pub fn recency_weight(days_ago: i64) -> f64 {
    match days_ago {
        0..=7 => 1.0,
        8..=30 => 0.7,
        31..=60 => 0.4,
        _ => 0.2,
    }
}

/// Share of negative feedback, with recent records counting more.
///
/// Age is measured from the latest dated record, not the wall clock, so the
/// same records always score the same.
pub fn weighted_negative_share(records: &[FeedbackRecord]) -> f64 {
    let dated: Vec<(NaiveDate, &FeedbackRecord)> = records
        .iter()
        .filter_map(|record| record.date().map(|date| (date, record)))
        .collect();
    let Some(latest) = dated.iter().map(|(date, _)| *date).max() else {
        return 0.0;
    };

    let mut negative = 0.0;
    let mut total = 0.0;
    for (date, record) in &dated {
        let weight = recency_weight((latest - *date).num_days());
        total += weight;
        if record.sentiment_label == SentimentLabel::Negative {
            negative += weight;
        }
    }
    math::safe_divide(negative, total)
}

fn component(dimension: RiskDimension, weight: f64, score: f64) -> RiskComponent {
    let score = math::finite_or_zero(score).clamp(0.0, 1.0);
    RiskComponent {
        dimension,
        score,
        weight,
        weighted_score: score * weight,
    }
}

fn volume_risk(buckets: &[DailyBucket], trend: &TrendReport) -> f64 {
    let cv = trend
        .volatility
        .as_ref()
        .map_or(0.0, |v| v.coefficient_of_variation)
        .min(1.0);
    let anomaly_share = math::safe_divide(trend.anomalies.len() as f64, buckets.len() as f64);
    let decline = if trend.overall.direction == TrendDirection::Decreasing {
        trend.overall.confidence
    } else {
        0.0
    };
    0.4 * cv + 0.3 * (anomaly_share * 5.0).min(1.0) + 0.3 * decline
}

fn sentiment_risk(records: &[FeedbackRecord], trend: &TrendReport) -> f64 {
    let scores: Vec<f64> = records.iter().filter_map(FeedbackRecord::sentiment).collect();
    let average = if scores.is_empty() {
        0.5
    } else {
        math::mean(&scores)
    };
    let decline = trend
        .sentiment_trend
        .as_ref()
        .filter(|t| t.direction == TrendDirection::Decreasing)
        .map_or(0.0, |t| t.confidence);
    0.6 * weighted_negative_share(records) + 0.2 * (1.0 - average) + 0.2 * decline
}

/// Herfindahl index of category shares across all buckets.
fn herfindahl(buckets: &[DailyBucket]) -> f64 {
    let mut tally: BTreeMap<&str, usize> = BTreeMap::new();
    for bucket in buckets {
        for (category, count) in &bucket.category_tally {
            *tally.entry(category.as_str()).or_insert(0) += count;
        }
    }
    let total: usize = tally.values().sum();
    tally
        .values()
        .map(|count| math::safe_divide(*count as f64, total as f64).powi(2))
        .sum()
}

fn stability_risk(trend: &TrendReport) -> f64 {
    let cv = trend
        .volatility
        .as_ref()
        .map_or(1.0, |v| v.coefficient_of_variation)
        .min(1.0);
    0.6 * (1.0 - trend.overall.confidence) + 0.4 * cv
}

fn anomaly_factors(trend: &TrendReport) -> Vec<RiskFactor> {
    trend
        .anomalies
        .iter()
        .filter(|a| a.kind == AnomalyKind::Drop)
        .map(|a| {
            let severity = match a.severity {
                AnomalySeverity::High => 0.7,
                AnomalySeverity::Medium => 0.5,
            };
            factor(
                RiskDimension::Volume,
                format!(
                    "Feedback volume dropped to {} on {} (expected {:.1})",
                    a.count, a.date, a.expected
                ),
                severity,
            )
        })
        .collect()
}

/// Categories where most scored feedback is negative.
fn category_factors(records: &[FeedbackRecord]) -> Vec<RiskFactor> {
    let mut labels: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for record in records {
        let entry = labels.entry(record.category.as_str()).or_insert((0, 0));
        entry.0 += 1;
        if record.sentiment_label == SentimentLabel::Negative {
            entry.1 += 1;
        }
    }

    labels
        .into_iter()
        .filter(|(_, (total, _))| *total >= 3)
        .filter_map(|(category, (total, negative))| {
            let share = negative as f64 / total as f64;
            (share > 0.5).then(|| {
                factor(
                    RiskDimension::Sentiment,
                    format!(
                        "{:.0}% of '{}' feedback is negative",
                        share * 100.0,
                        category
                    ),
                    share,
                )
            })
        })
        .collect()
}

fn factor(dimension: RiskDimension, description: String, severity: f64) -> RiskFactor {
    RiskFactor {
        dimension,
        description,
        severity,
        level: RiskLevel::from_score(severity),
    }
}

fn describe(dimension: RiskDimension, score: f64) -> String {
    let subject = match dimension {
        RiskDimension::Volume => "Feedback volume is irregular or shrinking",
        RiskDimension::Sentiment => "Negative sentiment is elevated",
        RiskDimension::CategoryConcentration => "Feedback is concentrated in few categories",
        RiskDimension::TrendStability => "The volume trend is unstable",
        RiskDimension::DataQuality => "Sentiment and classification coverage is incomplete",
    };
    format!("{subject} (score {score:.2})")
}

fn mitigation(dimension: RiskDimension) -> &'static str {
    match dimension {
        RiskDimension::Volume => {
            "Review collection channels for outages and prompt users after key interactions"
        }
        RiskDimension::Sentiment => {
            "Triage recent negative feedback and close the loop with affected users"
        }
        RiskDimension::CategoryConcentration => {
            "Assign an owner to the dominant category and broaden feedback prompts"
        }
        RiskDimension::TrendStability => {
            "Collect more consistent daily feedback before acting on forecasts"
        }
        RiskDimension::DataQuality => "Backfill sentiment scores and category classification",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{daily_series, record};
    use crate::timeseries;
    use crate::trend::TrendAnalyzer;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 1).expect("valid date")
    }

    #[test]
    fn weights_follow_expected_tiers() {
        assert_eq!(recency_weight(2), 1.0);
        assert_eq!(recency_weight(15), 0.7);
        assert_eq!(recency_weight(40), 0.4);
        assert_eq!(recency_weight(90), 0.2);
    }

    #[test]
    fn recent_negatives_weigh_more() {
        let records = vec![
            record("2026-03-31", "billing", Some(0.1)),
            record("2026-01-01", "billing", Some(0.9)),
        ];
        // 1.0 negative against 0.2 positive.
        let share = weighted_negative_share(&records);
        assert!((share - 1.0 / 1.2).abs() < 1e-9);

        let flipped = vec![
            record("2026-03-31", "billing", Some(0.9)),
            record("2026-01-01", "billing", Some(0.1)),
        ];
        assert!(weighted_negative_share(&flipped) < 0.2);
        assert_eq!(weighted_negative_share(&[]), 0.0);
    }

    #[test]
    fn levels_follow_score_bands() {
        assert_eq!(RiskLevel::from_score(0.1), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(0.4), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(0.69), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(0.7), RiskLevel::High);
    }

    #[test]
    fn single_category_is_fully_concentrated() {
        let records: Vec<FeedbackRecord> = (1..=3)
            .map(|d| record(&format!("2026-01-0{d}"), "billing", Some(0.8)))
            .collect();
        let buckets = timeseries::prepare(&records, None);
        assert!((herfindahl(&buckets) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn assessment_is_bounded_and_weighted() {
        let counts: Vec<usize> = (0..21).map(|i| 10 + (i % 4)).collect();
        let records = daily_series(start(), &counts);
        let buckets = timeseries::prepare(&records, None);
        let trend = TrendAnalyzer::default().analyze_buckets(&buckets, None);
        let quality = DataQuality::measure(&records);

        let assessment = assess(&records, &buckets, &trend, &quality, 10);
        assert!((0.0..=1.0).contains(&assessment.overall_score));
        assert_eq!(assessment.components.len(), 5);
        let weights: f64 = assessment.components.iter().map(|c| c.weight).sum();
        assert!((weights - 1.0).abs() < 1e-12);
        let total: f64 = assessment.components.iter().map(|c| c.weighted_score).sum();
        assert!((total - assessment.overall_score).abs() < 1e-12);
        assert!(assessment.factors.len() <= 10);
        assert!(assessment
            .factors
            .windows(2)
            .all(|w| w[0].severity >= w[1].severity));
    }

    #[test]
    fn negative_heavy_category_becomes_a_factor() {
        let mut records: Vec<FeedbackRecord> = (1..=4)
            .map(|d| record(&format!("2026-01-0{d}"), "refunds", Some(0.1)))
            .collect();
        records.push(record("2026-01-05", "praise", Some(0.9)));
        let factors = category_factors(&records);
        assert_eq!(factors.len(), 1);
        assert!(factors[0].description.contains("refunds"));
        assert_eq!(factors[0].severity, 1.0);
        assert_eq!(factors[0].level, RiskLevel::High);
    }

    #[test]
    fn factors_are_truncated() {
        let counts = vec![10; 20];
        let records = daily_series(start(), &counts);
        let buckets = timeseries::prepare(&records, None);
        let trend = TrendAnalyzer::default().analyze_buckets(&buckets, None);
        let quality = DataQuality::measure(&records);
        let assessment = assess(&records, &buckets, &trend, &quality, 1);
        assert!(assessment.factors.len() <= 1);
    }
}
