//! Headline numbers shown at the top of every composite report.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::math;
use crate::models::{FeedbackRecord, SentimentLabel};
use crate::predictive::PredictiveReport;
use crate::trend::TrendReport;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentDistribution {
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
    pub positive_pct: f64,
    pub neutral_pct: f64,
    pub negative_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupCount {
    pub name: String,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoreMetrics {
    pub total_feedback: usize,
    pub date_span: Option<DateSpan>,
    pub sentiment_distribution: SentimentDistribution,
    pub average_sentiment: Option<f64>,
    pub top_category: Option<GroupCount>,
    pub top_source: Option<GroupCount>,
    pub category_count: usize,
    pub source_count: usize,
    /// Share of records with an AI category confidence
    pub ai_coverage: f64,
    pub average_ai_confidence: Option<f64>,
    pub confidence_threshold: f64,
    /// Trend R² reached the confidence threshold
    pub trend_reliable: bool,
    /// Predictive confidence reached the confidence threshold; `None` when
    /// predictive analysis did not run
    pub forecast_reliable: Option<bool>,
}

impl CoreMetrics {
    pub fn compute(
        records: &[FeedbackRecord],
        trend: Option<&TrendReport>,
        confidence_threshold: f64,
    ) -> Self {
        let total = records.len();
        let pct = |count: usize| math::safe_divide(count as f64, total as f64) * 100.0;

        let label_count =
            |label: SentimentLabel| records.iter().filter(|r| r.sentiment_label == label).count();
        let positive = label_count(SentimentLabel::Positive);
        let neutral = label_count(SentimentLabel::Neutral);
        let negative = label_count(SentimentLabel::Negative);

        let dates: Vec<NaiveDate> = records.iter().filter_map(FeedbackRecord::date).collect();
        let date_span = dates
            .iter()
            .min()
            .zip(dates.iter().max())
            .map(|(start, end)| DateSpan {
                start: *start,
                end: *end,
                days: (*end - *start).num_days() + 1,
            });

        let scores: Vec<f64> = records.iter().filter_map(FeedbackRecord::sentiment).collect();
        let confidences: Vec<f64> = records.iter().filter_map(FeedbackRecord::ai_confidence).collect();
        let categories = tally(records.iter().map(|r| r.category.as_str()));
        let sources = tally(records.iter().map(|r| r.source.as_str()));

        let trend_reliable = trend.is_some_and(|t| {
            t.is_analyzable() && t.overall.confidence >= confidence_threshold
        });

        Self {
            total_feedback: total,
            date_span,
            sentiment_distribution: SentimentDistribution {
                positive,
                neutral,
                negative,
                positive_pct: pct(positive),
                neutral_pct: pct(neutral),
                negative_pct: pct(negative),
            },
            average_sentiment: (!scores.is_empty()).then(|| math::mean(&scores)),
            top_category: top(&categories, total),
            top_source: top(&sources, total),
            category_count: categories.len(),
            source_count: sources.len(),
            ai_coverage: math::safe_divide(confidences.len() as f64, total as f64),
            average_ai_confidence: (!confidences.is_empty()).then(|| math::mean(&confidences)),
            confidence_threshold,
            trend_reliable,
            forecast_reliable: None,
        }
    }

    pub fn with_forecast(mut self, predictive: Option<&PredictiveReport>) -> Self {
        self.forecast_reliable = predictive.map(|report| {
            report
                .confidence
                .as_ref()
                .is_some_and(|c| c.overall >= self.confidence_threshold)
        });
        self
    }
}

fn tally<'a>(names: impl Iterator<Item = &'a str>) -> BTreeMap<&'a str, usize> {
    let mut counts = BTreeMap::new();
    for name in names {
        *counts.entry(name).or_insert(0) += 1;
    }
    counts
}

/// Largest group; ties go to the alphabetically first name.
fn top(counts: &BTreeMap<&str, usize>, total: usize) -> Option<GroupCount> {
    counts
        .iter()
        .fold(None::<(&str, usize)>, |best, (name, count)| match best {
            Some((_, best_count)) if best_count >= *count => best,
            _ => Some((*name, *count)),
        })
        .map(|(name, count)| GroupCount {
            name: name.to_string(),
            count,
            percentage: math::safe_divide(count as f64, total as f64) * 100.0,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::record;

    #[test]
    fn headline_numbers() {
        let mut records = vec![
            record("2026-01-01", "billing", Some(0.9)),
            record("2026-01-03", "support", Some(0.2)),
            record("2026-01-05", "support", None),
            record("2026-01-05", "billing", Some(0.5)),
        ];
        records[2].ai_category_confidence = None;

        let metrics = CoreMetrics::compute(&records, None, 0.7);
        assert_eq!(metrics.total_feedback, 4);
        let span = metrics.date_span.as_ref().expect("span");
        assert_eq!(span.days, 5);
        assert_eq!(metrics.sentiment_distribution.positive, 1);
        assert_eq!(metrics.sentiment_distribution.negative, 1);
        assert_eq!(metrics.sentiment_distribution.neutral_pct, 50.0);
        assert!((metrics.average_sentiment.expect("avg") - 1.6 / 3.0).abs() < 1e-12);
        // Tie between billing and support resolves alphabetically.
        assert_eq!(metrics.top_category.as_ref().map(|g| g.name.as_str()), Some("billing"));
        assert_eq!(metrics.ai_coverage, 0.75);
        assert!(!metrics.trend_reliable);
        assert_eq!(metrics.forecast_reliable, None);
    }

    #[test]
    fn empty_input_has_no_headlines() {
        let metrics = CoreMetrics::compute(&[], None, 0.7);
        assert!(metrics.date_span.is_none());
        assert!(metrics.top_source.is_none());
        assert_eq!(metrics.sentiment_distribution.positive_pct, 0.0);
        assert!(metrics.with_forecast(None).forecast_reliable.is_none());
    }
}
