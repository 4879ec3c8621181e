//! Daily bucketing of feedback records.
//!
//! The series is sparse: days without feedback are never materialized, so
//! consumers index buckets by position, not by calendar distance.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::math;
use crate::models::{FeedbackRecord, TimeRange};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyBucket {
    pub date: NaiveDate,
    pub count: usize,
    pub sentiment_scores: Vec<f64>,
    /// Mean of `sentiment_scores`; 0 means "no signal", not neutral.
    pub avg_sentiment: f64,
    pub category_tally: BTreeMap<String, usize>,
    pub source_tally: BTreeMap<String, usize>,
}

impl DailyBucket {
    fn new(date: NaiveDate) -> Self {
        Self {
            date,
            count: 0,
            sentiment_scores: Vec::new(),
            avg_sentiment: 0.0,
            category_tally: BTreeMap::new(),
            source_tally: BTreeMap::new(),
        }
    }

    fn push(&mut self, record: &FeedbackRecord) {
        self.count += 1;
        if let Some(score) = record.sentiment() {
            self.sentiment_scores.push(score);
        }
        *self.category_tally.entry(record.category.clone()).or_insert(0) += 1;
        *self.source_tally.entry(record.source.clone()).or_insert(0) += 1;
    }

    pub fn has_sentiment(&self) -> bool {
        self.avg_sentiment > 0.0
    }
}

/// Group records into ascending per-day buckets.
///
/// Records outside `range` (inclusive) or with unparseable dates are skipped.
pub fn prepare(records: &[FeedbackRecord], range: Option<&TimeRange>) -> Vec<DailyBucket> {
    let mut days: BTreeMap<NaiveDate, DailyBucket> = BTreeMap::new();

    for record in records {
        let Some(date) = record.date() else {
            continue;
        };
        if range.is_some_and(|window| !window.contains(date)) {
            continue;
        }
        days.entry(date)
            .or_insert_with(|| DailyBucket::new(date))
            .push(record);
    }

    days.into_values()
        .map(|mut bucket| {
            bucket.avg_sentiment = math::mean(&bucket.sentiment_scores);
            bucket
        })
        .collect()
}

pub fn counts(buckets: &[DailyBucket]) -> Vec<f64> {
    buckets.iter().map(|bucket| bucket.count as f64).collect()
}

/// Average sentiment of the buckets that carry any scored record.
pub fn sentiment_series(buckets: &[DailyBucket]) -> Vec<f64> {
    buckets
        .iter()
        .filter(|bucket| bucket.has_sentiment())
        .map(|bucket| bucket.avg_sentiment)
        .collect()
}

/// `(bucket index, count)` pairs per category, keyed by category name.
pub fn category_series(buckets: &[DailyBucket]) -> BTreeMap<String, Vec<(f64, f64)>> {
    keyed_series(buckets, |bucket| &bucket.category_tally)
}

/// `(bucket index, count)` pairs per source, keyed by source name.
pub fn source_series(buckets: &[DailyBucket]) -> BTreeMap<String, Vec<(f64, f64)>> {
    keyed_series(buckets, |bucket| &bucket.source_tally)
}

fn keyed_series<F>(buckets: &[DailyBucket], tally: F) -> BTreeMap<String, Vec<(f64, f64)>>
where
    F: Fn(&DailyBucket) -> &BTreeMap<String, usize>,
{
    let mut series: BTreeMap<String, Vec<(f64, f64)>> = BTreeMap::new();
    for (index, bucket) in buckets.iter().enumerate() {
        for (key, count) in tally(bucket) {
            series
                .entry(key.clone())
                .or_default()
                .push((index as f64, *count as f64));
        }
    }
    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::record;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn buckets_are_sparse_and_sorted() {
        let records = vec![
            record("2026-01-05", "billing", Some(0.9)),
            record("2026-01-01", "billing", Some(0.2)),
            record("2026-01-05", "support", None),
            record("2026-01-03T10:00:00Z", "support", Some(0.5)),
        ];

        let buckets = prepare(&records, None);
        let dates: Vec<NaiveDate> = buckets.iter().map(|b| b.date).collect();
        assert_eq!(dates, vec![day(2026, 1, 1), day(2026, 1, 3), day(2026, 1, 5)]);

        let last = &buckets[2];
        assert_eq!(last.count, 2);
        assert_eq!(last.sentiment_scores, vec![0.9]);
        assert_eq!(last.avg_sentiment, 0.9);
        assert_eq!(last.category_tally.get("support"), Some(&1));
        assert!(last.count >= last.sentiment_scores.len());
    }

    #[test]
    fn unparseable_dates_are_dropped() {
        let records = vec![
            record("not a date", "billing", Some(0.5)),
            record("2026-01-01", "billing", Some(0.5)),
        ];
        let buckets = prepare(&records, None);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].count, 1);
    }

    #[test]
    fn range_filter_is_inclusive() {
        let records = vec![
            record("2026-01-01", "billing", None),
            record("2026-01-02", "billing", None),
            record("2026-01-03", "billing", None),
            record("2026-01-04", "billing", None),
        ];
        let range = TimeRange::new(day(2026, 1, 2), day(2026, 1, 3));
        let buckets = prepare(&records, Some(&range));
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].date, day(2026, 1, 2));
        assert_eq!(buckets[1].date, day(2026, 1, 3));
    }

    #[test]
    fn unscored_bucket_has_zero_average() {
        let buckets = prepare(&[record("2026-01-01", "billing", None)], None);
        assert_eq!(buckets[0].avg_sentiment, 0.0);
        assert!(sentiment_series(&buckets).is_empty());
    }

    #[test]
    fn category_series_keeps_bucket_positions() {
        let records = vec![
            record("2026-01-01", "billing", None),
            record("2026-01-02", "support", None),
            record("2026-01-03", "billing", None),
            record("2026-01-03", "billing", None),
        ];
        let series = category_series(&prepare(&records, None));
        assert_eq!(series["billing"], vec![(0.0, 1.0), (2.0, 2.0)]);
        assert_eq!(series["support"], vec![(1.0, 1.0)]);
    }
}
