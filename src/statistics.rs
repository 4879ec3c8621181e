//! Descriptive statistics over a flat collection of feedback records.
//!
//! Every numeric sub-report is a [`Section`]: either the computed value or a
//! marker naming why it could not be computed. One missing variable never
//! blanks out the rest of the report.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::config::{OutlierMethod, StatisticsConfig};
use crate::math::{self, Quartiles};
use crate::models::{FeedbackRecord, SentimentLabel};

const SIGNIFICANCE_LEVEL: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    NoRecords,
    NoNumericValues,
    InsufficientSample,
    NoVariance,
    InsufficientGroups,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Unavailable {
    pub available: bool,
    pub reason: UnavailableReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Section<T> {
    Available(T),
    Unavailable(Unavailable),
}

impl<T> Section<T> {
    pub fn unavailable(reason: UnavailableReason) -> Self {
        Section::Unavailable(Unavailable {
            available: false,
            reason,
        })
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Section::Available(value) => Some(value),
            Section::Unavailable(_) => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Section::Available(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub mode: Option<f64>,
    pub std_dev: f64,
    pub variance: f64,
    pub min: f64,
    pub max: f64,
    pub range: f64,
    pub skewness: f64,
    pub kurtosis: f64,
    pub quartiles: Quartiles,
    pub p10: f64,
    pub p90: f64,
    pub coefficient_of_variation: f64,
}

pub fn summarize(values: &[f64]) -> Section<Summary> {
    if values.is_empty() {
        return Section::unavailable(UnavailableReason::NoNumericValues);
    }
    let sorted = math::sorted(values);
    let min = sorted[0];
    let max = sorted[sorted.len() - 1];

    Section::Available(Summary {
        count: values.len(),
        mean: math::mean(values),
        median: math::median(&sorted),
        mode: math::mode(&sorted),
        std_dev: math::std_dev(values),
        variance: math::variance(values),
        min,
        max,
        range: max - min,
        skewness: math::skewness(values),
        kurtosis: math::kurtosis(values),
        quartiles: math::quartiles(&sorted),
        p10: math::percentile(&sorted, 10.0),
        p90: math::percentile(&sorted, 90.0),
        coefficient_of_variation: math::coefficient_of_variation(values),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescriptiveStatistics {
    pub sentiment: Section<Summary>,
    pub content_length: Section<Summary>,
    pub word_count: Section<Summary>,
    pub ai_confidence: Section<Summary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelShare {
    pub label: SentimentLabel,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LengthBucket {
    pub bucket: String,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Distributions {
    pub sentiment_labels: Vec<LabelShare>,
    pub sentiment_histogram: Section<Vec<HistogramBin>>,
    pub content_length: Vec<LengthBucket>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationStrength {
    Negligible,
    Weak,
    Moderate,
    Strong,
    VeryStrong,
}

impl CorrelationStrength {
    fn from_coefficient(r: f64) -> Self {
        match r.abs() {
            v if v < 0.1 => CorrelationStrength::Negligible,
            v if v < 0.3 => CorrelationStrength::Weak,
            v if v < 0.5 => CorrelationStrength::Moderate,
            v if v < 0.7 => CorrelationStrength::Strong,
            _ => CorrelationStrength::VeryStrong,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Correlation {
    pub x: String,
    pub y: String,
    pub coefficient: f64,
    pub p_value: f64,
    pub sample_size: usize,
    pub strength: CorrelationStrength,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationAnalysis {
    pub threshold: f64,
    pub pairs: Vec<Correlation>,
    pub significant: Vec<Correlation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlierSet {
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub values: Vec<f64>,
    /// Positions of the outliers in the analyzed record slice
    pub indices: Vec<usize>,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlierAnalysis {
    pub method: OutlierMethod,
    pub threshold: f64,
    pub sentiment: Section<OutlierSet>,
    pub content_length: Section<OutlierSet>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupStat {
    pub name: String,
    pub count: usize,
    pub percentage: f64,
    pub scored: usize,
    pub sentiment_mean: Option<f64>,
    pub sentiment_std_dev: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupStatistics {
    pub groups: Vec<GroupStat>,
    pub group_count: usize,
    /// Shannon entropy of group sizes, in bits
    pub entropy: f64,
    pub normalized_entropy: f64,
    /// Gini coefficient of group sizes: 0 is perfectly even
    pub gini: f64,
    pub dominant: Option<String>,
    pub dominant_share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Interval {
    pub estimate: f64,
    pub lower: f64,
    pub upper: f64,
    pub margin: f64,
    pub sample_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceIntervals {
    pub level: f64,
    pub sentiment_mean: Section<Interval>,
    pub positive_share: Section<Interval>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestResult {
    pub test: String,
    pub statistic: f64,
    pub degrees_of_freedom: f64,
    pub denominator_degrees_of_freedom: Option<f64>,
    pub p_value: f64,
    pub significant: bool,
    /// Eta squared for ANOVA, Cramér's V for chi-square
    pub effect_size: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HypothesisTests {
    pub sentiment_by_category: Section<TestResult>,
    pub label_by_source: Section<TestResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataQuality {
    pub total_records: usize,
    pub sentiment_coverage: f64,
    pub ai_confidence_coverage: f64,
    pub average_ai_confidence: f64,
    pub dated_coverage: f64,
    pub quality_score: f64,
}

impl DataQuality {
    pub fn measure(records: &[FeedbackRecord]) -> Self {
        let total = records.len() as f64;
        let scored = records.iter().filter(|r| r.sentiment().is_some()).count() as f64;
        let confidences: Vec<f64> = records.iter().filter_map(|r| r.ai_confidence()).collect();
        let dated = records.iter().filter(|r| r.date().is_some()).count() as f64;

        let sentiment_coverage = math::safe_divide(scored, total);
        let ai_confidence_coverage = math::safe_divide(confidences.len() as f64, total);
        let average_ai_confidence = math::mean(&confidences);
        let dated_coverage = math::safe_divide(dated, total);
        let quality_score = (0.4 * sentiment_coverage
            + 0.2 * ai_confidence_coverage
            + 0.2 * average_ai_confidence
            + 0.2 * dated_coverage)
            .clamp(0.0, 1.0);

        Self {
            total_records: records.len(),
            sentiment_coverage,
            ai_confidence_coverage,
            average_ai_confidence,
            dated_coverage,
            quality_score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticalReport {
    pub available: bool,
    pub reason: Option<UnavailableReason>,
    pub record_count: usize,
    pub descriptive: DescriptiveStatistics,
    pub distributions: Distributions,
    pub correlations: Section<CorrelationAnalysis>,
    pub outliers: OutlierAnalysis,
    pub categories: Section<GroupStatistics>,
    pub sources: Section<GroupStatistics>,
    pub confidence_intervals: ConfidenceIntervals,
    pub hypothesis_tests: HypothesisTests,
    pub data_quality: DataQuality,
}

#[derive(Debug, Clone, Default)]
pub struct StatisticalAnalyzer {
    config: StatisticsConfig,
}

impl StatisticalAnalyzer {
    pub fn new(config: StatisticsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StatisticsConfig {
        &self.config
    }

    pub fn analyze(&self, records: &[FeedbackRecord]) -> StatisticalReport {
        if records.is_empty() {
            return self.empty_report();
        }

        let sentiment: Vec<f64> = records.iter().filter_map(|r| r.sentiment()).collect();
        let lengths: Vec<f64> = records.iter().map(|r| r.content_length() as f64).collect();
        let words: Vec<f64> = records.iter().map(|r| r.word_count() as f64).collect();
        let confidences: Vec<f64> = records.iter().filter_map(|r| r.ai_confidence()).collect();

        let report = StatisticalReport {
            available: true,
            reason: None,
            record_count: records.len(),
            descriptive: DescriptiveStatistics {
                sentiment: summarize(&sentiment),
                content_length: summarize(&lengths),
                word_count: summarize(&words),
                ai_confidence: summarize(&confidences),
            },
            distributions: distributions(records, &sentiment),
            correlations: self.correlations(records),
            outliers: self.outliers(records),
            categories: group_statistics(records, |r| r.category.as_str()),
            sources: group_statistics(records, |r| r.source.as_str()),
            confidence_intervals: self.confidence_intervals(records, &sentiment),
            hypothesis_tests: HypothesisTests {
                sentiment_by_category: anova_by_category(records),
                label_by_source: chi_square_label_by_source(records),
            },
            data_quality: DataQuality::measure(records),
        };

        debug!(
            records = records.len(),
            scored = sentiment.len(),
            "statistical analysis complete"
        );
        report
    }

    fn empty_report(&self) -> StatisticalReport {
        fn none<T>() -> Section<T> {
            Section::unavailable(UnavailableReason::NoRecords)
        }

        StatisticalReport {
            available: false,
            reason: Some(UnavailableReason::NoRecords),
            record_count: 0,
            descriptive: DescriptiveStatistics {
                sentiment: none(),
                content_length: none(),
                word_count: none(),
                ai_confidence: none(),
            },
            distributions: Distributions {
                sentiment_labels: Vec::new(),
                sentiment_histogram: none(),
                content_length: Vec::new(),
            },
            correlations: none(),
            outliers: OutlierAnalysis {
                method: self.config.outlier_method,
                threshold: self.outlier_threshold(),
                sentiment: none(),
                content_length: none(),
            },
            categories: none(),
            sources: none(),
            confidence_intervals: ConfidenceIntervals {
                level: self.config.confidence_level,
                sentiment_mean: none(),
                positive_share: none(),
            },
            hypothesis_tests: HypothesisTests {
                sentiment_by_category: none(),
                label_by_source: none(),
            },
            data_quality: DataQuality::measure(&[]),
        }
    }

    fn correlations(&self, records: &[FeedbackRecord]) -> Section<CorrelationAnalysis> {
        type Extractor = fn(&FeedbackRecord) -> Option<f64>;
        let variables: [(&str, Extractor); 4] = [
            ("sentiment_score", |r| r.sentiment()),
            ("content_length", |r| Some(r.content_length() as f64)),
            ("word_count", |r| Some(r.word_count() as f64)),
            ("ai_confidence", |r| r.ai_confidence()),
        ];

        let mut pairs = Vec::new();
        for (i, (x_name, x_of)) in variables.iter().enumerate() {
            for (y_name, y_of) in variables.iter().skip(i + 1) {
                let (xs, ys): (Vec<f64>, Vec<f64>) = records
                    .iter()
                    .filter_map(|r| Some((x_of(r)?, y_of(r)?)))
                    .unzip();
                if xs.len() < 3 {
                    continue;
                }
                let coefficient = math::pearson(&xs, &ys);
                pairs.push(Correlation {
                    x: x_name.to_string(),
                    y: y_name.to_string(),
                    coefficient,
                    p_value: math::correlation_p_value(coefficient, xs.len()),
                    sample_size: xs.len(),
                    strength: CorrelationStrength::from_coefficient(coefficient),
                });
            }
        }

        if pairs.is_empty() {
            return Section::unavailable(UnavailableReason::InsufficientSample);
        }

        let significant = pairs
            .iter()
            .filter(|pair| pair.coefficient.abs() > self.config.correlation_threshold)
            .cloned()
            .collect();

        Section::Available(CorrelationAnalysis {
            threshold: self.config.correlation_threshold,
            pairs,
            significant,
        })
    }

    fn outlier_threshold(&self) -> f64 {
        match self.config.outlier_method {
            OutlierMethod::Iqr => self.config.iqr_multiplier,
            OutlierMethod::ZScore => self.config.zscore_threshold,
        }
    }

    fn outliers(&self, records: &[FeedbackRecord]) -> OutlierAnalysis {
        let sentiment: Vec<(usize, f64)> = records
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.sentiment().map(|s| (i, s)))
            .collect();
        let lengths: Vec<(usize, f64)> = records
            .iter()
            .enumerate()
            .map(|(i, r)| (i, r.content_length() as f64))
            .collect();

        OutlierAnalysis {
            method: self.config.outlier_method,
            threshold: self.outlier_threshold(),
            sentiment: self.detect_outliers(&sentiment),
            content_length: self.detect_outliers(&lengths),
        }
    }

    /// Flag outliers among `(record index, value)` pairs.
    pub fn detect_outliers(&self, indexed: &[(usize, f64)]) -> Section<OutlierSet> {
        if indexed.is_empty() {
            return Section::unavailable(UnavailableReason::NoNumericValues);
        }
        let values: Vec<f64> = indexed.iter().map(|(_, v)| *v).collect();
        let k = self.outlier_threshold();

        let (lower_bound, upper_bound) = match self.config.outlier_method {
            OutlierMethod::Iqr => {
                let q = math::quartiles(&math::sorted(&values));
                (q.q1 - k * q.iqr, q.q3 + k * q.iqr)
            }
            OutlierMethod::ZScore => {
                let m = math::mean(&values);
                let sd = math::std_dev(&values);
                (m - k * sd, m + k * sd)
            }
        };

        let (indices, outliers): (Vec<usize>, Vec<f64>) = indexed
            .iter()
            .filter(|(_, v)| *v < lower_bound || *v > upper_bound)
            .copied()
            .unzip();

        Section::Available(OutlierSet {
            lower_bound,
            upper_bound,
            percentage: percentage(outliers.len(), values.len()),
            values: outliers,
            indices,
        })
    }

    fn confidence_intervals(
        &self,
        records: &[FeedbackRecord],
        sentiment: &[f64],
    ) -> ConfidenceIntervals {
        let z = math::z_critical(self.config.confidence_level);

        let sentiment_mean = if sentiment.len() < 2 {
            Section::unavailable(UnavailableReason::InsufficientSample)
        } else {
            let estimate = math::mean(sentiment);
            let margin = z * math::safe_divide(
                math::sample_std_dev(sentiment),
                math::safe_sqrt(sentiment.len() as f64),
            );
            Section::Available(Interval {
                estimate,
                lower: (estimate - margin).max(0.0),
                upper: (estimate + margin).min(1.0),
                margin,
                sample_size: sentiment.len(),
            })
        };

        let positives = records
            .iter()
            .filter(|r| r.sentiment_label == SentimentLabel::Positive)
            .count();
        let n = records.len() as f64;
        let share = math::safe_divide(positives as f64, n);
        let margin = z * math::safe_sqrt(math::safe_divide(share * (1.0 - share), n));
        let positive_share = Section::Available(Interval {
            estimate: share,
            lower: (share - margin).max(0.0),
            upper: (share + margin).min(1.0),
            margin,
            sample_size: records.len(),
        });

        ConfidenceIntervals {
            level: self.config.confidence_level,
            sentiment_mean,
            positive_share,
        }
    }
}

fn percentage(part: usize, total: usize) -> f64 {
    math::safe_divide(part as f64, total as f64) * 100.0
}

fn distributions(records: &[FeedbackRecord], sentiment: &[f64]) -> Distributions {
    let total = records.len();
    let sentiment_labels = [
        SentimentLabel::Positive,
        SentimentLabel::Neutral,
        SentimentLabel::Negative,
    ]
    .into_iter()
    .map(|label| {
        let count = records.iter().filter(|r| r.sentiment_label == label).count();
        LabelShare {
            label,
            count,
            percentage: percentage(count, total),
        }
    })
    .collect();

    let sentiment_histogram = if sentiment.is_empty() {
        Section::unavailable(UnavailableReason::NoNumericValues)
    } else {
        let mut counts = [0usize; 5];
        for score in sentiment {
            let bin = ((score * 5.0).floor() as usize).min(4);
            counts[bin] += 1;
        }
        Section::Available(
            counts
                .iter()
                .enumerate()
                .map(|(i, count)| HistogramBin {
                    lower: i as f64 * 0.2,
                    upper: (i + 1) as f64 * 0.2,
                    count: *count,
                    percentage: percentage(*count, sentiment.len()),
                })
                .collect(),
        )
    };

    let mut length_counts = [0usize; 3];
    for record in records {
        let bucket = match record.content_length() {
            0..=49 => 0,
            50..=199 => 1,
            _ => 2,
        };
        length_counts[bucket] += 1;
    }
    let content_length = ["short", "medium", "long"]
        .iter()
        .zip(length_counts)
        .map(|(bucket, count)| LengthBucket {
            bucket: bucket.to_string(),
            count,
            percentage: percentage(count, total),
        })
        .collect();

    Distributions {
        sentiment_labels,
        sentiment_histogram,
        content_length,
    }
}

/// Shannon entropy, in bits, of a set of group sizes.
pub fn shannon_entropy(sizes: &[usize]) -> f64 {
    let total: usize = sizes.iter().sum();
    sizes
        .iter()
        .filter(|size| **size > 0)
        .map(|size| {
            let p = math::safe_divide(*size as f64, total as f64);
            -p * math::safe_log2(p)
        })
        .sum()
}

/// Gini coefficient of a set of group sizes.
pub fn gini_coefficient(sizes: &[usize]) -> f64 {
    let mut values: Vec<f64> = sizes.iter().map(|s| *s as f64).collect();
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len() as f64;
    let total: f64 = values.iter().sum();
    if values.is_empty() || total == 0.0 {
        return 0.0;
    }
    let weighted: f64 = values
        .iter()
        .enumerate()
        .map(|(i, v)| (i + 1) as f64 * v)
        .sum();
    (math::safe_divide(2.0 * weighted, n * total) - (n + 1.0) / n).clamp(0.0, 1.0)
}

fn group_statistics<'a, F>(records: &'a [FeedbackRecord], key_of: F) -> Section<GroupStatistics>
where
    F: Fn(&'a FeedbackRecord) -> &'a str,
{
    if records.is_empty() {
        return Section::unavailable(UnavailableReason::NoRecords);
    }

    let mut grouped: BTreeMap<&str, (usize, Vec<f64>)> = BTreeMap::new();
    for record in records {
        let entry = grouped.entry(key_of(record)).or_insert((0, Vec::new()));
        entry.0 += 1;
        if let Some(score) = record.sentiment() {
            entry.1.push(score);
        }
    }

    let mut groups: Vec<GroupStat> = grouped
        .into_iter()
        .map(|(name, (count, scores))| GroupStat {
            name: name.to_string(),
            count,
            percentage: percentage(count, records.len()),
            scored: scores.len(),
            sentiment_mean: (!scores.is_empty()).then(|| math::mean(&scores)),
            sentiment_std_dev: (!scores.is_empty()).then(|| math::std_dev(&scores)),
        })
        .collect();
    groups.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));

    let sizes: Vec<usize> = groups.iter().map(|g| g.count).collect();
    let entropy = shannon_entropy(&sizes);
    let dominant = groups.first();

    Section::Available(GroupStatistics {
        group_count: groups.len(),
        entropy,
        normalized_entropy: math::safe_divide(entropy, math::safe_log2(groups.len() as f64)),
        gini: gini_coefficient(&sizes),
        dominant: dominant.map(|g| g.name.clone()),
        dominant_share: dominant.map_or(0.0, |g| g.percentage / 100.0),
        groups,
    })
}

/// One-way ANOVA of sentiment scores across categories with at least two
/// scored records each.
pub fn anova_by_category(records: &[FeedbackRecord]) -> Section<TestResult> {
    let mut grouped: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for record in records {
        if let Some(score) = record.sentiment() {
            grouped.entry(record.category.as_str()).or_default().push(score);
        }
    }
    let groups: Vec<Vec<f64>> = grouped.into_values().filter(|g| g.len() >= 2).collect();
    if groups.len() < 2 {
        return Section::unavailable(UnavailableReason::InsufficientGroups);
    }

    let all: Vec<f64> = groups.iter().flatten().copied().collect();
    let grand_mean = math::mean(&all);
    let k = groups.len() as f64;
    let n = all.len() as f64;

    let ss_between: f64 = groups
        .iter()
        .map(|g| g.len() as f64 * (math::mean(g) - grand_mean).powi(2))
        .sum();
    let ss_within: f64 = groups
        .iter()
        .map(|g| {
            let m = math::mean(g);
            g.iter().map(|x| (x - m).powi(2)).sum::<f64>()
        })
        .sum();
    if ss_within == 0.0 {
        return Section::unavailable(UnavailableReason::NoVariance);
    }

    let df_between = k - 1.0;
    let df_within = n - k;
    let f = math::safe_divide(ss_between / df_between, ss_within / df_within);
    let p_value = math::f_survival(f, df_between, df_within);

    Section::Available(TestResult {
        test: "one_way_anova".to_string(),
        statistic: f,
        degrees_of_freedom: df_between,
        denominator_degrees_of_freedom: Some(df_within),
        p_value,
        significant: p_value < SIGNIFICANCE_LEVEL,
        effect_size: math::safe_divide(ss_between, ss_between + ss_within),
    })
}

/// Chi-square test of independence between sentiment label and source.
pub fn chi_square_label_by_source(records: &[FeedbackRecord]) -> Section<TestResult> {
    let mut table: BTreeMap<(SentimentLabel, &str), usize> = BTreeMap::new();
    let mut row_totals: BTreeMap<SentimentLabel, usize> = BTreeMap::new();
    let mut column_totals: BTreeMap<&str, usize> = BTreeMap::new();
    for record in records {
        *table
            .entry((record.sentiment_label, record.source.as_str()))
            .or_insert(0) += 1;
        *row_totals.entry(record.sentiment_label).or_insert(0) += 1;
        *column_totals.entry(record.source.as_str()).or_insert(0) += 1;
    }
    if row_totals.len() < 2 || column_totals.len() < 2 {
        return Section::unavailable(UnavailableReason::InsufficientGroups);
    }

    let n = records.len() as f64;
    let mut statistic = 0.0;
    for (label, row_total) in &row_totals {
        for (source, column_total) in &column_totals {
            let expected = (*row_total as f64) * (*column_total as f64) / n;
            let observed = table.get(&(*label, *source)).copied().unwrap_or(0) as f64;
            statistic += math::safe_divide((observed - expected).powi(2), expected);
        }
    }

    let rows = row_totals.len() as f64;
    let columns = column_totals.len() as f64;
    let df = (rows - 1.0) * (columns - 1.0);
    let p_value = math::chi_square_survival(statistic, df);
    let cramers_v = math::safe_sqrt(math::safe_divide(
        statistic,
        n * (rows - 1.0).min(columns - 1.0),
    ));

    Section::Available(TestResult {
        test: "chi_square_independence".to_string(),
        statistic,
        degrees_of_freedom: df,
        denominator_degrees_of_freedom: None,
        p_value,
        significant: p_value < SIGNIFICANCE_LEVEL,
        effect_size: cramers_v,
    })
}
