//! Request orchestration: validation, caching, concurrent analysis and
//! narrative merge.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::cache::TtlCache;
use crate::config::{AnalysisDepth, AnalyticsOptions, CacheConfig, EngineConfig};
use crate::error::{AnalyticsError, Result};
use crate::metrics::CoreMetrics;
use crate::models::FeedbackRecord;
use crate::narrative::{self, NarrativeGenerator, NarrativeInsights, NarrativeSummary};
use crate::predictive::{PredictiveInsights, PredictiveReport};
use crate::statistics::{DataQuality, StatisticalAnalyzer, StatisticalReport};
use crate::trend::{TrendAnalyzer, TrendReport};

/// Records hashed into the cache key.
const KEY_SAMPLE: usize = 100;

/// One cache per analysis stage.
///
/// Build one per coordinator, or share one between coordinators by passing
/// the same `Arc` to [`AnalyticsCoordinator::with_caches`].
#[derive(Debug)]
pub struct AnalyticsCaches {
    pub statistics: TtlCache<StatisticalReport>,
    pub trends: TtlCache<TrendReport>,
    pub predictive: TtlCache<PredictiveReport>,
    pub composite: TtlCache<CompositeReport>,
}

impl AnalyticsCaches {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            statistics: TtlCache::new("statistics", config.statistics_ttl()),
            trends: TtlCache::new("trend", config.trend_ttl()),
            predictive: TtlCache::new("predictive", config.predictive_ttl()),
            composite: TtlCache::new("composite", config.composite_ttl()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportMetadata {
    pub cache_key: String,
    pub generated_at: DateTime<Utc>,
    pub engine_version: &'static str,
    pub analysis_depth: AnalysisDepth,
    pub options: AnalyticsOptions,
    pub input_records: usize,
    pub analyzed_records: usize,
    /// Blank content or unparseable date
    pub dropped_invalid: usize,
    pub dropped_out_of_range: usize,
    pub truncated: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeReport {
    pub metadata: ReportMetadata,
    pub core_metrics: CoreMetrics,
    pub statistics: Option<StatisticalReport>,
    pub trends: Option<TrendReport>,
    pub predictive: Option<PredictiveReport>,
    pub insights: NarrativeInsights,
}

/// Records that survived validation, with a tally of what was removed.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedInput {
    pub records: Vec<FeedbackRecord>,
    pub input_records: usize,
    pub dropped_invalid: usize,
    pub dropped_out_of_range: usize,
    pub truncated: usize,
}

/// Keep records with content and a usable date inside the requested window,
/// capped at `max_data_points`.
pub fn validate(records: &[FeedbackRecord], options: &AnalyticsOptions) -> Result<ValidatedInput> {
    options.validate()?;

    let mut dropped_invalid = 0;
    let mut dropped_out_of_range = 0;
    let mut kept = Vec::with_capacity(records.len().min(options.max_data_points));

    for record in records {
        let Some(date) = record.date().filter(|_| record.has_content()) else {
            dropped_invalid += 1;
            continue;
        };
        if options.time_range.is_some_and(|range| !range.contains(date)) {
            dropped_out_of_range += 1;
            continue;
        }
        kept.push(record.clone());
    }

    let truncated = kept.len().saturating_sub(options.max_data_points);
    kept.truncate(options.max_data_points);

    if kept.is_empty() {
        return Err(AnalyticsError::Validation(format!(
            "no valid feedback records ({} supplied, {dropped_invalid} invalid, {dropped_out_of_range} outside the time range)",
            records.len()
        )));
    }
    if dropped_invalid > 0 || truncated > 0 {
        debug!(dropped_invalid, dropped_out_of_range, truncated, "input validated");
    }

    Ok(ValidatedInput {
        records: kept,
        input_records: records.len(),
        dropped_invalid,
        dropped_out_of_range,
        truncated,
    })
}

/// SHA-256 over a sample of the records, their count and the options.
///
/// Identical requests share a key, and so do requests that differ only past
/// the sampled records.
pub fn cache_key(records: &[FeedbackRecord], options: &AnalyticsOptions) -> Result<String> {
    let mut hasher = Sha256::new();
    let sample = &records[..records.len().min(KEY_SAMPLE)];
    hasher.update(serde_json::to_vec(sample)?);
    hasher.update(records.len().to_le_bytes());
    hasher.update(serde_json::to_vec(options)?);
    Ok(format!("{:x}", hasher.finalize()))
}

pub struct AnalyticsCoordinator {
    config: EngineConfig,
    statistics: Arc<StatisticalAnalyzer>,
    trends: Arc<TrendAnalyzer>,
    predictive: Arc<PredictiveInsights>,
    caches: Arc<AnalyticsCaches>,
    generator: Option<Arc<dyn NarrativeGenerator>>,
}

impl AnalyticsCoordinator {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            statistics: Arc::new(StatisticalAnalyzer::new(config.statistics.clone())),
            trends: Arc::new(TrendAnalyzer::new(config.trend.clone())),
            predictive: Arc::new(PredictiveInsights::new(config.predictive.clone())),
            caches: Arc::new(AnalyticsCaches::new(&config.cache)),
            generator: None,
            config,
        })
    }

    pub fn with_caches(mut self, caches: Arc<AnalyticsCaches>) -> Self {
        self.caches = caches;
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn NarrativeGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn caches(&self) -> &Arc<AnalyticsCaches> {
        &self.caches
    }

    pub async fn generate_report(
        &self,
        records: &[FeedbackRecord],
        options: &AnalyticsOptions,
    ) -> Result<Arc<CompositeReport>> {
        let input = validate(records, options)?;
        let key = cache_key(&input.records, options)?;

        if let Some(report) = self.caches.composite.get(&key).await {
            info!(key = %key, "serving cached report");
            return Ok(report);
        }

        let records = Arc::new(input.records);
        info!(
            records = records.len(),
            depth = ?options.analysis_depth,
            "generating analytics report"
        );

        let (statistics, trends) = tokio::join!(
            self.run_statistics(&key, &records, options),
            self.run_trends(&key, &records, options),
        );
        let statistics = statistics?;
        let trends = trends?;

        let core_metrics = CoreMetrics::compute(
            &records,
            trends.as_deref(),
            options.confidence_threshold,
        );
        let quality = statistics
            .as_ref()
            .map(|report| report.data_quality.clone())
            .unwrap_or_else(|| DataQuality::measure(&records));
        let summary = NarrativeSummary::build(&core_metrics, trends.as_deref(), &quality);

        let (insights, predictive) = tokio::join!(
            self.narrative(&summary, options),
            self.run_predictive(&key, &records, trends.clone(), options),
        );
        let predictive = predictive?;

        let report = Arc::new(CompositeReport {
            metadata: ReportMetadata {
                cache_key: key.clone(),
                generated_at: Utc::now(),
                engine_version: env!("CARGO_PKG_VERSION"),
                analysis_depth: options.analysis_depth,
                options: options.clone(),
                input_records: input.input_records,
                analyzed_records: records.len(),
                dropped_invalid: input.dropped_invalid,
                dropped_out_of_range: input.dropped_out_of_range,
                truncated: input.truncated,
            },
            core_metrics: core_metrics.with_forecast(predictive.as_deref()),
            statistics: statistics.map(|report| (*report).clone()),
            trends: trends.map(|report| (*report).clone()),
            predictive: predictive.map(|report| (*report).clone()),
            insights,
        });

        self.caches.composite.insert(key, Arc::clone(&report)).await;
        info!(
            narrative = ?report.insights.source,
            "analytics report ready"
        );
        Ok(report)
    }

    async fn run_statistics(
        &self,
        key: &str,
        records: &Arc<Vec<FeedbackRecord>>,
        options: &AnalyticsOptions,
    ) -> Result<Option<Arc<StatisticalReport>>> {
        if !options.runs_statistics() {
            debug!("statistics skipped at basic depth");
            return Ok(None);
        }
        if let Some(report) = self.caches.statistics.get(key).await {
            return Ok(Some(report));
        }

        let analyzer = Arc::clone(&self.statistics);
        let records = Arc::clone(records);
        let report = tokio::task::spawn_blocking(move || analyzer.analyze(&records))
            .await
            .map_err(|err| AnalyticsError::Task(err.to_string()))?;
        let report = Arc::new(report);
        self.caches
            .statistics
            .insert(key.to_string(), Arc::clone(&report))
            .await;
        Ok(Some(report))
    }

    async fn run_trends(
        &self,
        key: &str,
        records: &Arc<Vec<FeedbackRecord>>,
        options: &AnalyticsOptions,
    ) -> Result<Option<Arc<TrendReport>>> {
        if !options.enable_trend_analysis {
            debug!("trend analysis disabled");
            return Ok(None);
        }
        if let Some(report) = self.caches.trends.get(key).await {
            return Ok(Some(report));
        }

        let analyzer = Arc::clone(&self.trends);
        let records = Arc::clone(records);
        let range = options.time_range;
        let report = tokio::task::spawn_blocking(move || analyzer.analyze(&records, range.as_ref()))
            .await
            .map_err(|err| AnalyticsError::Task(err.to_string()))?;
        let report = Arc::new(report);
        self.caches
            .trends
            .insert(key.to_string(), Arc::clone(&report))
            .await;
        Ok(Some(report))
    }

    async fn run_predictive(
        &self,
        key: &str,
        records: &Arc<Vec<FeedbackRecord>>,
        trends: Option<Arc<TrendReport>>,
        options: &AnalyticsOptions,
    ) -> Result<Option<Arc<PredictiveReport>>> {
        let Some(trend) = trends.filter(|_| options.runs_predictive()) else {
            return Ok(None);
        };
        if let Some(report) = self.caches.predictive.get(key).await {
            return Ok(Some(report));
        }

        let predictive = Arc::clone(&self.predictive);
        let records = Arc::clone(records);
        let report = tokio::task::spawn_blocking(move || predictive.predict(&records, &trend))
            .await
            .map_err(|err| AnalyticsError::Task(err.to_string()))?;
        let report = Arc::new(report);
        self.caches
            .predictive
            .insert(key.to_string(), Arc::clone(&report))
            .await;
        Ok(Some(report))
    }

    async fn narrative(
        &self,
        summary: &NarrativeSummary,
        options: &AnalyticsOptions,
    ) -> NarrativeInsights {
        let fallback = narrative::fallback(summary);
        let generator = match &self.generator {
            Some(generator) if options.enable_ai_insights => generator,
            _ => return fallback,
        };

        match narrative::request(generator.as_ref(), summary, &self.config.narrative).await {
            Ok(draft) => narrative::merge(Some(draft), fallback),
            Err(err) => {
                warn!(error = %err, "falling back to computed narrative");
                fallback
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::record;
    use crate::models::TimeRange;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).expect("valid date")
    }

    #[test]
    fn validation_drops_unusable_records() {
        let mut blank = record("2026-01-02", "billing", Some(0.5));
        blank.content = "   ".to_string();
        let records = vec![
            record("2026-01-01", "billing", Some(0.5)),
            blank,
            record("yesterday", "billing", Some(0.5)),
            record("2026-01-03", "billing", Some(0.5)),
        ];
        let input = validate(&records, &AnalyticsOptions::default()).expect("valid");
        assert_eq!(input.records.len(), 2);
        assert_eq!(input.dropped_invalid, 2);
    }

    #[test]
    fn validation_applies_range_and_cap() {
        let records: Vec<FeedbackRecord> = (1..=9)
            .map(|d| record(&format!("2026-01-0{d}"), "billing", None))
            .collect();
        let options = AnalyticsOptions {
            max_data_points: 3,
            time_range: Some(TimeRange::new(day(2), day(6))),
            ..AnalyticsOptions::default()
        };
        let input = validate(&records, &options).expect("valid");
        assert_eq!(input.records.len(), 3);
        assert_eq!(input.dropped_out_of_range, 4);
        assert_eq!(input.truncated, 2);
        assert_eq!(input.records[0].feedback_date, "2026-01-02");
    }

    #[test]
    fn nothing_left_is_a_validation_error() {
        let records = vec![record("soon", "billing", None)];
        let result = validate(&records, &AnalyticsOptions::default());
        assert!(matches!(result, Err(AnalyticsError::Validation(_))));
        assert!(matches!(
            validate(&[], &AnalyticsOptions::default()),
            Err(AnalyticsError::Validation(_))
        ));
    }

    #[test]
    fn cache_key_depends_on_records_and_options() {
        let records = vec![record("2026-01-01", "billing", Some(0.5))];
        let options = AnalyticsOptions::default();
        let key = cache_key(&records, &options).expect("key");
        assert_eq!(key.len(), 64);
        assert_eq!(key, cache_key(&records, &options).expect("key"));

        let deeper = AnalyticsOptions {
            analysis_depth: AnalysisDepth::Advanced,
            ..AnalyticsOptions::default()
        };
        assert_ne!(key, cache_key(&records, &deeper).expect("key"));

        let mut more = records.clone();
        more.push(record("2026-01-02", "billing", Some(0.5)));
        assert_ne!(key, cache_key(&more, &options).expect("key"));
    }
}
