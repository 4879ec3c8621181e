use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use uuid::Uuid;

use feedback_analytics::narrative::InsightSource;
use feedback_analytics::trend::{TrendDirection, VolatilityLevel};
use feedback_analytics::{
    AnalysisDepth, AnalyticsCaches, AnalyticsCoordinator, AnalyticsError, AnalyticsOptions,
    EngineConfig, FeedbackRecord, NarrativeDraft, NarrativeGenerator, NarrativeSummary,
    SentimentLabel,
};

fn feedback(date: NaiveDate, index: usize) -> FeedbackRecord {
    let (score, label) = match index % 4 {
        0 => (0.2, SentimentLabel::Negative),
        1 => (0.5, SentimentLabel::Neutral),
        _ => (0.8, SentimentLabel::Positive),
    };
    FeedbackRecord {
        id: Uuid::new_v4(),
        content: format!("Feedback number {index} about the product"),
        category: ["billing", "support", "product"][index % 3].to_string(),
        source: ["email", "chat"][index % 2].to_string(),
        sentiment_score: Some(score),
        sentiment_label: label,
        feedback_date: date.to_string(),
        ai_category_confidence: Some(0.75),
    }
}

fn series(counts: &[usize]) -> Vec<FeedbackRecord> {
    let start = NaiveDate::from_ymd_opt(2026, 3, 1).expect("valid date");
    counts
        .iter()
        .enumerate()
        .flat_map(|(day, count)| {
            let date = start + Duration::days(day as i64);
            (0..*count).map(move |i| feedback(date, day * 31 + i))
        })
        .collect()
}

fn advanced() -> AnalyticsOptions {
    AnalyticsOptions {
        analysis_depth: AnalysisDepth::Advanced,
        ..AnalyticsOptions::default()
    }
}

struct CountingGenerator {
    calls: AtomicUsize,
}

#[async_trait]
impl NarrativeGenerator for CountingGenerator {
    async fn generate(
        &self,
        summary: &NarrativeSummary,
    ) -> feedback_analytics::Result<NarrativeDraft> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(NarrativeDraft {
            executive_summary: Some(format!("{} records reviewed", summary.total_feedback)),
            key_findings: Some(vec!["Volume is steady".to_string()]),
            recommendations: Some(vec!["Keep going".to_string()]),
            risk_assessment: None,
            opportunities: Some(vec!["Ask for reviews".to_string()]),
            strategic_insights: Some(vec!["Plan ahead".to_string()]),
            confidence_score: Some(0.9),
        })
    }
}

struct FailingGenerator {
    calls: AtomicUsize,
}

#[async_trait]
impl NarrativeGenerator for FailingGenerator {
    async fn generate(
        &self,
        _summary: &NarrativeSummary,
    ) -> feedback_analytics::Result<NarrativeDraft> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(AnalyticsError::Narrative("service unavailable".to_string()))
    }
}

#[tokio::test]
async fn identical_requests_hit_the_cache() {
    let generator = Arc::new(CountingGenerator {
        calls: AtomicUsize::new(0),
    });
    let coordinator = AnalyticsCoordinator::new(EngineConfig::default())
        .expect("coordinator")
        .with_generator(generator.clone());
    let records = series(&[12; 21]);

    let first = coordinator
        .generate_report(&records, &advanced())
        .await
        .expect("first report");
    let second = coordinator
        .generate_report(&records, &advanced())
        .await
        .expect("second report");

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first, second);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    assert_eq!(first.insights.source, InsightSource::Partial);
    assert_eq!(first.insights.fallback_fields, vec!["risk_assessment".to_string()]);
    assert_eq!(first.insights.executive_summary, "252 records reviewed");
}

#[tokio::test]
async fn failing_generator_degrades_to_fallback() {
    let generator = Arc::new(FailingGenerator {
        calls: AtomicUsize::new(0),
    });
    let coordinator = AnalyticsCoordinator::new(EngineConfig::default())
        .expect("coordinator")
        .with_generator(generator.clone());

    let report = coordinator
        .generate_report(&series(&[10; 14]), &AnalyticsOptions::default())
        .await
        .expect("report despite generator failure");

    assert_eq!(report.insights.source, InsightSource::Fallback);
    assert!(!report.insights.executive_summary.is_empty());
    // One attempt plus one retry.
    assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn disabled_insights_skip_the_generator() {
    let generator = Arc::new(CountingGenerator {
        calls: AtomicUsize::new(0),
    });
    let coordinator = AnalyticsCoordinator::new(EngineConfig::default())
        .expect("coordinator")
        .with_generator(generator.clone());
    let options = AnalyticsOptions {
        enable_ai_insights: false,
        ..AnalyticsOptions::default()
    };

    let report = coordinator
        .generate_report(&series(&[5; 10]), &options)
        .await
        .expect("report");
    assert_eq!(report.insights.source, InsightSource::Fallback);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn depth_controls_components() {
    let coordinator = AnalyticsCoordinator::new(EngineConfig::default()).expect("coordinator");
    let records = series(&[10; 20]);

    let basic = AnalyticsOptions {
        analysis_depth: AnalysisDepth::Basic,
        ..AnalyticsOptions::default()
    };
    let report = coordinator
        .generate_report(&records, &basic)
        .await
        .expect("basic");
    assert!(report.statistics.is_none());
    assert!(report.trends.is_some());
    assert!(report.predictive.is_none());

    let standard = coordinator
        .generate_report(&records, &AnalyticsOptions::default())
        .await
        .expect("standard");
    assert!(standard.statistics.is_some());
    assert!(standard.predictive.is_none());

    let full = coordinator
        .generate_report(&records, &advanced())
        .await
        .expect("advanced");
    let predictive = full.predictive.as_ref().expect("predictive");
    assert!(predictive.is_sufficient());
    assert!(full.core_metrics.forecast_reliable.is_some());

    let no_trends = AnalyticsOptions {
        enable_trend_analysis: false,
        ..advanced()
    };
    let report = coordinator
        .generate_report(&records, &no_trends)
        .await
        .expect("no trends");
    assert!(report.trends.is_none());
    assert!(report.predictive.is_none());
}

#[tokio::test]
async fn flat_month_is_stable_and_calm() {
    let coordinator = AnalyticsCoordinator::new(EngineConfig::default()).expect("coordinator");
    let report = coordinator
        .generate_report(&series(&[10; 30]), &advanced())
        .await
        .expect("report");

    let trend = report.trends.as_ref().expect("trend");
    assert_eq!(trend.overall.direction, TrendDirection::Stable);
    assert_eq!(
        trend.volatility.as_ref().map(|v| v.level),
        Some(VolatilityLevel::VeryLow)
    );
    assert!(trend.anomalies.is_empty());
    assert!(!trend.seasonality_detected());
    assert!(report.core_metrics.trend_reliable);
}

#[tokio::test]
async fn empty_input_is_rejected() {
    let coordinator = AnalyticsCoordinator::new(EngineConfig::default()).expect("coordinator");
    let mut records = series(&[2; 3]);
    for record in &mut records {
        record.content = String::new();
    }
    let result = coordinator
        .generate_report(&records, &AnalyticsOptions::default())
        .await;
    assert!(matches!(result, Err(AnalyticsError::Validation(_))));
}

#[tokio::test]
async fn shared_caches_serve_other_coordinators() {
    let config = EngineConfig::default();
    let caches = Arc::new(AnalyticsCaches::new(&config.cache));
    let first = AnalyticsCoordinator::new(config.clone())
        .expect("coordinator")
        .with_caches(Arc::clone(&caches));
    let second = AnalyticsCoordinator::new(config)
        .expect("coordinator")
        .with_caches(Arc::clone(&caches));
    let records = series(&[7; 14]);

    let a = first
        .generate_report(&records, &AnalyticsOptions::default())
        .await
        .expect("report");
    let b = second
        .generate_report(&records, &AnalyticsOptions::default())
        .await
        .expect("report");
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(caches.composite.len().await, 1);
    assert_eq!(caches.statistics.len().await, 1);

    let isolated = AnalyticsCoordinator::new(EngineConfig::default()).expect("coordinator");
    let c = isolated
        .generate_report(&records, &AnalyticsOptions::default())
        .await
        .expect("report");
    assert!(!Arc::ptr_eq(&a, &c));
}
