//! Narrative insights: an optional external generator plus a fallback built
//! from the computed numbers.
//!
//! The generator may fail, time out or leave fields empty. Every missing
//! field is filled from the fallback, so callers always get a full narrative.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{NarrativeConfig, MAX_NARRATIVE_RETRIES};
use crate::error::{AnalyticsError, Result};
use crate::metrics::CoreMetrics;
use crate::statistics::DataQuality;
use crate::trend::{TrendDirection, TrendReport, VolatilityLevel};

/// Flattened view of an analysis handed to the generator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NarrativeSummary {
    pub total_feedback: usize,
    pub positive_pct: f64,
    pub neutral_pct: f64,
    pub negative_pct: f64,
    pub average_sentiment: Option<f64>,
    pub top_category: Option<String>,
    pub top_category_pct: f64,
    pub top_source: Option<String>,
    pub trend_direction: TrendDirection,
    pub trend_confidence: f64,
    pub trend_strength: f64,
    pub trend_reliable: bool,
    pub volatility: Option<VolatilityLevel>,
    pub seasonality_detected: bool,
    pub data_quality_score: f64,
    pub ai_coverage: f64,
}

impl NarrativeSummary {
    pub fn build(core: &CoreMetrics, trend: Option<&TrendReport>, quality: &DataQuality) -> Self {
        let analyzable = trend.filter(|t| t.is_analyzable());
        Self {
            total_feedback: core.total_feedback,
            positive_pct: core.sentiment_distribution.positive_pct,
            neutral_pct: core.sentiment_distribution.neutral_pct,
            negative_pct: core.sentiment_distribution.negative_pct,
            average_sentiment: core.average_sentiment,
            top_category: core.top_category.as_ref().map(|g| g.name.clone()),
            top_category_pct: core.top_category.as_ref().map_or(0.0, |g| g.percentage),
            top_source: core.top_source.as_ref().map(|g| g.name.clone()),
            trend_direction: analyzable
                .map_or(TrendDirection::InsufficientData, |t| t.overall.direction),
            trend_confidence: analyzable.map_or(0.0, |t| t.overall.confidence),
            trend_strength: analyzable.map_or(0.0, |t| t.overall.strength),
            trend_reliable: core.trend_reliable,
            volatility: analyzable.and_then(|t| t.volatility.as_ref().map(|v| v.level)),
            seasonality_detected: analyzable.is_some_and(TrendReport::seasonality_detected),
            data_quality_score: quality.quality_score,
            ai_coverage: core.ai_coverage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeRisk {
    pub level: String,
    pub concerns: Vec<String>,
}

/// Generator output; any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrativeDraft {
    pub executive_summary: Option<String>,
    pub key_findings: Option<Vec<String>>,
    pub recommendations: Option<Vec<String>>,
    pub risk_assessment: Option<NarrativeRisk>,
    pub opportunities: Option<Vec<String>>,
    pub strategic_insights: Option<Vec<String>>,
    pub confidence_score: Option<f64>,
}

impl NarrativeDraft {
    /// Field names as reported in `NarrativeInsights::fallback_fields`.
    pub const FIELDS: [&'static str; 7] = [
        "executive_summary",
        "key_findings",
        "recommendations",
        "risk_assessment",
        "opportunities",
        "strategic_insights",
        "confidence_score",
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightSource {
    /// Every field came from the generator
    Generated,
    /// Some fields were filled from the fallback
    Partial,
    /// No generator output was used
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NarrativeInsights {
    pub source: InsightSource,
    pub executive_summary: String,
    pub key_findings: Vec<String>,
    pub recommendations: Vec<String>,
    pub risk_assessment: NarrativeRisk,
    pub opportunities: Vec<String>,
    pub strategic_insights: Vec<String>,
    pub confidence_score: f64,
    /// Fields taken from the fallback
    pub fallback_fields: Vec<String>,
}

#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    async fn generate(&self, summary: &NarrativeSummary) -> Result<NarrativeDraft>;
}

/// Call the generator with a per-attempt timeout and up to `max_retries`
/// retries, capped at [`MAX_NARRATIVE_RETRIES`].
pub async fn request(
    generator: &dyn NarrativeGenerator,
    summary: &NarrativeSummary,
    config: &NarrativeConfig,
) -> Result<NarrativeDraft> {
    let attempts = config.max_retries.min(MAX_NARRATIVE_RETRIES) + 1;
    let mut last_error = AnalyticsError::Narrative("generator was never called".to_string());

    for attempt in 1..=attempts {
        let outcome = tokio::time::timeout(config.timeout(), generator.generate(summary)).await;
        match outcome {
            Ok(Ok(draft)) => {
                debug!(attempt, "narrative generated");
                return Ok(draft);
            }
            Ok(Err(err)) => {
                warn!(attempt, error = %err, "narrative generator failed");
                last_error = err;
            }
            Err(_) => {
                warn!(attempt, timeout_ms = config.timeout_ms, "narrative generator timed out");
                last_error = AnalyticsError::Timeout(config.timeout_ms);
            }
        }
    }
    Err(last_error)
}

/// Fill every field the draft left empty from the fallback.
pub fn merge(draft: Option<NarrativeDraft>, fallback: NarrativeInsights) -> NarrativeInsights {
    let Some(draft) = draft else {
        return fallback;
    };

    let mut fallback_fields = Vec::new();
    let mut pick = |name: &str, generated: Option<Vec<String>>, default: Vec<String>| {
        match generated.filter(|items| !items.is_empty()) {
            Some(items) => items,
            None => {
                fallback_fields.push(name.to_string());
                default
            }
        }
    };

    let key_findings = pick("key_findings", draft.key_findings, fallback.key_findings);
    let recommendations = pick(
        "recommendations",
        draft.recommendations,
        fallback.recommendations,
    );
    let opportunities = pick("opportunities", draft.opportunities, fallback.opportunities);
    let strategic_insights = pick(
        "strategic_insights",
        draft.strategic_insights,
        fallback.strategic_insights,
    );

    let executive_summary = match draft.executive_summary.filter(|s| !s.trim().is_empty()) {
        Some(summary) => summary,
        None => {
            fallback_fields.push("executive_summary".to_string());
            fallback.executive_summary
        }
    };
    let risk_assessment = match draft.risk_assessment {
        Some(risk) => risk,
        None => {
            fallback_fields.push("risk_assessment".to_string());
            fallback.risk_assessment
        }
    };
    let confidence_score = match draft
        .confidence_score
        .filter(|score| (0.0..=1.0).contains(score))
    {
        Some(score) => score,
        None => {
            fallback_fields.push("confidence_score".to_string());
            fallback.confidence_score
        }
    };

    let source = if fallback_fields.is_empty() {
        InsightSource::Generated
    } else if fallback_fields.len() == NarrativeDraft::FIELDS.len() {
        InsightSource::Fallback
    } else {
        InsightSource::Partial
    };

    NarrativeInsights {
        source,
        executive_summary,
        key_findings,
        recommendations,
        risk_assessment,
        opportunities,
        strategic_insights,
        confidence_score,
        fallback_fields,
    }
}

/// Narrative synthesized from the summary alone.
pub fn fallback(summary: &NarrativeSummary) -> NarrativeInsights {
    let reliability = if summary.trend_reliable {
        "reliable"
    } else {
        "low confidence"
    };
    let sentiment = summary
        .average_sentiment
        .map_or("unscored".to_string(), |avg| format!("{avg:.2}"));

    let executive_summary = format!(
        "Analyzed {} feedback records. Average sentiment is {} with {:.0}% positive and {:.0}% negative feedback. Volume trend is {} ({}).",
        summary.total_feedback,
        sentiment,
        summary.positive_pct,
        summary.negative_pct,
        summary.trend_direction.as_str().replace('_', " "),
        reliability,
    );

    let mut key_findings = vec![format!(
        "Sentiment split: {:.0}% positive, {:.0}% neutral, {:.0}% negative",
        summary.positive_pct, summary.neutral_pct, summary.negative_pct
    )];
    if let Some(category) = &summary.top_category {
        key_findings.push(format!(
            "'{category}' is the largest category at {:.0}% of feedback",
            summary.top_category_pct
        ));
    }
    if summary.trend_direction != TrendDirection::InsufficientData {
        key_findings.push(format!(
            "Volume is {} with R² {:.2}",
            summary.trend_direction.as_str(),
            summary.trend_confidence
        ));
    }
    if let Some(level) = summary.volatility {
        key_findings.push(format!("Daily volume volatility is {}", volatility_label(level)));
    }
    if summary.seasonality_detected {
        key_findings.push("Volume follows a recurring seasonal cycle".to_string());
    }

    let mut recommendations = Vec::new();
    if summary.negative_pct > 30.0 {
        recommendations.push("Prioritize root-cause analysis of negative feedback".to_string());
    }
    if summary.trend_reliable && summary.trend_direction == TrendDirection::Decreasing {
        recommendations.push("Investigate the decline in feedback volume".to_string());
    }
    if matches!(
        summary.volatility,
        Some(VolatilityLevel::High | VolatilityLevel::VeryHigh)
    ) {
        recommendations.push("Smooth collection so daily volume is comparable".to_string());
    }
    if summary.data_quality_score < 0.7 {
        recommendations.push("Improve sentiment scoring and categorization coverage".to_string());
    }
    if recommendations.is_empty() {
        recommendations.push("Continue monitoring feedback for emerging changes".to_string());
    }

    let mut concerns = Vec::new();
    if summary.negative_pct > 30.0 {
        concerns.push(format!("{:.0}% of feedback is negative", summary.negative_pct));
    }
    if summary.trend_direction == TrendDirection::Decreasing {
        concerns.push("Feedback volume is declining".to_string());
    }
    if summary.top_category_pct > 50.0 {
        concerns.push("Feedback is concentrated in a single category".to_string());
    }
    let level = match concerns.len() {
        0 => "low",
        1 => "medium",
        _ => "high",
    };

    let mut opportunities = Vec::new();
    if summary.positive_pct > 60.0 {
        opportunities.push("Turn satisfied users into advocates and testimonials".to_string());
    }
    if summary.trend_direction == TrendDirection::Increasing {
        opportunities.push("Growing engagement leaves room to ask deeper follow-up questions".to_string());
    }
    if opportunities.is_empty() {
        opportunities.push("Use category-level sentiment to target improvements".to_string());
    }

    let mut strategic_insights = Vec::new();
    if summary.seasonality_detected {
        strategic_insights.push("Plan staffing and releases around the seasonal cycle".to_string());
    }
    if summary.ai_coverage < 0.5 {
        strategic_insights.push("Extend automatic categorization to more feedback".to_string());
    }
    strategic_insights.push(format!(
        "Data quality score is {:.2}; treat conclusions accordingly",
        summary.data_quality_score
    ));

    let trend_weight = if summary.trend_direction == TrendDirection::InsufficientData {
        0.0
    } else {
        summary.trend_confidence
    };

    NarrativeInsights {
        source: InsightSource::Fallback,
        executive_summary,
        key_findings,
        recommendations,
        risk_assessment: NarrativeRisk {
            level: level.to_string(),
            concerns,
        },
        opportunities,
        strategic_insights,
        confidence_score: (0.5 * summary.data_quality_score + 0.5 * trend_weight).clamp(0.0, 1.0),
        fallback_fields: Vec::new(),
    }
}

fn volatility_label(level: VolatilityLevel) -> &'static str {
    match level {
        VolatilityLevel::VeryLow => "very low",
        VolatilityLevel::Low => "low",
        VolatilityLevel::Moderate => "moderate",
        VolatilityLevel::High => "high",
        VolatilityLevel::VeryHigh => "very high",
    }
}
