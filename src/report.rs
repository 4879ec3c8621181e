use std::fmt::Write;

use crate::coordinator::CompositeReport;
use crate::statistics::GroupStat;

pub fn build_report(report: &CompositeReport, scope: Option<&str>) -> String {
    let mut output = String::new();
    let core = &report.core_metrics;
    let scope_label = scope.unwrap_or("all feedback");

    let _ = writeln!(output, "# Feedback Analytics Report");
    match &core.date_span {
        Some(span) => {
            let _ = writeln!(
                output,
                "Generated for {} ({} to {}, {} days)",
                scope_label, span.start, span.end, span.days
            );
        }
        None => {
            let _ = writeln!(output, "Generated for {scope_label}");
        }
    }
    let _ = writeln!(
        output,
        "{} records analyzed at {:?} depth on {}",
        report.metadata.analyzed_records,
        report.metadata.analysis_depth,
        report.metadata.generated_at.format("%Y-%m-%d %H:%M UTC")
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");
    let _ = writeln!(output, "{}", report.insights.executive_summary);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Sentiment Mix");
    let mix = &core.sentiment_distribution;
    let _ = writeln!(output, "- positive: {} ({:.1}%)", mix.positive, mix.positive_pct);
    let _ = writeln!(output, "- neutral: {} ({:.1}%)", mix.neutral, mix.neutral_pct);
    let _ = writeln!(output, "- negative: {} ({:.1}%)", mix.negative, mix.negative_pct);
    if let Some(avg) = core.average_sentiment {
        let _ = writeln!(output, "- average score: {avg:.2}");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Categories");
    let categories = report
        .statistics
        .as_ref()
        .and_then(|stats| stats.categories.value());
    match categories {
        Some(stats) if !stats.groups.is_empty() => {
            for group in stats.groups.iter().take(5) {
                let _ = writeln!(output, "- {}", describe_group(group));
            }
        }
        _ => match &core.top_category {
            Some(top) => {
                let _ = writeln!(
                    output,
                    "- {}: {} records ({:.1}%)",
                    top.name, top.count, top.percentage
                );
            }
            None => {
                let _ = writeln!(output, "No categories recorded.");
            }
        },
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Volume Trend");
    match &report.trends {
        Some(trend) if trend.is_analyzable() => {
            let _ = writeln!(
                output,
                "- direction: {} (slope {:.2}/day, R² {:.2}{})",
                trend.overall.direction.as_str(),
                trend.overall.slope,
                trend.overall.confidence,
                if core.trend_reliable { "" } else { ", low confidence" }
            );
            if let Some(volatility) = &trend.volatility {
                let _ = writeln!(
                    output,
                    "- volatility: {:?} (CV {:.2})",
                    volatility.level, volatility.coefficient_of_variation
                );
            }
            if let Some(season) = trend.seasonality.as_ref().filter(|s| s.detected) {
                let _ = writeln!(
                    output,
                    "- seasonality: {}-day cycle, strength {:.2}",
                    season.period, season.strength
                );
            }
            if trend.anomalies.is_empty() {
                let _ = writeln!(output, "- no anomalous days");
            }
            for anomaly in trend.anomalies.iter().take(5) {
                let _ = writeln!(
                    output,
                    "- {:?} on {}: {} records vs {:.1} expected ({:+.1}σ)",
                    anomaly.kind, anomaly.date, anomaly.count, anomaly.expected, anomaly.deviation
                );
            }
        }
        Some(trend) => {
            let _ = writeln!(
                output,
                "{}",
                trend.message.as_deref().unwrap_or("Not enough data for trend analysis.")
            );
        }
        None => {
            let _ = writeln!(output, "Trend analysis was not requested.");
        }
    }

    if let Some(predictive) = &report.predictive {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Outlook");
        match (&predictive.volume_forecast, &predictive.risk) {
            (Some(forecast), Some(risk)) => {
                let _ = writeln!(
                    output,
                    "- recommended forecast: {} (confidence {:.2})",
                    forecast.recommended.as_str(),
                    forecast.recommended_result().confidence
                );
                for horizon in &forecast.horizons {
                    let _ = writeln!(
                        output,
                        "- next {} days: ~{:.0} records ({:.1}/day)",
                        horizon.horizon_days, horizon.expected_total, horizon.daily_average
                    );
                }
                let _ = writeln!(
                    output,
                    "- risk: {:?} ({:.2})",
                    risk.level, risk.overall_score
                );
                for factor in risk.factors.iter().take(5) {
                    let _ = writeln!(output, "  - {}", factor.description);
                }
            }
            _ => {
                let _ = writeln!(
                    output,
                    "{}",
                    predictive
                        .message
                        .as_deref()
                        .unwrap_or("Not enough history for predictive analysis.")
                );
            }
        }
        if let Some(opportunities) = &predictive.opportunities {
            for opportunity in opportunities.quick_wins.iter().take(3) {
                let _ = writeln!(output, "- quick win: {}", opportunity.title);
            }
            for opportunity in opportunities.strategic.iter().take(3) {
                let _ = writeln!(output, "- strategic: {}", opportunity.title);
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Key Findings");
    for finding in &report.insights.key_findings {
        let _ = writeln!(output, "- {finding}");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recommendations");
    for recommendation in &report.insights.recommendations {
        let _ = writeln!(output, "- {recommendation}");
    }

    output
}

fn describe_group(group: &GroupStat) -> String {
    match group.sentiment_mean {
        Some(mean) => format!(
            "{}: {} records ({:.1}%), avg sentiment {:.2}",
            group.name, group.count, group.percentage, mean
        ),
        None => format!(
            "{}: {} records ({:.1}%)",
            group.name, group.count, group.percentage
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnalysisDepth, AnalyticsOptions, EngineConfig};
    use crate::coordinator::AnalyticsCoordinator;
    use crate::models::fixtures::daily_series;
    use chrono::NaiveDate;

    async fn composite(depth: AnalysisDepth, days: usize) -> std::sync::Arc<CompositeReport> {
        let start = NaiveDate::from_ymd_opt(2026, 1, 4).expect("valid date");
        let counts: Vec<usize> = (0..days).map(|i| 8 + i % 5).collect();
        let records = daily_series(start, &counts);
        let options = AnalyticsOptions {
            analysis_depth: depth,
            ..AnalyticsOptions::default()
        };
        AnalyticsCoordinator::new(EngineConfig::default())
            .expect("coordinator")
            .generate_report(&records, &options)
            .await
            .expect("report")
    }

    #[tokio::test]
    async fn advanced_report_has_every_section() {
        let report = composite(AnalysisDepth::Advanced, 28).await;
        let markdown = build_report(&report, Some("Acme"));
        assert!(markdown.starts_with("# Feedback Analytics Report"));
        assert!(markdown.contains("Generated for Acme (2026-01-04 to 2026-01-31, 28 days)"));
        assert!(markdown.contains("## Sentiment Mix"));
        assert!(markdown.contains("- billing:"));
        assert!(markdown.contains("## Volume Trend"));
        assert!(markdown.contains("## Outlook"));
        assert!(markdown.contains("- next 7 days:"));
        assert!(markdown.contains("## Recommendations"));
    }

    #[tokio::test]
    async fn short_history_explains_itself() {
        let report = composite(AnalysisDepth::Basic, 3).await;
        let markdown = build_report(&report, None);
        assert!(markdown.contains("Generated for all feedback"));
        assert!(markdown.contains("at least 7 days"));
        assert!(!markdown.contains("## Outlook"));
    }
}
