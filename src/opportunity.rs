use std::collections::BTreeMap;

use serde::Serialize;

use crate::math;
use crate::models::FeedbackRecord;
use crate::trend::{TrendDirection, TrendReport, WeeklyPattern};

const MIN_GROUP_SIZE: usize = 3;
const STRONG_SENTIMENT: f64 = 0.7;
const WEAK_SENTIMENT: f64 = 0.4;
const SOURCE_GAP: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Effort {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityKind {
    VolumeGrowth,
    SentimentImprovement,
    CategoryStrength,
    CategoryImprovement,
    SourcePerformance,
    ProcessOptimization,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Opportunity {
    pub kind: OpportunityKind,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub effort: Effort,
    /// Expected impact in [0, 1]
    pub impact: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Opportunities {
    pub quick_wins: Vec<Opportunity>,
    pub strategic: Vec<Opportunity>,
    pub total: usize,
}

impl Opportunities {
    pub fn iter(&self) -> impl Iterator<Item = &Opportunity> {
        self.quick_wins.iter().chain(self.strategic.iter())
    }
}

pub fn identify(records: &[FeedbackRecord], trend: &TrendReport) -> Opportunities {
    let mut found = Vec::new();
    found.extend(volume_growth(trend));
    found.extend(sentiment_improvement(trend));
    found.extend(category_opportunities(records));
    found.extend(source_gap(records));
    found.extend(process_signals(trend));

    found.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| b.impact.total_cmp(&a.impact))
    });
    let total = found.len();
    let (quick_wins, strategic): (Vec<Opportunity>, Vec<Opportunity>) = found
        .into_iter()
        .partition(|opportunity| opportunity.effort == Effort::Low);

    Opportunities {
        quick_wins,
        strategic,
        total,
    }
}

fn opportunity(
    kind: OpportunityKind,
    title: String,
    description: String,
    priority: Priority,
    effort: Effort,
    impact: f64,
) -> Opportunity {
    Opportunity {
        kind,
        title,
        description,
        priority,
        effort,
        impact: math::finite_or_zero(impact).clamp(0.0, 1.0),
    }
}

fn volume_growth(trend: &TrendReport) -> Option<Opportunity> {
    let overall = &trend.overall;
    if overall.direction != TrendDirection::Increasing || overall.confidence <= 0.5 {
        return None;
    }
    let daily_growth = trend.growth.as_ref().map_or(0.0, |g| g.daily);
    let priority = if daily_growth > 5.0 {
        Priority::High
    } else {
        Priority::Medium
    };
    Some(opportunity(
        OpportunityKind::VolumeGrowth,
        "Capitalize on growing feedback volume".to_string(),
        format!(
            "Volume is rising by {:.2} records per day (R² {:.2}); scale triage capacity to keep response times flat",
            overall.slope, overall.confidence
        ),
        priority,
        Effort::Medium,
        overall.confidence,
    ))
}

fn sentiment_improvement(trend: &TrendReport) -> Option<Opportunity> {
    let sentiment = trend.sentiment_trend.as_ref()?;
    if sentiment.direction != TrendDirection::Increasing || sentiment.confidence <= 0.3 {
        return None;
    }
    Some(opportunity(
        OpportunityKind::SentimentImprovement,
        "Reinforce improving sentiment".to_string(),
        "Average sentiment is trending up; identify the recent changes behind it and extend them"
            .to_string(),
        Priority::Medium,
        Effort::Low,
        sentiment.confidence,
    ))
}

fn category_opportunities(records: &[FeedbackRecord]) -> Vec<Opportunity> {
    let mut scores: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    let mut totals: BTreeMap<&str, usize> = BTreeMap::new();
    for record in records {
        *totals.entry(record.category.as_str()).or_insert(0) += 1;
        if let Some(score) = record.sentiment() {
            scores.entry(record.category.as_str()).or_default().push(score);
        }
    }
    let total = records.len();
    let min_size = MIN_GROUP_SIZE.max(total / 20);

    scores
        .into_iter()
        .filter(|(_, values)| values.len() >= min_size)
        .filter_map(|(category, values)| {
            let average = math::mean(&values);
            let share = math::safe_divide(
                totals.get(category).copied().unwrap_or(0) as f64,
                total as f64,
            );
            if average > STRONG_SENTIMENT {
                Some(opportunity(
                    OpportunityKind::CategoryStrength,
                    format!("Showcase '{category}'"),
                    format!(
                        "'{category}' averages {average:.2} sentiment; use it as a reference for weaker areas"
                    ),
                    Priority::Medium,
                    Effort::Low,
                    average,
                ))
            } else if average < WEAK_SENTIMENT && share >= 0.1 {
                Some(opportunity(
                    OpportunityKind::CategoryImprovement,
                    format!("Improve '{category}'"),
                    format!(
                        "'{category}' carries {:.0}% of feedback at {average:.2} average sentiment",
                        share * 100.0
                    ),
                    Priority::High,
                    Effort::High,
                    share + (WEAK_SENTIMENT - average),
                ))
            } else {
                None
            }
        })
        .collect()
}

fn source_gap(records: &[FeedbackRecord]) -> Option<Opportunity> {
    let mut scores: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for record in records {
        if let Some(score) = record.sentiment() {
            scores.entry(record.source.as_str()).or_default().push(score);
        }
    }
    let averages: Vec<(&str, f64)> = scores
        .into_iter()
        .filter(|(_, values)| values.len() >= MIN_GROUP_SIZE)
        .map(|(source, values)| (source, math::mean(&values)))
        .collect();

    let best = averages.iter().max_by(|a, b| a.1.total_cmp(&b.1))?;
    let worst = averages.iter().min_by(|a, b| a.1.total_cmp(&b.1))?;
    let gap = best.1 - worst.1;
    if gap <= SOURCE_GAP {
        return None;
    }
    Some(opportunity(
        OpportunityKind::SourcePerformance,
        format!("Close the gap between '{}' and '{}'", best.0, worst.0),
        format!(
            "Sentiment from '{}' trails '{}' by {gap:.2}; review how that channel is handled",
            worst.0, best.0
        ),
        if gap < 0.35 {
            Priority::Medium
        } else {
            Priority::High
        },
        Effort::Medium,
        gap,
    ))
}

fn process_signals(trend: &TrendReport) -> Vec<Opportunity> {
    let mut found = Vec::new();
    if let Some(pattern) = trend
        .day_of_week
        .as_ref()
        .filter(|p| p.pattern != WeeklyPattern::Balanced)
    {
        let ratio = math::safe_divide(
            pattern.weekday_average.max(pattern.weekend_average),
            pattern.weekday_average.min(pattern.weekend_average),
        );
        found.push(opportunity(
            OpportunityKind::ProcessOptimization,
            format!("Staff for the {} peak", pattern.peak_day),
            format!(
                "Feedback peaks on {} and is lowest on {}; align review shifts with the weekly rhythm",
                pattern.peak_day, pattern.low_day
            ),
            Priority::Low,
            Effort::Low,
            (ratio - 1.0).min(1.0),
        ));
    }
    if let Some(season) = trend.seasonality.as_ref().filter(|s| s.detected) {
        found.push(opportunity(
            OpportunityKind::ProcessOptimization,
            "Plan capacity around the seasonal cycle".to_string(),
            format!(
                "A {}-day cycle explains {:.0}% of the detrended variation",
                season.period,
                season.strength * 100.0
            ),
            Priority::Medium,
            Effort::Medium,
            season.strength,
        ));
    }
    found
}
