use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Negative => "negative",
        }
    }
}

impl std::str::FromStr for SentimentLabel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(SentimentLabel::Positive),
            "neutral" => Ok(SentimentLabel::Neutral),
            "negative" => Ok(SentimentLabel::Negative),
            other => Err(format!("unknown sentiment label '{other}'")),
        }
    }
}

/// One piece of customer feedback as supplied by the feedback source.
///
/// The date is kept exactly as supplied; use [`FeedbackRecord::date`] to place
/// it on the calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: Uuid,
    pub content: String,
    pub category: String,
    pub source: String,
    pub sentiment_score: Option<f64>,
    pub sentiment_label: SentimentLabel,
    pub feedback_date: String,
    pub ai_category_confidence: Option<f64>,
}

impl FeedbackRecord {
    /// Calendar day of the feedback, taken verbatim from the supplied value.
    pub fn date(&self) -> Option<NaiveDate> {
        parse_feedback_date(&self.feedback_date)
    }

    /// Sentiment score, when present, finite and within `[0, 1]`.
    pub fn sentiment(&self) -> Option<f64> {
        self.sentiment_score
            .filter(|score| score.is_finite() && (0.0..=1.0).contains(score))
    }

    pub fn ai_confidence(&self) -> Option<f64> {
        self.ai_category_confidence
            .filter(|score| score.is_finite() && (0.0..=1.0).contains(score))
    }

    pub fn content_length(&self) -> usize {
        self.content.chars().count()
    }

    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }

    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }
}

pub fn parse_feedback_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.date_naive());
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|timestamp| timestamp.date())
}

/// Inclusive calendar window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TimeRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn record(date: &str, category: &str, sentiment: Option<f64>) -> FeedbackRecord {
        let label = match sentiment {
            Some(score) if score >= 0.6 => SentimentLabel::Positive,
            Some(score) if score < 0.4 => SentimentLabel::Negative,
            _ => SentimentLabel::Neutral,
        };
        FeedbackRecord {
            id: Uuid::new_v4(),
            content: format!("Feedback about {category}"),
            category: category.to_string(),
            source: "email".to_string(),
            sentiment_score: sentiment,
            sentiment_label: label,
            feedback_date: date.to_string(),
            ai_category_confidence: Some(0.8),
        }
    }

    /// `counts[i]` records on the i-th day after `start`.
    pub fn daily_series(start: NaiveDate, counts: &[usize]) -> Vec<FeedbackRecord> {
        counts
            .iter()
            .enumerate()
            .flat_map(|(offset, count)| {
                let date = start + chrono::Duration::days(offset as i64);
                (0..*count).map(move |i| {
                    let sentiment = if i % 3 == 0 { 0.3 } else { 0.75 };
                    let category = if i % 2 == 0 { "billing" } else { "support" };
                    record(&date.to_string(), category, Some(sentiment))
                })
            })
            .collect()
    }
}
