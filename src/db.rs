//! Feedback sources: Postgres, CSV files and JSON arrays.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::{AnalyticsError, Result};
use crate::models::{FeedbackRecord, SentimentLabel, TimeRange};

pub async fn fetch_feedback(
    pool: &PgPool,
    project: Option<&str>,
    range: Option<&TimeRange>,
) -> Result<Vec<FeedbackRecord>> {
    let mut query = String::from(
        "SELECT f.id, f.content, f.category, f.source, f.sentiment_score, \
         f.sentiment_label, f.feedback_date::text AS feedback_date, f.ai_category_confidence \
         FROM feedback_analytics.feedback f \
         WHERE TRUE",
    );

    let mut placeholder = 0;
    let mut next = || {
        placeholder += 1;
        placeholder
    };
    if project.is_some() {
        query.push_str(&format!(" AND f.project_id = ${}", next()));
    }
    if range.is_some() {
        query.push_str(&format!(
            " AND f.feedback_date::date BETWEEN ${} AND ${}",
            next(),
            next()
        ));
    }
    query.push_str(" ORDER BY f.feedback_date");

    let mut rows = sqlx::query(&query);
    if let Some(value) = project {
        rows = rows.bind(value);
    }
    if let Some(window) = range {
        rows = rows.bind(window.start).bind(window.end);
    }

    let mut records = Vec::new();
    for row in rows.fetch_all(pool).await? {
        let sentiment_score: Option<f64> = row.try_get("sentiment_score")?;
        let label: Option<String> = row.try_get("sentiment_label")?;
        records.push(FeedbackRecord {
            id: row.try_get("id")?,
            content: row.try_get("content")?,
            category: row.try_get("category")?,
            source: row.try_get("source")?,
            sentiment_score,
            sentiment_label: resolve_label(label.as_deref(), sentiment_score)?,
            feedback_date: row.try_get("feedback_date")?,
            ai_category_confidence: row.try_get("ai_category_confidence")?,
        });
    }

    Ok(records)
}

/// Input row shared by the CSV and JSON loaders.
#[derive(Debug, Deserialize)]
struct FeedbackRow {
    id: Option<Uuid>,
    content: String,
    category: String,
    source: String,
    sentiment_score: Option<f64>,
    sentiment_label: Option<String>,
    feedback_date: String,
    ai_category_confidence: Option<f64>,
}

impl FeedbackRow {
    fn into_record(self) -> Result<FeedbackRecord> {
        Ok(FeedbackRecord {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            sentiment_label: resolve_label(self.sentiment_label.as_deref(), self.sentiment_score)?,
            content: self.content,
            category: self.category,
            source: self.source,
            sentiment_score: self.sentiment_score,
            feedback_date: self.feedback_date,
            ai_category_confidence: self.ai_category_confidence,
        })
    }
}

/// Explicit labels win; otherwise the label follows the score.
fn resolve_label(label: Option<&str>, score: Option<f64>) -> Result<SentimentLabel> {
    match label.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => value.parse().map_err(AnalyticsError::Validation),
        None => Ok(match score {
            Some(s) if s >= 0.6 => SentimentLabel::Positive,
            Some(s) if s < 0.4 => SentimentLabel::Negative,
            _ => SentimentLabel::Neutral,
        }),
    }
}

pub fn load_csv(path: &Path) -> Result<Vec<FeedbackRecord>> {
    read_csv(std::fs::File::open(path)?)
}

pub fn read_csv<R: Read>(input: R) -> Result<Vec<FeedbackRecord>> {
    let mut reader = csv::Reader::from_reader(input);
    let mut records = Vec::new();
    for result in reader.deserialize::<FeedbackRow>() {
        records.push(result?.into_record()?);
    }
    Ok(records)
}

pub fn load_json(path: &Path) -> Result<Vec<FeedbackRecord>> {
    parse_json(&std::fs::read_to_string(path)?)
}

/// Parse a JSON array of feedback objects; any other JSON value is rejected.
pub fn parse_json(raw: &str) -> Result<Vec<FeedbackRecord>> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    let serde_json::Value::Array(items) = value else {
        return Err(AnalyticsError::Validation(
            "expected a JSON array of feedback records".to_string(),
        ));
    };
    items
        .into_iter()
        .map(|item| serde_json::from_value::<FeedbackRow>(item)?.into_record())
        .collect()
}
