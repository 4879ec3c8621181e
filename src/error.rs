use thiserror::Error;

/// Errors surfaced by the analytics engine.
///
/// Insufficient data is never an error here: analyzers return a report variant
/// naming the shortfall instead.
#[derive(Error, Debug)]
pub enum AnalyticsError {
    /// Input rejected before any analysis ran
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Invalid configuration or option value
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// The narrative generator reported a failure
    #[error("Narrative generator failed: {0}")]
    Narrative(String),

    /// The narrative generator did not answer in time
    #[error("Narrative generator timed out after {0} ms")]
    Timeout(u64),

    /// A blocking analysis task panicked or was cancelled
    #[error("Analysis task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
