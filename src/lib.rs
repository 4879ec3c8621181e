//! Analytics engine for customer feedback: descriptive statistics, volume
//! and sentiment trends, forecasts and risk, stitched into one cached report.

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod db;
pub mod error;
pub mod forecast;
pub mod math;
pub mod metrics;
pub mod models;
pub mod narrative;
pub mod opportunity;
pub mod predictive;
pub mod report;
pub mod risk;
pub mod scenario;
pub mod statistics;
pub mod timeseries;
pub mod trend;

pub use config::{AnalysisDepth, AnalyticsOptions, EngineConfig};
pub use coordinator::{AnalyticsCaches, AnalyticsCoordinator, CompositeReport};
pub use error::{AnalyticsError, Result};
pub use models::{FeedbackRecord, SentimentLabel, TimeRange};
pub use narrative::{NarrativeDraft, NarrativeGenerator, NarrativeInsights, NarrativeSummary};
pub use predictive::{PredictiveInsights, PredictiveReport};
pub use statistics::{StatisticalAnalyzer, StatisticalReport};
pub use trend::{TrendAnalyzer, TrendReport};
