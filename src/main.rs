use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use clap::{ArgGroup, Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use feedback_analytics::{
    db, report, AnalysisDepth, AnalyticsCoordinator, AnalyticsOptions, EngineConfig,
    FeedbackRecord, TimeRange,
};

#[derive(Parser)]
#[command(name = "feedback-analytics")]
#[command(about = "Statistics, trends and forecasts for customer feedback", long_about = None)]
struct Cli {
    /// JSON engine configuration; missing keys keep their defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the full analytics report as JSON
    Analyze {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[derive(Args)]
#[command(group(
    ArgGroup::new("source")
        .args(["csv", "json", "database"])
        .required(true)
        .multiple(false)
))]
struct InputArgs {
    #[arg(long)]
    csv: Option<PathBuf>,
    #[arg(long)]
    json: Option<PathBuf>,
    /// Read from Postgres at DATABASE_URL
    #[arg(long)]
    database: bool,
    /// Project filter for the database source
    #[arg(long, requires = "database")]
    project: Option<String>,
    #[arg(long, default_value = "standard")]
    depth: AnalysisDepth,
    #[arg(long)]
    start: Option<NaiveDate>,
    #[arg(long)]
    end: Option<NaiveDate>,
    #[arg(long)]
    no_trends: bool,
    #[arg(long)]
    no_predictive: bool,
    #[arg(long, default_value_t = 0.7)]
    confidence_threshold: f64,
    #[arg(long, default_value_t = 100_000)]
    max_data_points: usize,
}

impl InputArgs {
    fn time_range(&self) -> anyhow::Result<Option<TimeRange>> {
        match (self.start, self.end) {
            (None, None) => Ok(None),
            (Some(start), Some(end)) => Ok(Some(TimeRange::new(start, end))),
            _ => anyhow::bail!("--start and --end must be given together"),
        }
    }

    fn options(&self) -> anyhow::Result<AnalyticsOptions> {
        Ok(AnalyticsOptions {
            analysis_depth: self.depth,
            enable_predictive_insights: !self.no_predictive,
            enable_trend_analysis: !self.no_trends,
            enable_ai_insights: false,
            confidence_threshold: self.confidence_threshold,
            max_data_points: self.max_data_points,
            time_range: self.time_range()?,
        })
    }

    async fn load(&self) -> anyhow::Result<Vec<FeedbackRecord>> {
        if let Some(path) = &self.csv {
            return db::load_csv(path)
                .with_context(|| format!("failed to read {}", path.display()));
        }
        if let Some(path) = &self.json {
            return db::load_json(path)
                .with_context(|| format!("failed to read {}", path.display()));
        }

        let database_url = std::env::var("DATABASE_URL")
            .context("DATABASE_URL must be set to read feedback from Postgres")?;
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await
            .context("failed to connect to Postgres")?;
        let range = self.time_range()?;
        let records = db::fetch_feedback(&pool, self.project.as_deref(), range.as_ref())
            .await
            .context("failed to fetch feedback")?;
        Ok(records)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::from_path(path)
            .with_context(|| format!("invalid config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let coordinator = AnalyticsCoordinator::new(config)?;

    match cli.command {
        Commands::Analyze { input, out } => {
            let records = input.load().await?;
            let analysis = coordinator
                .generate_report(&records, &input.options()?)
                .await?;
            let json = serde_json::to_string_pretty(analysis.as_ref())?;
            match out {
                Some(path) => {
                    write_output(&path, &json)?;
                    println!("Analysis written to {}.", path.display());
                }
                None => println!("{json}"),
            }
        }
        Commands::Report { input, out } => {
            let records = input.load().await?;
            let analysis = coordinator
                .generate_report(&records, &input.options()?)
                .await?;
            let markdown = report::build_report(&analysis, input.project.as_deref());
            write_output(&out, &markdown)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

fn write_output(path: &Path, contents: &str) -> anyhow::Result<()> {
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}
