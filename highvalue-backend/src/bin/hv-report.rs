//! One-shot high-value report.
//!
//! Reads the same environment as the server, runs a single report and prints
//! it to stdout:
//! ```bash
//! cargo run --bin hv-report -- --segment dormant --threshold-days 30 --format html > report.html
//! ```

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use highvalue_backend::analysis;
use highvalue_backend::config::Config;
use highvalue_backend::database::{MySqlStore, PoolProvider};
use highvalue_backend::models::{ReportFormat, SegmentSelection};
use highvalue_backend::render::render;
use highvalue_backend::segmentation::{SegmentationCriteria, DEFAULT_MIN_NET_BET, MAX_LIMIT};
use highvalue_backend::store::ActivityStore;
use tracing::info;

#[derive(Clone, Copy, ValueEnum)]
enum Segment {
    Active,
    Dormant,
    All,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Html,
}

#[derive(Parser)]
#[command(name = "hv-report")]
#[command(version, about = "Print a high-value user report", long_about = None)]
struct Cli {
    /// Minimum summed net bet
    #[arg(long, default_value_t = DEFAULT_MIN_NET_BET)]
    min_net_bet: f64,

    /// Inactivity threshold in days (defaults to SEGMENT_THRESHOLD_DAYS)
    #[arg(long)]
    threshold_days: Option<u32>,

    #[arg(long, value_enum, default_value_t = Segment::All)]
    segment: Segment,

    /// Rows in the report, shared across segments
    #[arg(long, default_value_t = 10)]
    limit: u32,

    /// Include event-effect analysis
    #[arg(long)]
    details: bool,

    /// Event lookback window in days
    #[arg(long, default_value_t = 90)]
    event_days: u32,

    #[arg(long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Reference date, YYYY-MM-DD (defaults to the database's CURRENT_DATE)
    #[arg(long)]
    date: Option<NaiveDate>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout stays a clean report
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("highvalue_backend=warn".parse()?)
                .add_directive("sqlx=warn".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("loading database configuration")?;

    info!("Running report against {}", config.database.redacted_url());

    let store = MySqlStore::new(PoolProvider::new(&config.database));
    let mut conn = store.acquire().await?;
    let reference_date = match cli.date {
        Some(date) => date,
        None => conn.current_date().await?,
    };

    let mut criteria = SegmentationCriteria::new(
        cli.threshold_days.unwrap_or(config.default_threshold_days),
        reference_date,
    );
    criteria.selection = match cli.segment {
        Segment::Active => SegmentSelection::Active,
        Segment::Dormant => SegmentSelection::Dormant,
        Segment::All => SegmentSelection::All,
    };
    if cli.min_net_bet.is_finite() && cli.min_net_bet >= 0.0 {
        criteria.min_net_bet = cli.min_net_bet;
    }
    criteria.limit = cli.limit.clamp(1, MAX_LIMIT);
    criteria.show_details = cli.details;
    criteria.event_lookback_days = cli.event_days;
    criteria.format = match cli.format {
        Format::Json => ReportFormat::Json,
        Format::Html => ReportFormat::Html,
    };

    let outcome = analysis::analyze(conn.as_mut(), &criteria).await;
    drop(conn);

    let rendered = render(&outcome?, criteria.format)?;
    println!("{}", rendered.body);
    Ok(())
}
