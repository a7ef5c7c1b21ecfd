//! CLI entry point for the drivewatch engine.
//!
//! Provides subcommands for running harsh-driving detection over one
//! vehicle or a whole fleet, and for querying derived analytics from the
//! CSV-backed stores.

use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use drivewatch::analytics::AnalyticsAggregator;
use drivewatch::config::EngineConfig;
use drivewatch::detection::{BatchDetector, VehicleRef, run_fleet};
use drivewatch::output::print_json;
use drivewatch::store::{CsvEventStore, CsvTelemetryStore, EventFilter, EventStore, TelemetryStore};

#[derive(Parser)]
#[command(name = "drivewatch")]
#[command(about = "Driving behavior detection and analytics over GPS telemetry", long_about = None)]
struct Cli {
    /// Data root holding vehicle_id=<id>/ partitions
    #[arg(short, long, default_value = "data", global = true)]
    data_dir: String,

    /// Optional JSON config file overriding detection/analytics tunables
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect harsh-driving events for one vehicle
    Detect {
        #[arg(long)]
        vehicle_id: i64,

        #[arg(long)]
        garage_no: String,

        /// Day to detect over (YYYY-MM-DD), full day window
        #[arg(long, conflicts_with_all = ["start", "end"])]
        date: Option<NaiveDate>,

        /// Window start (RFC 3339)
        #[arg(long, requires = "end")]
        start: Option<DateTime<Utc>>,

        /// Window end (RFC 3339)
        #[arg(long, requires = "start")]
        end: Option<DateTime<Utc>>,
    },
    /// Detect for every vehicle with telemetry in the window
    DetectFleet {
        /// Day to detect over (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Sweep this many days back from today instead of one date
        #[arg(long, default_value_t = 1)]
        last_days: u64,

        /// Maximum number of concurrent vehicle detections
        #[arg(long, default_value_t = 5)]
        concurrency: usize,
    },
    /// Analytics summary for one vehicle
    Summary {
        #[arg(long)]
        vehicle_id: i64,

        #[arg(long)]
        start: DateTime<Utc>,

        #[arg(long)]
        end: DateTime<Utc>,
    },
    /// Event-side statistics (counts, g-forces, safety score)
    Stats {
        #[arg(long)]
        vehicle_id: i64,

        #[arg(long)]
        start: DateTime<Utc>,

        #[arg(long)]
        end: DateTime<Utc>,
    },
    /// List stored events, paged
    Events {
        #[arg(long)]
        vehicle_id: i64,

        #[arg(long)]
        start: DateTime<Utc>,

        #[arg(long)]
        end: DateTime<Utc>,

        /// normal | moderate | severe
        #[arg(long)]
        severity: Option<String>,

        /// acceleration | braking (or the stored harsh_* form)
        #[arg(long)]
        event_type: Option<String>,

        #[arg(long, default_value_t = 1)]
        page: usize,

        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Sampled chart series with coincident events
    Chart {
        #[arg(long)]
        vehicle_id: i64,

        #[arg(long)]
        start: DateTime<Utc>,

        #[arg(long)]
        end: DateTime<Utc>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/drivewatch.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("drivewatch.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(
            EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        );

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(
            EnvFilter::try_from_env("RUST_LOG_JSON").unwrap_or_else(|_| EnvFilter::new("debug")),
        );

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let engine_config = load_config(cli.config.as_deref())?;
    let telemetry = Arc::new(CsvTelemetryStore::new(&cli.data_dir));
    let events = Arc::new(CsvEventStore::new(&cli.data_dir));

    match cli.command {
        Commands::Detect {
            vehicle_id,
            garage_no,
            date,
            start,
            end,
        } => {
            let (start, end) = resolve_window(date, start, end)?;
            let detector =
                BatchDetector::new(telemetry.clone(), events.clone(), engine_config.detection)?;
            let result = detector.detect(vehicle_id, &garage_no, start, end).await?;
            print_json(&result)?;
        }
        Commands::DetectFleet {
            date,
            last_days,
            concurrency,
        } => {
            let detector = Arc::new(BatchDetector::new(
                telemetry.clone(),
                events.clone(),
                engine_config.detection,
            )?);

            for day in fleet_dates(date, last_days)? {
                let (start, end) = day_window(day)?;
                info!(date = %day, "Starting fleet detection");

                let vehicles = discover_vehicles(telemetry.as_ref(), start, end).await?;
                if vehicles.is_empty() {
                    info!(date = %day, "No vehicles with telemetry in window");
                    continue;
                }

                let report = run_fleet(detector.clone(), vehicles, start, end, concurrency).await;
                print_json(&report)?;
            }
        }
        Commands::Summary {
            vehicle_id,
            start,
            end,
        } => {
            let aggregator = AnalyticsAggregator::new(
                telemetry.clone(),
                events.clone(),
                engine_config.analytics,
            )?;
            let summary = aggregator.summarize(vehicle_id, start, end).await?;
            print_json(&summary)?;
        }
        Commands::Stats {
            vehicle_id,
            start,
            end,
        } => {
            let aggregator = AnalyticsAggregator::new(
                telemetry.clone(),
                events.clone(),
                engine_config.analytics,
            )?;
            let stats = aggregator.event_statistics(vehicle_id, start, end).await?;
            print_json(&stats)?;
        }
        Commands::Events {
            vehicle_id,
            start,
            end,
            severity,
            event_type,
            page,
            limit,
        } => {
            let filter = EventFilter::parse(severity.as_deref(), event_type.as_deref())?;
            let events_page = events
                .list_events(vehicle_id, start, end, &filter, page, limit)
                .await?;
            print_json(&events_page)?;
        }
        Commands::Chart {
            vehicle_id,
            start,
            end,
        } => {
            let aggregator = AnalyticsAggregator::new(
                telemetry.clone(),
                events.clone(),
                engine_config.analytics,
            )?;
            let chart = aggregator.chart_data(vehicle_id, start, end).await?;
            print_json(&chart)?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&str>) -> Result<EngineConfig> {
    let config: EngineConfig = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {path}"))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing config file {path}"))?
        }
        None => EngineConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Full-day window for a calendar date.
fn day_window(date: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let start = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).context("invalid date")?);
    let end = Utc.from_utc_datetime(&date.and_hms_opt(23, 59, 59).context("invalid date")?);
    Ok((start, end))
}

fn resolve_window(
    date: Option<NaiveDate>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    match (date, start, end) {
        (Some(date), None, None) => day_window(date),
        (None, Some(start), Some(end)) => Ok((start, end)),
        _ => bail!("provide either --date or both --start and --end"),
    }
}

/// Dates to sweep: the given date, or the last N days ending today.
fn fleet_dates(date: Option<NaiveDate>, last_days: u64) -> Result<Vec<NaiveDate>> {
    if let Some(date) = date {
        return Ok(vec![date]);
    }
    let today = Utc::now().date_naive();
    (0..last_days.max(1))
        .map(|i| {
            today
                .checked_sub_days(Days::new(i))
                .context("date out of range")
        })
        .collect()
}

/// Finds every vehicle with telemetry in the window, taking its garage
/// number from the first point seen.
async fn discover_vehicles(
    store: &CsvTelemetryStore,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<VehicleRef>> {
    let mut vehicles = Vec::new();
    for vehicle_id in store.vehicle_ids()? {
        let points = store.fetch_telemetry(vehicle_id, start, end).await?;
        if let Some(first) = points.first() {
            vehicles.push(VehicleRef {
                vehicle_id,
                garage_no: first.garage_no.clone(),
            });
        }
    }
    info!(
        vehicle_count = vehicles.len(),
        "Discovered vehicles with telemetry"
    );
    Ok(vehicles)
}
