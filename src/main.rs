//! CLI entry point for the NYC congestion pricing audit pipeline.
//!
//! Provides subcommands for downloading monthly TLC trip files, running the
//! full transformation (unify, ghost-filter, enrich, aggregate, dashboard
//! tables), and rebuilding dashboard views from previously written KPI CSVs.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use congestion_audit::aggregate::{monthly_kpis, top_leakage_zones, velocity_heatmap, zone_kpis};
use congestion_audit::config::PipelineConfig;
use congestion_audit::congestion::enrich_trips;
use congestion_audit::dashboard::{leakage_view, load_kpi_rows, monthly_trend, zone_activity};
use congestion_audit::fetch::{
    BasicClient, TLC_BASE_URL, ZONE_LOOKUP_URL, download_if_missing, tripdata_url,
};
use congestion_audit::ghost::filter_ghost_trips;
use congestion_audit::output::{append_record, print_json, write_table};
use congestion_audit::schema::unify_sources;
use congestion_audit::sources::read_all_sources;

#[derive(Parser)]
#[command(name = "congestion_audit")]
#[command(about = "NYC taxi congestion pricing audit pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download monthly TLC trip files into the data directory
    Fetch {
        /// Months to download, as YYYY-MM (e.g. 2025-01)
        #[arg(value_name = "MONTH", required = true)]
        months: Vec<String>,

        /// Directory to cache raw trip files in
        #[arg(short, long, default_value = "data")]
        data_dir: String,

        /// Taxi-type file prefixes to download
        #[arg(short, long, default_values_t = ["yellow".to_string(), "green".to_string(), "fhvhv".to_string()])]
        taxi_types: Vec<String>,

        /// Base URL for trip files (override for mirrors)
        #[arg(long, default_value = TLC_BASE_URL)]
        base_url: String,
    },
    /// Run the full pipeline over the local data directory
    Run {
        /// Directory containing raw trip files
        #[arg(short, long, default_value = "data")]
        data_dir: String,

        /// Directory to write KPI and dashboard tables to
        #[arg(short, long, default_value = "out")]
        out_dir: String,

        /// Optional JSON config with thresholds and zone set
        #[arg(short, long)]
        config: Option<String>,

        /// Optional taxi_zone_lookup.csv to derive the congestion zone from
        #[arg(short, long)]
        zone_lookup: Option<String>,

        /// How many zones to keep in the top-leakage table
        #[arg(long, default_value_t = 10)]
        top_leakage: usize,
    },
    /// Rebuild dashboard views from previously written KPI CSVs
    Views {
        /// Directory holding monthly_kpis.csv and zone_kpis.csv
        #[arg(short, long, default_value = "out")]
        out_dir: String,

        /// How many zones to keep in the top-leakage table
        #[arg(long, default_value_t = 10)]
        top_leakage: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/congestion_audit.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("congestion_audit.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch {
            months,
            data_dir,
            taxi_types,
            base_url,
        } => {
            fetch_months(&months, &data_dir, &taxi_types, &base_url).await?;
        }
        Commands::Run {
            data_dir,
            out_dir,
            config,
            zone_lookup,
            top_leakage,
        } => {
            let mut pipeline_config = match config {
                Some(path) => PipelineConfig::load(&path)
                    .with_context(|| format!("loading config from {path}"))?,
                None => PipelineConfig::default(),
            };
            if let Some(lookup) = zone_lookup {
                pipeline_config = pipeline_config
                    .with_zone_lookup(&lookup)
                    .with_context(|| format!("deriving congestion zone from {lookup}"))?;
            }

            if let Err(e) = run_pipeline(&data_dir, &out_dir, &pipeline_config, top_leakage) {
                error!(error = %e, "Pipeline aborted");
                return Err(e);
            }
        }
        Commands::Views {
            out_dir,
            top_leakage,
        } => {
            rebuild_views(&out_dir, top_leakage)?;
        }
    }

    Ok(())
}

fn parse_month(month: &str) -> Result<(i32, u32)> {
    let Some((year, month)) = month.split_once('-') else {
        bail!("month must be YYYY-MM, got '{month}'");
    };
    let year: i32 = year.parse().with_context(|| format!("bad year in '{year}'"))?;
    let month: u32 = month
        .parse()
        .with_context(|| format!("bad month in '{month}'"))?;
    if !(1..=12).contains(&month) {
        bail!("month out of range: {month}");
    }
    Ok((year, month))
}

/// Downloads every requested month for every taxi type, plus the zone lookup
/// table. Already-cached files are skipped.
#[tracing::instrument(skip(months, taxi_types), fields(data_dir))]
async fn fetch_months(
    months: &[String],
    data_dir: &str,
    taxi_types: &[String],
    base_url: &str,
) -> Result<()> {
    let client = BasicClient::new();

    for month in months {
        let (year, month_num) = parse_month(month)?;
        for prefix in taxi_types {
            let url = tripdata_url(base_url, prefix, year, month_num);
            download_if_missing(&client, &url, data_dir).await?;
        }
    }

    download_if_missing(&client, ZONE_LOOKUP_URL, data_dir).await?;

    info!(data_dir, months = months.len(), "Fetch complete");
    Ok(())
}

/// Runs the batch transformation end to end and writes every output table.
/// Each stage consumes the previous stage's full output; a structural error
/// aborts before any dashboard table is written.
#[tracing::instrument(skip(config), fields(data_dir, out_dir))]
fn run_pipeline(
    data_dir: &str,
    out_dir: &str,
    config: &PipelineConfig,
    top_leakage: usize,
) -> Result<()> {
    let sources = read_all_sources(data_dir)?;

    let unified = unify_sources(sources);
    info!(rows = unified.len(), "Schema unification complete");

    let (clean, audit) = filter_ghost_trips(unified, config);
    let enriched = enrich_trips(clean, config);

    let monthly = monthly_kpis(&enriched);
    let zones = zone_kpis(&enriched);
    let heatmap = velocity_heatmap(&enriched);
    let top_zones = top_leakage_zones(&zones, top_leakage);

    std::fs::create_dir_all(out_dir)?;
    let path = |name: &str| format!("{out_dir}/{name}");

    // KPI tables
    write_table(&path("monthly_kpis.csv"), &monthly)?;
    write_table(&path("zone_kpis.csv"), &zones)?;
    write_table(&path("velocity_heatmap.csv"), &heatmap)?;
    write_table(&path("top_leakage_zones.csv"), &top_zones)?;

    // Dashboard views
    write_table(&path("dashboard_monthly_trend.csv"), &monthly_trend(&monthly))?;
    write_table(&path("dashboard_zone_activity.csv"), &zone_activity(&zones))?;
    write_table(&path("dashboard_leakage.csv"), &leakage_view(&monthly))?;

    // Ghost-trip audit: one log row per run, plus a JSON echo
    append_record(&path("ghost_audit_log.csv"), &audit)?;
    print_json(&audit)?;

    info!(
        out_dir,
        surviving = enriched.len(),
        removed = audit.removed,
        months = monthly.len(),
        "Pipeline complete"
    );
    Ok(())
}

/// Rebuilds the dashboard view tables from KPI CSVs written by a previous
/// run. Fails with a MissingColumn error if a KPI file lost a column.
#[tracing::instrument(fields(out_dir))]
fn rebuild_views(out_dir: &str, top_leakage: usize) -> Result<()> {
    let path = |name: &str| format!("{out_dir}/{name}");

    let monthly = load_kpi_rows(&path("monthly_kpis.csv"))?;
    let zones = load_kpi_rows(&path("zone_kpis.csv"))?;

    write_table(&path("dashboard_monthly_trend.csv"), &monthly_trend(&monthly))?;
    write_table(&path("dashboard_zone_activity.csv"), &zone_activity(&zones))?;
    write_table(&path("dashboard_leakage.csv"), &leakage_view(&monthly))?;
    write_table(
        &path("top_leakage_zones.csv"),
        &top_leakage_zones(&zones, top_leakage),
    )?;

    info!(out_dir, "Dashboard views rebuilt");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_month() {
        assert_eq!(parse_month("2025-01").unwrap(), (2025, 1));
        assert_eq!(parse_month("2024-12").unwrap(), (2024, 12));
        assert!(parse_month("2025-13").is_err());
        assert!(parse_month("january").is_err());
    }
}
