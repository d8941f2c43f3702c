//! CLI entry point for the bus disruption cost estimator.
//!
//! Provides subcommands for estimating the hourly cost of live disruptions,
//! snapshotting the live feeds into the local store, and inspecting the store.

use anyhow::Result;
use bus_disruption_cost::analyzers::analyzer::run_pipeline;
use bus_disruption_cost::infra::config::{AppConfig, parse_delay_override};
use bus_disruption_cost::infra::fallback::WithFallback;
use bus_disruption_cost::infra::sample::SampleDirectory;
use bus_disruption_cost::infra::tfl::TflClient;
use bus_disruption_cost::ingest::{COSTS_TABLE, ingest, show};
use bus_disruption_cost::output::{append_records, log_cost_table, log_headways, log_summary, print_json};
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "bus_disruption_cost")]
#[command(about = "Estimate the hourly cost of live bus disruptions", long_about = None)]
struct Cli {
    /// JSON cost-model config (falls back to COST_CONFIG, then built-in defaults)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Directory for stored tables and raw snapshots
    #[arg(long, global = true, env = "STORE_DIR", default_value = "data")]
    store_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate the hourly cost of current disruptions per line and severity
    Estimate {
        /// Read only from saved snapshots in this directory, never the live API
        #[arg(long, value_name = "DIR", conflicts_with = "sample_dir")]
        offline: Option<PathBuf>,

        /// Fall back to saved snapshots in this directory when the live API fails
        #[arg(long, value_name = "DIR")]
        sample_dir: Option<PathBuf>,

        /// Lines to estimate headways for (defaults to the configured watchlist)
        #[arg(short, long, value_delimiter = ',')]
        lines: Vec<String>,

        /// Maximum number of concurrent arrival requests
        #[arg(long, default_value_t = 4)]
        concurrency: usize,

        /// Override the cost per bus-minute (GBP)
        #[arg(long)]
        cost_per_minute: Option<f64>,

        /// Override a severity's delay per bus, e.g. --delay Severe=12
        #[arg(long = "delay", value_name = "SEVERITY=MINUTES", value_parser = parse_delay_override)]
        delays: Vec<(String, f64)>,

        /// Print the cost rows as JSON on stdout
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Append the cost rows to the store
        #[arg(long, default_value_t = false)]
        store: bool,
    },
    /// Snapshot live disruptions and watchlist arrivals into the store
    Ingest {
        /// Lines to save arrivals for (defaults to the configured watchlist)
        #[arg(short, long, value_delimiter = ',')]
        lines: Vec<String>,

        /// Gzip the raw disruptions snapshot
        #[arg(long, default_value_t = false)]
        gzip: bool,
    },
    /// Summarize what the store holds
    Show {
        /// Number of cost rows to list
        #[arg(short = 'n', long, default_value_t = 10)]
        top: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/bus_disruption_cost.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("bus_disruption_cost.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Estimate {
            offline,
            sample_dir,
            lines,
            concurrency,
            cost_per_minute,
            delays,
            json,
            store,
        } => {
            let config = config.with_overrides(cost_per_minute, &delays)?;
            let watchlist = watchlist_or_default(lines, &config);

            let output = match (offline, sample_dir) {
                (Some(dir), _) => {
                    info!(dir = %dir.display(), "Offline mode");
                    run_pipeline(Arc::new(SampleDirectory::new(dir)), &config, &watchlist, concurrency)
                        .await?
                }
                (None, Some(dir)) => {
                    let api = WithFallback::new(TflClient::from_env()?, SampleDirectory::new(dir));
                    run_pipeline(Arc::new(api), &config, &watchlist, concurrency).await?
                }
                (None, None) => {
                    run_pipeline(Arc::new(TflClient::from_env()?), &config, &watchlist, concurrency)
                        .await?
                }
            };

            log_headways(&output.headways);
            log_cost_table(&output.costs);
            log_summary(&output.summary);

            if json {
                print_json(&output.costs)?;
            }
            if store {
                let path = cli.store_dir.join(COSTS_TABLE);
                append_records(&path, &output.costs)?;
                info!(path = %path.display(), rows = output.costs.len(), "Cost rows stored");
            }
        }
        Commands::Ingest { lines, gzip } => {
            let watchlist = watchlist_or_default(lines, &config);
            let api = TflClient::from_env()?;
            ingest(&api, &cli.store_dir, &watchlist, gzip).await?;
        }
        Commands::Show { top } => {
            show(&cli.store_dir, top)?;
        }
    }

    Ok(())
}

fn watchlist_or_default(lines: Vec<String>, config: &AppConfig) -> Vec<String> {
    if lines.is_empty() {
        config.watchlist.default_lines.clone()
    } else {
        lines
    }
}
