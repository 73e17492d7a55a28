use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;

use hostwatch::alerts::{self, JsonStdoutSink};
use hostwatch::catalog::RuleGroup;
use hostwatch::model::{AuthLogRecord, LogRecord, TelemetrySample};
use hostwatch::query::{AuthLogFilter, LogFilter, PageRequest, QueryEngine};
use hostwatch::series::{SeriesKeying, TimeRange};
use hostwatch::storage::MemoryStore;

#[derive(Parser)]
#[command(
    name = "hostwatch",
    about = "Event correlation and rule-matching engine for multi-host log monitoring",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query system logs with filtering, pagination, and session pairing
    Query {
        /// JSON file holding an array of log records
        #[arg(long)]
        logs: PathBuf,

        /// JSON file holding an array of rule groups
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Free-text search over name, user, and command
        #[arg(long)]
        search: Option<String>,

        /// Host filter (repeatable)
        #[arg(long = "host")]
        hosts: Vec<String>,

        /// Action filter (repeatable)
        #[arg(long = "action")]
        actions: Vec<String>,

        /// Rule-group id filter (repeatable)
        #[arg(long = "rule-group")]
        rule_groups: Vec<i64>,

        /// Rule id filter (repeatable)
        #[arg(long = "rule")]
        rules: Vec<i64>,

        /// Minimum CPU percentage
        #[arg(long)]
        cpu_threshold: Option<f64>,

        /// Minimum memory percentage
        #[arg(long)]
        mem_threshold: Option<f64>,

        #[arg(long, default_value = "1")]
        page: usize,

        #[arg(long, default_value = "10")]
        page_size: usize,
    },

    /// Query auth logs with filtering and pagination
    AuthQuery {
        /// JSON file holding an array of auth log records
        #[arg(long)]
        logs: PathBuf,

        /// Free-text search over username and the raw entry
        #[arg(long)]
        search: Option<String>,

        /// Host filter, substring-matched against the raw entry (repeatable)
        #[arg(long = "host")]
        hosts: Vec<String>,

        #[arg(long, default_value = "1")]
        page: usize,

        #[arg(long, default_value = "10")]
        page_size: usize,
    },

    /// Downsample telemetry into chart buckets
    Chart {
        /// JSON file holding an array of telemetry samples
        #[arg(long)]
        telemetry: PathBuf,

        /// Time range: 1h, 6h, 24h, or 7d
        #[arg(long, default_value = "24h")]
        range: String,

        /// Only this metric name
        #[arg(long)]
        metric: Option<String>,

        /// Key series by host|metric instead of host alone
        #[arg(long)]
        per_metric: bool,
    },

    /// Downsample per-host CPU/memory readings carried on system logs
    Usage {
        /// JSON file holding an array of log records
        #[arg(long)]
        logs: PathBuf,

        /// Time range: 1h, 6h, 24h, or 7d
        #[arg(long, default_value = "24h")]
        range: String,
    },

    /// Run the command matcher over a page of logs and route notifications
    Scan {
        /// JSON file holding an array of log records
        #[arg(long)]
        logs: PathBuf,

        /// JSON file holding an array of rule groups
        #[arg(long)]
        catalog: PathBuf,

        /// Treat the log file as auth logs instead of system logs
        #[arg(long)]
        auth: bool,

        #[arg(long, default_value = "1")]
        page: usize,

        #[arg(long, default_value = "1000")]
        page_size: usize,
    },
}

fn load_json<T: serde::de::DeserializeOwned>(path: &PathBuf, what: &str) -> Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading {} file {}", what, path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {} file {}", what, path.display()))
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Query {
            logs,
            catalog,
            search,
            hosts,
            actions,
            rule_groups,
            rules,
            cpu_threshold,
            mem_threshold,
            page,
            page_size,
        } => {
            let records: Vec<LogRecord> = load_json(&logs, "log")?;
            let groups: Vec<RuleGroup> = match catalog {
                Some(path) => load_json(&path, "catalog")?,
                None => Vec::new(),
            };
            let engine =
                QueryEngine::new(MemoryStore::new().with_logs(records).with_catalog(groups));
            let filter = LogFilter {
                search,
                hosts,
                actions,
                rule_groups,
                rules,
                cpu_threshold,
                mem_threshold,
            };
            let result = engine.logs(&filter, PageRequest::new(page, page_size))?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::AuthQuery {
            logs,
            search,
            hosts,
            page,
            page_size,
        } => {
            let records: Vec<AuthLogRecord> = load_json(&logs, "auth log")?;
            let engine = QueryEngine::new(MemoryStore::new().with_auth_logs(records));
            let filter = AuthLogFilter { search, hosts };
            let result = engine.auth_logs(&filter, PageRequest::new(page, page_size))?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Chart {
            telemetry,
            range,
            metric,
            per_metric,
        } => {
            let samples: Vec<TelemetrySample> = load_json(&telemetry, "telemetry")?;
            let engine = QueryEngine::new(MemoryStore::new().with_telemetry(samples));
            let keying = if per_metric {
                SeriesKeying::HostMetric
            } else {
                SeriesKeying::Host
            };
            let buckets =
                engine.telemetry_series(metric.as_deref(), TimeRange::parse(&range), keying)?;
            println!("{}", serde_json::to_string_pretty(&buckets)?);
        }
        Commands::Usage { logs, range } => {
            let records: Vec<LogRecord> = load_json(&logs, "log")?;
            let engine = QueryEngine::new(MemoryStore::new().with_logs(records));
            let buckets = engine.usage_series(TimeRange::parse(&range))?;
            println!("{}", serde_json::to_string_pretty(&buckets)?);
        }
        Commands::Scan {
            logs,
            catalog,
            auth,
            page,
            page_size,
        } => {
            let groups: Vec<RuleGroup> = load_json(&catalog, "catalog")?;
            let request = PageRequest::new(page, page_size);
            let matches = if auth {
                let records: Vec<AuthLogRecord> = load_json(&logs, "auth log")?;
                let engine = QueryEngine::new(
                    MemoryStore::new()
                        .with_auth_logs(records)
                        .with_catalog(groups),
                );
                engine.auth_command_matches(&AuthLogFilter::default(), request)?
            } else {
                let records: Vec<LogRecord> = load_json(&logs, "log")?;
                let engine =
                    QueryEngine::new(MemoryStore::new().with_logs(records).with_catalog(groups));
                engine.command_matches(&LogFilter::default(), request)?
            };
            tracing::info!(matches = matches.len(), "scan complete");
            let delivered = alerts::route_matches(&matches, &mut JsonStdoutSink);
            tracing::info!(delivered, "notifications routed");
        }
    }

    Ok(())
}
