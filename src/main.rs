//! edgar-getter main entry point
//!
//! This is the command-line interface for the concurrent resource getter.

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use edgar_getter::config::{load_config_with_hash, Config};
use edgar_getter::output::{print_run_history, print_summary};
use edgar_getter::retrieval::Coordinator;
use edgar_getter::storage::{open_storage, record_aborted, record_retrieval};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Hash recorded for runs made without a configuration file
const DEFAULT_CONFIG_HASH: &str = "default";

/// edgar-getter: concurrent retrieval of resources listed on index pages
///
/// Given an index page, edgar-getter downloads every linked resource whose
/// suffix is eligible. Given a direct resource URI, it downloads that one
/// resource.
#[derive(Parser, Debug)]
#[command(name = "edgar-getter")]
#[command(version)]
#[command(about = "Concurrent retrieval of resources listed on index pages", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (built-in defaults when omitted)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Index page or resource URI to retrieve from
    #[arg(short, long, value_name = "URI", required_unless_present = "stats")]
    source: Option<String>,

    /// Fetch at most this many discovered links (0 fetches all of them)
    #[arg(short, long, default_value_t = 0)]
    limit: usize,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Show the run history from the database and exit
    #[arg(long, conflicts_with = "source")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let (config, config_hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (config, hash)
        }
        None => {
            tracing::info!("No configuration file given, using defaults");
            (Config::default(), DEFAULT_CONFIG_HASH.to_string())
        }
    };

    if cli.stats {
        return handle_stats(&config);
    }

    let source = cli
        .source
        .context("A source URI is required unless --stats is given")?;
    handle_retrieve(config, &config_hash, &source, cli.limit).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("edgar_getter=info,warn"),
            1 => EnvFilter::new("edgar_getter=debug,info"),
            2 => EnvFilter::new("edgar_getter=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --stats mode: shows the run history from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let database_path = config
        .output
        .database_path
        .as_deref()
        .context("--stats needs output.database-path in the configuration")?;

    println!("Database: {}\n", database_path);

    let storage = open_storage(Path::new(database_path))?;
    print_run_history(&storage)?;

    Ok(())
}

/// Handles the main retrieval operation
async fn handle_retrieve(
    config: Config,
    config_hash: &str,
    source: &str,
    limit: usize,
) -> anyhow::Result<()> {
    let database_path = config.output.database_path.clone();
    let coordinator = Coordinator::new(config)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, waiting for in-flight fetches to stop");
            on_interrupt.cancel();
        }
    });

    tracing::info!(
        "Retrieving from {} (limit: {}, saving to {})",
        source,
        limit,
        coordinator.config().retrieval.save_location.display()
    );

    let started_at = Utc::now().to_rfc3339();
    let result = coordinator.retrieve_with_cancel(source, limit, cancel).await;

    if let Some(path) = &database_path {
        let mut storage = open_storage(Path::new(path))?;
        let recorded = match &result {
            Ok(result) => record_retrieval(&mut storage, result, config_hash),
            Err(e) => record_aborted(&mut storage, source, &started_at, config_hash, e),
        };
        match recorded {
            Ok(run_id) => tracing::info!("Recorded run #{} in {}", run_id, path),
            Err(e) => tracing::error!("Failed to record run in {}: {}", path, e),
        }
    }

    match result {
        Ok(result) => {
            print_summary(&result);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Retrieval failed: {}", e);
            Err(e.into())
        }
    }
}
