//! Hunt main entry point
//!
//! This is the command-line interface for the hunt onion link harvester.

use anyhow::{bail, Context};
use clap::Parser;
use hunt::config::{load_config_with_hash, validate, Config};
use hunt::crawler::{Coordinator, HuntRequest};
use hunt::output::{print_run_summary, print_search_results, print_statistics};
use hunt::storage::{open_store, KnowledgeStore};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Hunt: a concurrent onion link harvester
///
/// Hunt queries onion search engines, public feeds and directories, follows
/// discovered sites to a bounded depth, and stores every new address in a
/// local knowledge store with full-text lookup.
#[derive(Parser, Debug)]
#[command(name = "hunt")]
#[command(version = "1.0.0")]
#[command(about = "A concurrent onion link harvester", long_about = None)]
struct Cli {
    /// Search term, expanded through the synonym table
    #[arg(value_name = "QUERY", default_value = "onion")]
    query: String,

    /// Record every onion address found instead of keyword matches only
    #[arg(long)]
    all: bool,

    /// Recursion depth for deep crawling (capped by crawler.max-depth)
    #[arg(long, value_name = "N")]
    depth: Option<u32>,

    /// Query the local knowledge store and exit
    #[arg(long, conflicts_with_all = ["stats", "all", "depth"])]
    search: bool,

    /// Show statistics from the knowledge store and exit
    #[arg(long, conflicts_with_all = ["search", "all", "depth"])]
    stats: bool,

    /// Path to TOML configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Number of concurrent workers
    #[arg(long, value_name = "N")]
    workers: Option<u32>,

    /// Path to the knowledge store database
    #[arg(long, value_name = "PATH")]
    db: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let (mut config, config_hash) = match load_config_with_hash(cli.config.as_deref()) {
        Ok((cfg, hash)) => {
            tracing::debug!("Configuration loaded (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };
    apply_overrides(&mut config, &cli)?;

    if cli.search {
        handle_search(&config, &cli.query)
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_hunt(config, config_hash, &cli).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("hunt=info,warn"),
            1 => EnvFilter::new("hunt=debug,info"),
            2 => EnvFilter::new("hunt=trace,debug"),
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

/// Applies command-line overrides on top of the loaded configuration
fn apply_overrides(config: &mut Config, cli: &Cli) -> anyhow::Result<()> {
    if let Some(workers) = cli.workers {
        config.crawler.workers = workers;
    }
    if let Some(db) = &cli.db {
        config.output.database_path = db.clone();
    }
    validate(config).context("Invalid command-line override")?;
    Ok(())
}

/// Handles the --search mode: queries the knowledge store without crawling
fn handle_search(config: &Config, query: &str) -> anyhow::Result<()> {
    let path = Path::new(&config.output.database_path);
    let store = open_store(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let records = store
        .search_local(query)
        .with_context(|| format!("Search for {:?} failed", query))?;

    print_search_results(query, &records);
    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let path = Path::new(&config.output.database_path);
    println!("Database: {}\n", path.display());

    let store = open_store(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let stats = store.stats().context("Failed to load statistics")?;

    print_statistics(&stats);
    Ok(())
}

/// Handles the main harvest operation
async fn handle_hunt(config: Config, config_hash: String, cli: &Cli) -> anyhow::Result<()> {
    tracing::info!(
        "Sources: {} engines, {} feeds, {} directories, {} seeds ({} workers)",
        config.engines.len(),
        config.feeds.len(),
        config.directories.len(),
        config.seeds.len(),
        config.crawler.workers
    );

    let coordinator = Coordinator::new(config, config_hash)?;

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping admission of new tasks");
            signal_token.cancel();
        }
    });

    let request = HuntRequest {
        query: cli.query.clone(),
        match_all: cli.all,
        depth: cli.depth,
    };

    let summary = match coordinator.run(&request, cancel).await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!("Hunt failed: {}", e);
            return Err(e.into());
        }
    };

    print_run_summary(&summary);

    if let Some(error) = &summary.report.storage_error {
        bail!(
            "Knowledge store failed during the run ({} records lost): {}",
            summary.report.records_lost,
            error
        );
    }

    Ok(())
}
