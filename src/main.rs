//! notice-watch main entry point
//!
//! This is the command-line interface for the notice-watch posting monitor.

use clap::{Parser, Subcommand};
use notice_watch::config::{load_config_with_hash, Config};
use notice_watch::crawler::{build_monitor, build_scheduler};
use notice_watch::health::{self, HealthState};
use notice_watch::output::{print_cache_stats, print_connection_report, print_crawl_result};
use notice_watch::storage::{FileCache, ItemCache};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

/// notice-watch: watches a notice board and emails new postings
///
/// notice-watch fetches a single listing page on a fixed interval, extracts
/// its postings, remembers what it has already seen and sends a notification
/// whenever something new shows up.
#[derive(Parser, Debug)]
#[command(name = "notice-watch")]
#[command(version = "1.0.0")]
#[command(about = "Watches a notice board and emails new postings", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG", default_value = "notice-watch.toml", global = true)]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single monitoring cycle and print the result
    Run,

    /// Run cycles on the configured interval until interrupted
    Daemon,

    /// Check DNS, TCP and HEAD connectivity to the target
    TestConnection,

    /// Show statistics of the item cache and exit
    Stats,

    /// Remove cached items older than the retention window
    Cleanup {
        /// Override `[cache] max-age-days`
        #[arg(long)]
        max_age_days: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    match cli.command {
        Command::Run => handle_run(&config).await,
        Command::Daemon => handle_daemon(&config).await,
        Command::TestConnection => handle_test_connection(&config).await,
        Command::Stats => handle_stats(&config),
        Command::Cleanup { max_age_days } => handle_cleanup(&config, max_age_days),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("notice_watch=info,warn"),
            1 => EnvFilter::new("notice_watch=debug,info"),
            2 => EnvFilter::new("notice_watch=trace,debug"),
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

/// Handles `run`: one cycle, printed to stdout
async fn handle_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let monitor = build_monitor(config)?;
    tracing::info!("Checking {}", monitor.target_url());

    let result = monitor.run_cycle().await;
    print_crawl_result(&result);

    if result.success {
        Ok(())
    } else {
        Err("monitoring cycle failed".into())
    }
}

/// Handles `daemon`: scheduled cycles plus the optional health endpoint
async fn handle_daemon(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let monitor = Arc::new(build_monitor(config)?);
    let health_state = Arc::new(HealthState::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("Shutdown requested; finishing the current cycle");
        let _ = shutdown_tx.send(true);
    });

    let health_server = match &config.health {
        Some(health_config) => {
            let bind: SocketAddr = health_config.bind.parse()?;
            let state = health_state.clone();
            let rx = shutdown_rx.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = health::serve(bind, state, rx).await {
                    tracing::error!("Health endpoint failed: {}", e);
                }
            }))
        }
        None => None,
    };

    tracing::info!("Monitoring {}", monitor.target_url());
    let scheduler = build_scheduler(config, monitor).with_health(health_state);
    scheduler.run_until(shutdown_rx).await;

    if let Some(handle) = health_server {
        let _ = handle.await;
    }

    tracing::info!("notice-watch stopped");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!("Cannot listen for SIGTERM: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Handles `test-connection`: raw connectivity diagnostics
async fn handle_test_connection(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let monitor = build_monitor(config)?;
    let report = monitor.fetcher().test_connection().await;
    print_connection_report(&report);

    if report.is_healthy() {
        Ok(())
    } else {
        Err(format!("{} is not reachable", report.host).into())
    }
}

/// Handles `stats`: shows cache statistics
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Cache directory: {}\n", config.cache.dir);

    let cache = FileCache::open(&config.cache.dir);
    let stats = cache.stats()?;
    print_cache_stats(&stats);

    Ok(())
}

/// Handles `cleanup`: evicts old cache entries
fn handle_cleanup(config: &Config, max_age_days: Option<u32>) -> Result<(), Box<dyn std::error::Error>> {
    let max_age_days = max_age_days.unwrap_or(config.cache.max_age_days);
    let cache = FileCache::open(&config.cache.dir);

    let removed = cache.cleanup_older_than(max_age_days)?;
    println!(
        "Removed {} cached items older than {} days from {}",
        removed, max_age_days, config.cache.dir
    );

    Ok(())
}
