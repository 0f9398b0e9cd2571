//! Crawler module for monitoring the target page
//!
//! This module contains the core monitoring logic, including:
//! - Host resolution through public resolvers with a TTL cache
//! - HTTP fetching with retry logic
//! - Low-level connection diagnostics
//! - HTML extraction of posting candidates
//! - Cycle orchestration and fixed-delay scheduling

mod coordinator;
mod diagnostics;
mod dns_cache;
mod fetcher;
mod parser;
mod resolver;
mod scheduler;

pub use coordinator::{Monitor, CYCLE_BUSY};
pub use diagnostics::{test_connection, ConnectionReport, ProbeOutcome};
pub use dns_cache::{CachedAddress, DnsCache};
pub use fetcher::{backoff_delay, build_http_client, fetch_page, FetchError, Fetcher, HttpFetcher};
pub use parser::{Extractor, SelectorExtractor, SelectorStrategy, DEFAULT_SELECTORS, MIN_TITLE_CHARS};
pub use resolver::{
    DohStrategy, HostResolver, NameserverStrategy, ResolveError, ResolveStrategy, SystemStrategy,
};
pub use scheduler::Scheduler;

use crate::clock::{Clock, SystemClock};
use crate::config::{validate, Config};
use crate::notify::build_notifier;
use crate::storage::FileCache;
use crate::WatchResult;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Wires a production [`Monitor`] from configuration
///
/// This is the main entry point for the CLI. It will:
/// 1. Validate the configuration
/// 2. Build the resolver chain and its address cache
/// 3. Build the HTTP fetcher for the target
/// 4. Set up the default selector extractor
/// 5. Open the file cache
/// 6. Pick the notifier (SMTP when `[email]` is present, log otherwise)
///
/// No network or disk I/O happens here.
///
/// # Returns
///
/// * `Ok(Monitor)` - Ready to run cycles
/// * `Err(WatchError)` - A component could not be built from the config
pub fn build_monitor(config: &Config) -> WatchResult<Monitor> {
    validate(config)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let resolver = Arc::new(HostResolver::from_config(&config.resolver, clock.clone())?);
    tracing::debug!("Resolver chain: {}", resolver.strategy_names().join(" -> "));

    let fetcher = HttpFetcher::new(&config.target.url, config.fetch.clone(), resolver)?;
    let extractor = SelectorExtractor::with_defaults(Url::parse(&config.target.url)?, clock.clone());
    let cache = FileCache::open(&config.cache.dir);
    let notifier = build_notifier(config.email.as_ref())?;

    Ok(Monitor::new(
        config.target.url.clone(),
        Arc::new(fetcher),
        Arc::new(extractor),
        Arc::new(cache),
        notifier,
        clock,
    ))
}

/// Wraps `monitor` in a scheduler configured from `[schedule]` and `[cache]`
pub fn build_scheduler(config: &Config, monitor: Arc<Monitor>) -> Scheduler {
    let interval = Duration::from_secs(config.schedule.interval_minutes.saturating_mul(60));
    let scheduler = Scheduler::new(monitor, interval);
    if config.schedule.cleanup_after_cycle {
        scheduler.with_cleanup(config.cache.max_age_days)
    } else {
        scheduler
    }
}
