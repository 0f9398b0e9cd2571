//! Fixed-delay cycle scheduler
//!
//! Runs monitoring cycles back to back with `interval` of sleep between the
//! end of one cycle and the start of the next, so cycles never overlap even
//! when one takes longer than the interval. Shutdown requests are honoured
//! between cycles only; an in-flight cycle always completes.

use crate::crawler::coordinator::Monitor;
use crate::health::HealthState;
use crate::model::CrawlResult;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Drives a [`Monitor`] on a fixed delay
pub struct Scheduler {
    monitor: Arc<Monitor>,
    interval: Duration,
    cleanup_max_age_days: Option<u32>,
    health: Option<Arc<HealthState>>,
}

impl Scheduler {
    /// Creates a scheduler
    ///
    /// # Arguments
    ///
    /// * `monitor` - The monitor whose cycles are scheduled
    /// * `interval` - Sleep between the end of a cycle and the next start
    pub fn new(monitor: Arc<Monitor>, interval: Duration) -> Self {
        Self {
            monitor,
            interval,
            cleanup_max_age_days: None,
            health: None,
        }
    }

    /// Evicts cache entries older than `max_age_days` after every cycle
    pub fn with_cleanup(mut self, max_age_days: u32) -> Self {
        self.cleanup_max_age_days = Some(max_age_days);
        self
    }

    /// Reports every cycle outcome to `health`
    pub fn with_health(mut self, health: Arc<HealthState>) -> Self {
        self.health = Some(health);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs one cycle plus the post-cycle housekeeping
    pub async fn run_once(&self) -> CrawlResult {
        let result = self.monitor.run_cycle().await;

        if let Some(max_age_days) = self.cleanup_max_age_days {
            match self.monitor.cleanup(max_age_days).await {
                Ok(0) => {}
                Ok(removed) => tracing::info!("Evicted {} cached items older than {} days", removed, max_age_days),
                Err(e) => tracing::warn!("Cache cleanup failed: {}", e),
            }
        }

        if let Some(health) = &self.health {
            health.record(&result);
        }

        result
    }

    /// Runs cycles until `shutdown` becomes true
    ///
    /// # Returns
    ///
    /// The number of cycles that ran
    pub async fn run_until(&self, mut shutdown: watch::Receiver<bool>) -> u64 {
        let mut cycles = 0;

        tracing::info!(
            "Scheduler started: one cycle every {}s after the previous one finishes",
            self.interval.as_secs()
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.run_once().await;
            cycles += 1;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        tracing::warn!("Shutdown channel closed; stopping scheduler");
                        break;
                    }
                }
            }
        }

        tracing::info!("Scheduler stopped after {} cycles", cycles);
        cycles
    }
}
