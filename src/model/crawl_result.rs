//! Outcome of one monitoring cycle

use crate::model::Item;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Result of a single fetch-extract-diff-notify cycle
///
/// Produced fresh by every cycle and never persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlResult {
    /// Whether the page was fetched and the cache updated
    pub success: bool,

    /// Every candidate extracted from the page
    pub items: Vec<Item>,

    /// Candidates that were not in the cache before this cycle
    pub new_items: Vec<Item>,

    /// Errors encountered during the cycle (fatal or degraded)
    pub errors: Vec<String>,

    /// Wall time spent on the cycle
    pub execution_time_ms: u64,

    /// When the cycle started
    pub timestamp: DateTime<Utc>,

    /// Whether this was the first cycle since deployment
    pub first_run: bool,

    /// Whether a notification was delivered for the new items
    pub notified: bool,
}

impl CrawlResult {
    /// Creates an empty, not-yet-successful result stamped with `timestamp`
    pub fn started(timestamp: DateTime<Utc>) -> Self {
        Self {
            success: false,
            items: Vec::new(),
            new_items: Vec::new(),
            errors: Vec::new(),
            execution_time_ms: 0,
            timestamp,
            first_run: false,
            notified: false,
        }
    }

    /// Creates a failed result carrying a single error
    pub fn failed(timestamp: DateTime<Utc>, error: impl Into<String>) -> Self {
        let mut result = Self::started(timestamp);
        result.errors.push(error.into());
        result
    }

    /// Returns true when the cycle succeeded but recorded errors
    pub fn is_degraded(&self) -> bool {
        self.success && !self.errors.is_empty()
    }
}
