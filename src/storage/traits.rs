//! Cache store trait and error types
//!
//! This module defines the trait interface for the item cache and the
//! associated error and statistics types.

use crate::model::Item;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to write snapshot {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// The complete set of known items, keyed by item id
pub type Snapshot = BTreeMap<String, Item>;

/// Summary of the persisted cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of items in the snapshot
    pub total_items: usize,

    /// Earliest `crawled_at` among cached items
    pub oldest_crawled_at: Option<DateTime<Utc>>,

    /// Latest `crawled_at` among cached items
    pub newest_crawled_at: Option<DateTime<Utc>>,

    /// Size of the snapshot file on disk
    pub size_bytes: u64,
}

/// Trait for item cache implementations
///
/// The cache exclusively owns the persisted snapshot and the first-run
/// marker; no other component touches that state directly.
pub trait ItemCache: Send + Sync {
    /// Loads the persisted snapshot
    ///
    /// A missing or corrupt snapshot yields an empty map. Only I/O errors
    /// other than "not found" are returned as errors.
    fn load_snapshot(&self) -> CacheResult<Snapshot>;

    /// Replaces the snapshot with exactly `items`
    ///
    /// The live snapshot is always either the previous complete state or the
    /// new complete state, never a partial write.
    fn persist(&self, items: &[Item]) -> CacheResult<()>;

    /// Removes entries whose `crawled_at` is older than `max_age_days`
    ///
    /// # Returns
    ///
    /// The number of entries removed. The snapshot is rewritten only when
    /// this is non-zero.
    fn cleanup_older_than(&self, max_age_days: u32) -> CacheResult<usize>;

    /// Returns true exactly once per absence of the first-run marker
    ///
    /// The first call that observes no marker creates it and returns true;
    /// every later call returns false until the marker is removed externally.
    fn is_first_run_after_deployment(&self) -> CacheResult<bool>;

    /// Returns summary statistics of the persisted snapshot
    fn stats(&self) -> CacheResult<CacheStats>;

    /// Returns the candidates not present in the current snapshot
    fn diff_new(&self, candidates: &[Item]) -> CacheResult<Vec<Item>> {
        let snapshot = self.load_snapshot()?;
        Ok(diff_against(&snapshot, candidates))
    }
}

/// Returns the candidates whose id is absent from `snapshot`, in candidate order
///
/// Duplicate candidates are reported once.
pub fn diff_against(snapshot: &Snapshot, candidates: &[Item]) -> Vec<Item> {
    let mut seen = HashSet::new();
    candidates
        .iter()
        .filter(|item| !snapshot.contains_key(item.id()))
        .filter(|item| seen.insert(item.id().to_string()))
        .cloned()
        .collect()
}

/// Builds a snapshot from a list of items; later duplicates win
pub fn snapshot_from(items: &[Item]) -> Snapshot {
    items
        .iter()
        .map(|item| (item.id().to_string(), item.clone()))
        .collect()
}
