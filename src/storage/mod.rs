//! Storage module for the posting cache
//!
//! This module owns all durable state:
//! - The snapshot of every known item, keyed by content-addressed id
//! - Atomic snapshot replacement (temp file, fsync, rename)
//! - Age-based cleanup
//! - The first-run-after-deployment marker

mod file_cache;
mod fs;
mod traits;

pub use file_cache::{FileCache, MARKER_FILE, SNAPSHOT_FILE};
pub use fs::{FileSystem, LocalFs, MemoryFs};
pub use traits::{
    diff_against, snapshot_from, CacheError, CacheResult, CacheStats, ItemCache, Snapshot,
};
