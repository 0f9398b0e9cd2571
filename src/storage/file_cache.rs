//! JSON file implementation of the item cache
//!
//! The snapshot lives in `<dir>/items.json` as a JSON object mapping item id to
//! item. Writes go to `<dir>/items.json.tmp`, are fsynced, then renamed over the
//! live file. The first-run marker is the zero-byte `<dir>/.first-run-marker`.

use crate::clock::{Clock, SystemClock};
use crate::model::Item;
use crate::storage::fs::{FileSystem, LocalFs};
use crate::storage::traits::{snapshot_from, CacheError, CacheResult, CacheStats, ItemCache, Snapshot};
use chrono::Duration;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// File name of the persisted snapshot
pub const SNAPSHOT_FILE: &str = "items.json";

/// File name of the first-run marker
pub const MARKER_FILE: &str = ".first-run-marker";

/// File-backed item cache
pub struct FileCache<F = LocalFs, C = SystemClock> {
    fs: F,
    clock: C,
    dir: PathBuf,
    /// Serializes every operation that mutates durable state
    write_lock: Mutex<()>,
}

impl FileCache {
    /// Creates a cache in `dir` on the local disk
    ///
    /// # Arguments
    ///
    /// * `dir` - Directory holding the snapshot and marker; created on first write
    ///
    /// # Example
    ///
    /// ```no_run
    /// use notice_watch::storage::{FileCache, ItemCache};
    ///
    /// let cache = FileCache::open("./cache");
    /// let snapshot = cache.load_snapshot().unwrap();
    /// println!("{} known items", snapshot.len());
    /// ```
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self::with_parts(LocalFs, SystemClock, dir)
    }
}

impl<F: FileSystem, C: Clock> FileCache<F, C> {
    /// Creates a cache with an explicit filesystem and clock
    pub fn with_parts(fs: F, clock: C, dir: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            clock,
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the cache directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the underlying filesystem
    pub fn fs(&self) -> &F {
        &self.fs
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    pub fn temp_path(&self) -> PathBuf {
        self.dir.join(format!("{}.tmp", SNAPSHOT_FILE))
    }

    pub fn marker_path(&self) -> PathBuf {
        self.dir.join(MARKER_FILE)
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Writes a snapshot via temp file and rename; caller holds the write lock
    fn write_snapshot(&self, snapshot: &Snapshot) -> CacheResult<()> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let live = self.snapshot_path();
        let tmp = self.temp_path();

        self.fs.create_dir_all(&self.dir)?;

        let result = self
            .fs
            .write_synced(&tmp, &bytes)
            .and_then(|_| self.fs.rename(&tmp, &live));

        if let Err(source) = result {
            if let Err(e) = self.fs.remove(&tmp) {
                if e.kind() != ErrorKind::NotFound {
                    tracing::warn!("Failed to remove temp snapshot {}: {}", tmp.display(), e);
                }
            }
            return Err(CacheError::Write { path: live, source });
        }

        tracing::debug!(
            "Persisted {} items to {} ({} bytes)",
            snapshot.len(),
            live.display(),
            bytes.len()
        );
        Ok(())
    }
}

/// Rebuilds a snapshot from raw entries, keyed by each item's own id
///
/// Entries that fail validation are dropped.
fn snapshot_from_entries(entries: BTreeMap<String, serde_json::Value>) -> Snapshot {
    let mut snapshot = Snapshot::new();

    for (key, value) in entries {
        let item = match serde_json::from_value::<Item>(value) {
            Ok(item) => item,
            Err(e) => {
                tracing::warn!("Dropping invalid cached item '{}': {}", key, e);
                continue;
            }
        };

        if item.id() != key {
            tracing::warn!("Cached item '{}' re-keyed as '{}'", key, item.id());
        }
        snapshot.insert(item.id().to_string(), item);
    }

    snapshot
}

impl<F: FileSystem, C: Clock> ItemCache for FileCache<F, C> {
    fn load_snapshot(&self) -> CacheResult<Snapshot> {
        let path = self.snapshot_path();
        let Some(bytes) = self.fs.read(&path)? else {
            tracing::debug!("No snapshot at {}, starting empty", path.display());
            return Ok(Snapshot::new());
        };

        let entries = match serde_json::from_slice::<BTreeMap<String, serde_json::Value>>(&bytes) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(
                    "Snapshot {} is corrupt, treating as empty: {}",
                    path.display(),
                    e
                );
                return Ok(Snapshot::new());
            }
        };

        Ok(snapshot_from_entries(entries))
    }

    fn persist(&self, items: &[Item]) -> CacheResult<()> {
        let _guard = self.lock();
        self.write_snapshot(&snapshot_from(items))
    }

    fn cleanup_older_than(&self, max_age_days: u32) -> CacheResult<usize> {
        let _guard = self.lock();
        let Some(cutoff) = Duration::try_days(i64::from(max_age_days))
            .and_then(|age| self.clock.now().checked_sub_signed(age))
        else {
            tracing::warn!(
                "Retention of {} days reaches past the earliest representable time, nothing to remove",
                max_age_days
            );
            return Ok(0);
        };
        let mut snapshot = self.load_snapshot()?;

        let before = snapshot.len();
        snapshot.retain(|_, item| item.crawled_at() >= cutoff);
        let removed = before - snapshot.len();

        if removed > 0 {
            self.write_snapshot(&snapshot)?;
            tracing::info!(
                "Removed {} cached items older than {} days",
                removed,
                max_age_days
            );
        }

        Ok(removed)
    }

    fn is_first_run_after_deployment(&self) -> CacheResult<bool> {
        let _guard = self.lock();
        self.fs.create_dir_all(&self.dir)?;
        let created = self.fs.create_new(&self.marker_path())?;
        if created {
            tracing::info!(
                "Created first-run marker at {}",
                self.marker_path().display()
            );
        }
        Ok(created)
    }

    fn stats(&self) -> CacheResult<CacheStats> {
        let snapshot = self.load_snapshot()?;
        let size_bytes = self.fs.size(&self.snapshot_path())?.unwrap_or(0);

        Ok(CacheStats {
            total_items: snapshot.len(),
            oldest_crawled_at: snapshot.values().map(|i| i.crawled_at()).min(),
            newest_crawled_at: snapshot.values().map(|i| i.crawled_at()).max(),
            size_bytes,
        })
    }
}
