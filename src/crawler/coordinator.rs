//! Monitor - per-cycle orchestration
//!
//! One cycle runs the pipeline:
//! 1. Check (and set) the first-run-after-deployment marker
//! 2. Fetch the page; stop on failure without touching the cache
//! 3. Extract candidates
//! 4. Diff candidates against the snapshot
//! 5. Persist the union of snapshot and candidates
//! 6. Notify about new items (dev recipient only on first run)
//!
//! A cycle never returns an error: every failure is recorded in the
//! [`CrawlResult`] so the caller can log it and carry on.

use crate::clock::Clock;
use crate::crawler::fetcher::Fetcher;
use crate::crawler::parser::Extractor;
use crate::model::{CrawlResult, Item};
use crate::notify::{compose_message, Notifier};
use crate::storage::{diff_against, CacheError, CacheResult, ItemCache};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Error text recorded when a cycle is requested while another is running
pub const CYCLE_BUSY: &str = "cycle already running";

/// Composes fetcher, extractor, cache and notifier into monitoring cycles
pub struct Monitor {
    target_url: String,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn Extractor>,
    cache: Arc<dyn ItemCache>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    busy: AtomicBool,
}

/// Clears the busy flag when a cycle ends, including by panic
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Monitor {
    /// Creates a monitor from its collaborators
    ///
    /// # Arguments
    ///
    /// * `target_url` - The monitored page, used in notification text
    /// * `fetcher` - Source of the page HTML
    /// * `extractor` - Turns HTML into candidates
    /// * `cache` - Snapshot and first-run marker owner
    /// * `notifier` - Delivers new-item notifications
    /// * `clock` - Time source for result timestamps
    pub fn new(
        target_url: impl Into<String>,
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn Extractor>,
        cache: Arc<dyn ItemCache>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            target_url: target_url.into(),
            fetcher,
            extractor,
            cache,
            notifier,
            clock,
            busy: AtomicBool::new(false),
        }
    }

    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    pub fn fetcher(&self) -> &Arc<dyn Fetcher> {
        &self.fetcher
    }

    /// Returns true while a cycle is in flight
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Runs one complete cycle
    ///
    /// Concurrent calls do not overlap: a call made while another cycle is in
    /// flight returns immediately with a failed result.
    pub async fn run_cycle(&self) -> CrawlResult {
        let timestamp = self.clock.now();

        let Some(_busy) = BusyGuard::acquire(&self.busy) else {
            tracing::warn!("Cycle requested while another is running; skipping");
            return CrawlResult::failed(timestamp, CYCLE_BUSY);
        };

        let started = Instant::now();
        let mut result = CrawlResult::started(timestamp);

        self.execute(&mut result).await;

        result.execution_time_ms = started.elapsed().as_millis() as u64;

        if result.success {
            tracing::info!(
                "Cycle finished in {}ms: {} items, {} new, {} errors",
                result.execution_time_ms,
                result.items.len(),
                result.new_items.len(),
                result.errors.len()
            );
        } else {
            tracing::error!(
                "Cycle failed after {}ms: {}",
                result.execution_time_ms,
                result.errors.join("; ")
            );
        }

        result
    }

    async fn execute(&self, result: &mut CrawlResult) {
        result.first_run = match self.with_cache(|c| c.is_first_run_after_deployment()).await {
            Ok(first_run) => first_run,
            Err(e) => {
                tracing::warn!("First-run check failed, assuming a regular run: {}", e);
                result.errors.push(format!("First-run check failed: {}", e));
                false
            }
        };
        if result.first_run {
            tracing::info!("First cycle since deployment");
        }

        let html = match self.fetcher.fetch_page().await {
            Ok(html) => html,
            Err(e) => {
                result.errors.push(e.to_string());
                return;
            }
        };

        let items = self.extractor.extract(&html);
        tracing::debug!("Extracted {} candidates", items.len());

        let snapshot = match self.with_cache(|c| c.load_snapshot()).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                // Persisting now could overwrite entries we failed to read
                result.errors.push(format!("Failed to load cache: {}", e));
                result.items = items;
                return;
            }
        };

        let new_items = diff_against(&snapshot, &items);

        let mut merged = snapshot;
        for item in &items {
            merged.insert(item.id().to_string(), item.clone());
        }
        let all: Vec<Item> = merged.into_values().collect();

        match self.with_cache(move |c| c.persist(&all)).await {
            Ok(()) => result.success = true,
            Err(e) => {
                tracing::error!("Failed to persist cache, previous snapshot kept: {}", e);
                result.errors.push(format!("Failed to persist cache: {}", e));
            }
        }

        result.items = items;
        result.new_items = new_items;

        if !result.new_items.is_empty() {
            self.notify(result).await;
        } else {
            tracing::info!("No new items");
        }
    }

    async fn notify(&self, result: &mut CrawlResult) {
        let (title, body) = compose_message(&result.new_items, result.first_run, &self.target_url);

        match self
            .notifier
            .notify(&title, &body, &result.new_items, result.first_run)
            .await
        {
            Ok(report) => {
                result.notified = report.success;
                result
                    .errors
                    .extend(report.per_recipient_failures.iter().map(|f| f.to_string()));
                if !report.success {
                    result
                        .errors
                        .push(format!("{} notification reached no recipients", self.notifier.name()));
                }
            }
            Err(e) => {
                tracing::error!("Notification failed: {}", e);
                result.errors.push(format!("Notification failed: {}", e));
            }
        }
    }

    /// Removes cached items older than `max_age_days`
    pub async fn cleanup(&self, max_age_days: u32) -> CacheResult<usize> {
        self.with_cache(move |c| c.cleanup_older_than(max_age_days)).await
    }

    /// Runs a blocking cache operation off the async worker threads
    async fn with_cache<T, F>(&self, op: F) -> CacheResult<T>
    where
        F: FnOnce(&dyn ItemCache) -> CacheResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let cache = self.cache.clone();
        tokio::task::spawn_blocking(move || op(cache.as_ref()))
            .await
            .map_err(|e| CacheError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::crawler::diagnostics::ConnectionReport;
    use crate::crawler::fetcher::FetchError;
    use crate::notify::{NotifyError, NotifyReport, NotifyResult, RecipientFailure};
    use crate::storage::{FileCache, MemoryFs};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    struct StaticFetcher(Option<String>);

    #[async_trait]
    impl Fetcher for StaticFetcher {
        async fn fetch_page(&self) -> Result<String, FetchError> {
            self.0.clone().ok_or_else(|| FetchError::Timeout {
                url: "http://x/".to_string(),
            })
        }

        async fn test_connection(&self) -> ConnectionReport {
            unimplemented!("not used by monitor tests")
        }
    }

    /// Extractor that treats each non-empty line as "title|link"
    struct LineExtractor;

    impl Extractor for LineExtractor {
        fn extract(&self, html: &str) -> Vec<Item> {
            html.lines()
                .filter_map(|line| line.split_once('|'))
                .filter_map(|(title, link)| Item::new(title, link, None, "", Utc::now()).ok())
                .collect()
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        calls: Mutex<Vec<(String, usize, bool)>>,
        outcome: Option<NotifyReport>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        fn name(&self) -> &str {
            "recording"
        }

        async fn notify(
            &self,
            title: &str,
            _body: &str,
            items: &[Item],
            restrict_to_dev: bool,
        ) -> NotifyResult<NotifyReport> {
            self.calls
                .lock()
                .unwrap()
                .push((title.to_string(), items.len(), restrict_to_dev));
            if self.fail {
                return Err(NotifyError::Transport("smtp down".to_string()));
            }
            Ok(self.outcome.clone().unwrap_or_else(NotifyReport::delivered))
        }
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()))
    }

    fn monitor(
        page: Option<&str>,
        cache: Arc<FileCache<MemoryFs, ManualClock>>,
        notifier: Arc<RecordingNotifier>,
    ) -> Monitor {
        Monitor::new(
            "http://x/",
            Arc::new(StaticFetcher(page.map(String::from))),
            Arc::new(LineExtractor),
            cache,
            notifier,
            clock(),
        )
    }

    fn memory_cache() -> Arc<FileCache<MemoryFs, ManualClock>> {
        Arc::new(FileCache::with_parts(
            MemoryFs::new(),
            ManualClock::new(Utc::now()),
            "/cache",
        ))
    }

    #[tokio::test]
    async fn test_first_cycle_notifies_dev_only() {
        let cache = memory_cache();
        let notifier = Arc::new(RecordingNotifier::default());
        let m = monitor(Some("A posting|http://x/a"), cache.clone(), notifier.clone());

        let result = m.run_cycle().await;

        assert!(result.success);
        assert!(result.first_run);
        assert!(result.notified);
        assert_eq!(result.new_items.len(), 1);
        let calls = notifier.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].2, "first run must restrict to dev recipient");
        assert!(calls[0].0.contains("Cache initialized"));
    }

    #[tokio::test]
    async fn test_second_cycle_same_items_no_notification() {
        let cache = memory_cache();
        let notifier = Arc::new(RecordingNotifier::default());
        let m = monitor(Some("A posting|http://x/a"), cache.clone(), notifier.clone());

        m.run_cycle().await;
        let second = m.run_cycle().await;

        assert!(second.success);
        assert!(!second.first_run);
        assert!(second.new_items.is_empty());
        assert_eq!(second.items.len(), 1);
        assert_eq!(notifier.calls.lock().unwrap().len(), 1);
        assert_eq!(cache.load_snapshot().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_regular_run_notifies_everyone() {
        let cache = memory_cache();
        cache.is_first_run_after_deployment().unwrap();
        let notifier = Arc::new(RecordingNotifier::default());
        let m = monitor(
            Some("A posting|http://x/a\nB posting|http://x/b"),
            cache.clone(),
            notifier.clone(),
        );

        let result = m.run_cycle().await;

        assert!(!result.first_run);
        let calls = notifier.calls.lock().unwrap();
        assert_eq!(calls[0], ("[notice-watch] 2 new postings".to_string(), 2, false));
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_cache_untouched() {
        let cache = memory_cache();
        let existing = Item::new("Old posting", "http://x/old", None, "", Utc::now()).unwrap();
        cache.persist(&[existing.clone()]).unwrap();
        let notifier = Arc::new(RecordingNotifier::default());
        let m = monitor(None, cache.clone(), notifier.clone());

        let result = m.run_cycle().await;

        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("timeout"));
        let snapshot = cache.load_snapshot().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains_key(existing.id()));
        assert!(notifier.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persist_keeps_previously_known_items() {
        let cache = memory_cache();
        let existing = Item::new("Old posting", "http://x/old", None, "", Utc::now()).unwrap();
        cache.persist(&[existing.clone()]).unwrap();
        let m = monitor(
            Some("A posting|http://x/a"),
            cache.clone(),
            Arc::new(RecordingNotifier::default()),
        );

        let result = m.run_cycle().await;

        assert_eq!(result.new_items.len(), 1);
        let snapshot = cache.load_snapshot().unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains_key(existing.id()));
    }

    #[tokio::test]
    async fn test_zero_items_is_a_successful_cycle() {
        let cache = memory_cache();
        let notifier = Arc::new(RecordingNotifier::default());
        let m = monitor(Some("<html>nothing</html>"), cache.clone(), notifier.clone());

        let result = m.run_cycle().await;

        assert!(result.success);
        assert!(result.items.is_empty());
        assert!(result.errors.is_empty());
        assert!(notifier.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_notification_failure_is_degraded_success() {
        let cache = memory_cache();
        let notifier = Arc::new(RecordingNotifier {
            fail: true,
            ..Default::default()
        });
        let m = monitor(Some("A posting|http://x/a"), cache.clone(), notifier);

        let result = m.run_cycle().await;

        assert!(result.success);
        assert!(result.is_degraded());
        assert!(!result.notified);
        assert!(result.errors[0].contains("smtp down"));
        assert_eq!(cache.load_snapshot().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_partial_delivery_records_warnings() {
        let cache = memory_cache();
        cache.is_first_run_after_deployment().unwrap();
        let notifier = Arc::new(RecordingNotifier {
            outcome: Some(NotifyReport {
                success: true,
                per_recipient_failures: vec![RecipientFailure {
                    recipient: "b@example.com".to_string(),
                    error: "mailbox full".to_string(),
                }],
            }),
            ..Default::default()
        });
        let m = monitor(Some("A posting|http://x/a"), cache, notifier);

        let result = m.run_cycle().await;

        assert!(result.success);
        assert!(result.notified);
        assert_eq!(
            result.errors,
            vec!["delivery to b@example.com failed: mailbox full".to_string()]
        );
    }

    #[tokio::test]
    async fn test_persist_failure_is_reported() {
        let cache = memory_cache();
        cache.fs().set_fail_writes(true);
        let m = monitor(
            Some("A posting|http://x/a"),
            cache.clone(),
            Arc::new(RecordingNotifier::default()),
        );

        let result = m.run_cycle().await;

        assert!(!result.success);
        assert!(result.errors.iter().any(|e| e.contains("Failed to persist cache")));
        assert!(cache.load_snapshot().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cleanup_runs_on_blocking_pool() {
        let cache = memory_cache();
        let old = Item::new("Old posting", "http://x/old", None, "", Utc::now() - chrono::Duration::days(40))
            .unwrap();
        let recent = Item::new("New posting", "http://x/new", None, "", Utc::now()).unwrap();
        cache.persist(&[old.clone(), recent.clone()]).unwrap();
        let m = monitor(None, cache.clone(), Arc::new(RecordingNotifier::default()));

        assert_eq!(m.cleanup(30).await.unwrap(), 1);
        let snapshot = cache.load_snapshot().unwrap();
        assert!(snapshot.contains_key(recent.id()));
        assert!(!snapshot.contains_key(old.id()));
    }

    struct SlowFetcher;

    #[async_trait]
    impl Fetcher for SlowFetcher {
        async fn fetch_page(&self) -> Result<String, FetchError> {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            Ok("A posting|http://x/a".to_string())
        }

        async fn test_connection(&self) -> ConnectionReport {
            unimplemented!("not used by monitor tests")
        }
    }

    #[tokio::test]
    async fn test_overlapping_cycle_is_rejected() {
        let m = Monitor::new(
            "http://x/",
            Arc::new(SlowFetcher),
            Arc::new(LineExtractor),
            memory_cache(),
            Arc::new(RecordingNotifier::default()),
            clock(),
        );

        let (first, second) = tokio::join!(m.run_cycle(), async {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            m.run_cycle().await
        });

        assert!(first.success);
        assert!(!second.success);
        assert_eq!(second.errors, vec![CYCLE_BUSY.to_string()]);
        assert!(!m.is_busy());
    }

    #[tokio::test]
    async fn test_busy_guard_rejects_reentry() {
        let flag = AtomicBool::new(false);
        let guard = BusyGuard::acquire(&flag).unwrap();
        assert!(BusyGuard::acquire(&flag).is_none());
        drop(guard);
        assert!(BusyGuard::acquire(&flag).is_some());
    }
}
