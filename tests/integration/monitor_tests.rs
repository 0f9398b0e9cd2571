//! Integration tests for the monitor
//!
//! These tests use wiremock to serve the target page and a temporary
//! directory for the cache, exercising full cycles end-to-end.

use async_trait::async_trait;
use notice_watch::clock::{Clock, SystemClock};
use notice_watch::config::FetchConfig;
use notice_watch::crawler::{
    fetch_page, FetchError, HostResolver, HttpFetcher, Monitor, ResolveError, ResolveStrategy,
    SelectorExtractor,
};
use notice_watch::model::Item;
use notice_watch::notify::{Notifier, NotifyReport, NotifyResult};
use notice_watch::storage::{FileCache, ItemCache, MARKER_FILE, SNAPSHOT_FILE};
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Notifier that remembers every call
#[derive(Default)]
struct RecordingNotifier {
    calls: Mutex<Vec<(String, Vec<String>, bool)>>,
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
        self.calls.lock().unwrap().push((
            title.to_string(),
            items.iter().map(|i| i.title().to_string()).collect(),
            restrict_to_dev,
        ));
        Ok(NotifyReport::delivered())
    }
}

/// Resolves every host to one fixed address
struct FixedStrategy(IpAddr);

#[async_trait]
impl ResolveStrategy for FixedStrategy {
    fn name(&self) -> String {
        "fixed".to_string()
    }

    async fn resolve(&self, _host: &str) -> Result<IpAddr, ResolveError> {
        Ok(self.0)
    }
}

/// Counts lookups; answers with `addr`, or fails when it is `None`
struct CountingStrategy {
    addr: Option<IpAddr>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ResolveStrategy for CountingStrategy {
    fn name(&self) -> String {
        "counting".to_string()
    }

    async fn resolve(&self, host: &str) -> Result<IpAddr, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.addr.ok_or_else(|| ResolveError::NoAddress {
            strategy: self.name(),
            host: host.to_string(),
        })
    }
}

fn counting_resolver(addr: Option<IpAddr>) -> (Arc<HostResolver>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let resolver = HostResolver::new(
        vec![Box::new(CountingStrategy {
            addr,
            calls: calls.clone(),
        })],
        Duration::from_secs(1),
        chrono::Duration::minutes(5),
        Arc::new(SystemClock),
    );
    (Arc::new(resolver), calls)
}

fn test_fetch_config() -> FetchConfig {
    FetchConfig {
        timeout_seconds: 5,
        max_retries: 3,
        retry_base_delay_ms: 10,
        min_content_length: 100,
        ..FetchConfig::default()
    }
}

fn resolver() -> Arc<HostResolver> {
    Arc::new(HostResolver::new(
        vec![Box::new(FixedStrategy("127.0.0.1".parse().unwrap()))],
        Duration::from_secs(1),
        chrono::Duration::minutes(5),
        Arc::new(SystemClock),
    ))
}

/// Renders a board page listing `titles`, padded past the minimum length
fn board_page(titles: &[&str]) -> String {
    let rows: String = titles
        .iter()
        .enumerate()
        .map(|(i, title)| {
            format!(
                "<tr><td><a href=\"/board/view?id={}\">{}</a></td><td class=\"date\">2024-05-0{}</td></tr>\n",
                i + 1,
                title,
                i + 1
            )
        })
        .collect();
    format!(
        "<html><head><title>Notices</title></head><body>\n<table class=\"board-list\">\n{}</table>\n<!-- {} -->\n</body></html>",
        rows,
        "padding ".repeat(20)
    )
}

async fn mount_page(server: &MockServer, body: String) {
    Mock::given(method("GET"))
        .and(path("/board/list"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

fn build_monitor(
    server: &MockServer,
    cache_dir: &std::path::Path,
    notifier: Arc<RecordingNotifier>,
) -> Monitor {
    let target = format!("{}/board/list", server.uri());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let fetcher = HttpFetcher::new(&target, test_fetch_config(), resolver()).unwrap();
    let extractor = SelectorExtractor::with_defaults(Url::parse(&target).unwrap(), clock.clone());

    Monitor::new(
        target,
        Arc::new(fetcher),
        Arc::new(extractor),
        Arc::new(FileCache::open(cache_dir)),
        notifier,
        clock,
    )
}

#[tokio::test]
async fn test_short_content_exhausts_exact_retry_budget() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/board/list"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .expect(3)
        .mount(&server)
        .await;

    let target = Url::parse(&format!("{}/board/list", server.uri())).unwrap();
    let result = fetch_page(&resolver(), &target, &test_fetch_config()).await;

    match result {
        Err(FetchError::RetriesExhausted { attempts, last, .. }) => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last, FetchError::ContentTooShort { minimum: 100, .. }));
        }
        other => panic!("expected exhausted retries, got {:?}", other.map(|b| b.len())),
    }
}

#[tokio::test]
async fn test_recovers_after_transient_server_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/board/list"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, board_page(&["Spring recruitment notice"])).await;

    let target = Url::parse(&format!("{}/board/list", server.uri())).unwrap();
    let body = fetch_page(&resolver(), &target, &test_fetch_config())
        .await
        .unwrap();

    assert!(body.contains("Spring recruitment notice"));
}

#[tokio::test]
async fn test_hostname_is_pinned_to_resolved_address() {
    let server = MockServer::start().await;
    let port = server.address().port();
    let host = format!("notices.invalid:{}", port);

    Mock::given(method("GET"))
        .and(path("/board/list"))
        .and(header("host", host.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string(board_page(&["Pinned posting title"])))
        .expect(1)
        .mount(&server)
        .await;

    let target = Url::parse(&format!("http://{}/board/list", host)).unwrap();
    let body = fetch_page(&resolver(), &target, &test_fetch_config())
        .await
        .unwrap();

    assert!(body.contains("Pinned posting title"));
}

#[tokio::test]
async fn test_failed_resolution_falls_back_to_hostname() {
    let server = MockServer::start().await;
    let host = format!("localhost:{}", server.address().port());

    Mock::given(method("GET"))
        .and(path("/board/list"))
        .and(header("host", host.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string(board_page(&["Fallback posting title"])))
        .expect(1)
        .mount(&server)
        .await;

    let (resolver, calls) = counting_resolver(None);
    let target = Url::parse(&format!("http://{}/board/list", host)).unwrap();
    let body = fetch_page(&resolver, &target, &test_fetch_config())
        .await
        .unwrap();

    assert!(body.contains("Fallback posting title"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_direct_connection_skips_resolver_chain() {
    let server = MockServer::start().await;
    let host = format!("localhost:{}", server.address().port());
    mount_page(&server, board_page(&["Direct posting title"])).await;

    // An unroutable answer would break the fetch if it were used
    let (resolver, calls) = counting_resolver(Some("192.0.2.1".parse().unwrap()));
    let config = FetchConfig {
        connect_via_ip: false,
        ..test_fetch_config()
    };
    let target = Url::parse(&format!("http://{}/board/list", host)).unwrap();
    let body = fetch_page(&resolver, &target, &config).await.unwrap();

    assert!(body.contains("Direct posting title"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_first_cycle_then_no_change() {
    let server = MockServer::start().await;
    mount_page(&server, board_page(&["Spring recruitment notice"])).await;

    let dir = tempfile::tempdir().unwrap();
    let notifier = Arc::new(RecordingNotifier::default());
    let monitor = build_monitor(&server, dir.path(), notifier.clone());

    let first = monitor.run_cycle().await;
    assert!(first.success, "errors: {:?}", first.errors);
    assert!(first.first_run);
    assert_eq!(first.new_items.len(), 1);
    assert_eq!(first.new_items[0].date(), Some("2024-05-01"));
    assert!(dir.path().join(SNAPSHOT_FILE).exists());
    assert!(dir.path().join(MARKER_FILE).exists());

    let second = monitor.run_cycle().await;
    assert!(second.success);
    assert!(!second.first_run);
    assert!(second.new_items.is_empty());
    assert_eq!(second.items.len(), 1);

    let calls = notifier.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].2, "first cycle goes to the dev recipient only");
}

#[tokio::test]
async fn test_new_posting_notifies_everyone() {
    let dir = tempfile::tempdir().unwrap();
    let notifier = Arc::new(RecordingNotifier::default());

    let server = MockServer::start().await;
    mount_page(&server, board_page(&["Spring recruitment notice"])).await;
    build_monitor(&server, dir.path(), notifier.clone())
        .run_cycle()
        .await;

    server.reset().await;
    mount_page(
        &server,
        board_page(&["Spring recruitment notice", "Summer internship program"]),
    )
    .await;
    let result = build_monitor(&server, dir.path(), notifier.clone())
        .run_cycle()
        .await;

    assert!(result.success);
    assert_eq!(result.items.len(), 2);
    assert_eq!(result.new_items.len(), 1);
    assert_eq!(result.new_items[0].title(), "Summer internship program");
    assert!(result.notified);

    let calls = notifier.calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert_eq!(
        calls[1],
        (
            "[notice-watch] New posting: Summer internship program".to_string(),
            vec!["Summer internship program".to_string()],
            false
        )
    );

    let cache = FileCache::open(dir.path());
    assert_eq!(cache.load_snapshot().unwrap().len(), 2);
}

#[tokio::test]
async fn test_unreachable_target_keeps_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let notifier = Arc::new(RecordingNotifier::default());

    let server = MockServer::start().await;
    mount_page(&server, board_page(&["Spring recruitment notice"])).await;
    build_monitor(&server, dir.path(), notifier.clone())
        .run_cycle()
        .await;
    let before = std::fs::read(dir.path().join(SNAPSHOT_FILE)).unwrap();

    server.reset().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let result = build_monitor(&server, dir.path(), notifier.clone())
        .run_cycle()
        .await;

    assert!(!result.success);
    assert!(result.errors[0].contains("after 3 attempts"));
    assert_eq!(std::fs::read(dir.path().join(SNAPSHOT_FILE)).unwrap(), before);
    assert_eq!(notifier.calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_snapshot_file_layout() {
    let server = MockServer::start().await;
    mount_page(&server, board_page(&["Spring recruitment notice"])).await;

    let dir = tempfile::tempdir().unwrap();
    build_monitor(&server, dir.path(), Arc::new(RecordingNotifier::default()))
        .run_cycle()
        .await;

    let raw = std::fs::read_to_string(dir.path().join(SNAPSHOT_FILE)).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let entries = json.as_object().unwrap();
    assert_eq!(entries.len(), 1);

    let (id, entry) = entries.iter().next().unwrap();
    assert_eq!(id.len(), 32);
    assert_eq!(entry["id"], id.as_str());
    assert_eq!(entry["title"], "Spring recruitment notice");
    assert!(entry["link"].as_str().unwrap().ends_with("/board/view?id=1"));
    assert!(entry["crawledAt"].as_str().is_some());
    assert!(entry.get("contentPreview").is_some());

    assert_eq!(std::fs::metadata(dir.path().join(MARKER_FILE)).unwrap().len(), 0);
}
