//! HTTP fetcher implementation
//!
//! This module fetches the monitored page:
//! - Resolving the target host through the fallback resolver chain
//! - Pinning the connection to the resolved address while keeping the
//!   original hostname for the `Host` header and TLS SNI
//! - Rotating user agents between attempts
//! - Rejecting suspiciously short responses
//! - Retrying with exponential backoff

use crate::config::FetchConfig;
use crate::crawler::diagnostics::{test_connection, ConnectionReport};
use crate::crawler::resolver::HostResolver;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Longest pause between two attempts
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Errors produced while fetching the monitored page
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    Client(reqwest::Error),

    #[error("Invalid target url: {0}")]
    InvalidUrl(String),

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Content too short from {url}: {length} bytes (must exceed {minimum})")]
    ContentTooShort {
        url: String,
        length: usize,
        minimum: usize,
    },

    #[error("Giving up on {url} after {attempts} attempts: {last}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last: Box<FetchError>,
    },
}

/// Source of the monitored page's HTML
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches the page, retrying internally; returns the HTML body
    async fn fetch_page(&self) -> Result<String, FetchError>;

    /// Runs low-level connectivity checks without a full fetch
    async fn test_connection(&self) -> ConnectionReport;
}

/// Fetcher for one fixed target URL
pub struct HttpFetcher {
    target: Url,
    config: FetchConfig,
    resolver: Arc<HostResolver>,
}

impl HttpFetcher {
    /// Creates a fetcher for `target_url`
    ///
    /// # Returns
    ///
    /// * `Ok(HttpFetcher)` - Ready to fetch
    /// * `Err(FetchError::InvalidUrl)` - The target is not an absolute http(s) URL with a host
    pub fn new(
        target_url: &str,
        config: FetchConfig,
        resolver: Arc<HostResolver>,
    ) -> Result<Self, FetchError> {
        let target = parse_target(target_url)?;
        Ok(Self {
            target,
            config,
            resolver,
        })
    }

    pub fn target(&self) -> &Url {
        &self.target
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_page(&self) -> Result<String, FetchError> {
        fetch_page(&self.resolver, &self.target, &self.config).await
    }

    async fn test_connection(&self) -> ConnectionReport {
        test_connection(
            &self.resolver,
            &self.target,
            Duration::from_secs(self.config.timeout_seconds),
        )
        .await
    }
}

fn parse_target(target_url: &str) -> Result<Url, FetchError> {
    let target =
        Url::parse(target_url).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", target_url, e)))?;
    if target.host_str().is_none() || !matches!(target.scheme(), "http" | "https") {
        return Err(FetchError::InvalidUrl(target_url.to_string()));
    }
    Ok(target)
}

/// Fetches `target` with retry logic
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | Resolution failure | Request the hostname directly |
/// | Timeout | Retry after backoff |
/// | Transport error | Retry after backoff |
/// | Non-2xx status | Retry after backoff |
/// | Body ≤ `min_content_length` bytes | Retry after backoff |
///
/// Exactly `config.max_retries` HTTP attempts are made before giving up.
/// The delay before attempt `n` (n ≥ 2) is `retry_base_delay_ms * 2^(n-2)`,
/// capped at 30 seconds.
///
/// # Returns
///
/// * `Ok(String)` - The page body
/// * `Err(FetchError::RetriesExhausted)` - Every attempt failed
pub async fn fetch_page(
    resolver: &HostResolver,
    target: &Url,
    config: &FetchConfig,
) -> Result<String, FetchError> {
    let attempts = config.max_retries.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        if attempt > 1 {
            let delay = backoff_delay(config.retry_base_delay_ms, attempt);
            tracing::debug!(
                "Waiting {}ms before attempt {}/{}",
                delay.as_millis(),
                attempt,
                attempts
            );
            tokio::time::sleep(delay).await;
        }

        match fetch_once(resolver, target, config).await {
            Ok(body) => {
                if attempt > 1 {
                    tracing::info!("Fetched {} on attempt {}/{}", target, attempt, attempts);
                }
                return Ok(body);
            }
            Err(e) => {
                tracing::warn!("Attempt {}/{} failed: {}", attempt, attempts, e);
                last_error = Some(e);
            }
        }
    }

    Err(FetchError::RetriesExhausted {
        url: target.to_string(),
        attempts,
        last: Box::new(
            last_error.unwrap_or_else(|| FetchError::InvalidUrl(target.to_string())),
        ),
    })
}

/// Delay before `attempt` (1-based); zero for the first attempt
pub fn backoff_delay(base_delay_ms: u64, attempt: u32) -> Duration {
    if attempt <= 1 {
        return Duration::ZERO;
    }
    let factor = 2u64.saturating_pow(attempt - 2);
    Duration::from_millis(base_delay_ms.saturating_mul(factor)).min(MAX_BACKOFF)
}

/// Makes a single HTTP attempt
async fn fetch_once(
    resolver: &HostResolver,
    target: &Url,
    config: &FetchConfig,
) -> Result<String, FetchError> {
    let url = target.to_string();
    let client = build_http_client(resolver, target, config).await?;

    let mut request = client.get(target.clone());
    if let Some(agent) = pick_user_agent(&config.user_agents) {
        request = request.header(USER_AGENT, agent);
    }

    let response = request.send().await.map_err(|e| classify(&url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url,
            status: status.as_u16(),
        });
    }

    let body = response.text().await.map_err(|e| classify(&url, e))?;

    if body.len() <= config.min_content_length {
        return Err(FetchError::ContentTooShort {
            url,
            length: body.len(),
            minimum: config.min_content_length,
        });
    }

    Ok(body)
}

/// Builds an HTTP client for one attempt
///
/// When `connect_via_ip` is set and the resolver chain finds an address, the
/// client is pinned to that address for the target host. If resolution
/// fails the client falls back to its own DNS lookup of the hostname.
pub async fn build_http_client(
    resolver: &HostResolver,
    target: &Url,
    config: &FetchConfig,
) -> Result<Client, FetchError> {
    let timeout = Duration::from_secs(config.timeout_seconds);
    let mut builder = Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .danger_accept_invalid_certs(config.accept_invalid_certs)
        .gzip(true)
        .brotli(true);

    if let Some(host) = target.host_str() {
        let is_literal = matches!(target.host(), Some(url::Host::Ipv4(_) | url::Host::Ipv6(_)));

        if config.connect_via_ip && !is_literal {
            match resolver.resolve(host).await {
                Ok(ip) => {
                    let port = target.port_or_known_default().unwrap_or(443);
                    tracing::debug!("Pinning {} to {}", host, ip);
                    builder = builder.resolve(host, SocketAddr::new(ip, port));
                }
                Err(e) => {
                    tracing::warn!("Falling back to direct hostname request: {}", e);
                }
            }
        }
    }

    builder.build().map_err(FetchError::Client)
}

fn pick_user_agent(pool: &[String]) -> Option<&str> {
    pool.choose(&mut rand::thread_rng()).map(String::as_str)
}

fn classify(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Http {
            url: url.to_string(),
            source: e,
        }
    }
}
