//! Hostname resolution with ordered fallback strategies
//!
//! Resolution tries each strategy in priority order and stops at the first
//! address found:
//! 1. UDP DNS against each configured public nameserver
//! 2. DNS-over-HTTPS (JSON API) against each configured endpoint
//! 3. The operating system resolver
//!
//! Strategies run sequentially, never raced, so the winner is decided by
//! priority rather than speed. Each attempt has its own timeout.

use crate::clock::Clock;
use crate::config::{ResolverConfig, MAX_DNS_CACHE_TTL_SECONDS};
use crate::crawler::dns_cache::DnsCache;
use async_trait::async_trait;
use hickory_resolver::config::{
    NameServerConfigGroup, ResolverConfig as NameserverConfig, ResolverOpts,
};
use hickory_resolver::TokioAsyncResolver;
use reqwest::Client;
use serde::Deserialize;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors produced while resolving a hostname
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("{strategy} timed out after {timeout_ms}ms")]
    Timeout { strategy: String, timeout_ms: u64 },

    #[error("{strategy} returned no usable address for {host}")]
    NoAddress { strategy: String, host: String },

    #[error("{strategy} lookup of {host} failed: {message}")]
    Lookup {
        strategy: String,
        host: String,
        message: String,
    },

    #[error("All {} resolution strategies failed for {host}: {}", .failures.len(), .failures.join("; "))]
    Exhausted { host: String, failures: Vec<String> },
}

/// A single way of turning a hostname into an address
#[async_trait]
pub trait ResolveStrategy: Send + Sync {
    /// Short name used in logs and errors (e.g. "udp:1.1.1.1")
    fn name(&self) -> String;

    /// Resolves `host` to one address
    async fn resolve(&self, host: &str) -> Result<IpAddr, ResolveError>;
}

/// Queries one public nameserver directly over UDP
pub struct NameserverStrategy {
    server: IpAddr,
    resolver: TokioAsyncResolver,
}

impl NameserverStrategy {
    pub fn new(server: IpAddr, timeout: Duration) -> Self {
        let group = NameServerConfigGroup::from_ips_clear(&[server], 53, true);
        let config = NameserverConfig::from_parts(None, vec![], group);

        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        opts.attempts = 1;
        // Caching is handled by DnsCache
        opts.cache_size = 0;

        Self {
            server,
            resolver: TokioAsyncResolver::tokio(config, opts),
        }
    }
}

#[async_trait]
impl ResolveStrategy for NameserverStrategy {
    fn name(&self) -> String {
        format!("udp:{}", self.server)
    }

    async fn resolve(&self, host: &str) -> Result<IpAddr, ResolveError> {
        let lookup = self
            .resolver
            .lookup_ip(host)
            .await
            .map_err(|e| ResolveError::Lookup {
                strategy: self.name(),
                host: host.to_string(),
                message: e.to_string(),
            })?;

        // Prefer IPv4
        let addrs: Vec<IpAddr> = lookup.iter().collect();
        addrs
            .iter()
            .find(|a| a.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| ResolveError::NoAddress {
                strategy: self.name(),
                host: host.to_string(),
            })
    }
}

/// DNS JSON response as served by Cloudflare and Google DoH endpoints
#[derive(Debug, Deserialize)]
struct DohResponse {
    #[serde(rename = "Status")]
    status: u32,

    #[serde(rename = "Answer", default)]
    answer: Vec<DohAnswer>,
}

#[derive(Debug, Deserialize)]
struct DohAnswer {
    #[serde(rename = "type")]
    record_type: u16,
    data: String,
}

const DNS_TYPE_A: u16 = 1;

/// Queries a DNS-over-HTTPS endpoint using the JSON API
pub struct DohStrategy {
    endpoint: String,
    client: Client,
}

impl DohStrategy {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: endpoint.to_string(),
            client,
        })
    }
}

#[async_trait]
impl ResolveStrategy for DohStrategy {
    fn name(&self) -> String {
        format!("doh:{}", self.endpoint)
    }

    async fn resolve(&self, host: &str) -> Result<IpAddr, ResolveError> {
        let lookup_err = |message: String| ResolveError::Lookup {
            strategy: self.name(),
            host: host.to_string(),
            message,
        };

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("name", host), ("type", "A")])
            .header(reqwest::header::ACCEPT, "application/dns-json")
            .send()
            .await
            .map_err(|e| lookup_err(e.to_string()))?;

        if !response.status().is_success() {
            return Err(lookup_err(format!("HTTP {}", response.status().as_u16())));
        }

        let body: DohResponse = response
            .json()
            .await
            .map_err(|e| lookup_err(format!("invalid DNS JSON: {}", e)))?;

        if body.status != 0 {
            return Err(lookup_err(format!("DNS status {}", body.status)));
        }

        body.answer
            .iter()
            .filter(|a| a.record_type == DNS_TYPE_A)
            .find_map(|a| a.data.parse::<IpAddr>().ok())
            .ok_or_else(|| ResolveError::NoAddress {
                strategy: self.name(),
                host: host.to_string(),
            })
    }
}

/// Uses the operating system's configured resolver
pub struct SystemStrategy;

#[async_trait]
impl ResolveStrategy for SystemStrategy {
    fn name(&self) -> String {
        "system".to_string()
    }

    async fn resolve(&self, host: &str) -> Result<IpAddr, ResolveError> {
        let mut addrs = tokio::net::lookup_host((host, 0))
            .await
            .map_err(|e| ResolveError::Lookup {
                strategy: self.name(),
                host: host.to_string(),
                message: e.to_string(),
            })?;

        addrs
            .next()
            .map(|a| a.ip())
            .ok_or_else(|| ResolveError::NoAddress {
                strategy: self.name(),
                host: host.to_string(),
            })
    }
}

/// Resolves hostnames through an ordered strategy chain with caching
pub struct HostResolver {
    strategies: Vec<Box<dyn ResolveStrategy>>,
    cache: DnsCache,
    attempt_timeout: Duration,
}

impl HostResolver {
    /// Creates a resolver from an explicit strategy list
    ///
    /// # Arguments
    ///
    /// * `strategies` - Strategies in priority order
    /// * `attempt_timeout` - Upper bound on each individual strategy attempt
    /// * `cache_ttl` - How long successful resolutions are reused
    /// * `clock` - Time source for cache expiry
    pub fn new(
        strategies: Vec<Box<dyn ResolveStrategy>>,
        attempt_timeout: Duration,
        cache_ttl: chrono::Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            strategies,
            cache: DnsCache::new(cache_ttl, clock),
            attempt_timeout,
        }
    }

    /// Builds the standard chain: nameservers, then DoH endpoints, then the system resolver
    pub fn from_config(config: &ResolverConfig, clock: Arc<dyn Clock>) -> Result<Self, reqwest::Error> {
        let timeout = Duration::from_secs(config.timeout_seconds);
        let ttl_seconds = config.cache_ttl_seconds.min(MAX_DNS_CACHE_TTL_SECONDS) as i64;
        let cache_ttl = chrono::Duration::try_seconds(ttl_seconds).unwrap_or(chrono::Duration::zero());
        let mut strategies: Vec<Box<dyn ResolveStrategy>> = Vec::new();

        for server in &config.nameservers {
            match server.parse::<IpAddr>() {
                Ok(ip) => strategies.push(Box::new(NameserverStrategy::new(ip, timeout))),
                Err(_) => tracing::warn!("Skipping invalid nameserver '{}'", server),
            }
        }

        for endpoint in &config.doh_endpoints {
            strategies.push(Box::new(DohStrategy::new(endpoint, timeout)?));
        }

        if config.use_system_resolver {
            strategies.push(Box::new(SystemStrategy));
        }

        Ok(Self::new(
            strategies,
            timeout,
            cache_ttl,
            clock,
        ))
    }

    /// Names of the configured strategies, in order
    pub fn strategy_names(&self) -> Vec<String> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Resolves `host` to an address
    ///
    /// IP literals are returned as-is. Cached results are reused until their
    /// TTL expires. Otherwise each strategy is tried in order until one
    /// succeeds.
    pub async fn resolve(&self, host: &str) -> Result<IpAddr, ResolveError> {
        let bare = host.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = bare.parse::<IpAddr>() {
            return Ok(ip);
        }

        if let Some(cached) = self.cache.get(host) {
            tracing::trace!(
                "DNS cache hit for {} ({} via {})",
                host,
                cached.addr,
                cached.source
            );
            return Ok(cached.addr);
        }

        let mut failures = Vec::new();

        for strategy in &self.strategies {
            let name = strategy.name();
            let outcome = tokio::time::timeout(self.attempt_timeout, strategy.resolve(host))
                .await
                .unwrap_or_else(|_| {
                    Err(ResolveError::Timeout {
                        strategy: name.clone(),
                        timeout_ms: self.attempt_timeout.as_millis() as u64,
                    })
                });

            match outcome {
                Ok(addr) => {
                    tracing::debug!("Resolved {} to {} via {}", host, addr, name);
                    self.cache.insert(host, addr, &name);
                    return Ok(addr);
                }
                Err(e) => {
                    tracing::debug!("Resolution of {} via {} failed: {}", host, name, e);
                    failures.push(e.to_string());
                }
            }
        }

        tracing::warn!("All resolution strategies failed for {}", host);
        Err(ResolveError::Exhausted {
            host: host.to_string(),
            failures,
        })
    }
}
