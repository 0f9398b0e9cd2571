//! In-memory cache of resolved host addresses
//!
//! Entries expire after a fixed TTL and are evicted lazily on the next lookup
//! of the same host.

use crate::clock::Clock;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};

/// A resolved address and when it was obtained
#[derive(Debug, Clone)]
pub struct CachedAddress {
    /// The resolved address
    pub addr: IpAddr,

    /// When the address was resolved
    pub resolved_at: DateTime<Utc>,

    /// Name of the strategy that produced the address
    pub source: String,
}

impl CachedAddress {
    /// Checks if the entry is older than `ttl` at `now`
    pub fn is_stale(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.resolved_at >= ttl
    }

    /// Returns the age of the entry at `now`
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.resolved_at
    }
}

/// Hostname → address cache with a fixed TTL
pub struct DnsCache {
    entries: Mutex<HashMap<String, CachedAddress>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl DnsCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    /// Returns the cached entry for `host`, evicting it if expired
    pub fn get(&self, host: &str) -> Option<CachedAddress> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        match entries.get(host) {
            Some(entry) if entry.is_stale(now, self.ttl) => {
                tracing::debug!(
                    "DNS cache entry for {} expired (age {}s)",
                    host,
                    entry.age(now).num_seconds()
                );
                entries.remove(host);
                None
            }
            Some(entry) => Some(entry.clone()),
            None => None,
        }
    }

    /// Records a fresh resolution for `host`
    pub fn insert(&self, host: &str, addr: IpAddr, source: &str) {
        let entry = CachedAddress {
            addr,
            resolved_at: self.clock.now(),
            source: source.to_string(),
        };
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(host.to_string(), entry);
    }

    /// Number of entries currently held, including expired ones not yet evicted
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::net::Ipv4Addr;

    fn setup() -> (DnsCache, ManualClock) {
        let clock = ManualClock::new(Utc::now());
        let cache = DnsCache::new(Duration::minutes(5), Arc::new(clock.clone()));
        (cache, clock)
    }

    #[test]
    fn test_fresh_entry_is_returned() {
        let (cache, _clock) = setup();
        let addr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        cache.insert("example.com", addr, "udp:1.1.1.1");

        let entry = cache.get("example.com").unwrap();
        assert_eq!(entry.addr, addr);
        assert_eq!(entry.source, "udp:1.1.1.1");
    }

    #[test]
    fn test_not_stale_just_before_ttl() {
        let (cache, clock) = setup();
        cache.insert("example.com", IpAddr::V4(Ipv4Addr::LOCALHOST), "system");

        clock.advance(Duration::minutes(4) + Duration::seconds(59));

        assert!(cache.get("example.com").is_some());
    }

    #[test]
    fn test_expired_entry_is_evicted_on_lookup() {
        let (cache, clock) = setup();
        cache.insert("example.com", IpAddr::V4(Ipv4Addr::LOCALHOST), "system");

        clock.advance(Duration::minutes(6));
        assert_eq!(cache.len(), 1);

        assert!(cache.get("example.com").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_unknown_host() {
        let (cache, _clock) = setup();
        assert!(cache.get("missing.example").is_none());
    }
}
