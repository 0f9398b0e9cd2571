use serde::Deserialize;

/// Main configuration structure for notice-watch
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub target: TargetConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    pub cache: CacheConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// SMTP settings; notifications are only logged when absent
    pub email: Option<EmailConfig>,
    /// Health endpoint settings; no endpoint is served when absent
    pub health: Option<HealthConfig>,
}

/// The page being monitored
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// Absolute URL of the listing page
    pub url: String,
}

/// HTTP fetch behavior
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Per-attempt request timeout (seconds)
    #[serde(rename = "timeout-seconds", default = "default_fetch_timeout")]
    pub timeout_seconds: u64,

    /// Total number of HTTP attempts before giving up
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the second attempt; doubles for each later attempt (milliseconds)
    #[serde(rename = "retry-base-delay-ms", default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,

    /// Responses with a body of this many bytes or fewer are treated as failures
    #[serde(rename = "min-content-length", default = "default_min_content_length")]
    pub min_content_length: usize,

    /// Pin requests to the address found by the resolver chain
    #[serde(rename = "connect-via-ip", default = "default_true")]
    pub connect_via_ip: bool,

    /// Skip TLS certificate verification for the target
    #[serde(rename = "accept-invalid-certs", default = "default_true")]
    pub accept_invalid_certs: bool,

    /// Pool of user agents; one is picked at random per attempt
    #[serde(rename = "user-agents", default = "default_user_agents")]
    pub user_agents: Vec<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_fetch_timeout(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay(),
            min_content_length: default_min_content_length(),
            connect_via_ip: true,
            accept_invalid_certs: true,
            user_agents: default_user_agents(),
        }
    }
}

/// Hostname resolution behavior
#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    /// Public DNS servers queried over UDP, in priority order
    #[serde(default = "default_nameservers")]
    pub nameservers: Vec<String>,

    /// DNS-over-HTTPS JSON endpoints, in priority order
    #[serde(rename = "doh-endpoints", default = "default_doh_endpoints")]
    pub doh_endpoints: Vec<String>,

    /// Fall back to the operating system resolver last
    #[serde(rename = "use-system-resolver", default = "default_true")]
    pub use_system_resolver: bool,

    /// Per-strategy timeout (seconds)
    #[serde(rename = "timeout-seconds", default = "default_resolver_timeout")]
    pub timeout_seconds: u64,

    /// How long a resolved address is reused (seconds)
    #[serde(rename = "cache-ttl-seconds", default = "default_dns_ttl")]
    pub cache_ttl_seconds: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            nameservers: default_nameservers(),
            doh_endpoints: default_doh_endpoints(),
            use_system_resolver: true,
            timeout_seconds: default_resolver_timeout(),
            cache_ttl_seconds: default_dns_ttl(),
        }
    }
}

/// Item cache location and retention
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Directory holding the snapshot and first-run marker
    pub dir: String,

    /// Entries not seen for this many days are removed by cleanup
    #[serde(rename = "max-age-days", default = "default_max_age_days")]
    pub max_age_days: u32,
}

/// Daemon scheduling
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Pause between the end of one cycle and the start of the next (minutes)
    #[serde(rename = "interval-minutes", default = "default_interval_minutes")]
    pub interval_minutes: u64,

    /// Run cache cleanup after every cycle
    #[serde(rename = "cleanup-after-cycle", default = "default_true")]
    pub cleanup_after_cycle: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            cleanup_after_cycle: true,
        }
    }
}

/// SMTP notification settings
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    #[serde(rename = "smtp-host")]
    pub smtp_host: String,

    #[serde(rename = "smtp-port", default = "default_smtp_port")]
    pub smtp_port: u16,

    pub username: Option<String>,

    pub password: Option<String>,

    /// Sender address
    pub from: String,

    /// Full recipient list for regular notifications
    pub recipients: Vec<String>,

    /// Sole recipient for the first cycle after deployment
    #[serde(rename = "dev-recipient")]
    pub dev_recipient: String,
}

/// Health endpoint settings
#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    /// Socket address to listen on (e.g. "127.0.0.1:8080")
    pub bind: String,
}

fn default_true() -> bool {
    true
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay() -> u64 {
    1000
}

fn default_min_content_length() -> usize {
    1000
}

fn default_user_agents() -> Vec<String> {
    vec![
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15".to_string(),
        "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0".to_string(),
    ]
}

fn default_nameservers() -> Vec<String> {
    vec!["1.1.1.1".to_string(), "8.8.8.8".to_string()]
}

fn default_doh_endpoints() -> Vec<String> {
    vec![
        "https://cloudflare-dns.com/dns-query".to_string(),
        "https://dns.google/resolve".to_string(),
    ]
}

fn default_resolver_timeout() -> u64 {
    5
}

fn default_dns_ttl() -> u64 {
    300
}

fn default_max_age_days() -> u32 {
    30
}

fn default_interval_minutes() -> u64 {
    30
}

fn default_smtp_port() -> u16 {
    587
}
