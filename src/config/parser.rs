use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use notice_watch::config::load_config;
///
/// let config = load_config(Path::new("notice-watch.toml")).unwrap();
/// println!("Watching: {}", config.target.url);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from a TOML string
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so deployments can tell which configuration a daemon runs with.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[target]
url = "https://www.example.go.kr/board/list.do"

[fetch]
timeout-seconds = 20
max-retries = 4
user-agents = ["TestAgent/1.0"]

[resolver]
nameservers = ["1.1.1.1"]
doh-endpoints = ["https://cloudflare-dns.com/dns-query"]

[cache]
dir = "./cache"
max-age-days = 14

[schedule]
interval-minutes = 10

[email]
smtp-host = "smtp.example.com"
from = "watch@example.com"
recipients = ["a@example.com", "b@example.com"]
dev-recipient = "dev@example.com"

[health]
bind = "127.0.0.1:8080"
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.target.url, "https://www.example.go.kr/board/list.do");
        assert_eq!(config.fetch.timeout_seconds, 20);
        assert_eq!(config.fetch.max_retries, 4);
        assert_eq!(config.fetch.user_agents, vec!["TestAgent/1.0".to_string()]);
        assert_eq!(config.fetch.min_content_length, 1000);
        assert_eq!(config.resolver.nameservers.len(), 1);
        assert_eq!(config.cache.max_age_days, 14);
        assert_eq!(config.schedule.interval_minutes, 10);

        let email = config.email.unwrap();
        assert_eq!(email.smtp_port, 587);
        assert_eq!(email.recipients.len(), 2);
        assert_eq!(config.health.unwrap().bind, "127.0.0.1:8080");
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse_config(
            r#"
[target]
url = "https://example.com/notices"

[cache]
dir = "/var/lib/notice-watch"
"#,
        )
        .unwrap();

        assert_eq!(config.fetch.max_retries, 3);
        assert_eq!(config.fetch.retry_base_delay_ms, 1000);
        assert!(config.fetch.accept_invalid_certs);
        assert_eq!(config.resolver.nameservers, vec!["1.1.1.1", "8.8.8.8"]);
        assert_eq!(config.resolver.doh_endpoints.len(), 2);
        assert_eq!(config.resolver.cache_ttl_seconds, 300);
        assert_eq!(config.cache.max_age_days, 30);
        assert!(config.email.is_none());
        assert!(config.health.is_none());
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let config_content = r#"
[target]
url = "https://example.com/"

[fetch]
max-retries = 0

[cache]
dir = "./cache"
"#;

        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_invalid_recipient_rejected() {
        let result = parse_config(
            r#"
[target]
url = "https://example.com/"

[cache]
dir = "./cache"

[email]
smtp-host = "smtp.example.com"
from = "watch@example.com"
recipients = ["not-an-address"]
dev-recipient = "dev@example.com"
"#,
        );
        assert!(matches!(result, Err(ConfigError::InvalidEmail(_))));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }
}
