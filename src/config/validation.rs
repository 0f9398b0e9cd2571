use crate::config::types::{
    CacheConfig, Config, EmailConfig, FetchConfig, HealthConfig, ResolverConfig, ScheduleConfig,
    TargetConfig,
};
use crate::ConfigError;
use std::net::{IpAddr, SocketAddr};
use url::Url;

/// Longest accepted cache retention
pub const MAX_CACHE_AGE_DAYS: u32 = 36_500;

/// Longest accepted DNS cache TTL
pub const MAX_DNS_CACHE_TTL_SECONDS: u64 = 86_400;

/// Longest accepted delay between cycles (one week)
pub const MAX_INTERVAL_MINUTES: u64 = 10_080;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_target_config(&config.target)?;
    validate_fetch_config(&config.fetch)?;
    validate_resolver_config(&config.resolver)?;
    validate_cache_config(&config.cache)?;
    validate_schedule_config(&config.schedule)?;
    if let Some(email) = &config.email {
        validate_email_config(email)?;
    }
    if let Some(health) = &config.health {
        validate_health_config(health)?;
    }
    Ok(())
}

/// Validates the monitored target
fn validate_target_config(config: &TargetConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid target url '{}': {}", config.url, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "Target url '{}' must use http or https",
            config.url
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "Target url '{}' has no host",
            config.url
        )));
    }

    Ok(())
}

/// Validates fetch configuration
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.timeout_seconds < 1 || config.timeout_seconds > 300 {
        return Err(ConfigError::Validation(format!(
            "fetch timeout_seconds must be between 1 and 300, got {}",
            config.timeout_seconds
        )));
    }

    if config.max_retries < 1 || config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be between 1 and 10, got {}",
            config.max_retries
        )));
    }

    if config.user_agents.is_empty() {
        return Err(ConfigError::Validation(
            "user_agents must contain at least one entry".to_string(),
        ));
    }

    if config.user_agents.iter().any(|ua| ua.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "user_agents cannot contain empty entries".to_string(),
        ));
    }

    Ok(())
}

/// Validates resolver configuration
fn validate_resolver_config(config: &ResolverConfig) -> Result<(), ConfigError> {
    for server in &config.nameservers {
        server.parse::<IpAddr>().map_err(|_| {
            ConfigError::Validation(format!("Nameserver '{}' is not an IP address", server))
        })?;
    }

    for endpoint in &config.doh_endpoints {
        let url = Url::parse(endpoint).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid DoH endpoint '{}': {}", endpoint, e))
        })?;
        if url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "DoH endpoint '{}' must use HTTPS scheme",
                endpoint
            )));
        }
    }

    if config.nameservers.is_empty() && config.doh_endpoints.is_empty() && !config.use_system_resolver
    {
        return Err(ConfigError::Validation(
            "At least one resolution strategy must be enabled".to_string(),
        ));
    }

    if config.timeout_seconds < 1 || config.timeout_seconds > 60 {
        return Err(ConfigError::Validation(format!(
            "resolver timeout_seconds must be between 1 and 60, got {}",
            config.timeout_seconds
        )));
    }

    if config.cache_ttl_seconds > MAX_DNS_CACHE_TTL_SECONDS {
        return Err(ConfigError::Validation(format!(
            "cache_ttl_seconds must be at most {}, got {}",
            MAX_DNS_CACHE_TTL_SECONDS, config.cache_ttl_seconds
        )));
    }

    Ok(())
}

/// Validates cache configuration
fn validate_cache_config(config: &CacheConfig) -> Result<(), ConfigError> {
    if config.dir.is_empty() {
        return Err(ConfigError::Validation(
            "cache dir cannot be empty".to_string(),
        ));
    }

    if config.max_age_days < 1 || config.max_age_days > MAX_CACHE_AGE_DAYS {
        return Err(ConfigError::Validation(format!(
            "max_age_days must be between 1 and {}, got {}",
            MAX_CACHE_AGE_DAYS, config.max_age_days
        )));
    }

    Ok(())
}

/// Validates schedule configuration
fn validate_schedule_config(config: &ScheduleConfig) -> Result<(), ConfigError> {
    if config.interval_minutes < 1 || config.interval_minutes > MAX_INTERVAL_MINUTES {
        return Err(ConfigError::Validation(format!(
            "interval_minutes must be between 1 and {}, got {}",
            MAX_INTERVAL_MINUTES, config.interval_minutes
        )));
    }
    Ok(())
}

/// Validates SMTP settings and recipient addresses
fn validate_email_config(config: &EmailConfig) -> Result<(), ConfigError> {
    if config.smtp_host.is_empty() {
        return Err(ConfigError::Validation(
            "smtp_host cannot be empty".to_string(),
        ));
    }

    if config.username.is_some() != config.password.is_some() {
        return Err(ConfigError::Validation(
            "username and password must be set together".to_string(),
        ));
    }

    validate_email(&config.from)?;
    validate_email(&config.dev_recipient)?;

    if config.recipients.is_empty() {
        return Err(ConfigError::Validation(
            "recipients must contain at least one address".to_string(),
        ));
    }

    for recipient in &config.recipients {
        validate_email(recipient)?;
    }

    Ok(())
}

/// Validates the health endpoint bind address
fn validate_health_config(config: &HealthConfig) -> Result<(), ConfigError> {
    config.bind.parse::<SocketAddr>().map_err(|_| {
        ConfigError::Validation(format!(
            "health bind '{}' is not a socket address",
            config.bind
        ))
    })?;
    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::InvalidEmail(
            "email address cannot be empty".to_string(),
        ));
    }

    // Basic email format check: must contain @ and have text on both sides
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::InvalidEmail(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::InvalidEmail(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    // Domain part should contain at least one dot
    if !domain.contains('.') {
        return Err(ConfigError::InvalidEmail(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
