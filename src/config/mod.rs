//! Configuration module for notice-watch
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use notice_watch::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("notice-watch.toml")).unwrap();
//! println!("Retries per cycle: {}", config.fetch.max_retries);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CacheConfig, Config, EmailConfig, FetchConfig, HealthConfig, ResolverConfig, ScheduleConfig,
    TargetConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};

// Re-export validation and its bounds
pub use validation::{validate, MAX_CACHE_AGE_DAYS, MAX_DNS_CACHE_TTL_SECONDS, MAX_INTERVAL_MINUTES};
