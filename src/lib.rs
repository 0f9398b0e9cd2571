//! notice-watch: a single-page posting monitor
//!
//! This crate periodically fetches one web page, extracts its list of postings,
//! diffs them against a local content-addressed cache and emails a notification
//! when new postings appear.

pub mod clock;
pub mod config;
pub mod crawler;
pub mod health;
pub mod model;
pub mod notify;
pub mod output;
pub mod storage;

use thiserror::Error;

/// Main error type for notice-watch operations
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Notification error: {0}")]
    Notify(#[from] notify::NotifyError),

    #[error("Invalid item: {0}")]
    InvalidItem(String),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid email address in config: {0}")]
    InvalidEmail(String),
}

/// Result type alias for notice-watch operations
pub type WatchResult<T> = std::result::Result<T, WatchError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Monitor, Scheduler};
pub use model::{CrawlResult, Item};
pub use storage::{FileCache, ItemCache};
