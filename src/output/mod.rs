//! Console output for the CLI commands
//!
//! This module handles:
//! - Rendering cycle results for `run`
//! - Rendering connection diagnostics for `test-connection`
//! - Rendering cache statistics for `stats`

mod report;
pub mod stats;

pub use report::{format_connection_report, format_crawl_result, print_connection_report, print_crawl_result};
pub use stats::{format_cache_stats, print_cache_stats};
