//! Cache statistics display
//!
//! Renders the [`CacheStats`] reported by the item cache.

use crate::storage::CacheStats;
use chrono::{DateTime, Utc};

/// Formats cache statistics as plain text
///
/// # Arguments
///
/// * `stats` - The statistics to display
/// * `now` - Reference time for item ages
///
/// # Returns
///
/// A multi-line report
pub fn format_cache_stats(stats: &CacheStats, now: DateTime<Utc>) -> String {
    let mut out = String::new();

    out.push_str("=== Cache Statistics ===\n\n");
    out.push_str(&format!("  Cached items: {}\n", stats.total_items));
    out.push_str(&format!("  Snapshot size: {}\n", human_bytes(stats.size_bytes)));

    if let Some(oldest) = stats.oldest_crawled_at {
        out.push_str(&format!(
            "  Oldest item: {} ({} days ago)\n",
            oldest.to_rfc3339(),
            (now - oldest).num_days()
        ));
    }
    if let Some(newest) = stats.newest_crawled_at {
        out.push_str(&format!(
            "  Newest item: {} ({} days ago)\n",
            newest.to_rfc3339(),
            (now - newest).num_days()
        ));
    }
    if stats.total_items == 0 {
        out.push_str("\n  The cache is empty; no cycle has persisted items yet.\n");
    }

    out
}

/// Prints cache statistics to stdout
pub fn print_cache_stats(stats: &CacheStats) {
    print!("{}", format_cache_stats(stats, Utc::now()));
}

fn human_bytes(bytes: u64) -> String {
    match bytes {
        b if b >= 1024 * 1024 => format!("{:.1} MiB", b as f64 / (1024.0 * 1024.0)),
        b if b >= 1024 => format!("{:.1} KiB", b as f64 / 1024.0),
        b => format!("{} bytes", b),
    }
}
