//! Data model for monitored postings
//!
//! # Components
//!
//! - `Item`: An immutable, content-addressed posting record
//! - `CrawlResult`: The transient outcome of one monitoring cycle

mod crawl_result;
mod item;

// Re-export main types
pub use crawl_result::CrawlResult;
pub use item::{compute_item_id, Item, MAX_PREVIEW_CHARS};
