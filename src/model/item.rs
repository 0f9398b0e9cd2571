//! Posting record extracted from the monitored page
//!
//! Items are content-addressed: the id depends only on title and link, so
//! re-crawling the same posting always produces the same id.

use crate::WatchError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Maximum number of characters kept in an item's content preview
pub const MAX_PREVIEW_CHARS: usize = 200;

/// A single posting seen on the monitored page
///
/// Deserialization goes through [`Item::new`], so a stored id is never
/// trusted: it is recomputed from title and link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "StoredItem")]
pub struct Item {
    id: String,
    title: String,
    link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date: Option<String>,
    #[serde(default)]
    content_preview: String,
    crawled_at: DateTime<Utc>,
}

impl Item {
    /// Creates a new item, computing its id and truncating the preview
    ///
    /// # Arguments
    ///
    /// * `title` - Visible title of the posting (must be non-empty after trimming)
    /// * `link` - Absolute link to the posting (must be non-empty after trimming)
    /// * `date` - Optional date text shown next to the posting
    /// * `content_preview` - Surrounding text, truncated to [`MAX_PREVIEW_CHARS`]
    /// * `crawled_at` - When the posting was observed
    ///
    /// # Returns
    ///
    /// * `Ok(Item)` - A valid item
    /// * `Err(WatchError::InvalidItem)` - Title or link was empty
    pub fn new(
        title: &str,
        link: &str,
        date: Option<String>,
        content_preview: &str,
        crawled_at: DateTime<Utc>,
    ) -> Result<Self, WatchError> {
        let title = title.trim();
        let link = link.trim();

        if title.is_empty() {
            return Err(WatchError::InvalidItem("title cannot be empty".to_string()));
        }
        if link.is_empty() {
            return Err(WatchError::InvalidItem("link cannot be empty".to_string()));
        }

        let date = date
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        Ok(Self {
            id: compute_item_id(title, link),
            title: title.to_string(),
            link: link.to_string(),
            date,
            content_preview: truncate_chars(content_preview.trim(), MAX_PREVIEW_CHARS),
            crawled_at,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn link(&self) -> &str {
        &self.link
    }

    pub fn date(&self) -> Option<&str> {
        self.date.as_deref()
    }

    pub fn content_preview(&self) -> &str {
        &self.content_preview
    }

    pub fn crawled_at(&self) -> DateTime<Utc> {
        self.crawled_at
    }
}

/// On-disk shape of an item before validation
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredItem {
    title: String,
    link: String,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    content_preview: String,
    crawled_at: DateTime<Utc>,
}

impl TryFrom<StoredItem> for Item {
    type Error = WatchError;

    fn try_from(stored: StoredItem) -> Result<Self, Self::Error> {
        Item::new(
            &stored.title,
            &stored.link,
            stored.date,
            &stored.content_preview,
            stored.crawled_at,
        )
    }
}

/// Computes the deterministic id of a posting
///
/// The id is the first 128 bits of SHA-256 over `title`, a newline and
/// `link`, hex-encoded.
pub fn compute_item_id(title: &str, link: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(b"\n");
    hasher.update(link.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..16])
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
