//! HTML extraction of posting candidates
//!
//! Postings are found by trying a fixed, ordered list of CSS selector
//! strategies. The first strategy that yields any accepted anchor wins and
//! later strategies are not consulted, so overlapping selectors never produce
//! duplicate or partial matches.

use crate::clock::Clock;
use crate::model::Item;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::Arc;
use url::Url;

/// Titles shorter than this many characters are treated as navigation noise
pub const MIN_TITLE_CHARS: usize = 5;

/// How many ancestor levels are searched for a date element
pub const DATE_SEARCH_DEPTH: usize = 3;

/// Elements whose text becomes the content preview of an enclosed anchor
const ROW_ELEMENTS: &[&str] = &["tr", "li"];

/// Selectors tried in order by [`SelectorExtractor::with_defaults`]
pub const DEFAULT_SELECTORS: &[&str] = &[
    "a[href*='board']",
    "a[href*='notice']",
    "a[href*='view']",
    ".board-list a[href]",
    ".notice-list a[href]",
    ".list a[href]",
    "table td a[href]",
    "ul li a[href]",
];

/// Turns fetched HTML into posting candidates
pub trait Extractor: Send + Sync {
    /// Extracts candidates in document order, de-duplicated by id
    fn extract(&self, html: &str) -> Vec<Item>;
}

/// One named selector heuristic
#[derive(Debug, Clone)]
pub struct SelectorStrategy {
    pub source: String,
    selector: Selector,
}

impl SelectorStrategy {
    /// Parses a CSS selector
    ///
    /// # Returns
    ///
    /// * `Ok(SelectorStrategy)` - Valid selector
    /// * `Err(String)` - The selector could not be parsed
    pub fn parse(source: &str) -> Result<Self, String> {
        let selector =
            Selector::parse(source).map_err(|e| format!("Invalid selector '{}': {:?}", source, e))?;
        Ok(Self {
            source: source.to_string(),
            selector,
        })
    }
}

/// Extractor driven by an ordered list of selector strategies
pub struct SelectorExtractor {
    base_url: Url,
    strategies: Vec<SelectorStrategy>,
    date_selector: Selector,
    clock: Arc<dyn Clock>,
}

impl SelectorExtractor {
    /// Creates an extractor with custom strategies
    ///
    /// # Arguments
    ///
    /// * `base_url` - The target page URL, used to resolve relative links
    /// * `strategies` - Selector strategies in priority order
    /// * `clock` - Time source for `crawled_at`
    pub fn new(base_url: Url, strategies: Vec<SelectorStrategy>, clock: Arc<dyn Clock>) -> Self {
        Self {
            base_url,
            strategies,
            date_selector: Selector::parse("[class*='date']").expect("static selector is valid"),
            clock,
        }
    }

    /// Creates an extractor with [`DEFAULT_SELECTORS`]
    pub fn with_defaults(base_url: Url, clock: Arc<dyn Clock>) -> Self {
        let strategies = DEFAULT_SELECTORS
            .iter()
            .filter_map(|s| SelectorStrategy::parse(s).ok())
            .collect();
        Self::new(base_url, strategies, clock)
    }

    /// Applies a single strategy, returning accepted candidates
    fn apply(&self, document: &Html, strategy: &SelectorStrategy) -> Vec<Item> {
        let crawled_at = self.clock.now();
        let mut seen = HashSet::new();
        let mut items = Vec::new();

        for anchor in document.select(&strategy.selector) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let Some(link) = resolve_link(href, &self.base_url) else {
                continue;
            };

            let title = collapse_whitespace(anchor.text());
            if title.chars().count() < MIN_TITLE_CHARS {
                continue;
            }

            let date = self.find_date(anchor);
            let preview = self.preview_text(anchor);

            match Item::new(&title, &link, date, &preview, crawled_at) {
                Ok(item) => {
                    if seen.insert(item.id().to_string()) {
                        items.push(item);
                    }
                }
                Err(e) => tracing::trace!("Skipping candidate {}: {}", link, e),
            }
        }

        items
    }

    /// Looks for an element whose class mentions "date" near the anchor
    fn find_date(&self, anchor: ElementRef<'_>) -> Option<String> {
        anchor
            .ancestors()
            .filter_map(ElementRef::wrap)
            .take(DATE_SEARCH_DEPTH)
            .find_map(|ancestor| {
                ancestor
                    .select(&self.date_selector)
                    .map(|el| collapse_whitespace(el.text()))
                    .find(|text| !text.is_empty())
            })
    }

    /// Text of the enclosing row or list item, falling back to the parent element
    fn preview_text(&self, anchor: ElementRef<'_>) -> String {
        let mut ancestors = anchor.ancestors().filter_map(ElementRef::wrap);
        let parent = anchor.parent().and_then(ElementRef::wrap);

        let container = ancestors
            .find(|el| ROW_ELEMENTS.contains(&el.value().name()))
            .or(parent);

        container
            .map(|el| collapse_whitespace(el.text()))
            .unwrap_or_default()
    }
}

impl Extractor for SelectorExtractor {
    fn extract(&self, html: &str) -> Vec<Item> {
        let document = Html::parse_document(html);

        for strategy in &self.strategies {
            let items = self.apply(&document, strategy);
            if !items.is_empty() {
                tracing::debug!(
                    "Selector '{}' matched {} candidates",
                    strategy.source,
                    items.len()
                );
                return items;
            }
        }

        tracing::info!("No selector strategy matched any candidates");
        Vec::new()
    }
}

/// Joins text fragments and collapses runs of whitespace
fn collapse_whitespace<'a>(text: impl Iterator<Item = &'a str>) -> String {
    text.flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) if matches!(absolute_url.scheme(), "http" | "https") => {
            Some(absolute_url.to_string())
        }
        _ => None,
    }
}
