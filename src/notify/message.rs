//! Subject and body text for new-item notifications

use crate::model::Item;
use std::fmt::Write;

/// Composes the subject and plain-text body for `items`
///
/// The first cycle after deployment announces the items as the initial cache
/// contents rather than as new postings.
pub fn compose_message(items: &[Item], first_run: bool, target_url: &str) -> (String, String) {
    let title = if first_run {
        format!(
            "[notice-watch] Cache initialized with {} postings",
            items.len()
        )
    } else if items.len() == 1 {
        format!("[notice-watch] New posting: {}", items[0].title())
    } else {
        format!("[notice-watch] {} new postings", items.len())
    };

    let mut body = String::new();
    if first_run {
        let _ = writeln!(
            body,
            "First check since deployment. The following postings are currently listed on {}:",
            target_url
        );
    } else {
        let _ = writeln!(body, "New postings were found on {}:", target_url);
    }
    body.push('\n');

    for (idx, item) in items.iter().enumerate() {
        let _ = write!(body, "{}. {}", idx + 1, item.title());
        if let Some(date) = item.date() {
            let _ = write!(body, " ({})", date);
        }
        body.push('\n');
        let _ = writeln!(body, "   {}", item.link());
        if !item.content_preview().is_empty() && item.content_preview() != item.title() {
            let _ = writeln!(body, "   {}", item.content_preview());
        }
        body.push('\n');
    }

    (title, body)
}
