//! Notifier that only writes to the log
//!
//! Used when no `[email]` section is configured, e.g. for local dry runs.

use crate::model::Item;
use crate::notify::traits::{NotifyReport, NotifyResult, Notifier};
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(
        &self,
        title: &str,
        body: &str,
        items: &[Item],
        restrict_to_dev: bool,
    ) -> NotifyResult<NotifyReport> {
        let audience = if restrict_to_dev { "dev" } else { "all" };
        tracing::info!("{} ({} items, audience: {})", title, items.len(), audience);
        for line in body.lines().filter(|l| !l.trim().is_empty()) {
            tracing::info!("  {}", line);
        }
        Ok(NotifyReport::delivered())
    }
}
