//! Notification delivery
//!
//! This module defines the [`Notifier`] seam used by the monitor and its
//! implementations:
//! - `EmailNotifier`: SMTP delivery, one message per recipient
//! - `LogNotifier`: writes notifications to the log only

mod email;
mod logging;
mod message;
mod traits;

pub use email::EmailNotifier;
pub use logging::LogNotifier;
pub use message::compose_message;
pub use traits::{NotifyError, NotifyReport, NotifyResult, Notifier, RecipientFailure};

use crate::config::EmailConfig;
use std::sync::Arc;

/// Picks the notifier for the given email settings
///
/// Falls back to [`LogNotifier`] when email is not configured.
pub fn build_notifier(email: Option<&EmailConfig>) -> NotifyResult<Arc<dyn Notifier>> {
    match email {
        Some(cfg) => Ok(Arc::new(EmailNotifier::from_config(cfg)?)),
        None => {
            tracing::info!("No [email] section configured; notifications will only be logged");
            Ok(Arc::new(LogNotifier))
        }
    }
}
