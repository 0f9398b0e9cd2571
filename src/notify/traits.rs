//! Notifier trait and delivery types

use crate::model::Item;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Errors that prevent a notification from being attempted at all
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Invalid address '{address}': {message}")]
    InvalidAddress { address: String, message: String },

    #[error("Failed to set up transport: {0}")]
    Transport(String),

    #[error("Failed to build message: {0}")]
    Message(String),
}

/// Result type for notification operations
pub type NotifyResult<T> = Result<T, NotifyError>;

/// A recipient that could not be reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientFailure {
    pub recipient: String,
    pub error: String,
}

impl fmt::Display for RecipientFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "delivery to {} failed: {}", self.recipient, self.error)
    }
}

/// Outcome of one notification
///
/// `success` is true if at least one recipient received the message; any
/// recipients that did not are listed as warnings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifyReport {
    pub success: bool,
    pub per_recipient_failures: Vec<RecipientFailure>,
}

impl NotifyReport {
    pub fn delivered() -> Self {
        Self {
            success: true,
            per_recipient_failures: Vec::new(),
        }
    }
}

/// Delivers new-item notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Sends a notification about `items`
    ///
    /// # Arguments
    ///
    /// * `title` - Subject line
    /// * `body` - Plain-text body
    /// * `items` - The new items being announced
    /// * `restrict_to_dev` - Send only to the development recipient
    async fn notify(
        &self,
        title: &str,
        body: &str,
        items: &[Item],
        restrict_to_dev: bool,
    ) -> NotifyResult<NotifyReport>;
}
