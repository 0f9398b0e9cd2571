//! SMTP notifier
//!
//! Sends one plain-text message per recipient so a single bad address does not
//! block delivery to the others.

use crate::config::EmailConfig;
use crate::model::Item;
use crate::notify::traits::{NotifyError, NotifyReport, NotifyResult, Notifier, RecipientFailure};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// Port that uses implicit TLS instead of STARTTLS
const SMTPS_PORT: u16 = 465;

/// Notifier that delivers over SMTP
pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    recipients: Vec<Mailbox>,
    dev_recipient: Mailbox,
}

impl EmailNotifier {
    /// Builds the SMTP transport and parses all addresses
    ///
    /// # Returns
    ///
    /// * `Ok(EmailNotifier)` - Ready to send (no connection is made yet)
    /// * `Err(NotifyError)` - An address or the relay host is invalid
    pub fn from_config(config: &EmailConfig) -> NotifyResult<Self> {
        let builder = if config.smtp_port == SMTPS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
        }
        .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let mut builder = builder.port(config.smtp_port);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from: parse_mailbox(&config.from)?,
            recipients: config
                .recipients
                .iter()
                .map(|r| parse_mailbox(r))
                .collect::<NotifyResult<Vec<_>>>()?,
            dev_recipient: parse_mailbox(&config.dev_recipient)?,
        })
    }

    fn audience(&self, restrict_to_dev: bool) -> Vec<Mailbox> {
        if restrict_to_dev {
            vec![self.dev_recipient.clone()]
        } else {
            self.recipients.clone()
        }
    }
}

fn parse_mailbox(address: &str) -> NotifyResult<Mailbox> {
    address
        .parse::<Mailbox>()
        .map_err(|e| NotifyError::InvalidAddress {
            address: address.to_string(),
            message: e.to_string(),
        })
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &str {
        "email"
    }

    async fn notify(
        &self,
        title: &str,
        body: &str,
        items: &[Item],
        restrict_to_dev: bool,
    ) -> NotifyResult<NotifyReport> {
        let audience = self.audience(restrict_to_dev);
        let mut failures = Vec::new();

        for recipient in &audience {
            let message = Message::builder()
                .from(self.from.clone())
                .to(recipient.clone())
                .subject(title)
                .header(ContentType::TEXT_PLAIN)
                .body(body.to_string())
                .map_err(|e| NotifyError::Message(e.to_string()))?;

            match self.transport.send(message).await {
                Ok(_) => tracing::debug!("Sent notification to {}", recipient),
                Err(e) => {
                    tracing::warn!("Failed to send notification to {}: {}", recipient, e);
                    failures.push(RecipientFailure {
                        recipient: recipient.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let delivered = audience.len() - failures.len();
        tracing::info!(
            "Notified {}/{} recipients about {} items",
            delivered,
            audience.len(),
            items.len()
        );

        Ok(NotifyReport {
            success: delivered > 0,
            per_recipient_failures: failures,
        })
    }
}
