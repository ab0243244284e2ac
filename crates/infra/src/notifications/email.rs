//! Log-backed email transport

use async_trait::async_trait;
use crmsync_core::EmailSender;
use crmsync_domain::{EmailMessage, NotificationConfig, Result};
use tracing::info;

/// Email transport that records outgoing messages in the log.
///
/// Deployments without an SMTP relay still get a trace of every
/// notification that would have been sent.
pub struct LogEmailSender {
    from_address: String,
}

impl LogEmailSender {
    /// Sender that stamps every message with `from_address`.
    pub fn new(from_address: impl Into<String>) -> Self {
        Self { from_address: from_address.into() }
    }

    /// Sender using the configured from address.
    pub fn from_config(config: &NotificationConfig) -> Self {
        Self::new(config.from_address.clone())
    }
}

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            from = %self.from_address,
            to = %message.to,
            subject = %message.subject,
            body_len = message.html.len(),
            "email notification"
        );
        Ok(())
    }
}
