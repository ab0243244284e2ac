//! Webhook delivery over HTTP

use std::time::Duration;

use async_trait::async_trait;
use crmsync_core::WebhookSender;
use crmsync_domain::{NotificationConfig, Result};
use tracing::debug;

use crate::http::HttpClient;

/// Posts JSON payloads to user-supplied webhook URLs.
///
/// Deliveries are attempted once: the request timeout bounds every call and
/// any non-2xx status is reported as an error to the dispatcher.
pub struct HttpWebhookSender {
    client: HttpClient,
}

impl HttpWebhookSender {
    /// Single-attempt sender bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = HttpClient::builder().timeout(timeout).max_attempts(1).build()?;
        Ok(Self { client })
    }

    /// Sender using the configured webhook timeout.
    pub fn from_config(config: &NotificationConfig) -> Result<Self> {
        Self::new(Duration::from_secs(config.webhook_timeout_secs))
    }
}

#[async_trait]
impl WebhookSender for HttpWebhookSender {
    async fn post(&self, url: &str, payload: &serde_json::Value) -> Result<()> {
        let response = self.client.post_json(url, payload).await?;
        debug!(url, status = %response.status(), "webhook delivered");
        Ok(())
    }
}
