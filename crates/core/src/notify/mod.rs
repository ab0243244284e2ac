//! Job and alert notifications
//!
//! Deliveries run on detached tasks; a failed delivery is logged and never
//! affects the job or error record that caused it.

use std::sync::Arc;

use async_trait::async_trait;
use crmsync_domain::{
    AlertConfig, EmailMessage, ErrorAlert, JobStatus, JobWebhookPayload, Result, SyncJob,
};
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::failures::AlertSink;

/// Outbound email transport.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Outbound webhook transport.
#[async_trait]
pub trait WebhookSender: Send + Sync {
    async fn post(&self, url: &str, payload: &serde_json::Value) -> Result<()>;
}

/// Fans job outcomes and error alerts out to email and webhook transports.
pub struct NotificationDispatcher {
    email: Option<Arc<dyn EmailSender>>,
    webhook: Option<Arc<dyn WebhookSender>>,
    alert_email: Option<String>,
    alert_webhook: Option<String>,
    tasks: TaskTracker,
}

impl NotificationDispatcher {
    /// Dispatcher with no channels; every notification is skipped.
    pub fn new() -> Self {
        Self {
            email: None,
            webhook: None,
            alert_email: None,
            alert_webhook: None,
            tasks: TaskTracker::new(),
        }
    }

    /// Send job emails through `sender`.
    #[must_use]
    pub fn with_email(mut self, sender: Arc<dyn EmailSender>) -> Self {
        self.email = Some(sender);
        self
    }

    /// Post job webhooks through `sender`.
    #[must_use]
    pub fn with_webhook(mut self, sender: Arc<dyn WebhookSender>) -> Self {
        self.webhook = Some(sender);
        self
    }

    /// Alert destinations from config.
    #[must_use]
    pub fn with_alert_targets(mut self, config: &AlertConfig) -> Self {
        self.alert_email = config.email.clone();
        self.alert_webhook = config.webhook_url.clone();
        self
    }

    /// Announce a job that reached completed or failed. Returns the number of
    /// deliveries started.
    pub fn notify_job(&self, job: &SyncJob) -> usize {
        if !matches!(job.status, JobStatus::Completed | JobStatus::Failed) {
            return 0;
        }
        let mut started = 0;

        if let (Some(sender), Some(url)) = (&self.webhook, &job.config.webhook_url) {
            match serde_json::to_value(JobWebhookPayload::from(job)) {
                Ok(payload) => {
                    self.spawn_webhook(Arc::clone(sender), url.clone(), payload);
                    started += 1;
                }
                Err(err) => warn!(error = %err, job_id = %job.id, "webhook payload encoding failed"),
            }
        }

        if let (Some(sender), Some(to)) = (&self.email, &job.config.notify_email) {
            self.spawn_email(Arc::clone(sender), job_email(job, to));
            started += 1;
        }

        if started > 0 {
            debug!(job_id = %job.id, deliveries = started, "job notifications dispatched");
        }
        started
    }

    /// Wait for in-flight deliveries.
    pub async fn settle(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    fn spawn_webhook(&self, sender: Arc<dyn WebhookSender>, url: String, payload: serde_json::Value) {
        self.tasks.spawn(async move {
            if let Err(err) = sender.post(&url, &payload).await {
                warn!(error = %err, url = %url, "webhook delivery failed");
            }
        });
    }

    fn spawn_email(&self, sender: Arc<dyn EmailSender>, message: EmailMessage) {
        self.tasks.spawn(async move {
            if let Err(err) = sender.send(&message).await {
                warn!(error = %err, to = %message.to, "email delivery failed");
            }
        });
    }
}

impl Default for NotificationDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AlertSink for NotificationDispatcher {
    async fn send_alert(&self, alert: &ErrorAlert) -> Result<()> {
        if let (Some(sender), Some(url)) = (&self.webhook, &self.alert_webhook) {
            sender.post(url, &serde_json::to_value(alert)?).await?;
        }
        if let (Some(sender), Some(to)) = (&self.email, &self.alert_email) {
            sender.send(&alert_email(alert, to)).await?;
        }
        Ok(())
    }
}

fn job_email(job: &SyncJob, to: &str) -> EmailMessage {
    let subject = match job.status {
        JobStatus::Completed => format!("{} sync completed", job.provider),
        _ => format!("{} sync failed", job.provider),
    };

    let mut html = format!(
        "<h2>{subject}</h2><p>Job <code>{}</code> ({} {})</p>",
        job.id, job.job_type, job.direction
    );
    if let Some(result) = &job.result {
        html.push_str(&format!(
            "<ul><li>Processed: {}</li><li>Created: {}</li><li>Updated: {}</li>\
             <li>Skipped: {}</li><li>Errors: {}</li></ul>",
            result.records_processed,
            result.records_created,
            result.records_updated,
            result.records_skipped,
            result.error_count()
        ));
    }
    if let Some(error) = &job.last_error {
        html.push_str(&format!("<p>Last error: {error}</p>"));
    }

    EmailMessage { to: to.to_string(), subject, html }
}

fn alert_email(alert: &ErrorAlert, to: &str) -> EmailMessage {
    let record = &alert.latest;
    let subject = format!("Sync error alert: {} ({})", record.error_type, record.severity);
    let html = format!(
        "<h2>{subject}</h2><p>User: {}</p><p>Operation: {}</p><p>{}</p>",
        alert.user_id, record.context.operation, record.message
    );
    EmailMessage { to: to.to_string(), subject, html }
}
