//! Recording notification transports

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use crmsync_core::{AlertSink, EmailSender, WebhookSender};
use crmsync_domain::{EmailMessage, ErrorAlert, Result as DomainResult};

#[derive(Default, Clone)]
pub struct RecordingEmail {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
}

impl RecordingEmail {
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailSender for RecordingEmail {
    async fn send(&self, message: &EmailMessage) -> DomainResult<()> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct RecordingWebhook {
    posted: Arc<Mutex<Vec<(String, serde_json::Value)>>>,
}

impl RecordingWebhook {
    pub fn posted(&self) -> Vec<(String, serde_json::Value)> {
        self.posted.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebhookSender for RecordingWebhook {
    async fn post(&self, url: &str, payload: &serde_json::Value) -> DomainResult<()> {
        self.posted.lock().unwrap().push((url.to_string(), payload.clone()));
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct RecordingAlertSink {
    alerts: Arc<Mutex<Vec<ErrorAlert>>>,
}

impl RecordingAlertSink {
    pub fn alerts(&self) -> Vec<ErrorAlert> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertSink for RecordingAlertSink {
    async fn send_alert(&self, alert: &ErrorAlert) -> DomainResult<()> {
        self.alerts.lock().unwrap().push(alert.clone());
        Ok(())
    }
}
