//! Port interfaces for the error subsystem

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crmsync_domain::{ErrorAlert, ErrorLogFilter, ErrorRecord, Result};
use uuid::Uuid;

/// Durable error records.
#[async_trait]
pub trait ErrorRepository: Send + Sync {
    async fn insert(&self, record: &ErrorRecord) -> Result<()>;

    /// Insert `record` and count the user's records created at or after
    /// `since`, this one included, as one atomic step.
    async fn insert_and_count(&self, record: &ErrorRecord, since: DateTime<Utc>) -> Result<u64>;

    async fn update(&self, record: &ErrorRecord) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<ErrorRecord>>;

    /// Newest first, at most `filter.limit` rows.
    async fn list(&self, user_id: &str, filter: &ErrorLogFilter) -> Result<Vec<ErrorRecord>>;

    /// Every record created at or after `since`.
    async fn list_since(&self, user_id: &str, since: DateTime<Utc>) -> Result<Vec<ErrorRecord>>;

    async fn count_since(&self, user_id: &str, since: DateTime<Utc>) -> Result<u64>;
}

/// Destination for error alerts.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send_alert(&self, alert: &ErrorAlert) -> Result<()>;
}
