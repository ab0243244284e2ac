//! Port interfaces for CRM providers

use async_trait::async_trait;
use crmsync_domain::{
    ConflictResolution, FailureDetails, Provider, SyncDirection, SyncJob, SyncJobResult,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Failure raised by a connector call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectorError {
    /// No connector is registered for the provider.
    #[error("sync connector not implemented for {0}")]
    NotImplemented(Provider),

    /// Provider answered with a non-success status.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// Transport failure before a response arrived.
    #[error("network error: {0}")]
    Network(String),

    /// The provider did not answer in time.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The job was cancelled while the call was in flight.
    #[error("sync cancelled")]
    Cancelled,

    /// Anything else, carried as text.
    #[error("{0}")]
    Other(String),
}

impl ConnectorError {
    /// Shorthand for [`ConnectorError::Api`].
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api { status, message: message.into() }
    }

    /// HTTP status for API failures.
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Raw failure handed to the error classifier.
    pub fn to_failure(&self) -> FailureDetails {
        let mut details = FailureDetails::new(self.to_string());
        details.status_code = self.status_code();
        match self {
            Self::Network(_) => details.with_code("ECONNRESET"),
            Self::Timeout(_) => details.with_code("ETIMEDOUT"),
            _ => details,
        }
    }
}

/// Options derived from a job's config for one connector run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOptions {
    /// Owner of the CRM credentials.
    pub user_id: String,
    /// Which side is read and which is written.
    pub direction: SyncDirection,
    /// Records per page requested from the provider.
    pub batch_size: u32,
    /// Winner when both sides changed a record.
    pub conflict_resolution: ConflictResolution,
    /// Match incoming records against existing ones before writing.
    pub deduplicate: bool,
    /// Create records missing on the target side.
    pub create_new: bool,
    /// Overwrite records that already exist on the target side.
    pub update_existing: bool,
    /// Provider-specific query filters, passed through untouched.
    pub filters: serde_json::Value,
}

impl From<&SyncJob> for SyncOptions {
    fn from(job: &SyncJob) -> Self {
        Self {
            user_id: job.user_id.clone(),
            direction: job.direction,
            batch_size: job.config.batch_size,
            conflict_resolution: job.config.conflict_resolution,
            deduplicate: job.config.deduplicate,
            create_new: job.config.create_new,
            update_existing: job.config.update_existing,
            filters: job.config.filters.clone(),
        }
    }
}

/// Provider-neutral contact record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Contact {
    /// Provider record id.
    pub id: Option<String>,
    /// Primary email, the usual deduplication key.
    pub email: Option<String>,
    /// Given name.
    pub first_name: Option<String>,
    /// Family name.
    pub last_name: Option<String>,
    /// Employer or account name.
    pub company: Option<String>,
    /// Phone number as the provider formats it.
    pub phone: Option<String>,
    /// Provider fields without a neutral counterpart.
    pub properties: serde_json::Value,
}

/// Operations the engine needs from a CRM provider.
///
/// Implementations own their HTTP timeouts and should return promptly once
/// `cancel` fires.
#[async_trait]
pub trait SyncConnector: Send + Sync {
    fn provider(&self) -> Provider;

    /// Sync contacts in the direction given by `options`.
    async fn sync_contacts(
        &self,
        options: &SyncOptions,
        cancel: &CancellationToken,
    ) -> Result<SyncJobResult, ConnectorError>;

    /// Sync companies in the direction given by `options`.
    async fn sync_companies(
        &self,
        options: &SyncOptions,
        cancel: &CancellationToken,
    ) -> Result<SyncJobResult, ConnectorError>;

    async fn create_contact(&self, contact: &Contact) -> Result<Contact, ConnectorError>;

    async fn update_contact(&self, id: &str, contact: &Contact) -> Result<Contact, ConnectorError>;

    async fn search_contacts(&self, query: &str) -> Result<Vec<Contact>, ConnectorError>;

    /// Verify credentials and reachability.
    async fn test_connection(&self) -> Result<bool, ConnectorError>;
}
