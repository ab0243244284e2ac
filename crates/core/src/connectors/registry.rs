//! Provider lookup and job-type dispatch

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use crmsync_domain::{JobType, Provider, SyncJobResult};
use tokio_util::sync::CancellationToken;

use super::ports::{ConnectorError, Contact, SyncConnector, SyncOptions};

/// Connectors keyed by provider.
#[derive(Default, Clone)]
pub struct ConnectorRegistry {
    connectors: HashMap<Provider, Arc<dyn SyncConnector>>,
}

impl ConnectorRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connector under its own provider, replacing any previous one.
    #[must_use]
    pub fn with_connector(mut self, connector: Arc<dyn SyncConnector>) -> Self {
        self.register(connector);
        self
    }

    /// In-place form of [`with_connector`](Self::with_connector).
    pub fn register(&mut self, connector: Arc<dyn SyncConnector>) {
        self.connectors.insert(connector.provider(), connector);
    }

    /// Whether a real connector is registered for `provider`.
    pub fn is_implemented(&self, provider: Provider) -> bool {
        self.connectors.contains_key(&provider)
    }

    /// Connector for `provider`, or one that fails every call.
    pub fn resolve(&self, provider: Provider) -> Arc<dyn SyncConnector> {
        self.connectors
            .get(&provider)
            .cloned()
            .unwrap_or_else(|| Arc::new(NotImplementedConnector::new(provider)))
    }
}

impl std::fmt::Debug for ConnectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut providers: Vec<_> = self.connectors.keys().collect();
        providers.sort();
        f.debug_struct("ConnectorRegistry").field("providers", &providers).finish()
    }
}

/// Run the connector operations for one job type.
///
/// `full` syncs contacts, then companies, and folds both results together.
pub async fn run_job(
    connector: &dyn SyncConnector,
    job_type: JobType,
    options: &SyncOptions,
    cancel: &CancellationToken,
) -> Result<SyncJobResult, ConnectorError> {
    match job_type {
        JobType::Contacts => connector.sync_contacts(options, cancel).await,
        JobType::Companies => connector.sync_companies(options, cancel).await,
        JobType::Full => {
            let mut result = connector.sync_contacts(options, cancel).await?;
            if cancel.is_cancelled() {
                return Err(ConnectorError::Cancelled);
            }
            result.merge(connector.sync_companies(options, cancel).await?);
            Ok(result)
        }
    }
}

/// Placeholder for providers without a connector.
#[derive(Debug, Clone, Copy)]
pub struct NotImplementedConnector {
    provider: Provider,
}

impl NotImplementedConnector {
    /// Stand-in for `provider`.
    pub const fn new(provider: Provider) -> Self {
        Self { provider }
    }

    fn error(&self) -> ConnectorError {
        ConnectorError::NotImplemented(self.provider)
    }
}

#[async_trait]
impl SyncConnector for NotImplementedConnector {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn sync_contacts(
        &self,
        _options: &SyncOptions,
        _cancel: &CancellationToken,
    ) -> Result<SyncJobResult, ConnectorError> {
        Err(self.error())
    }

    async fn sync_companies(
        &self,
        _options: &SyncOptions,
        _cancel: &CancellationToken,
    ) -> Result<SyncJobResult, ConnectorError> {
        Err(self.error())
    }

    async fn create_contact(&self, _contact: &Contact) -> Result<Contact, ConnectorError> {
        Err(self.error())
    }

    async fn update_contact(
        &self,
        _id: &str,
        _contact: &Contact,
    ) -> Result<Contact, ConnectorError> {
        Err(self.error())
    }

    async fn search_contacts(&self, _query: &str) -> Result<Vec<Contact>, ConnectorError> {
        Err(self.error())
    }

    async fn test_connection(&self) -> Result<bool, ConnectorError> {
        Err(self.error())
    }
}
