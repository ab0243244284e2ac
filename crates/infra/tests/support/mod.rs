//! Shared helpers for `crmsync-infra` integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use crmsync_common::{BackoffPolicy, SharedClock};
use crmsync_core::{
    ConnectorError, ConnectorRegistry, Contact, ErrorHandler, ManagerDeps, ManagerSettings,
    NotificationDispatcher, RateLimiter, SyncConnector, SyncJobManager, SyncOptions,
    WebhookSender,
};
use crmsync_domain::{
    default_rate_limits, JobSpec, JobType, Provider, QuotaConfig, SyncDirection, SyncJobResult,
};
use crmsync_infra::{
    DbManager, InMemoryCounterStore, SqliteErrorRepository, SqliteJobRepository,
    SqliteQuotaRepository, SqliteScheduleRepository, SqliteUsageLog,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Migrated SQLite database in a temporary directory that lives as long as
/// the value.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let manager = DbManager::new(temp_dir.path().join("crmsync-test.db"), 4)
            .expect("db manager should be created");
        manager.run_migrations().expect("migrations should apply");

        Self { manager: Arc::new(manager), _temp_dir: temp_dir }
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

pub fn hubspot_contacts(user_id: &str) -> JobSpec {
    JobSpec::new(user_id, Provider::Hubspot, JobType::Contacts, SyncDirection::Pull)
}

pub fn batch(processed: u64, created: u64) -> SyncJobResult {
    SyncJobResult {
        records_processed: processed,
        records_created: created,
        records_updated: processed.saturating_sub(created),
        records_skipped: 0,
        errors: Vec::new(),
        duration_ms: 12,
    }
}

/// Connector that always returns the same batch for contacts and companies.
pub struct FixedConnector {
    provider: Provider,
    result: SyncJobResult,
    calls: Arc<AtomicUsize>,
}

impl FixedConnector {
    pub fn new(provider: Provider, result: SyncJobResult) -> Self {
        Self { provider, result, calls: Arc::default() }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl SyncConnector for FixedConnector {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn sync_contacts(
        &self,
        _options: &SyncOptions,
        _cancel: &CancellationToken,
    ) -> Result<SyncJobResult, ConnectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.result.clone())
    }

    async fn sync_companies(
        &self,
        options: &SyncOptions,
        cancel: &CancellationToken,
    ) -> Result<SyncJobResult, ConnectorError> {
        self.sync_contacts(options, cancel).await
    }

    async fn create_contact(&self, contact: &Contact) -> Result<Contact, ConnectorError> {
        Ok(contact.clone())
    }

    async fn update_contact(&self, _id: &str, contact: &Contact) -> Result<Contact, ConnectorError> {
        Ok(contact.clone())
    }

    async fn search_contacts(&self, _query: &str) -> Result<Vec<Contact>, ConnectorError> {
        Ok(Vec::new())
    }

    async fn test_connection(&self) -> Result<bool, ConnectorError> {
        Ok(true)
    }
}

/// The engine wired to SQLite repositories.
pub struct SqliteEngine {
    pub manager: SyncJobManager,
    pub limiter: Arc<RateLimiter>,
    pub errors: Arc<ErrorHandler>,
    pub jobs: Arc<SqliteJobRepository>,
}

pub fn sqlite_engine(
    db: &Arc<DbManager>,
    clock: SharedClock,
    connectors: Vec<Arc<dyn SyncConnector>>,
    webhook: Option<Arc<dyn WebhookSender>>,
) -> SqliteEngine {
    let jobs = Arc::new(SqliteJobRepository::new(Arc::clone(db)));
    let limiter = Arc::new(RateLimiter::new(
        default_rate_limits(),
        QuotaConfig::default(),
        Arc::new(SqliteQuotaRepository::new(Arc::clone(db))),
        Arc::new(SqliteUsageLog::new(Arc::clone(db))),
        Arc::new(InMemoryCounterStore::new()),
        Arc::clone(&clock),
    ));
    let errors = Arc::new(ErrorHandler::new(
        Arc::new(SqliteErrorRepository::new(Arc::clone(db))),
        Arc::clone(&clock),
    ));

    let mut notifier = NotificationDispatcher::new();
    if let Some(webhook) = webhook {
        notifier = notifier.with_webhook(webhook);
    }

    let mut registry = ConnectorRegistry::new();
    for connector in connectors {
        registry.register(connector);
    }

    let policy = BackoffPolicy::new(Duration::from_secs(1), Duration::from_secs(60), 2.0)
        .expect("valid policy")
        .with_jitter(false);

    let manager = SyncJobManager::new(
        ManagerDeps {
            jobs: jobs.clone(),
            schedules: Arc::new(SqliteScheduleRepository::new(Arc::clone(db))),
            limiter: Arc::clone(&limiter),
            errors: Arc::clone(&errors),
            connectors: registry,
            notifier: Arc::new(notifier),
            policy,
            clock,
        },
        ManagerSettings::default(),
    );

    SqliteEngine { manager, limiter, errors, jobs }
}
