//! Shared helpers for `crmsync-app` integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use crmsync_app::AppContext;
use crmsync_common::MockClock;
use crmsync_core::{ConnectorError, Contact, SyncConnector, SyncOptions};
use crmsync_domain::{Config, JobSpec, JobType, Provider, SyncDirection, SyncJobResult};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Context on a fresh database in a temporary directory, driven by a mock
/// clock. Background schedulers are disabled so tests tick by hand.
pub struct TestApp {
    pub ctx: AppContext,
    pub clock: MockClock,
    pub dir: TempDir,
}

impl TestApp {
    pub async fn new(connectors: Vec<Arc<dyn SyncConnector>>) -> Self {
        let dir = TempDir::new().expect("temp dir should be created");
        Self::in_dir(dir, connectors).await
    }

    pub async fn in_dir(dir: TempDir, connectors: Vec<Arc<dyn SyncConnector>>) -> Self {
        let clock = MockClock::at_ymd_hms(2024, 6, 3, 10, 0, 30);
        let ctx = AppContext::with_connectors(test_config(&dir), clock.shared(), connectors)
            .await
            .expect("context should build");
        Self { ctx, clock, dir }
    }

    /// Run one dispatch tick and wait for the started jobs to finish.
    pub async fn run_tick(&self) -> usize {
        let started = self.ctx.jobs.tick().await.expect("tick should succeed");
        self.ctx.jobs.drain().await;
        started
    }
}

pub fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.database.path = dir.path().join("crmsync.db").to_string_lossy().into_owned();
    config.database.pool_size = 4;
    config.scheduler.enabled = false;
    config.retry.base_delay_ms = 1_000;
    config.retry.max_delay_ms = 60_000;
    config.retry.jitter = false;
    config
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
        duration_ms: 40,
    }
}

enum Behaviour {
    Succeed(SyncJobResult),
    NetworkFailure,
}

/// HubSpot connector that either always succeeds with one batch or always
/// fails with a network error.
pub struct ScriptedConnector {
    behaviour: Behaviour,
    calls: Arc<AtomicUsize>,
}

impl ScriptedConnector {
    pub fn succeeding(result: SyncJobResult) -> Self {
        Self { behaviour: Behaviour::Succeed(result), calls: Arc::default() }
    }

    pub fn failing() -> Self {
        Self { behaviour: Behaviour::NetworkFailure, calls: Arc::default() }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    pub fn shared(self) -> Arc<dyn SyncConnector> {
        Arc::new(self)
    }
}

#[async_trait]
impl SyncConnector for ScriptedConnector {
    fn provider(&self) -> Provider {
        Provider::Hubspot
    }

    async fn sync_contacts(
        &self,
        _options: &SyncOptions,
        _cancel: &CancellationToken,
    ) -> Result<SyncJobResult, ConnectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behaviour {
            Behaviour::Succeed(result) => Ok(result.clone()),
            Behaviour::NetworkFailure => Err(ConnectorError::Network("connection reset".into())),
        }
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
