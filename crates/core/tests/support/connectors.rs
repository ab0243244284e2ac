//! Scripted connector for driving job outcomes

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use crmsync_core::{ConnectorError, Contact, SyncConnector, SyncOptions};
use crmsync_domain::{Provider, RecordError, SyncJobResult};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// One scripted response.
#[derive(Debug, Clone)]
pub enum Step {
    Succeed(SyncJobResult),
    Fail(ConnectorError),
    /// Block until the job is cancelled.
    Hang,
    /// Wait for the signal, then succeed with `processed` clean records.
    SucceedAfter(Arc<Notify>, u64),
}

/// Plays back scripted steps, then repeats the fallback forever.
#[derive(Clone)]
pub struct ScriptedConnector {
    provider: Provider,
    steps: Arc<Mutex<VecDeque<Step>>>,
    fallback: Step,
    calls: Arc<AtomicUsize>,
}

impl ScriptedConnector {
    /// Connector that always succeeds with `processed` clean records.
    pub fn succeeding(provider: Provider, processed: u64) -> Self {
        Self::always(provider, Step::Succeed(result(processed, 0)))
    }

    pub fn always(provider: Provider, step: Step) -> Self {
        Self {
            provider,
            steps: Arc::new(Mutex::new(VecDeque::new())),
            fallback: step,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    #[must_use]
    pub fn then(self, step: Step) -> Self {
        self.steps.lock().unwrap().push_back(step);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn play(&self, cancel: &CancellationToken) -> Result<SyncJobResult, ConnectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.steps.lock().unwrap().pop_front().unwrap_or_else(|| self.fallback.clone());
        match step {
            Step::Succeed(result) => Ok(result),
            Step::Fail(err) => Err(err),
            Step::Hang => {
                cancel.cancelled().await;
                Err(ConnectorError::Cancelled)
            }
            Step::SucceedAfter(signal, processed) => {
                signal.notified().await;
                Ok(result(processed, 0))
            }
        }
    }
}

/// Result with `processed` records of which `errors` failed.
pub fn result(processed: u64, errors: u64) -> SyncJobResult {
    SyncJobResult {
        records_processed: processed,
        records_created: processed.saturating_sub(errors),
        records_updated: 0,
        records_skipped: 0,
        errors: (0..errors)
            .map(|i| RecordError { record_id: Some(format!("rec-{i}")), message: "bad email".into() })
            .collect(),
        duration_ms: 5,
    }
}

#[async_trait]
impl SyncConnector for ScriptedConnector {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn sync_contacts(
        &self,
        _options: &SyncOptions,
        cancel: &CancellationToken,
    ) -> Result<SyncJobResult, ConnectorError> {
        self.play(cancel).await
    }

    async fn sync_companies(
        &self,
        _options: &SyncOptions,
        cancel: &CancellationToken,
    ) -> Result<SyncJobResult, ConnectorError> {
        self.play(cancel).await
    }

    async fn create_contact(&self, contact: &Contact) -> Result<Contact, ConnectorError> {
        Ok(Contact { id: Some("created".into()), ..contact.clone() })
    }

    async fn update_contact(&self, id: &str, contact: &Contact) -> Result<Contact, ConnectorError> {
        Ok(Contact { id: Some(id.to_string()), ..contact.clone() })
    }

    async fn search_contacts(&self, _query: &str) -> Result<Vec<Contact>, ConnectorError> {
        Ok(Vec::new())
    }

    async fn test_connection(&self) -> Result<bool, ConnectorError> {
        Ok(true)
    }
}
