//! Timer-driven retries for standalone error records
//!
//! Each scheduled retry is a tokio task that sleeps for the backoff delay,
//! bumps the record's retry count, runs the operation, and either resolves
//! the record or schedules the next attempt while budget remains.

use std::sync::Arc;

use chrono::Duration as ChronoDuration;
use crmsync_common::{BackoffPolicy, SharedClock};
use crmsync_domain::{ErrorRecord, FailureDetails};
use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::handler::ErrorHandler;

/// Re-runnable operation behind an error record.
pub type RetryOperation =
    Arc<dyn Fn() -> BoxFuture<'static, Result<(), FailureDetails>> + Send + Sync>;

/// How a scheduled retry chain ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// An attempt succeeded and the record was resolved.
    Succeeded { attempts: u32 },
    /// Every allowed attempt failed.
    Exhausted { attempts: u32 },
    /// Aborted or shut down before the chain finished.
    Cancelled,
    /// The record was not retryable when scheduled.
    Skipped,
}

/// Handle to a pending retry chain.
#[derive(Debug)]
pub struct RetryHandle {
    cancel: CancellationToken,
    task: JoinHandle<RetryOutcome>,
}

impl RetryHandle {
    /// Stop the chain before its next attempt.
    pub fn abort(&self) {
        self.cancel.cancel();
    }

    /// Wait for the chain to end.
    pub async fn outcome(self) -> RetryOutcome {
        self.task.await.unwrap_or(RetryOutcome::Cancelled)
    }
}

/// Schedules retries with the shared backoff policy.
pub struct RetryScheduler {
    errors: Arc<ErrorHandler>,
    policy: BackoffPolicy,
    clock: SharedClock,
    shutdown: CancellationToken,
}

impl RetryScheduler {
    /// Scheduler that persists retry bookkeeping through `errors`.
    pub fn new(errors: Arc<ErrorHandler>, policy: BackoffPolicy, clock: SharedClock) -> Self {
        Self { errors, policy, clock, shutdown: CancellationToken::new() }
    }

    /// Backoff applied between attempts.
    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Start a retry chain for `record`.
    pub fn schedule_retry(&self, record: ErrorRecord, operation: RetryOperation) -> RetryHandle {
        let cancel = self.shutdown.child_token();
        let task = tokio::spawn(run_chain(
            Arc::clone(&self.errors),
            self.policy.clone(),
            Arc::clone(&self.clock),
            record,
            operation,
            cancel.clone(),
        ));
        RetryHandle { cancel, task }
    }

    /// Cancel every pending retry.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

async fn run_chain(
    errors: Arc<ErrorHandler>,
    policy: BackoffPolicy,
    clock: SharedClock,
    mut record: ErrorRecord,
    operation: RetryOperation,
    cancel: CancellationToken,
) -> RetryOutcome {
    if !record.can_retry() {
        return RetryOutcome::Skipped;
    }

    loop {
        let delay = policy.delay(record.retry_count);
        let now = clock.now();
        record.next_retry_at = ChronoDuration::from_std(delay)
            .ok()
            .and_then(|delay| now.checked_add_signed(delay));
        record.updated_at = now;
        persist(&errors, &record).await;
        let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        debug!(record_id = %record.id, delay_ms, "retry scheduled");

        tokio::select! {
            () = cancel.cancelled() => {
                debug!(record_id = %record.id, "retry cancelled");
                return RetryOutcome::Cancelled;
            }
            () = tokio::time::sleep(delay) => {}
        }

        record.retry_count += 1;
        record.next_retry_at = None;
        record.updated_at = clock.now();
        persist(&errors, &record).await;

        match operation().await {
            Ok(()) => {
                record.resolve("retry succeeded", clock.now());
                persist(&errors, &record).await;
                info!(record_id = %record.id, attempts = record.retry_count, "retry succeeded");
                return RetryOutcome::Succeeded { attempts: record.retry_count };
            }
            Err(failure) => {
                warn!(
                    record_id = %record.id,
                    attempt = record.retry_count,
                    error = %failure.message,
                    "retry attempt failed"
                );
                record.message = failure.message;
                if !record.can_retry() {
                    record.updated_at = clock.now();
                    persist(&errors, &record).await;
                    return RetryOutcome::Exhausted { attempts: record.retry_count };
                }
            }
        }
    }
}

async fn persist(errors: &ErrorHandler, record: &ErrorRecord) {
    if let Err(err) = errors.save(record).await {
        warn!(error = %err, record_id = %record.id, "failed to persist retry state");
    }
}
