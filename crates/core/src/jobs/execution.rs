//! Dispatch tick and per-job execution
//!
//! A tick reserves concurrency slots for due jobs, asks the rate limiter,
//! and spawns one execution task per admitted job. The task races the
//! connector against the job's cancellation token, books usage, and applies
//! the outcome: completion, automatic retry, or terminal failure.

use std::time::Instant;

use chrono::Duration;
use crmsync_domain::{
    CrmSyncError, ErrorContext, ErrorHandlingOptions, FailureDetails, JobStatus, Result, SyncJob,
    SyncJobResult,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::manager::SyncJobManager;
use crate::connectors::{run_job, ConnectorError, SyncOptions};
use crate::failures::Classification;

impl SyncJobManager {
    /// Dispatch due jobs up to the free concurrency. Returns how many
    /// executions were started.
    pub async fn tick(&self) -> Result<usize> {
        let now = self.inner.clock.now();
        let reserved: Vec<(Uuid, CancellationToken)> = {
            let mut state = self.inner.state.lock();
            let free = self.inner.settings.max_concurrent_jobs.saturating_sub(state.running.len());
            let ids = state.queue.take_ready(now, free);
            ids.into_iter()
                .map(|id| {
                    let token = CancellationToken::new();
                    state.running.insert(id, token.clone());
                    (id, token)
                })
                .collect()
        };

        let mut started = 0;
        for (id, token) in reserved {
            match self.dispatch(id, token).await {
                Ok(true) => started += 1,
                Ok(false) => {}
                Err(err) => {
                    self.release(id);
                    warn!(job_id = %id, error = %err, "dispatch failed");
                }
            }
        }
        Ok(started)
    }

    async fn dispatch(&self, id: Uuid, token: CancellationToken) -> Result<bool> {
        let inner = &self.inner;
        let Some(mut job) = inner.jobs.get(id).await? else {
            self.release(id);
            return Ok(false);
        };
        if job.status != JobStatus::Pending || token.is_cancelled() {
            self.release(id);
            return Ok(false);
        }

        let endpoint = job.job_type.endpoint();
        let decision = match inner.limiter.check(&job.user_id, job.provider, endpoint).await {
            Ok(decision) => decision,
            Err(CrmSyncError::Config(message)) => {
                self.release(id);
                let now = inner.clock.now();
                job.transition(JobStatus::Running, now)?;
                job.started_at = Some(now);
                let options = ErrorHandlingOptions { retryable: Some(false), ..Default::default() };
                self.fail(job, JobStatus::Pending, FailureDetails::new(message), options).await?;
                return Ok(false);
            }
            Err(err) => {
                self.release(id);
                inner.state.lock().queue.push(&job);
                return Err(err);
            }
        };

        if !decision.allowed {
            let now = inner.clock.now();
            job.scheduled_at =
                decision.retry_at(now).unwrap_or(now + inner.settings.credit_recheck);
            job.updated_at = now;
            self.release(id);
            if !inner.jobs.update_if_status(&job, JobStatus::Pending).await? {
                return Ok(false);
            }
            inner.state.lock().queue.push(&job);
            info!(
                job_id = %id,
                reason = ?decision.denial,
                retry_at = %job.scheduled_at,
                "dispatch deferred by rate limit"
            );
            return Ok(false);
        }

        let now = inner.clock.now();
        job.transition(JobStatus::Running, now)?;
        job.started_at = Some(now);
        job.next_retry_at = None;
        if token.is_cancelled() || !inner.jobs.update_if_status(&job, JobStatus::Pending).await? {
            self.release(id);
            return Ok(false);
        }

        let manager = self.clone();
        inner.tasks.spawn(async move { manager.execute(job, token).await });
        Ok(true)
    }

    async fn execute(self, job: SyncJob, token: CancellationToken) {
        let inner = &self.inner;
        let connector = inner.connectors.resolve(job.provider);
        let options = SyncOptions::from(&job);
        info!(job_id = %job.id, provider = %job.provider, job_type = %job.job_type, "sync job started");

        let started = Instant::now();
        let outcome = tokio::select! {
            biased;
            () = token.cancelled() => Err(ConnectorError::Cancelled),
            result = run_job(connector.as_ref(), job.job_type, &options, &token) => result,
        };
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let error_message = outcome.as_ref().err().map(ToString::to_string);
        if let Err(err) = inner
            .limiter
            .record(
                &job.user_id,
                job.provider,
                job.job_type.endpoint(),
                outcome.is_ok(),
                elapsed_ms,
                error_message,
            )
            .await
        {
            warn!(job_id = %job.id, error = %err, "usage recording failed");
        }

        self.release(job.id);
        if token.is_cancelled() {
            info!(job_id = %job.id, "sync job stopped after cancellation");
            return;
        }
        match inner.jobs.get(job.id).await {
            Ok(Some(current)) if current.status == JobStatus::Cancelled => return,
            Ok(Some(_)) => {}
            Ok(None) => {
                warn!(job_id = %job.id, "sync job vanished during execution");
                return;
            }
            Err(err) => warn!(job_id = %job.id, error = %err, "could not reload sync job"),
        }

        let job_id = job.id;
        if let Err(err) = self.finish(job, outcome, elapsed_ms).await {
            error!(job_id = %job_id, error = %err, "failed to record sync job outcome");
        }
    }

    async fn finish(
        &self,
        mut job: SyncJob,
        outcome: std::result::Result<SyncJobResult, ConnectorError>,
        elapsed_ms: u64,
    ) -> Result<()> {
        match outcome {
            Ok(mut result) => {
                if result.duration_ms == 0 {
                    result.duration_ms = elapsed_ms;
                }
                let successful = result.is_successful(self.inner.settings.success_error_rate);
                let (errors, processed) = (result.error_count(), result.records_processed);
                job.apply_result(result);

                if successful {
                    let now = self.inner.clock.now();
                    job.transition(JobStatus::Completed, now)?;
                    job.completed_at = Some(now);
                    if !self.inner.jobs.update_if_status(&job, JobStatus::Running).await? {
                        info!(job_id = %job.id, "sync job left running state, outcome dropped");
                        return Ok(());
                    }
                    info!(job_id = %job.id, processed, errors, "sync job completed");
                    self.inner.notifier.notify_job(&job);
                    Ok(())
                } else {
                    let failure = FailureDetails::new(format!(
                        "sync batch failed: {errors} of {processed} records errored"
                    ));
                    self.fail(job, JobStatus::Running, failure, ErrorHandlingOptions::default())
                        .await
                }
            }
            Err(err) => {
                let options = ErrorHandlingOptions {
                    retryable: matches!(err, ConnectorError::NotImplemented(_)).then_some(false),
                    ..Default::default()
                };
                self.fail(job, JobStatus::Running, err.to_failure(), options).await
            }
        }
    }

    /// Record a failure for a running job and either re-queue it with
    /// backoff or leave it failed. The write only lands while the stored
    /// status is still `stored`.
    async fn fail(
        &self,
        mut job: SyncJob,
        stored: JobStatus,
        failure: FailureDetails,
        options: ErrorHandlingOptions,
    ) -> Result<()> {
        let inner = &self.inner;
        let context = ErrorContext::new(job.user_id.as_str(), "sync_job")
            .with_provider(job.provider)
            .with_job(job.id)
            .with_endpoint(job.job_type.endpoint());

        let (retryable, message) =
            match inner.errors.handle_error(failure.clone(), context, options).await {
                Ok(record) => (record.retryable, record.message),
                Err(err) => {
                    warn!(job_id = %job.id, error = %err, "error record not persisted");
                    let classification = Classification::of(&failure);
                    (classification.retryable && options.retryable != Some(false), failure.message)
                }
            };

        let now = inner.clock.now();
        job.last_error = Some(message);
        job.transition(JobStatus::Failed, now)?;

        if retryable && job.retry_count < job.max_retries {
            job.retry_count += 1;
            if job.retry_count < job.max_retries {
                let delay = inner.policy.delay(job.retry_count - 1);
                let retry_at = Duration::from_std(delay)
                    .ok()
                    .and_then(|delay| now.checked_add_signed(delay))
                    .unwrap_or(now);
                job.next_retry_at = Some(retry_at);
                job.scheduled_at = retry_at;
                job.transition(JobStatus::Pending, now)?;
                if !inner.jobs.update_if_status(&job, stored).await? {
                    info!(job_id = %job.id, "sync job left running state, retry dropped");
                    return Ok(());
                }
                inner.state.lock().queue.push(&job);
                info!(
                    job_id = %job.id,
                    retry_count = job.retry_count,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "sync job scheduled for retry"
                );
                return Ok(());
            }
        }

        job.completed_at = Some(now);
        job.next_retry_at = None;
        if !inner.jobs.update_if_status(&job, stored).await? {
            info!(job_id = %job.id, "sync job left running state, failure not applied");
            return Ok(());
        }
        warn!(
            job_id = %job.id,
            retry_count = job.retry_count,
            error = job.last_error.as_deref().unwrap_or_default(),
            "sync job failed"
        );
        inner.notifier.notify_job(&job);
        Ok(())
    }
}
