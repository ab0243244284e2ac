//! Sync job manager - submission, cancellation, retry, recovery
//!
//! The manager exclusively owns job lifecycle and queue membership. Its
//! in-memory state (the dispatch queue and the map of running jobs) sits
//! behind one `parking_lot::Mutex` that is never held across an `.await`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use crmsync_common::{BackoffPolicy, SharedClock};
use crmsync_domain::constants::{MAX_BATCH_SIZE, MAX_JOB_PRIORITY, MIN_JOB_PRIORITY};
use crmsync_domain::{
    CrmSyncError, JobFilter, JobSpec, JobStatus, Result, SchedulerConfig, SyncJob, SyncMetrics,
};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument};
use url::Url;
use uuid::Uuid;

use super::ports::{JobRepository, ScheduleRepository};
use super::queue::JobQueue;
use crate::connectors::ConnectorRegistry;
use crate::failures::ErrorHandler;
use crate::notify::NotificationDispatcher;
use crate::rate_limit::RateLimiter;

/// Re-reads allowed when a cancel races another status change.
const CANCEL_ATTEMPTS: usize = 3;

/// Dispatch and bookkeeping knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerSettings {
    /// Executions allowed to run at once.
    pub max_concurrent_jobs: usize,
    /// Batches with an error share at or above this rate fail.
    pub success_error_rate: f64,
    /// Deferral after a denial for insufficient credits.
    pub credit_recheck: Duration,
    /// Age after which terminal jobs are archived.
    pub job_retention: Duration,
}

impl From<&SchedulerConfig> for ManagerSettings {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            max_concurrent_jobs: config.max_concurrent_jobs,
            success_error_rate: config.success_error_rate,
            credit_recheck: Duration::seconds(
                i64::try_from(config.credit_recheck_secs).unwrap_or(i64::MAX / 1000),
            ),
            job_retention: Duration::days(i64::from(config.job_retention_days)),
        }
    }
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self::from(&SchedulerConfig::default())
    }
}

/// Collaborators injected into the manager.
pub struct ManagerDeps {
    /// Durable job rows.
    pub jobs: Arc<dyn JobRepository>,
    /// Recurring schedules materialized into jobs.
    pub schedules: Arc<dyn ScheduleRepository>,
    /// Gate consulted before every dispatch.
    pub limiter: Arc<RateLimiter>,
    /// Records and alerts on execution failures.
    pub errors: Arc<ErrorHandler>,
    /// Provider connectors; unregistered providers fail as not implemented.
    pub connectors: ConnectorRegistry,
    /// Completion and failure notifications.
    pub notifier: Arc<NotificationDispatcher>,
    /// Backoff between automatic job retries.
    pub policy: BackoffPolicy,
    /// Time source for scheduling and timestamps.
    pub clock: SharedClock,
}

#[derive(Default)]
pub(super) struct ManagerState {
    pub(super) queue: JobQueue,
    /// Jobs holding a concurrency slot, from reservation until the execution
    /// task finishes.
    pub(super) running: HashMap<Uuid, CancellationToken>,
}

pub(super) struct Inner {
    pub(super) jobs: Arc<dyn JobRepository>,
    pub(super) schedules: Arc<dyn ScheduleRepository>,
    pub(super) limiter: Arc<RateLimiter>,
    pub(super) errors: Arc<ErrorHandler>,
    pub(super) connectors: ConnectorRegistry,
    pub(super) notifier: Arc<NotificationDispatcher>,
    pub(super) policy: BackoffPolicy,
    pub(super) clock: SharedClock,
    pub(super) settings: ManagerSettings,
    pub(super) state: Mutex<ManagerState>,
    pub(super) tasks: TaskTracker,
}

/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SyncJobManager {
    pub(super) inner: Arc<Inner>,
}

impl SyncJobManager {
    /// Build a manager with an empty queue. Call `rebuild_queue` to pick up
    /// persisted work.
    pub fn new(deps: ManagerDeps, settings: ManagerSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                jobs: deps.jobs,
                schedules: deps.schedules,
                limiter: deps.limiter,
                errors: deps.errors,
                connectors: deps.connectors,
                notifier: deps.notifier,
                policy: deps.policy,
                clock: deps.clock,
                settings,
                state: Mutex::new(ManagerState::default()),
                tasks: TaskTracker::new(),
            }),
        }
    }

    /// Settings the manager was built with.
    pub fn settings(&self) -> &ManagerSettings {
        &self.inner.settings
    }

    /// Validate and persist a job; queue it when due.
    #[instrument(skip(self, spec), fields(user_id = %spec.user_id, provider = %spec.provider))]
    pub async fn submit(&self, spec: JobSpec) -> Result<Uuid> {
        validate_spec(&spec)?;
        let now = self.inner.clock.now();
        let job = SyncJob::from_spec(spec, now);
        self.inner.jobs.insert(&job).await?;

        if job.is_ready(now) {
            self.inner.state.lock().queue.push(&job);
        }
        info!(job_id = %job.id, job_type = %job.job_type, priority = job.priority, "sync job submitted");
        Ok(job.id)
    }

    /// Cancel a pending, running or retryable failed job. Returns `false`
    /// for unknown or terminal jobs, including a job that reached a terminal
    /// state while the cancellation was in flight.
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: Uuid) -> Result<bool> {
        for _ in 0..CANCEL_ATTEMPTS {
            let Some(mut job) = self.inner.jobs.get(id).await? else {
                return Ok(false);
            };
            if job.is_terminal() || !job.status.can_transition_to(JobStatus::Cancelled) {
                return Ok(false);
            }

            let observed = job.status;
            let now = self.inner.clock.now();
            job.transition(JobStatus::Cancelled, now)?;
            job.completed_at = Some(now);
            job.next_retry_at = None;
            if !self.inner.jobs.update_if_status(&job, observed).await? {
                debug!(job_id = %id, %observed, "job moved on during cancel, re-reading");
                continue;
            }

            {
                let mut state = self.inner.state.lock();
                state.queue.remove(id);
                if let Some(token) = state.running.get(&id) {
                    token.cancel();
                }
            }
            info!(job_id = %id, "sync job cancelled");
            return Ok(true);
        }
        Ok(false)
    }

    /// Current persisted state of a job.
    pub async fn get_job(&self, id: Uuid) -> Result<Option<SyncJob>> {
        self.inner.jobs.get(id).await
    }

    /// A user's jobs, newest first.
    pub async fn list_jobs(&self, user_id: &str, filter: &JobFilter) -> Result<Vec<SyncJob>> {
        self.inner.jobs.list_for_user(user_id, filter).await
    }

    /// Manually re-run a failed job that still has retry budget.
    #[instrument(skip(self))]
    pub async fn retry(&self, id: Uuid) -> Result<bool> {
        let mut job = self
            .inner
            .jobs
            .get(id)
            .await?
            .ok_or_else(|| CrmSyncError::NotFound(format!("sync job {id}")))?;
        if job.status != JobStatus::Failed || job.retry_count >= job.max_retries {
            return Err(CrmSyncError::InvalidState(format!(
                "job {id} is {} with {}/{} retries used",
                job.status, job.retry_count, job.max_retries
            )));
        }

        let now = self.inner.clock.now();
        job.reset_progress();
        job.scheduled_at = now;
        job.next_retry_at = None;
        job.transition(JobStatus::Pending, now)?;
        if !self.inner.jobs.update_if_status(&job, JobStatus::Failed).await? {
            return Err(CrmSyncError::InvalidState(format!("job {id} changed during retry")));
        }
        self.inner.state.lock().queue.push(&job);
        info!(job_id = %id, "sync job re-queued manually");
        Ok(true)
    }

    /// Startup recovery: interrupted jobs go back to pending, then every due
    /// pending job is queued. Returns the number queued.
    #[instrument(skip(self))]
    pub async fn rebuild_queue(&self) -> Result<usize> {
        let now = self.inner.clock.now();
        for mut job in self.inner.jobs.list_by_status(JobStatus::Running).await? {
            job.transition(JobStatus::Pending, now)?;
            job.scheduled_at = now;
            job.started_at = None;
            if self.inner.jobs.update_if_status(&job, JobStatus::Running).await? {
                info!(job_id = %job.id, "interrupted sync job reset to pending");
            }
        }

        let ready = self.inner.jobs.list_ready(now).await?;
        let mut state = self.inner.state.lock();
        state.queue.clear();
        for job in &ready {
            if !state.running.contains_key(&job.id) {
                state.queue.push(job);
            }
        }
        let queued = state.queue.len();
        drop(state);
        info!(queued, "dispatch queue rebuilt");
        Ok(queued)
    }

    /// Queue dormant pending jobs whose time has come.
    pub async fn promote_ready(&self) -> Result<usize> {
        let now = self.inner.clock.now();
        let ready = self.inner.jobs.list_ready(now).await?;

        let mut state = self.inner.state.lock();
        let mut promoted = 0;
        for job in &ready {
            if !state.queue.contains(job.id) && !state.running.contains_key(&job.id) {
                state.queue.push(job);
                promoted += 1;
            }
        }
        drop(state);
        if promoted > 0 {
            debug!(promoted, "dormant jobs promoted");
        }
        Ok(promoted)
    }

    /// Archive terminal jobs older than the retention window.
    pub async fn archive_stale(&self) -> Result<usize> {
        let cutoff = self.inner.clock.now() - self.inner.settings.job_retention;
        let archived = self.inner.jobs.archive_terminal_before(cutoff).await?;
        if archived > 0 {
            info!(archived, %cutoff, "stale sync jobs archived");
        }
        Ok(archived)
    }

    /// Aggregate metrics over jobs created in the last `days` days.
    pub async fn get_metrics(&self, user_id: &str, days: u32) -> Result<SyncMetrics> {
        let now = self.inner.clock.now();
        let since = now - Duration::days(i64::from(days));
        let jobs = self.inner.jobs.list_since(user_id, since).await?;
        Ok(SyncMetrics::from_jobs(&jobs, now))
    }

    /// Jobs currently holding a concurrency slot.
    pub fn running_count(&self) -> usize {
        self.inner.state.lock().running.len()
    }

    /// Jobs waiting in the in-memory queue.
    pub fn queued_count(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// Wait for in-flight executions and their notifications.
    pub async fn drain(&self) {
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
        self.inner.tasks.reopen();
        self.inner.notifier.settle().await;
        self.inner.errors.settle().await;
    }

    pub(super) fn release(&self, id: Uuid) {
        self.inner.state.lock().running.remove(&id);
    }
}

fn validate_spec(spec: &JobSpec) -> Result<()> {
    if spec.user_id.trim().is_empty() {
        return Err(CrmSyncError::InvalidInput("user_id is required".into()));
    }
    if !(MIN_JOB_PRIORITY..=MAX_JOB_PRIORITY).contains(&spec.priority) {
        return Err(CrmSyncError::InvalidInput(format!(
            "priority must be between {MIN_JOB_PRIORITY} and {MAX_JOB_PRIORITY}, got {}",
            spec.priority
        )));
    }

    let config = &spec.config;
    if config.batch_size == 0 || config.batch_size > MAX_BATCH_SIZE {
        return Err(CrmSyncError::InvalidInput(format!(
            "batch_size must be between 1 and {MAX_BATCH_SIZE}"
        )));
    }
    if let Some(raw) = &config.webhook_url {
        let url = Url::parse(raw)
            .map_err(|e| CrmSyncError::InvalidInput(format!("webhook_url: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(CrmSyncError::InvalidInput("webhook_url must be http or https".into()));
        }
    }
    if let Some(email) = &config.notify_email {
        if !email.contains('@') {
            return Err(CrmSyncError::InvalidInput(format!("notify_email {email:?} is not an address")));
        }
    }
    if !config.filters.is_object() {
        return Err(CrmSyncError::InvalidInput("filters must be a JSON object".into()));
    }
    Ok(())
}
