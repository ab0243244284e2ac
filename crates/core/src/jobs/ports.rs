//! Port interfaces for job and schedule storage

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crmsync_domain::{JobFilter, JobStatus, Result, SyncJob, SyncSchedule};
use uuid::Uuid;

/// Durable sync jobs.
#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn insert(&self, job: &SyncJob) -> Result<()>;

    async fn update(&self, job: &SyncJob) -> Result<()>;

    /// Write `job` only while the stored row still has status `expected`.
    /// Returns `false` when another writer changed the status first or the
    /// row is gone.
    async fn update_if_status(&self, job: &SyncJob, expected: JobStatus) -> Result<bool>;

    async fn get(&self, id: Uuid) -> Result<Option<SyncJob>>;

    /// Newest first, at most `filter.limit` rows.
    async fn list_for_user(&self, user_id: &str, filter: &JobFilter) -> Result<Vec<SyncJob>>;

    async fn list_by_status(&self, status: JobStatus) -> Result<Vec<SyncJob>>;

    /// Pending jobs with `scheduled_at <= now`.
    async fn list_ready(&self, now: DateTime<Utc>) -> Result<Vec<SyncJob>>;

    /// Jobs created at or after `since`.
    async fn list_since(&self, user_id: &str, since: DateTime<Utc>) -> Result<Vec<SyncJob>>;

    /// Move terminal jobs last touched before `cutoff` to the archive.
    async fn archive_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

/// Durable recurring schedules.
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    async fn insert(&self, schedule: &SyncSchedule) -> Result<()>;

    async fn update(&self, schedule: &SyncSchedule) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<SyncSchedule>>;

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<SyncSchedule>>;

    /// Enabled schedules with `next_run_at <= now`.
    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<SyncSchedule>>;
}
