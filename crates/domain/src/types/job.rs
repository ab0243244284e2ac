//! Sync job model and its lifecycle state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_JOB_MAX_RETRIES, DEFAULT_JOB_PRIORITY, DEFAULT_LIST_LIMIT,
};
use crate::errors::{CrmSyncError, Result};
use crate::impl_domain_enum_conversions;

/// External CRM / enrichment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Hubspot,
    Salesforce,
    Pipedrive,
    Hunter,
    PeopleDataLabs,
}

impl_domain_enum_conversions!(Provider {
    Hubspot => "hubspot",
    Salesforce => "salesforce",
    Pipedrive => "pipedrive",
    Hunter => "hunter",
    PeopleDataLabs => "peopledatalabs",
});

/// What a job synchronizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Contacts,
    Companies,
    /// Contacts followed by companies in one run.
    Full,
}

impl_domain_enum_conversions!(JobType {
    Contacts => "contacts",
    Companies => "companies",
    Full => "full",
});

impl JobType {
    /// Rate-limit endpoint charged for one execution of this job type.
    pub const fn endpoint(&self) -> &'static str {
        match self {
            Self::Contacts | Self::Full => "contacts",
            Self::Companies => "companies",
        }
    }
}

/// Direction of record flow relative to the external CRM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    Pull,
    Push,
    Bidirectional,
}

impl_domain_enum_conversions!(SyncDirection {
    Pull => "pull",
    Push => "push",
    Bidirectional => "bidirectional",
});

/// Job lifecycle status.
///
/// ```text
/// pending -> running -> completed
///                    -> failed -> pending (retry) -> running ...
/// pending | running | failed -> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl_domain_enum_conversions!(JobStatus {
    Pending => "pending",
    Running => "running",
    Completed => "completed",
    Failed => "failed",
    Cancelled => "cancelled",
});

impl JobStatus {
    /// Whether the state machine allows `self -> next`.
    ///
    /// `running -> pending` is the recovery path for work interrupted by a
    /// process restart.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running | Self::Cancelled)
                | (Self::Running, Self::Completed | Self::Failed | Self::Cancelled | Self::Pending)
                | (Self::Failed, Self::Pending | Self::Cancelled)
        )
    }

    /// Completed and cancelled never change again.
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// How to resolve a record changed on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    #[default]
    CrmWins,
    LocalWins,
    NewestWins,
    Manual,
}

impl_domain_enum_conversions!(ConflictResolution {
    CrmWins => "crm_wins",
    LocalWins => "local_wins",
    NewestWins => "newest_wins",
    Manual => "manual",
});

/// Per-job options; every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncJobConfig {
    pub batch_size: u32,
    pub conflict_resolution: ConflictResolution,
    pub deduplicate: bool,
    pub create_new: bool,
    pub update_existing: bool,
    pub notify_email: Option<String>,
    pub webhook_url: Option<String>,
    /// Provider-specific query filters, passed through untouched.
    pub filters: serde_json::Value,
}

impl Default for SyncJobConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            conflict_resolution: ConflictResolution::CrmWins,
            deduplicate: true,
            create_new: true,
            update_existing: true,
            notify_email: None,
            webhook_url: None,
            filters: serde_json::Value::Object(serde_json::Map::new()),
        }
    }
}

/// A record-level failure inside an otherwise completed batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordError {
    pub record_id: Option<String>,
    pub message: String,
}

/// Outcome of one connector run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncJobResult {
    pub records_processed: u64,
    pub records_created: u64,
    pub records_updated: u64,
    pub records_skipped: u64,
    pub errors: Vec<RecordError>,
    pub duration_ms: u64,
}

impl SyncJobResult {
    pub fn error_count(&self) -> u64 {
        self.errors.len() as u64
    }

    /// A batch succeeds while record errors stay strictly under
    /// `max_error_rate` of processed records. An empty batch succeeds only
    /// without errors.
    pub fn is_successful(&self, max_error_rate: f64) -> bool {
        if self.records_processed == 0 {
            return self.errors.is_empty();
        }
        (self.error_count() as f64) < max_error_rate * self.records_processed as f64
    }

    /// Fold another partial result (e.g. companies after contacts) into this one.
    pub fn merge(&mut self, other: Self) {
        self.records_processed += other.records_processed;
        self.records_created += other.records_created;
        self.records_updated += other.records_updated;
        self.records_skipped += other.records_skipped;
        self.errors.extend(other.errors);
        self.duration_ms += other.duration_ms;
    }
}

/// Declarative submission accepted by the job manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    pub user_id: String,
    pub provider: Provider,
    pub job_type: JobType,
    pub direction: SyncDirection,
    #[serde(default)]
    pub config: SyncJobConfig,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub max_retries: Option<u32>,
}

impl JobSpec {
    /// Spec with default config, priority 0, due immediately.
    pub fn new(
        user_id: impl Into<String>,
        provider: Provider,
        job_type: JobType,
        direction: SyncDirection,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            provider,
            job_type,
            direction,
            config: SyncJobConfig::default(),
            priority: DEFAULT_JOB_PRIORITY,
            scheduled_at: None,
            max_retries: None,
        }
    }
}

/// Persisted sync job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncJob {
    pub id: Uuid,
    pub user_id: String,
    pub provider: Provider,
    pub job_type: JobType,
    pub direction: SyncDirection,
    pub status: JobStatus,
    pub priority: i32,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Percent complete, 0..=100.
    pub progress: u8,
    pub total_records: Option<u64>,
    pub processed_records: u64,
    pub error_count: u64,
    pub retry_count: u32,
    pub max_retries: u32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub config: SyncJobConfig,
    pub result: Option<SyncJobResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SyncJob {
    /// Materialize a pending job from a submission.
    pub fn from_spec(spec: JobSpec, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id: spec.user_id,
            provider: spec.provider,
            job_type: spec.job_type,
            direction: spec.direction,
            status: JobStatus::Pending,
            priority: spec.priority,
            scheduled_at: spec.scheduled_at.unwrap_or(now),
            started_at: None,
            completed_at: None,
            progress: 0,
            total_records: None,
            processed_records: 0,
            error_count: 0,
            retry_count: 0,
            max_retries: spec.max_retries.unwrap_or(DEFAULT_JOB_MAX_RETRIES),
            next_retry_at: None,
            last_error: None,
            config: spec.config,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `next`, rejecting transitions the state machine forbids.
    pub fn transition(&mut self, next: JobStatus, now: DateTime<Utc>) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(CrmSyncError::InvalidState(format!(
                "job {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Failed with no retry budget left.
    pub fn is_exhausted(&self) -> bool {
        self.status == JobStatus::Failed && self.retry_count >= self.max_retries
    }

    /// Terminal: completed, cancelled, or failed with retries exhausted.
    pub fn is_terminal(&self) -> bool {
        self.status.is_final() || self.is_exhausted()
    }

    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Pending && self.scheduled_at <= now
    }

    /// Clear per-attempt counters before a manual retry.
    pub fn reset_progress(&mut self) {
        self.progress = 0;
        self.total_records = None;
        self.processed_records = 0;
        self.error_count = 0;
        self.started_at = None;
        self.completed_at = None;
        self.result = None;
    }

    /// Copy a connector result into the progress counters.
    pub fn apply_result(&mut self, result: SyncJobResult) {
        self.processed_records = result.records_processed;
        let total = self.total_records.unwrap_or(0).max(result.records_processed);
        self.total_records = Some(total);
        self.error_count = result.error_count();
        self.progress = 100;
        self.result = Some(result);
    }
}

/// Query filter for job listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub provider: Option<Provider>,
    pub limit: usize,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self { status: None, provider: None, limit: DEFAULT_LIST_LIMIT }
    }
}

impl JobFilter {
    pub fn matches(&self, job: &SyncJob) -> bool {
        self.status.map_or(true, |status| job.status == status)
            && self.provider.map_or(true, |provider| job.provider == provider)
    }
}
