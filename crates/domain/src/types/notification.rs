//! Outbound job notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::job::{JobStatus, JobType, Provider, SyncDirection, SyncJob, SyncJobResult};

/// JSON body POSTed to a job's webhook when it finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobWebhookPayload {
    pub job_id: Uuid,
    pub user_id: String,
    pub provider: Provider,
    pub job_type: JobType,
    pub direction: SyncDirection,
    pub status: JobStatus,
    pub result: Option<SyncJobResult>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&SyncJob> for JobWebhookPayload {
    fn from(job: &SyncJob) -> Self {
        Self {
            job_id: job.id,
            user_id: job.user_id.clone(),
            provider: job.provider,
            job_type: job.job_type,
            direction: job.direction,
            status: job.status,
            result: job.result.clone(),
            started_at: job.started_at,
            completed_at: job.completed_at,
        }
    }
}

/// Rendered email handed to the email sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}
