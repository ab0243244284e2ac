//! Aggregated job metrics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::job::{JobStatus, SyncJob};

/// Per-user job statistics over a trailing window.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMetrics {
    pub total_jobs: u64,
    pub completed_jobs: u64,
    pub failed_jobs: u64,
    /// Percent of finished jobs (completed + failed) that completed.
    pub success_rate: f64,
    pub average_duration_ms: u64,
    pub total_records_processed: u64,
    pub total_records_created: u64,
    pub total_records_updated: u64,
    pub total_errors: u64,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub upcoming_jobs: u64,
}

impl SyncMetrics {
    /// Fold jobs created inside the window; `now` decides which pending jobs
    /// count as upcoming.
    pub fn from_jobs<'a>(jobs: impl IntoIterator<Item = &'a SyncJob>, now: DateTime<Utc>) -> Self {
        let mut metrics = Self::default();
        let mut duration_total: u64 = 0;
        let mut duration_samples: u64 = 0;

        for job in jobs {
            metrics.total_jobs += 1;
            match job.status {
                JobStatus::Completed => {
                    metrics.completed_jobs += 1;
                    metrics.last_sync_at = metrics.last_sync_at.max(job.completed_at);
                }
                JobStatus::Failed => metrics.failed_jobs += 1,
                JobStatus::Pending if job.scheduled_at > now => metrics.upcoming_jobs += 1,
                _ => {}
            }

            if let Some(result) = &job.result {
                metrics.total_records_processed += result.records_processed;
                metrics.total_records_created += result.records_created;
                metrics.total_records_updated += result.records_updated;
                if job.status == JobStatus::Completed {
                    duration_total += result.duration_ms;
                    duration_samples += 1;
                }
            }
            metrics.total_errors += job.error_count;
        }

        let finished = metrics.completed_jobs + metrics.failed_jobs;
        if finished > 0 {
            metrics.success_rate = metrics.completed_jobs as f64 * 100.0 / finished as f64;
        }
        if duration_samples > 0 {
            metrics.average_duration_ms = duration_total / duration_samples;
        }
        metrics
    }
}
