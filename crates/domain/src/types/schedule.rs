//! Recurring sync schedules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::job::{JobSpec, JobType, Provider, SyncDirection, SyncJobConfig};

/// A recurrence that materializes a new job each time `next_run_at` passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSchedule {
    pub id: Uuid,
    pub user_id: String,
    pub provider: Provider,
    pub job_type: JobType,
    pub direction: SyncDirection,
    /// Recurrence expression: `daily`, `every 15m`, or a five-field cron.
    pub interval: String,
    /// IANA timezone the expression is evaluated in.
    pub timezone: String,
    pub enabled: bool,
    pub priority: i32,
    pub config: SyncJobConfig,
    pub next_run_at: DateTime<Utc>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SyncSchedule {
    /// Job template for one run of this schedule, due at `now`.
    pub fn job_spec(&self, now: DateTime<Utc>) -> JobSpec {
        JobSpec {
            user_id: self.user_id.clone(),
            provider: self.provider,
            job_type: self.job_type,
            direction: self.direction,
            config: self.config.clone(),
            priority: self.priority,
            scheduled_at: Some(now),
            max_retries: None,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.next_run_at <= now
    }
}

/// Request to create a schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSpec {
    pub user_id: String,
    pub provider: Provider,
    pub job_type: JobType,
    pub direction: SyncDirection,
    pub interval: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub config: SyncJobConfig,
    /// First run; defaults to the first occurrence after creation.
    #[serde(default)]
    pub start_at: Option<DateTime<Utc>>,
}

fn default_timezone() -> String {
    "UTC".to_string()
}
