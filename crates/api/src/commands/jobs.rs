//! Job lifecycle commands.

use crmsync_domain::constants::DEFAULT_LIST_LIMIT;
use crmsync_domain::{JobFilter, JobSpec, JobStatus, Provider, Result, SyncJob, SyncMetrics};
use serde::Deserialize;
use uuid::Uuid;

use crate::context::AppContext;
use crate::utils::execute_command;

/// Query for [`list_jobs`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListJobsQuery {
    /// Only jobs in this state.
    pub status: Option<JobStatus>,
    /// Only jobs for this provider.
    pub provider: Option<Provider>,
    /// Defaults to `DEFAULT_LIST_LIMIT`.
    pub limit: Option<usize>,
}

impl From<ListJobsQuery> for JobFilter {
    fn from(query: ListJobsQuery) -> Self {
        Self {
            status: query.status,
            provider: query.provider,
            limit: query.limit.unwrap_or(DEFAULT_LIST_LIMIT),
        }
    }
}

/// Validate and enqueue a job. Returns the new job id.
pub async fn submit_job(ctx: &AppContext, spec: JobSpec) -> Result<Uuid> {
    execute_command("jobs::submit_job", || ctx.jobs.submit(spec)).await
}

/// Cancel a pending or running job. `false` when the job is already terminal.
pub async fn cancel_job(ctx: &AppContext, job_id: Uuid) -> Result<bool> {
    execute_command("jobs::cancel_job", || ctx.jobs.cancel(job_id)).await
}

/// Re-queue a failed job that still has retry budget.
pub async fn retry_job(ctx: &AppContext, job_id: Uuid) -> Result<bool> {
    execute_command("jobs::retry_job", || ctx.jobs.retry(job_id)).await
}

/// `None` for unknown ids.
pub async fn get_job(ctx: &AppContext, job_id: Uuid) -> Result<Option<SyncJob>> {
    execute_command("jobs::get_job", || ctx.jobs.get_job(job_id)).await
}

/// A user's jobs, newest first.
pub async fn list_jobs(
    ctx: &AppContext,
    user_id: &str,
    query: ListJobsQuery,
) -> Result<Vec<SyncJob>> {
    let filter = JobFilter::from(query);
    execute_command("jobs::list_jobs", || ctx.jobs.list_jobs(user_id, &filter)).await
}

/// Aggregates over jobs created in the last `days` days.
pub async fn get_metrics(ctx: &AppContext, user_id: &str, days: u32) -> Result<SyncMetrics> {
    execute_command("jobs::get_metrics", || ctx.jobs.get_metrics(user_id, days)).await
}
