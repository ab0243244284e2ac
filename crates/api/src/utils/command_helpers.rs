//! Command execution wrapper.

use std::future::Future;
use std::time::Instant;

use crmsync_domain::Result;

use crate::utils::logging::log_command_execution;

/// Time a command, log its outcome and pass the result through.
///
/// ```rust,ignore
/// pub async fn get_job(ctx: &AppContext, job_id: Uuid) -> Result<Option<SyncJob>> {
///     execute_command("jobs::get_job", || ctx.jobs.get_job(job_id)).await
/// }
/// ```
pub async fn execute_command<F, Fut, T>(command_name: &str, command_fn: F) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let start = Instant::now();
    let result = command_fn().await;
    log_command_execution(command_name, start.elapsed(), result.as_ref().err());
    result
}
