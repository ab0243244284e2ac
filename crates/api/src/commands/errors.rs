//! Error record commands.

use crmsync_domain::{
    CrmSyncError, ErrorContext, ErrorHandlingOptions, ErrorLogFilter, ErrorRecord, ErrorStats,
    FailureDetails, Result,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::context::AppContext;
use crate::utils::execute_command;

/// A failure reported from outside the job engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandleErrorRequest {
    /// What went wrong.
    pub failure: FailureDetails,
    /// Where it happened.
    pub context: ErrorContext,
    /// Caller overrides for retry and severity.
    #[serde(default)]
    pub options: ErrorHandlingOptions,
}

/// Classify, persist and alert on a failure.
pub async fn handle_error(ctx: &AppContext, request: HandleErrorRequest) -> Result<ErrorRecord> {
    execute_command("errors::handle_error", || async {
        if request.context.user_id.trim().is_empty() {
            return Err(CrmSyncError::InvalidInput("user_id is required".into()));
        }
        ctx.errors.handle_error(request.failure, request.context, request.options).await
    })
    .await
}

/// A user's error records, newest first.
pub async fn get_error_logs(
    ctx: &AppContext,
    user_id: &str,
    filter: ErrorLogFilter,
) -> Result<Vec<ErrorRecord>> {
    execute_command("errors::get_error_logs", || ctx.errors.get_error_logs(user_id, &filter)).await
}

/// Mark a record resolved with a note. Already resolved records are rejected.
pub async fn resolve_error(
    ctx: &AppContext,
    error_id: Uuid,
    resolution: &str,
) -> Result<ErrorRecord> {
    execute_command("errors::resolve_error", || ctx.errors.resolve_error(error_id, resolution))
        .await
}

/// Aggregates over the last `days` days.
pub async fn get_error_stats(ctx: &AppContext, user_id: &str, days: u32) -> Result<ErrorStats> {
    execute_command("errors::get_error_stats", || ctx.errors.get_error_stats(user_id, days)).await
}
