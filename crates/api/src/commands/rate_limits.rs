//! Rate limit and quota commands.

use crmsync_domain::{Provider, RateLimitDecision, Result, UsageEvent, UserQuota};
use serde::Deserialize;

use crate::context::AppContext;
use crate::utils::execute_command;

/// One finished provider call, as reported by a caller outside the engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordUsageRequest {
    /// User the call is charged to.
    pub user_id: String,
    /// Provider that was called.
    pub provider: Provider,
    /// Endpoint name as configured in the rate limits.
    pub endpoint: String,
    /// Only successful calls are counted and charged.
    pub success: bool,
    /// Round-trip time of the call.
    #[serde(default)]
    pub response_time_ms: u64,
    /// Failure text for unsuccessful calls.
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Would a call be allowed now? Nothing is counted.
pub async fn check_rate_limit(
    ctx: &AppContext,
    user_id: &str,
    provider: Provider,
    endpoint: &str,
) -> Result<RateLimitDecision> {
    execute_command("rate_limits::check_rate_limit", || {
        ctx.limiter.check(user_id, provider, endpoint)
    })
    .await
}

/// Book a call. Successful calls count toward every window and quota and
/// consume credits; failures are only logged.
pub async fn record_usage(ctx: &AppContext, request: RecordUsageRequest) -> Result<UsageEvent> {
    execute_command("rate_limits::record_usage", || async {
        ctx.limiter
            .record(
                &request.user_id,
                request.provider,
                &request.endpoint,
                request.success,
                request.response_time_ms,
                request.error_message.clone(),
            )
            .await
    })
    .await
}

/// Quota row after any due reset, created on first use.
pub async fn get_user_quota(ctx: &AppContext, user_id: &str) -> Result<UserQuota> {
    execute_command("rate_limits::get_user_quota", || ctx.limiter.get_user_quota(user_id)).await
}

/// Top up a user's credits. Returns the new balance.
pub async fn add_credits(ctx: &AppContext, user_id: &str, amount: u64) -> Result<u64> {
    execute_command("rate_limits::add_credits", || ctx.limiter.add_credits(user_id, amount)).await
}

/// Most recent usage events for a user, newest first.
pub async fn get_usage_history(
    ctx: &AppContext,
    user_id: &str,
    limit: usize,
) -> Result<Vec<UsageEvent>> {
    execute_command("rate_limits::get_usage_history", || {
        ctx.limiter.usage_history(user_id, limit)
    })
    .await
}
