//! Port interfaces for quota and usage storage

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crmsync_domain::{Result, UsageEvent, UserQuota};

/// Per-user quota rows.
#[async_trait]
pub trait QuotaRepository: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<UserQuota>>;

    /// Insert or replace the whole row.
    async fn save(&self, quota: &UserQuota) -> Result<()>;

    /// Insert `quota` unless the user already has a row. Returns the stored
    /// row either way.
    async fn create_if_absent(&self, quota: &UserQuota) -> Result<UserQuota>;

    /// Zero the daily and monthly usage whose period ended before `now`,
    /// leaving credits and limits untouched. Only counters whose reset
    /// marker is stale are written. Returns the current row, or `None` for
    /// an unknown user.
    async fn reset_elapsed(&self, user_id: &str, now: DateTime<Utc>) -> Result<Option<UserQuota>>;

    /// Atomically count one successful call and deduct `credits`, never below
    /// zero. Returns the updated row.
    async fn record_usage(
        &self,
        user_id: &str,
        credits: u64,
        now: DateTime<Utc>,
    ) -> Result<UserQuota>;

    /// Atomically add credits; returns the new balance.
    async fn add_credits(&self, user_id: &str, amount: u64, now: DateTime<Utc>) -> Result<u64>;
}

/// Append-only usage audit log.
#[async_trait]
pub trait UsageLogRepository: Send + Sync {
    async fn append(&self, event: &UsageEvent) -> Result<()>;

    /// Most recent events first.
    async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<UsageEvent>>;
}

/// Windowed request counters.
///
/// Keys embed the bucket index, so a key is never reused after its window
/// ends; `reset_at_ms` only drives eviction.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Current count, zero when the key is unknown.
    async fn get(&self, key: &str) -> Result<u64>;

    /// Increment and return the new count.
    async fn increment(&self, key: &str, reset_at_ms: i64) -> Result<u64>;

    /// Drop counters whose window ended at or before `now_ms`.
    async fn evict_expired(&self, now_ms: i64) -> Result<usize>;
}
