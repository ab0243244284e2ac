//! SQLite-backed quota rows and usage audit log.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crmsync_core::{QuotaRepository, UsageLogRepository};
use crmsync_domain::{CrmSyncError, Result, UsageEvent, UserQuota};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use tracing::debug;

use super::codec::{date, parse_date, parse_enum, parse_ts, parse_uuid, to_i64, to_u64, ts};
use super::manager::{map_sql_error, DbManager};

const QUOTA_COLUMNS: &str = "user_id, daily_usage, monthly_usage, daily_limit, monthly_limit,
        api_credits, last_reset_date, last_monthly_reset, updated_at";

/// Per-user quota storage. Usage and credit changes are single UPDATE
/// statements so concurrent recorders never lose increments.
pub struct SqliteQuotaRepository {
    db: Arc<DbManager>,
}

impl SqliteQuotaRepository {
    /// Repository over the shared pool.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl QuotaRepository for SqliteQuotaRepository {
    async fn get(&self, user_id: &str) -> Result<Option<UserQuota>> {
        let user_id = user_id.to_string();
        self.db.run(move |conn| select_quota(conn, &user_id)).await
    }

    async fn save(&self, quota: &UserQuota) -> Result<()> {
        let quota = quota.clone();
        self.db
            .run(move |conn| {
                insert_quota(
                    conn,
                    "ON CONFLICT(user_id) DO UPDATE SET
                        daily_usage = excluded.daily_usage,
                        monthly_usage = excluded.monthly_usage,
                        daily_limit = excluded.daily_limit,
                        monthly_limit = excluded.monthly_limit,
                        api_credits = excluded.api_credits,
                        last_reset_date = excluded.last_reset_date,
                        last_monthly_reset = excluded.last_monthly_reset,
                        updated_at = excluded.updated_at",
                    &quota,
                )?;
                Ok(())
            })
            .await
    }

    async fn create_if_absent(&self, quota: &UserQuota) -> Result<UserQuota> {
        let quota = quota.clone();
        self.db
            .run(move |conn| {
                let tx = conn.transaction().map_err(map_sql_error)?;
                if insert_quota(&tx, "ON CONFLICT(user_id) DO NOTHING", &quota)? == 1 {
                    debug!(user_id = %quota.user_id, "quota row created");
                }
                let stored = select_quota(&tx, &quota.user_id)?.ok_or_else(|| {
                    CrmSyncError::NotFound(format!("quota for user {}", quota.user_id))
                })?;
                tx.commit().map_err(map_sql_error)?;
                Ok(stored)
            })
            .await
    }

    async fn reset_elapsed(&self, user_id: &str, now: DateTime<Utc>) -> Result<Option<UserQuota>> {
        let user_id = user_id.to_string();
        let (today, this_month) = UserQuota::reset_marks(now);
        self.db
            .run(move |conn| {
                let tx = conn.transaction().map_err(map_sql_error)?;
                // CASE sees the pre-update markers, so each counter is zeroed
                // only when its own period rolled over.
                tx.execute(
                    "UPDATE user_quotas SET
                        daily_usage = CASE WHEN last_reset_date <> ?2 THEN 0 ELSE daily_usage END,
                        monthly_usage =
                            CASE WHEN last_monthly_reset <> ?3 THEN 0 ELSE monthly_usage END,
                        last_reset_date = ?2,
                        last_monthly_reset = ?3,
                        updated_at = ?4
                     WHERE user_id = ?1 AND (last_reset_date <> ?2 OR last_monthly_reset <> ?3)",
                    params![user_id, date(today), date(this_month), ts(&now)],
                )
                .map_err(map_sql_error)?;
                let quota = select_quota(&tx, &user_id)?;
                tx.commit().map_err(map_sql_error)?;
                Ok(quota)
            })
            .await
    }

    async fn record_usage(
        &self,
        user_id: &str,
        credits: u64,
        now: DateTime<Utc>,
    ) -> Result<UserQuota> {
        let user_id = user_id.to_string();
        self.db
            .run(move |conn| {
                let tx = conn.transaction().map_err(map_sql_error)?;
                let changed = tx
                    .execute(
                        "UPDATE user_quotas SET
                            daily_usage = daily_usage + 1,
                            monthly_usage = monthly_usage + 1,
                            api_credits = MAX(0, api_credits - ?2),
                            updated_at = ?3
                         WHERE user_id = ?1",
                        params![user_id, to_i64(credits), ts(&now)],
                    )
                    .map_err(map_sql_error)?;
                if changed == 0 {
                    return Err(CrmSyncError::NotFound(format!("quota for user {user_id}")));
                }

                let quota = select_quota(&tx, &user_id)?
                    .ok_or_else(|| CrmSyncError::NotFound(format!("quota for user {user_id}")))?;
                tx.commit().map_err(map_sql_error)?;
                Ok(quota)
            })
            .await
    }

    async fn add_credits(&self, user_id: &str, amount: u64, now: DateTime<Utc>) -> Result<u64> {
        let user_id = user_id.to_string();
        self.db
            .run(move |conn| {
                let balance: Option<i64> = conn
                    .query_row(
                        "UPDATE user_quotas SET api_credits = api_credits + ?2, updated_at = ?3
                         WHERE user_id = ?1
                         RETURNING api_credits",
                        params![user_id, to_i64(amount), ts(&now)],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(map_sql_error)?;
                balance
                    .map(to_u64)
                    .ok_or_else(|| CrmSyncError::NotFound(format!("quota for user {user_id}")))
            })
            .await
    }
}

/// Insert `quota` with the given conflict clause; returns rows written.
fn insert_quota(conn: &Connection, on_conflict: &str, quota: &UserQuota) -> Result<usize> {
    let daily_usage = to_i64(quota.daily_usage);
    let monthly_usage = to_i64(quota.monthly_usage);
    let daily_limit = to_i64(quota.daily_limit);
    let monthly_limit = to_i64(quota.monthly_limit);
    let api_credits = to_i64(quota.api_credits);
    let last_reset_date = date(quota.last_reset_date);
    let last_monthly_reset = date(quota.last_monthly_reset);
    let updated_at = ts(&quota.updated_at);

    let params: [&dyn ToSql; 9] = [
        &quota.user_id,
        &daily_usage,
        &monthly_usage,
        &daily_limit,
        &monthly_limit,
        &api_credits,
        &last_reset_date,
        &last_monthly_reset,
        &updated_at,
    ];
    let sql = format!(
        "INSERT INTO user_quotas (user_id, daily_usage, monthly_usage, daily_limit,
            monthly_limit, api_credits, last_reset_date, last_monthly_reset, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         {on_conflict}"
    );
    conn.execute(&sql, params.as_slice()).map_err(map_sql_error)
}

fn select_quota(conn: &Connection, user_id: &str) -> Result<Option<UserQuota>> {
    let sql = format!("SELECT {QUOTA_COLUMNS} FROM user_quotas WHERE user_id = ?1");
    conn.query_row(&sql, params![user_id], map_quota_row).optional().map_err(map_sql_error)
}

fn map_quota_row(row: &Row<'_>) -> rusqlite::Result<UserQuota> {
    Ok(UserQuota {
        user_id: row.get(0)?,
        daily_usage: to_u64(row.get(1)?),
        monthly_usage: to_u64(row.get(2)?),
        daily_limit: to_u64(row.get(3)?),
        monthly_limit: to_u64(row.get(4)?),
        api_credits: to_u64(row.get(5)?),
        last_reset_date: parse_date(6, &row.get::<_, String>(6)?)?,
        last_monthly_reset: parse_date(7, &row.get::<_, String>(7)?)?,
        updated_at: parse_ts(8, &row.get::<_, String>(8)?)?,
    })
}

/// Append-only usage events.
pub struct SqliteUsageLog {
    db: Arc<DbManager>,
}

impl SqliteUsageLog {
    /// Log over the shared pool.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UsageLogRepository for SqliteUsageLog {
    async fn append(&self, event: &UsageEvent) -> Result<()> {
        let event = event.clone();
        self.db
            .run(move |conn| {
                conn.execute(
                    "INSERT INTO usage_events (id, user_id, provider, endpoint, success,
                        response_time_ms, error_message, credits_charged, recorded_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        event.id.to_string(),
                        event.user_id,
                        event.provider.as_str(),
                        event.endpoint,
                        event.success,
                        to_i64(event.response_time_ms),
                        event.error_message,
                        to_i64(event.credits_charged),
                        ts(&event.recorded_at),
                    ],
                )
                .map_err(map_sql_error)?;
                Ok(())
            })
            .await
    }

    async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<UsageEvent>> {
        let user_id = user_id.to_string();
        self.db
            .run(move |conn| {
                let limit = i64::try_from(limit).unwrap_or(i64::MAX);
                let mut stmt = conn
                    .prepare(
                        "SELECT id, user_id, provider, endpoint, success, response_time_ms,
                            error_message, credits_charged, recorded_at
                         FROM usage_events
                         WHERE user_id = ?1
                         ORDER BY recorded_at DESC, id DESC
                         LIMIT ?2",
                    )
                    .map_err(map_sql_error)?;
                let rows = stmt
                    .query_map(params![user_id, limit], map_usage_row)
                    .map_err(map_sql_error)?;
                rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
            })
            .await
    }
}

fn map_usage_row(row: &Row<'_>) -> rusqlite::Result<UsageEvent> {
    Ok(UsageEvent {
        id: parse_uuid(0, &row.get::<_, String>(0)?)?,
        user_id: row.get(1)?,
        provider: parse_enum(2, &row.get::<_, String>(2)?)?,
        endpoint: row.get(3)?,
        success: row.get(4)?,
        response_time_ms: to_u64(row.get(5)?),
        error_message: row.get(6)?,
        credits_charged: to_u64(row.get(7)?),
        recorded_at: parse_ts(8, &row.get::<_, String>(8)?)?,
    })
}
