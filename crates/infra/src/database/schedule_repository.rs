//! SQLite-backed implementation of the `ScheduleRepository` port.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crmsync_core::ScheduleRepository;
use crmsync_domain::{Result, SyncSchedule};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use uuid::Uuid;

use super::codec::{opt_ts, parse_enum, parse_json, parse_opt_ts, parse_ts, parse_uuid, ts};
use super::manager::{map_sql_error, DbManager};

const SCHEDULE_COLUMNS: &str = "id, user_id, provider, job_type, direction, interval_expr,
        timezone, enabled, priority, config_json, next_run_at, last_run_at, created_at";

const SCHEDULE_UPSERT_SQL: &str = "INSERT OR REPLACE INTO sync_schedules (id, user_id, provider,
        job_type, direction, interval_expr, timezone, enabled, priority, config_json, next_run_at,
        last_run_at, created_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)";

/// Durable storage for recurring schedules.
pub struct SqliteScheduleRepository {
    db: Arc<DbManager>,
}

impl SqliteScheduleRepository {
    /// Repository over the shared pool.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    async fn upsert(&self, schedule: &SyncSchedule) -> Result<()> {
        let schedule = schedule.clone();
        self.db
            .run(move |conn| {
                let id = schedule.id.to_string();
                let config_json = serde_json::to_string(&schedule.config)?;
                let next_run_at = ts(&schedule.next_run_at);
                let last_run_at = opt_ts(schedule.last_run_at.as_ref());
                let created_at = ts(&schedule.created_at);
                let params: [&dyn ToSql; 13] = [
                    &id,
                    &schedule.user_id,
                    &schedule.provider.as_str(),
                    &schedule.job_type.as_str(),
                    &schedule.direction.as_str(),
                    &schedule.interval,
                    &schedule.timezone,
                    &schedule.enabled,
                    &schedule.priority,
                    &config_json,
                    &next_run_at,
                    &last_run_at,
                    &created_at,
                ];
                conn.execute(SCHEDULE_UPSERT_SQL, params.as_slice()).map_err(map_sql_error)?;
                Ok(())
            })
            .await
    }
}

#[async_trait]
impl ScheduleRepository for SqliteScheduleRepository {
    async fn insert(&self, schedule: &SyncSchedule) -> Result<()> {
        self.upsert(schedule).await
    }

    async fn update(&self, schedule: &SyncSchedule) -> Result<()> {
        self.upsert(schedule).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<SyncSchedule>> {
        self.db
            .run(move |conn| {
                let sql = format!("SELECT {SCHEDULE_COLUMNS} FROM sync_schedules WHERE id = ?1");
                conn.query_row(&sql, params![id.to_string()], map_schedule_row)
                    .optional()
                    .map_err(map_sql_error)
            })
            .await
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<SyncSchedule>> {
        let user_id = user_id.to_string();
        self.db
            .run(move |conn| {
                let sql = format!(
                    "SELECT {SCHEDULE_COLUMNS} FROM sync_schedules WHERE user_id = ?1 ORDER BY created_at"
                );
                query_schedules(conn, &sql, &[&user_id])
            })
            .await
    }

    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<SyncSchedule>> {
        self.db
            .run(move |conn| {
                let sql = format!(
                    "SELECT {SCHEDULE_COLUMNS} FROM sync_schedules
                     WHERE enabled = 1 AND next_run_at <= ?1
                     ORDER BY next_run_at"
                );
                query_schedules(conn, &sql, &[&ts(&now)])
            })
            .await
    }
}

fn query_schedules(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> Result<Vec<SyncSchedule>> {
    let mut stmt = conn.prepare(sql).map_err(map_sql_error)?;
    let rows = stmt.query_map(params, map_schedule_row).map_err(map_sql_error)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
}

fn map_schedule_row(row: &Row<'_>) -> rusqlite::Result<SyncSchedule> {
    let id: String = row.get(0)?;
    Ok(SyncSchedule {
        id: parse_uuid(0, &id)?,
        user_id: row.get(1)?,
        provider: parse_enum(2, &row.get::<_, String>(2)?)?,
        job_type: parse_enum(3, &row.get::<_, String>(3)?)?,
        direction: parse_enum(4, &row.get::<_, String>(4)?)?,
        interval: row.get(5)?,
        timezone: row.get(6)?,
        enabled: row.get(7)?,
        priority: row.get(8)?,
        config: parse_json(9, &row.get::<_, String>(9)?)?,
        next_run_at: parse_ts(10, &row.get::<_, String>(10)?)?,
        last_run_at: parse_opt_ts(11, row.get(11)?)?,
        created_at: parse_ts(12, &row.get::<_, String>(12)?)?,
    })
}
