//! SQLite-backed implementation of the `ErrorRepository` port.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crmsync_core::ErrorRepository;
use crmsync_domain::{CrmSyncError, ErrorLogFilter, ErrorRecord, Result};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql, TransactionBehavior};
use uuid::Uuid;

use super::codec::{opt_ts, parse_enum, parse_json, parse_opt_ts, parse_ts, parse_uuid, ts};
use super::manager::{map_sql_error, DbManager};

const ERROR_COLUMNS: &str = "id, user_id, context_json, error_type, severity, message, stack,
        status_code, retryable, retry_count, max_retries, next_retry_at, resolved_at, resolution,
        created_at, updated_at";

const ERROR_INSERT_SQL: &str = "INSERT INTO error_records (id, user_id, context_json, error_type,
        severity, message, stack, status_code, retryable, retry_count, max_retries, next_retry_at,
        resolved_at, resolution, created_at, updated_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)";

const ERROR_UPDATE_SQL: &str = "UPDATE error_records SET user_id = ?2, context_json = ?3,
        error_type = ?4, severity = ?5, message = ?6, stack = ?7, status_code = ?8,
        retryable = ?9, retry_count = ?10, max_retries = ?11, next_retry_at = ?12,
        resolved_at = ?13, resolution = ?14, created_at = ?15, updated_at = ?16
    WHERE id = ?1";

/// Durable storage for classified failures.
pub struct SqliteErrorRepository {
    db: Arc<DbManager>,
}

impl SqliteErrorRepository {
    /// Repository over the shared pool.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ErrorRepository for SqliteErrorRepository {
    async fn insert(&self, record: &ErrorRecord) -> Result<()> {
        let record = record.clone();
        self.db
            .run(move |conn| {
                write_record(conn, ERROR_INSERT_SQL, &record)?;
                Ok(())
            })
            .await
    }

    async fn insert_and_count(&self, record: &ErrorRecord, since: DateTime<Utc>) -> Result<u64> {
        let record = record.clone();
        self.db
            .run(move |conn| {
                // IMMEDIATE takes the write lock up front, so concurrent
                // inserts each see a distinct post-insert count.
                let tx = conn
                    .transaction_with_behavior(TransactionBehavior::Immediate)
                    .map_err(map_sql_error)?;
                write_record(&tx, ERROR_INSERT_SQL, &record)?;
                let count = count_for_user(&tx, &record.user_id, since)?;
                tx.commit().map_err(map_sql_error)?;
                Ok(count)
            })
            .await
    }

    async fn update(&self, record: &ErrorRecord) -> Result<()> {
        let record = record.clone();
        self.db
            .run(move |conn| {
                if write_record(conn, ERROR_UPDATE_SQL, &record)? == 0 {
                    return Err(CrmSyncError::NotFound(format!("error record {}", record.id)));
                }
                Ok(())
            })
            .await
    }

    async fn get(&self, id: Uuid) -> Result<Option<ErrorRecord>> {
        self.db
            .run(move |conn| {
                let sql = format!("SELECT {ERROR_COLUMNS} FROM error_records WHERE id = ?1");
                conn.query_row(&sql, params![id.to_string()], map_record_row)
                    .optional()
                    .map_err(map_sql_error)
            })
            .await
    }

    async fn list(&self, user_id: &str, filter: &ErrorLogFilter) -> Result<Vec<ErrorRecord>> {
        let user_id = user_id.to_string();
        let filter = filter.clone();
        self.db
            .run(move |conn| {
                let error_type = filter.error_type.map(|t| t.as_str());
                let severity = filter.severity.map(|s| s.as_str());
                let resolved = filter.resolved;
                let limit = i64::try_from(filter.limit).unwrap_or(i64::MAX);
                let sql = format!(
                    "SELECT {ERROR_COLUMNS} FROM error_records
                     WHERE user_id = ?1
                       AND (?2 IS NULL OR error_type = ?2)
                       AND (?3 IS NULL OR severity = ?3)
                       AND (?4 IS NULL OR (resolved_at IS NOT NULL) = ?4)
                     ORDER BY created_at DESC, id DESC
                     LIMIT ?5"
                );
                query_records(conn, &sql, &[&user_id, &error_type, &severity, &resolved, &limit])
            })
            .await
    }

    async fn list_since(&self, user_id: &str, since: DateTime<Utc>) -> Result<Vec<ErrorRecord>> {
        let user_id = user_id.to_string();
        self.db
            .run(move |conn| {
                let sql = format!(
                    "SELECT {ERROR_COLUMNS} FROM error_records
                     WHERE user_id = ?1 AND created_at >= ?2
                     ORDER BY created_at"
                );
                query_records(conn, &sql, &[&user_id, &ts(&since)])
            })
            .await
    }

    async fn count_since(&self, user_id: &str, since: DateTime<Utc>) -> Result<u64> {
        let user_id = user_id.to_string();
        self.db
            .run(move |conn| count_for_user(conn, &user_id, since))
            .await
    }
}

fn count_for_user(conn: &Connection, user_id: &str, since: DateTime<Utc>) -> Result<u64> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM error_records WHERE user_id = ?1 AND created_at >= ?2",
            params![user_id, ts(&since)],
            |row| row.get(0),
        )
        .map_err(map_sql_error)?;
    Ok(u64::try_from(count).unwrap_or(0))
}

fn write_record(conn: &Connection, sql: &str, record: &ErrorRecord) -> Result<usize> {
    let id = record.id.to_string();
    let context_json = serde_json::to_string(&record.context)?;
    let next_retry_at = opt_ts(record.next_retry_at.as_ref());
    let resolved_at = opt_ts(record.resolved_at.as_ref());
    let created_at = ts(&record.created_at);
    let updated_at = ts(&record.updated_at);

    let params: [&dyn ToSql; 16] = [
        &id,
        &record.user_id,
        &context_json,
        &record.error_type.as_str(),
        &record.severity.as_str(),
        &record.message,
        &record.stack,
        &record.status_code,
        &record.retryable,
        &record.retry_count,
        &record.max_retries,
        &next_retry_at,
        &resolved_at,
        &record.resolution,
        &created_at,
        &updated_at,
    ];
    conn.execute(sql, params.as_slice()).map_err(map_sql_error)
}

fn query_records(conn: &Connection, sql: &str, params: &[&dyn ToSql]) -> Result<Vec<ErrorRecord>> {
    let mut stmt = conn.prepare(sql).map_err(map_sql_error)?;
    let rows = stmt.query_map(params, map_record_row).map_err(map_sql_error)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
}

fn map_record_row(row: &Row<'_>) -> rusqlite::Result<ErrorRecord> {
    Ok(ErrorRecord {
        id: parse_uuid(0, &row.get::<_, String>(0)?)?,
        user_id: row.get(1)?,
        context: parse_json(2, &row.get::<_, String>(2)?)?,
        error_type: parse_enum(3, &row.get::<_, String>(3)?)?,
        severity: parse_enum(4, &row.get::<_, String>(4)?)?,
        message: row.get(5)?,
        stack: row.get(6)?,
        status_code: row.get(7)?,
        retryable: row.get(8)?,
        retry_count: row.get(9)?,
        max_retries: row.get(10)?,
        next_retry_at: parse_opt_ts(11, row.get(11)?)?,
        resolved_at: parse_opt_ts(12, row.get(12)?)?,
        resolution: row.get(13)?,
        created_at: parse_ts(14, &row.get::<_, String>(14)?)?,
        updated_at: parse_ts(15, &row.get::<_, String>(15)?)?,
    })
}
