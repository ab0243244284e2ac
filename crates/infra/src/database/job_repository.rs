//! SQLite-backed implementation of the `JobRepository` port.
//!
//! Ready-job and listing queries compare RFC 3339 text columns, which sort
//! chronologically because every timestamp is written in the same UTC form.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crmsync_core::JobRepository;
use crmsync_domain::{CrmSyncError, JobFilter, JobStatus, Result, SyncJob};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use tracing::debug;
use uuid::Uuid;

use super::codec::{
    opt_ts, parse_enum, parse_json, parse_opt_ts, parse_ts, parse_uuid, to_i64, to_u64, ts,
};
use super::manager::{map_sql_error, DbManager};

const JOB_COLUMNS: &str = "id, user_id, provider, job_type, direction, status, priority,
        scheduled_at, started_at, completed_at, progress, total_records, processed_records,
        error_count, retry_count, max_retries, next_retry_at, last_error, config_json,
        result_json, created_at, updated_at";

const JOB_INSERT_SQL: &str = "INSERT INTO sync_jobs (id, user_id, provider, job_type, direction,
        status, priority, scheduled_at, started_at, completed_at, progress, total_records,
        processed_records, error_count, retry_count, max_retries, next_retry_at, last_error,
        config_json, result_json, created_at, updated_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18,
        ?19, ?20, ?21, ?22)";

const JOB_UPDATE_SQL: &str = "UPDATE sync_jobs SET user_id = ?2, provider = ?3, job_type = ?4,
        direction = ?5, status = ?6, priority = ?7, scheduled_at = ?8, started_at = ?9,
        completed_at = ?10, progress = ?11, total_records = ?12, processed_records = ?13,
        error_count = ?14, retry_count = ?15, max_retries = ?16, next_retry_at = ?17,
        last_error = ?18, config_json = ?19, result_json = ?20, created_at = ?21, updated_at = ?22
    WHERE id = ?1";

const JOB_UPDATE_IF_STATUS_SQL: &str = "UPDATE sync_jobs SET user_id = ?2, provider = ?3,
        job_type = ?4, direction = ?5, status = ?6, priority = ?7, scheduled_at = ?8,
        started_at = ?9, completed_at = ?10, progress = ?11, total_records = ?12,
        processed_records = ?13, error_count = ?14, retry_count = ?15, max_retries = ?16,
        next_retry_at = ?17, last_error = ?18, config_json = ?19, result_json = ?20,
        created_at = ?21, updated_at = ?22
    WHERE id = ?1 AND status = ?23";

const TERMINAL_PREDICATE: &str = "(status IN ('completed', 'cancelled')
        OR (status = 'failed' AND retry_count >= max_retries))
    AND COALESCE(completed_at, updated_at) < ?1";

/// Durable job storage.
pub struct SqliteJobRepository {
    db: Arc<DbManager>,
}

impl SqliteJobRepository {
    /// Repository over the shared pool.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn insert(&self, job: &SyncJob) -> Result<()> {
        let job = job.clone();
        self.db
            .run(move |conn| {
                write_job(conn, JOB_INSERT_SQL, &job)?;
                Ok(())
            })
            .await
    }

    async fn update(&self, job: &SyncJob) -> Result<()> {
        let job = job.clone();
        self.db
            .run(move |conn| {
                if write_job(conn, JOB_UPDATE_SQL, &job)? == 0 {
                    return Err(CrmSyncError::NotFound(format!("sync job {}", job.id)));
                }
                Ok(())
            })
            .await
    }

    async fn update_if_status(&self, job: &SyncJob, expected: JobStatus) -> Result<bool> {
        let job = job.clone();
        self.db
            .run(move |conn| {
                let written = write_job_guarded(conn, &job, expected)?;
                if written == 0 {
                    debug!(job_id = %job.id, %expected, "sync job status moved on, write skipped");
                }
                Ok(written == 1)
            })
            .await
    }

    async fn get(&self, id: Uuid) -> Result<Option<SyncJob>> {
        self.db
            .run(move |conn| {
                let sql = format!("SELECT {JOB_COLUMNS} FROM sync_jobs WHERE id = ?1");
                conn.query_row(&sql, params![id.to_string()], map_job_row)
                    .optional()
                    .map_err(map_sql_error)
            })
            .await
    }

    async fn list_for_user(&self, user_id: &str, filter: &JobFilter) -> Result<Vec<SyncJob>> {
        let user_id = user_id.to_string();
        let filter = filter.clone();
        self.db
            .run(move |conn| {
                let status = filter.status.map(|s| s.as_str());
                let provider = filter.provider.map(|p| p.as_str());
                let limit = i64::try_from(filter.limit).unwrap_or(i64::MAX);
                let sql = format!(
                    "SELECT {JOB_COLUMNS} FROM sync_jobs
                     WHERE user_id = ?1 AND (?2 IS NULL OR status = ?2) AND (?3 IS NULL OR provider = ?3)
                     ORDER BY created_at DESC, id DESC
                     LIMIT ?4"
                );
                query_jobs(conn, &sql, &[&user_id, &status, &provider, &limit])
            })
            .await
    }

    async fn list_by_status(&self, status: JobStatus) -> Result<Vec<SyncJob>> {
        self.db
            .run(move |conn| {
                let sql = format!(
                    "SELECT {JOB_COLUMNS} FROM sync_jobs WHERE status = ?1 ORDER BY created_at"
                );
                query_jobs(conn, &sql, &[&status.as_str()])
            })
            .await
    }

    async fn list_ready(&self, now: DateTime<Utc>) -> Result<Vec<SyncJob>> {
        self.db
            .run(move |conn| {
                let sql = format!(
                    "SELECT {JOB_COLUMNS} FROM sync_jobs
                     WHERE status = 'pending' AND scheduled_at <= ?1
                     ORDER BY priority DESC, scheduled_at"
                );
                query_jobs(conn, &sql, &[&ts(&now)])
            })
            .await
    }

    async fn list_since(&self, user_id: &str, since: DateTime<Utc>) -> Result<Vec<SyncJob>> {
        let user_id = user_id.to_string();
        self.db
            .run(move |conn| {
                let sql = format!(
                    "SELECT {JOB_COLUMNS} FROM sync_jobs
                     WHERE user_id = ?1 AND created_at >= ?2
                     ORDER BY created_at"
                );
                query_jobs(conn, &sql, &[&user_id, &ts(&since)])
            })
            .await
    }

    async fn archive_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.db
            .run(move |conn| {
                let tx = conn.transaction().map_err(map_sql_error)?;
                let cutoff = ts(&cutoff);
                let sql = format!("SELECT {JOB_COLUMNS} FROM sync_jobs WHERE {TERMINAL_PREDICATE}");
                let stale = query_jobs(&tx, &sql, &[&cutoff])?;

                let archived_at = ts(&Utc::now());
                for job in &stale {
                    let job_json = serde_json::to_string(job)?;
                    tx.execute(
                        "INSERT OR REPLACE INTO sync_jobs_archive (id, user_id, status, job_json, archived_at)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![job.id.to_string(), job.user_id, job.status.as_str(), job_json, archived_at],
                    )
                    .map_err(map_sql_error)?;
                    tx.execute("DELETE FROM sync_jobs WHERE id = ?1", params![job.id.to_string()])
                        .map_err(map_sql_error)?;
                }
                tx.commit().map_err(map_sql_error)?;

                debug!(archived = stale.len(), "terminal jobs archived");
                Ok(stale.len())
            })
            .await
    }
}

fn write_job(conn: &Connection, sql: &str, job: &SyncJob) -> Result<usize> {
    write_job_with(conn, sql, job, None)
}

fn write_job_guarded(conn: &Connection, job: &SyncJob, expected: JobStatus) -> Result<usize> {
    write_job_with(conn, JOB_UPDATE_IF_STATUS_SQL, job, Some(expected))
}

fn write_job_with(
    conn: &Connection,
    sql: &str,
    job: &SyncJob,
    expected: Option<JobStatus>,
) -> Result<usize> {
    let config_json = serde_json::to_string(&job.config)?;
    let result_json = job.result.as_ref().map(serde_json::to_string).transpose()?;
    let id = job.id.to_string();
    let total_records = job.total_records.map(to_i64);
    let processed_records = to_i64(job.processed_records);
    let error_count = to_i64(job.error_count);
    let scheduled_at = ts(&job.scheduled_at);
    let started_at = opt_ts(job.started_at.as_ref());
    let completed_at = opt_ts(job.completed_at.as_ref());
    let next_retry_at = opt_ts(job.next_retry_at.as_ref());
    let created_at = ts(&job.created_at);
    let updated_at = ts(&job.updated_at);

    let expected = expected.map(|status| status.as_str());
    let provider = job.provider.as_str();
    let job_type = job.job_type.as_str();
    let direction = job.direction.as_str();
    let status = job.status.as_str();
    let mut params: Vec<&dyn ToSql> = vec![
        &id,
        &job.user_id,
        &provider,
        &job_type,
        &direction,
        &status,
        &job.priority,
        &scheduled_at,
        &started_at,
        &completed_at,
        &job.progress,
        &total_records,
        &processed_records,
        &error_count,
        &job.retry_count,
        &job.max_retries,
        &next_retry_at,
        &job.last_error,
        &config_json,
        &result_json,
        &created_at,
        &updated_at,
    ];
    if let Some(expected) = &expected {
        params.push(expected);
    }
    conn.execute(sql, params.as_slice()).map_err(map_sql_error)
}

fn query_jobs(conn: &Connection, sql: &str, params: &[&dyn ToSql]) -> Result<Vec<SyncJob>> {
    let mut stmt = conn.prepare(sql).map_err(map_sql_error)?;
    let rows = stmt.query_map(params, map_job_row).map_err(map_sql_error)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
}

fn map_job_row(row: &Row<'_>) -> rusqlite::Result<SyncJob> {
    let id: String = row.get(0)?;
    let result_json: Option<String> = row.get(19)?;

    Ok(SyncJob {
        id: parse_uuid(0, &id)?,
        user_id: row.get(1)?,
        provider: parse_enum(2, &row.get::<_, String>(2)?)?,
        job_type: parse_enum(3, &row.get::<_, String>(3)?)?,
        direction: parse_enum(4, &row.get::<_, String>(4)?)?,
        status: parse_enum(5, &row.get::<_, String>(5)?)?,
        priority: row.get(6)?,
        scheduled_at: parse_ts(7, &row.get::<_, String>(7)?)?,
        started_at: parse_opt_ts(8, row.get(8)?)?,
        completed_at: parse_opt_ts(9, row.get(9)?)?,
        progress: row.get(10)?,
        total_records: row.get::<_, Option<i64>>(11)?.map(to_u64),
        processed_records: to_u64(row.get(12)?),
        error_count: to_u64(row.get(13)?),
        retry_count: row.get(14)?,
        max_retries: row.get(15)?,
        next_retry_at: parse_opt_ts(16, row.get(16)?)?,
        last_error: row.get(17)?,
        config: parse_json(18, &row.get::<_, String>(18)?)?,
        result: result_json.map(|raw| parse_json(19, &raw)).transpose()?,
        created_at: parse_ts(20, &row.get::<_, String>(20)?)?,
        updated_at: parse_ts(21, &row.get::<_, String>(21)?)?,
    })
}
