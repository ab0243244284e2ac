//! Mapping of driver and transport errors onto [`CrmSyncError`].

use crmsync_domain::CrmSyncError;
use rusqlite::ffi::ErrorCode;

/// Carrier for infrastructure failures.
///
/// Orphan rules stop `crmsync-infra` from implementing `From<rusqlite::Error>`
/// for the domain error directly, so conversions go through this wrapper.
#[derive(Debug)]
pub struct InfraError(pub CrmSyncError);

impl From<InfraError> for CrmSyncError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<CrmSyncError> for InfraError {
    fn from(value: CrmSyncError) -> Self {
        Self(value)
    }
}

impl From<rusqlite::Error> for InfraError {
    fn from(value: rusqlite::Error) -> Self {
        Self(map_sqlite(value))
    }
}

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        Self(CrmSyncError::Database(format!("connection pool: {value}")))
    }
}

impl From<tokio::task::JoinError> for InfraError {
    fn from(value: tokio::task::JoinError) -> Self {
        Self(CrmSyncError::Internal(format!("blocking task failed: {value}")))
    }
}

impl From<reqwest::Error> for InfraError {
    fn from(value: reqwest::Error) -> Self {
        Self(map_http(&value))
    }
}

// SQLite extended result codes.
const PRIMARY_KEY: i32 = 1555;
const UNIQUE: i32 = 2067;
const FOREIGN_KEY: i32 = 787;

fn map_sqlite(err: rusqlite::Error) -> CrmSyncError {
    let message = match err {
        rusqlite::Error::QueryReturnedNoRows => {
            return CrmSyncError::NotFound("no rows returned by query".into())
        }
        rusqlite::Error::SqliteFailure(failure, detail) => match failure.code {
            ErrorCode::DatabaseBusy => "database is busy".to_string(),
            ErrorCode::DatabaseLocked => "database is locked".to_string(),
            ErrorCode::ConstraintViolation
                if matches!(failure.extended_code, PRIMARY_KEY | UNIQUE) =>
            {
                "unique constraint violation".to_string()
            }
            ErrorCode::ConstraintViolation if failure.extended_code == FOREIGN_KEY => {
                "foreign key constraint violation".to_string()
            }
            code => format!(
                "sqlite {code:?} (extended {}): {}",
                failure.extended_code,
                detail.unwrap_or_default()
            ),
        },
        rusqlite::Error::FromSqlConversionFailure(column, _, cause) => {
            format!("column {column} could not be decoded: {cause}")
        }
        rusqlite::Error::InvalidColumnType(column, name, ty) => {
            format!("column {column} ({name}) has unexpected type {ty}")
        }
        other => other.to_string(),
    };
    CrmSyncError::Database(message)
}

fn map_http(err: &reqwest::Error) -> CrmSyncError {
    if err.is_timeout() {
        return CrmSyncError::Network("HTTP request timed out".into());
    }
    if err.is_connect() {
        return CrmSyncError::Network("HTTP connection failure".into());
    }
    let Some(status) = err.status() else {
        return CrmSyncError::Network(err.to_string());
    };

    let message = format!("HTTP {status}");
    match status.as_u16() {
        404 => CrmSyncError::NotFound(message),
        429 => CrmSyncError::Network(message),
        400..=499 => CrmSyncError::InvalidInput(message),
        _ => CrmSyncError::Network(message),
    }
}
