//! Scheduler error types

use std::time::Duration;

use crmsync_domain::CrmSyncError;
use thiserror::Error;

use crate::errors::InfraError;

/// Scheduler lifecycle errors.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// `start` called twice.
    #[error("scheduler already running")]
    AlreadyRunning,

    /// `stop` called on a stopped loop.
    #[error("scheduler not running")]
    NotRunning,

    /// A pass or shutdown exceeded its bound.
    #[error("{operation} timed out after {duration:?}")]
    Timeout { operation: &'static str, duration: Duration },

    /// The loop task panicked or was aborted.
    #[error("task join failed: {0}")]
    TaskJoinFailed(#[from] tokio::task::JoinError),
}

impl From<SchedulerError> for InfraError {
    fn from(err: SchedulerError) -> Self {
        let mapped = match err {
            SchedulerError::AlreadyRunning | SchedulerError::NotRunning => {
                CrmSyncError::InvalidState(err.to_string())
            }
            _ => CrmSyncError::Internal(err.to_string()),
        };
        InfraError(mapped)
    }
}

impl From<SchedulerError> for CrmSyncError {
    fn from(err: SchedulerError) -> Self {
        InfraError::from(err).into()
    }
}

/// Result alias for scheduler lifecycle calls.
pub type SchedulerResult<T> = Result<T, SchedulerError>;
