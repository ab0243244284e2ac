//! Error types used throughout the sync engine

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for CrmSync
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum CrmSyncError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation not allowed in the entity's current lifecycle state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Connector error: {0}")]
    Connector(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CrmSyncError {
    /// Stable label suitable for logs and metrics.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Database(_) => "database",
            Self::Config(_) => "config",
            Self::Network(_) => "network",
            Self::NotFound(_) => "not_found",
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidState(_) => "invalid_state",
            Self::Connector(_) => "connector",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<serde_json::Error> for CrmSyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("serialization failed: {err}"))
    }
}

/// Result type alias for CrmSync operations
pub type Result<T> = std::result::Result<T, CrmSyncError>;
