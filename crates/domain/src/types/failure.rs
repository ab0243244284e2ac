//! Error taxonomy and persisted error records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::job::Provider;
use crate::constants::DEFAULT_LIST_LIMIT;
use crate::impl_domain_enum_conversions;

/// Failure category assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    AuthenticationError,
    AuthorizationError,
    RateLimitError,
    ValidationError,
    NetworkError,
    TimeoutError,
    DataConflictError,
    MappingError,
    WebhookError,
    SyncError,
    ApiError,
    UnknownError,
}

impl_domain_enum_conversions!(ErrorType {
    AuthenticationError => "authentication_error",
    AuthorizationError => "authorization_error",
    RateLimitError => "rate_limit_error",
    ValidationError => "validation_error",
    NetworkError => "network_error",
    TimeoutError => "timeout_error",
    DataConflictError => "data_conflict_error",
    MappingError => "mapping_error",
    WebhookError => "webhook_error",
    SyncError => "sync_error",
    ApiError => "api_error",
    UnknownError => "unknown_error",
});

/// Ordered severity; `Critical > High > Medium > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl_domain_enum_conversions!(Severity {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

/// Raw failure as observed at a call boundary, before classification.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureDetails {
    pub status_code: Option<u16>,
    /// Machine code such as `ECONNRESET`.
    pub code: Option<String>,
    pub message: String,
    pub stack: Option<String>,
}

impl FailureDetails {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), ..Self::default() }
    }

    pub fn from_status(status_code: u16, message: impl Into<String>) -> Self {
        Self { status_code: Some(status_code), message: message.into(), ..Self::default() }
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

/// Where a failure happened.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ErrorContext {
    pub user_id: String,
    pub operation: String,
    pub provider: Option<Provider>,
    pub job_id: Option<Uuid>,
    pub endpoint: Option<String>,
    pub metadata: serde_json::Value,
}

impl ErrorContext {
    pub fn new(user_id: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            operation: operation.into(),
            metadata: serde_json::Value::Object(serde_json::Map::new()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.provider = Some(provider);
        self
    }

    #[must_use]
    pub fn with_job(mut self, job_id: Uuid) -> Self {
        self.job_id = Some(job_id);
        self
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

/// Caller overrides applied after classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ErrorHandlingOptions {
    /// Force retryability off (never on: non-retryable categories stay so).
    pub retryable: Option<bool>,
    /// Lower the retry budget for this record.
    pub max_retries: Option<u32>,
    /// Raise severity above the classifier's choice.
    pub min_severity: Option<Severity>,
}

/// Persisted, classified failure. Never deleted, only resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub id: Uuid,
    pub user_id: String,
    pub context: ErrorContext,
    pub error_type: ErrorType,
    pub severity: Severity,
    pub message: String,
    pub stack: Option<String>,
    pub status_code: Option<u16>,
    pub retryable: bool,
    pub retry_count: u32,
    pub max_retries: u32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ErrorRecord {
    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }

    /// Retryable, unresolved and under budget.
    pub fn can_retry(&self) -> bool {
        self.retryable && !self.is_resolved() && self.retry_count < self.max_retries
    }

    pub fn resolve(&mut self, resolution: impl Into<String>, now: DateTime<Utc>) {
        self.resolved_at = Some(now);
        self.resolution = Some(resolution.into());
        self.next_retry_at = None;
        self.updated_at = now;
    }
}

/// Filter for error log queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ErrorLogFilter {
    pub error_type: Option<ErrorType>,
    pub severity: Option<Severity>,
    pub resolved: Option<bool>,
    pub limit: usize,
}

impl Default for ErrorLogFilter {
    fn default() -> Self {
        Self { error_type: None, severity: None, resolved: None, limit: DEFAULT_LIST_LIMIT }
    }
}

impl ErrorLogFilter {
    pub fn matches(&self, record: &ErrorRecord) -> bool {
        self.error_type.map_or(true, |t| record.error_type == t)
            && self.severity.map_or(true, |s| record.severity == s)
            && self.resolved.map_or(true, |r| record.is_resolved() == r)
    }
}

/// Aggregate view of a user's errors over a period.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorStats {
    pub total: u64,
    pub resolved: u64,
    pub unresolved: u64,
    pub retryable: u64,
    pub by_type: BTreeMap<ErrorType, u64>,
    pub by_severity: BTreeMap<Severity, u64>,
    pub most_common_type: Option<ErrorType>,
}

impl ErrorStats {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a ErrorRecord>) -> Self {
        let mut stats = Self::default();
        for record in records {
            stats.total += 1;
            if record.is_resolved() {
                stats.resolved += 1;
            } else {
                stats.unresolved += 1;
            }
            if record.retryable {
                stats.retryable += 1;
            }
            *stats.by_type.entry(record.error_type).or_default() += 1;
            *stats.by_severity.entry(record.severity).or_default() += 1;
        }
        // Ties resolve to the earliest type in declaration order.
        stats.most_common_type = stats
            .by_type
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(error_type, _)| *error_type);
        stats
    }
}

/// Why an alert fired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertTrigger {
    /// Error count in the rolling window reached the threshold.
    Threshold { count: u64, window_minutes: u32 },
    /// A single record at or above the immediate-alert severity.
    Severity { severity: Severity },
}

/// Alert handed to the notification sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorAlert {
    pub user_id: String,
    pub trigger: AlertTrigger,
    pub latest: ErrorRecord,
    pub triggered_at: DateTime<Utc>,
}
