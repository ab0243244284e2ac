//! Rule-based failure classification
//!
//! Rules are evaluated in order and the first hit wins, so a 401 whose body
//! mentions "timeout" is still an authentication error.

use crmsync_domain::{ErrorType, FailureDetails, Severity};

/// Everything the classifier decides about one failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// Category picked by the first matching rule.
    pub error_type: ErrorType,
    /// Severity before caller overrides.
    pub severity: Severity,
    /// Whether an automatic retry can help.
    pub retryable: bool,
    /// Retry budget for this error type.
    pub max_retries: u32,
}

impl Classification {
    /// Classify `failure` with the first rule whose status or message matches.
    pub fn of(failure: &FailureDetails) -> Self {
        let error_type = classify(failure);
        Self {
            error_type,
            severity: severity(error_type, failure),
            retryable: is_retryable(error_type, failure),
            max_retries: max_retries(error_type),
        }
    }
}

struct Rule {
    error_type: ErrorType,
    statuses: &'static [u16],
    needles: &'static [&'static str],
}

const RULES: &[Rule] = &[
    Rule {
        error_type: ErrorType::AuthenticationError,
        statuses: &[401],
        needles: &["unauthorized", "authentication", "invalid token", "expired token"],
    },
    Rule {
        error_type: ErrorType::AuthorizationError,
        statuses: &[403],
        needles: &["forbidden", "permission", "access denied"],
    },
    Rule {
        error_type: ErrorType::RateLimitError,
        statuses: &[429],
        needles: &["rate limit", "too many requests", "quota exceeded"],
    },
    Rule {
        error_type: ErrorType::ValidationError,
        statuses: &[400, 422],
        needles: &["validation", "invalid", "required field"],
    },
    Rule {
        error_type: ErrorType::TimeoutError,
        statuses: &[408, 504],
        needles: &["timeout", "timed out", "etimedout"],
    },
    Rule {
        error_type: ErrorType::NetworkError,
        statuses: &[],
        needles: &["network", "econnrefused", "econnreset", "enotfound", "connection", "dns"],
    },
    Rule {
        error_type: ErrorType::DataConflictError,
        statuses: &[409],
        needles: &["conflict", "duplicate"],
    },
    Rule { error_type: ErrorType::MappingError, statuses: &[], needles: &["mapping", "field map"] },
    Rule { error_type: ErrorType::WebhookError, statuses: &[], needles: &["webhook"] },
    Rule { error_type: ErrorType::SyncError, statuses: &[], needles: &["sync"] },
];

/// Map a raw failure to its category.
pub fn classify(failure: &FailureDetails) -> ErrorType {
    let mut haystack = failure.message.to_lowercase();
    if let Some(code) = &failure.code {
        haystack.push(' ');
        haystack.push_str(&code.to_lowercase());
    }

    let hit = RULES.iter().find(|rule| {
        failure.status_code.is_some_and(|status| rule.statuses.contains(&status))
            || rule.needles.iter().any(|needle| haystack.contains(needle))
    });
    match hit {
        Some(rule) => rule.error_type,
        None if failure.status_code.is_some_and(|status| status >= 400) => ErrorType::ApiError,
        None => ErrorType::UnknownError,
    }
}

/// Base severity; API errors grade by status class.
pub fn severity(error_type: ErrorType, failure: &FailureDetails) -> Severity {
    match error_type {
        ErrorType::AuthenticationError | ErrorType::AuthorizationError => Severity::High,
        ErrorType::RateLimitError | ErrorType::TimeoutError | ErrorType::NetworkError => {
            Severity::Medium
        }
        ErrorType::ValidationError | ErrorType::MappingError => Severity::Low,
        ErrorType::DataConflictError => Severity::Medium,
        ErrorType::WebhookError | ErrorType::SyncError => Severity::High,
        ErrorType::ApiError => match failure.status_code {
            Some(status) if status >= 500 => Severity::High,
            Some(status) if status >= 400 => Severity::Medium,
            _ => Severity::Low,
        },
        ErrorType::UnknownError => Severity::Medium,
    }
}

/// Credential, validation and mapping failures never retry, nor do 400/401/403/404.
pub fn is_retryable(error_type: ErrorType, failure: &FailureDetails) -> bool {
    let never = matches!(
        error_type,
        ErrorType::AuthenticationError
            | ErrorType::AuthorizationError
            | ErrorType::ValidationError
            | ErrorType::MappingError
    );
    let fatal_status = matches!(failure.status_code, Some(400 | 401 | 403 | 404));
    !never && !fatal_status
}

/// Retry budget per category; rate limits get the most room.
pub const fn max_retries(error_type: ErrorType) -> u32 {
    match error_type {
        ErrorType::RateLimitError => 5,
        ErrorType::NetworkError | ErrorType::TimeoutError => 3,
        ErrorType::ApiError => 2,
        _ => 1,
    }
}
