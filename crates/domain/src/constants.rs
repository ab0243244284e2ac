//! Engine constants
//!
//! Defaults shared by configuration, services and storage.

// Job defaults
pub const DEFAULT_BATCH_SIZE: u32 = 100;
pub const DEFAULT_JOB_MAX_RETRIES: u32 = 3;
pub const DEFAULT_JOB_PRIORITY: i32 = 0;
pub const MIN_JOB_PRIORITY: i32 = -100;
pub const MAX_JOB_PRIORITY: i32 = 100;
pub const MAX_BATCH_SIZE: u32 = 10_000;
pub const DEFAULT_LIST_LIMIT: usize = 50;

// Scheduler defaults
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 3;
pub const DEFAULT_MAINTENANCE_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_JOB_RETENTION_DAYS: u32 = 30;
pub const DEFAULT_CREDIT_RECHECK_SECS: u64 = 3600;

/// A batch is successful when per-record errors stay strictly below this
/// share of processed records.
pub const DEFAULT_SUCCESS_ERROR_RATE: f64 = 0.10;

// Retry defaults (milliseconds)
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 5_000;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 300_000;
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

// Rate-limit windows (milliseconds)
pub const MINUTE_WINDOW_MS: i64 = 60_000;
pub const HOUR_WINDOW_MS: i64 = 3_600_000;
pub const DAY_WINDOW_MS: i64 = 86_400_000;

// Quota defaults
pub const DEFAULT_DAILY_LIMIT: u64 = 10_000;
pub const DEFAULT_MONTHLY_LIMIT: u64 = 250_000;
pub const DEFAULT_INITIAL_CREDITS: u64 = 1_000;

// Error alerting
pub const DEFAULT_ALERT_THRESHOLD: u32 = 5;
pub const DEFAULT_ALERT_WINDOW_MINUTES: u32 = 60;

// Notifications
pub const DEFAULT_WEBHOOK_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_FROM_ADDRESS: &str = "sync-notifications@localhost";
