//! Engine configuration
//!
//! Every section deserializes with defaults so a config file only needs the
//! values it changes.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_ALERT_THRESHOLD, DEFAULT_ALERT_WINDOW_MINUTES, DEFAULT_BACKOFF_MULTIPLIER,
    DEFAULT_CREDIT_RECHECK_SECS, DEFAULT_DAILY_LIMIT, DEFAULT_FROM_ADDRESS,
    DEFAULT_INITIAL_CREDITS, DEFAULT_JOB_RETENTION_DAYS, DEFAULT_MAINTENANCE_INTERVAL_SECS,
    DEFAULT_MAX_CONCURRENT_JOBS, DEFAULT_MONTHLY_LIMIT, DEFAULT_RETRY_BASE_DELAY_MS,
    DEFAULT_RETRY_MAX_DELAY_MS, DEFAULT_SUCCESS_ERROR_RATE, DEFAULT_TICK_INTERVAL_SECS,
    DEFAULT_WEBHOOK_TIMEOUT_SECS,
};
use crate::errors::{CrmSyncError, Result};
use crate::types::{EndpointLimit, Provider, Severity};

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub scheduler: SchedulerConfig,
    pub retry: RetryConfig,
    pub quota: QuotaConfig,
    pub rate_limits: Vec<EndpointLimit>,
    pub alerts: AlertConfig,
    pub notifications: NotificationConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            scheduler: SchedulerConfig::default(),
            retry: RetryConfig::default(),
            quota: QuotaConfig::default(),
            rate_limits: default_rate_limits(),
            alerts: AlertConfig::default(),
            notifications: NotificationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Reject values the services cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.database.path.trim().is_empty() {
            return Err(CrmSyncError::Config("database.path must not be empty".into()));
        }
        if self.database.pool_size == 0 {
            return Err(CrmSyncError::Config("database.pool_size must be at least 1".into()));
        }
        if self.scheduler.max_concurrent_jobs == 0 {
            return Err(CrmSyncError::Config(
                "scheduler.max_concurrent_jobs must be at least 1".into(),
            ));
        }
        if self.scheduler.tick_interval_secs == 0 || self.scheduler.maintenance_interval_secs == 0
        {
            return Err(CrmSyncError::Config("scheduler intervals must be non-zero".into()));
        }
        let rate = self.scheduler.success_error_rate;
        if !(rate > 0.0 && rate <= 1.0) {
            return Err(CrmSyncError::Config(format!(
                "scheduler.success_error_rate must be in (0, 1], got {rate}"
            )));
        }
        if self.retry.base_delay_ms == 0 || self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(CrmSyncError::Config(
                "retry.base_delay_ms must be non-zero and <= retry.max_delay_ms".into(),
            ));
        }
        if !self.retry.backoff_multiplier.is_finite() || self.retry.backoff_multiplier < 1.0 {
            return Err(CrmSyncError::Config("retry.backoff_multiplier must be >= 1.0".into()));
        }
        if self.alerts.threshold == 0 || self.alerts.window_minutes == 0 {
            return Err(CrmSyncError::Config("alerts threshold and window must be non-zero".into()));
        }

        let mut seen = HashSet::new();
        for limit in &self.rate_limits {
            if !seen.insert((limit.provider, limit.endpoint.as_str())) {
                return Err(CrmSyncError::Config(format!(
                    "duplicate rate limit for {}/{}",
                    limit.provider, limit.endpoint
                )));
            }
            if limit.requests_per_minute == 0
                || limit.requests_per_hour == 0
                || limit.requests_per_day == 0
            {
                return Err(CrmSyncError::Config(format!(
                    "rate limit ceilings for {}/{} must be non-zero",
                    limit.provider, limit.endpoint
                )));
            }
        }
        Ok(())
    }
}

/// SQLite settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "crmsync.db".to_string(), pool_size: 4 }
    }
}

/// Job dispatch and maintenance cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub tick_interval_secs: u64,
    pub max_concurrent_jobs: usize,
    pub maintenance_interval_secs: u64,
    pub job_retention_days: u32,
    pub success_error_rate: f64,
    /// Deferral applied when a job is denied for insufficient credits.
    pub credit_recheck_secs: u64,
}

impl SchedulerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_interval_secs: DEFAULT_TICK_INTERVAL_SECS,
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
            maintenance_interval_secs: DEFAULT_MAINTENANCE_INTERVAL_SECS,
            job_retention_days: DEFAULT_JOB_RETENTION_DAYS,
            success_error_rate: DEFAULT_SUCCESS_ERROR_RATE,
            credit_recheck_secs: DEFAULT_CREDIT_RECHECK_SECS,
        }
    }
}

/// Backoff parameters shared by job retries and standalone error retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            jitter: true,
        }
    }
}

/// Limits given to a user the first time they are seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    pub daily_limit: u64,
    pub monthly_limit: u64,
    pub initial_credits: u64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            daily_limit: DEFAULT_DAILY_LIMIT,
            monthly_limit: DEFAULT_MONTHLY_LIMIT,
            initial_credits: DEFAULT_INITIAL_CREDITS,
        }
    }
}

/// Error alerting thresholds and destinations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub threshold: u32,
    pub window_minutes: u32,
    pub immediate_severity: Severity,
    pub email: Option<String>,
    pub webhook_url: Option<String>,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_ALERT_THRESHOLD,
            window_minutes: DEFAULT_ALERT_WINDOW_MINUTES,
            immediate_severity: Severity::Critical,
            email: None,
            webhook_url: None,
        }
    }
}

/// Outbound notification transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub from_address: String,
    pub webhook_timeout_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            from_address: DEFAULT_FROM_ADDRESS.to_string(),
            webhook_timeout_secs: DEFAULT_WEBHOOK_TIMEOUT_SECS,
        }
    }
}

/// Tracing subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, overridden by `RUST_LOG`.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}

/// Built-in ceilings for every supported provider.
pub fn default_rate_limits() -> Vec<EndpointLimit> {
    let mut limits = Vec::new();
    let table: [(Provider, u64, u64, u64, u64); 5] = [
        (Provider::Hubspot, 100, 5_000, 40_000, 1),
        (Provider::Salesforce, 60, 2_000, 15_000, 1),
        (Provider::Pipedrive, 80, 3_000, 20_000, 1),
        (Provider::Hunter, 15, 500, 2_000, 2),
        (Provider::PeopleDataLabs, 10, 300, 1_000, 5),
    ];
    for (provider, per_minute, per_hour, per_day, credits) in table {
        for endpoint in ["contacts", "companies"] {
            limits.push(EndpointLimit::new(
                provider, endpoint, per_minute, per_hour, per_day, credits,
            ));
        }
    }
    limits
}
