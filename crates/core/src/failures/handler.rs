//! Error handling service - classify, persist, log, alert

use std::sync::Arc;

use chrono::Duration;
use crmsync_common::SharedClock;
use crmsync_domain::{
    AlertConfig, AlertTrigger, CrmSyncError, ErrorAlert, ErrorContext, ErrorHandlingOptions,
    ErrorLogFilter, ErrorRecord, ErrorStats, FailureDetails, Result, Severity,
};
use tokio_util::task::TaskTracker;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::classifier::Classification;
use super::ports::{AlertSink, ErrorRepository};

/// When alerts fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertPolicy {
    /// Errors within `window` that trigger one alert.
    pub threshold: u64,
    /// Trailing span the threshold counts over.
    pub window: Duration,
    /// Records at or above this severity alert on their own.
    pub immediate_severity: Severity,
}

impl From<&AlertConfig> for AlertPolicy {
    fn from(config: &AlertConfig) -> Self {
        Self {
            threshold: u64::from(config.threshold),
            window: Duration::minutes(i64::from(config.window_minutes)),
            immediate_severity: config.immediate_severity,
        }
    }
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self::from(&AlertConfig::default())
    }
}

/// Owns the lifecycle of [`ErrorRecord`]s.
pub struct ErrorHandler {
    repository: Arc<dyn ErrorRepository>,
    sink: Option<Arc<dyn AlertSink>>,
    policy: AlertPolicy,
    clock: SharedClock,
    alerts: TaskTracker,
}

impl ErrorHandler {
    /// Handler with the default policy and no alert sink.
    pub fn new(repository: Arc<dyn ErrorRepository>, clock: SharedClock) -> Self {
        Self {
            repository,
            sink: None,
            policy: AlertPolicy::default(),
            clock,
            alerts: TaskTracker::new(),
        }
    }

    /// Deliver alerts to `sink`; without one, alerts are not evaluated.
    #[must_use]
    pub fn with_alert_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Replace the alert thresholds.
    #[must_use]
    pub fn with_policy(mut self, policy: AlertPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Classify and persist a failure, then evaluate alerts.
    #[instrument(skip(self, failure, options), fields(user_id = %context.user_id, operation = %context.operation))]
    pub async fn handle_error(
        &self,
        failure: FailureDetails,
        context: ErrorContext,
        options: ErrorHandlingOptions,
    ) -> Result<ErrorRecord> {
        let now = self.clock.now();
        let classification = Classification::of(&failure);

        let retryable = classification.retryable && options.retryable != Some(false);
        let max_retries = options
            .max_retries
            .map_or(classification.max_retries, |cap| cap.min(classification.max_retries));
        let severity = options.min_severity.map_or(classification.severity, |floor| {
            classification.severity.max(floor)
        });

        let record = ErrorRecord {
            id: Uuid::now_v7(),
            user_id: context.user_id.clone(),
            context,
            error_type: classification.error_type,
            severity,
            message: failure.message,
            stack: failure.stack,
            status_code: failure.status_code,
            retryable,
            retry_count: 0,
            max_retries,
            next_retry_at: None,
            resolved_at: None,
            resolution: None,
            created_at: now,
            updated_at: now,
        };
        let since = record.created_at - self.policy.window;
        let in_window = self.repository.insert_and_count(&record, since).await?;
        log_record(&record);

        self.evaluate_alerts(&record, in_window);
        Ok(record)
    }

    /// Newest first, filtered and capped by `filter`.
    pub async fn get_error_logs(
        &self,
        user_id: &str,
        filter: &ErrorLogFilter,
    ) -> Result<Vec<ErrorRecord>> {
        self.repository.list(user_id, filter).await
    }

    /// Fetch one record; unknown ids are `NotFound`.
    pub async fn get_error(&self, id: Uuid) -> Result<ErrorRecord> {
        self.repository
            .get(id)
            .await?
            .ok_or_else(|| CrmSyncError::NotFound(format!("error record {id}")))
    }

    /// Mark a record resolved. Resolving twice is rejected.
    #[instrument(skip(self, resolution))]
    pub async fn resolve_error(&self, id: Uuid, resolution: &str) -> Result<ErrorRecord> {
        let mut record = self.get_error(id).await?;
        if record.is_resolved() {
            return Err(CrmSyncError::InvalidState(format!("error record {id} already resolved")));
        }
        record.resolve(resolution, self.clock.now());
        self.repository.update(&record).await?;
        info!(record_id = %id, "error record resolved");
        Ok(record)
    }

    /// Aggregate a user's errors over the last `days` days.
    pub async fn get_error_stats(&self, user_id: &str, days: u32) -> Result<ErrorStats> {
        let since = self.clock.now() - Duration::days(i64::from(days));
        let records = self.repository.list_since(user_id, since).await?;
        Ok(ErrorStats::from_records(&records))
    }

    /// Persist retry bookkeeping changes.
    pub async fn save(&self, record: &ErrorRecord) -> Result<()> {
        self.repository.update(record).await
    }

    /// Wait for in-flight alert deliveries.
    pub async fn settle(&self) {
        self.alerts.close();
        self.alerts.wait().await;
        self.alerts.reopen();
    }

    /// `in_window` is the user's error count including `record`, taken
    /// atomically with its insert, so exactly one record observes each
    /// crossing of the threshold.
    fn evaluate_alerts(&self, record: &ErrorRecord, in_window: u64) {
        let Some(sink) = &self.sink else {
            return;
        };

        let mut triggers = Vec::new();
        if in_window == self.policy.threshold {
            triggers.push(AlertTrigger::Threshold {
                count: in_window,
                window_minutes: u32::try_from(self.policy.window.num_minutes()).unwrap_or(u32::MAX),
            });
        }
        if record.severity >= self.policy.immediate_severity {
            triggers.push(AlertTrigger::Severity { severity: record.severity });
        }

        for trigger in triggers {
            let alert = ErrorAlert {
                user_id: record.user_id.clone(),
                trigger,
                latest: record.clone(),
                triggered_at: self.clock.now(),
            };
            let sink = Arc::clone(sink);
            self.alerts.spawn(async move {
                if let Err(err) = sink.send_alert(&alert).await {
                    warn!(error = %err, user_id = %alert.user_id, "alert delivery failed");
                }
            });
        }
    }
}

fn log_record(record: &ErrorRecord) {
    match record.severity {
        Severity::High | Severity::Critical => error!(
            record_id = %record.id,
            error_type = %record.error_type,
            severity = %record.severity,
            retryable = record.retryable,
            "{}", record.message
        ),
        Severity::Medium => warn!(
            record_id = %record.id,
            error_type = %record.error_type,
            retryable = record.retryable,
            "{}", record.message
        ),
        Severity::Low => info!(
            record_id = %record.id,
            error_type = %record.error_type,
            "{}", record.message
        ),
    }
}
