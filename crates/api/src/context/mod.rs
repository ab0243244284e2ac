//! Application context - dependency injection container

use std::sync::Arc;
use std::time::Duration;

use crmsync_common::{BackoffPolicy, SharedClock, SystemClock};
use crmsync_core::{
    AlertPolicy, AlertSink, ConnectorRegistry, ErrorHandler, ManagerDeps, ManagerSettings,
    NotificationDispatcher, RateLimiter, RetryScheduler, SyncConnector, SyncJobManager,
};
use crmsync_domain::{Config, CrmSyncError, Result, RetryConfig};
use crmsync_infra::{
    DbManager, HttpWebhookSender, InMemoryCounterStore, JobScheduler, JobSchedulerConfig,
    LogEmailSender, MaintenanceScheduler, MaintenanceSchedulerConfig, SchedulerError,
    SqliteErrorRepository, SqliteJobRepository, SqliteQuotaRepository, SqliteScheduleRepository,
    SqliteUsageLog,
};
use tracing::{info, warn};

use crate::utils::health::{ComponentHealth, HealthStatus};

/// Application context - holds all services and dependencies
pub struct AppContext {
    /// Configuration the context was built from.
    pub config: Config,
    /// Shared SQLite pool.
    pub db: Arc<DbManager>,
    /// Time source shared by every service.
    pub clock: SharedClock,

    // Core services
    /// Job and schedule lifecycle.
    pub jobs: SyncJobManager,
    /// Rate limits, quotas and credits.
    pub limiter: Arc<RateLimiter>,
    /// Error records and alerts.
    pub errors: Arc<ErrorHandler>,
    /// Backoff-driven retry chains.
    pub retries: Arc<RetryScheduler>,
    /// Email and webhook notifications.
    pub notifier: Arc<NotificationDispatcher>,

    // Schedulers
    /// Dispatch loop.
    pub job_scheduler: Arc<JobScheduler>,
    /// Housekeeping loop.
    pub maintenance_scheduler: Arc<MaintenanceScheduler>,
}

impl AppContext {
    /// Build the context on the system clock with no provider connectors
    /// registered; every provider resolves to the not-implemented connector.
    pub async fn new(config: Config) -> Result<Self> {
        Self::with_connectors(config, SystemClock::shared(), Vec::new()).await
    }

    /// Build the context with an explicit clock and connector set.
    ///
    /// Opens the database and applies migrations. Nothing runs until
    /// [`AppContext::start`].
    pub async fn with_connectors(
        config: Config,
        clock: SharedClock,
        connectors: Vec<Arc<dyn SyncConnector>>,
    ) -> Result<Self> {
        config.validate()?;

        let db = Arc::new(DbManager::from_config(&config.database)?);
        {
            let db = Arc::clone(&db);
            tokio::task::spawn_blocking(move || db.run_migrations())
                .await
                .map_err(|err| CrmSyncError::Internal(format!("migration task failed: {err}")))??;
        }

        let notifier = Arc::new(
            NotificationDispatcher::new()
                .with_webhook(Arc::new(HttpWebhookSender::from_config(&config.notifications)?))
                .with_email(Arc::new(LogEmailSender::from_config(&config.notifications)))
                .with_alert_targets(&config.alerts),
        );

        let limiter = Arc::new(RateLimiter::new(
            config.rate_limits.clone(),
            config.quota.clone(),
            Arc::new(SqliteQuotaRepository::new(Arc::clone(&db))),
            Arc::new(SqliteUsageLog::new(Arc::clone(&db))),
            Arc::new(InMemoryCounterStore::new()),
            Arc::clone(&clock),
        ));

        let alert_sink: Arc<dyn AlertSink> = notifier.clone();
        let errors = Arc::new(
            ErrorHandler::new(
                Arc::new(SqliteErrorRepository::new(Arc::clone(&db))),
                Arc::clone(&clock),
            )
            .with_policy(AlertPolicy::from(&config.alerts))
            .with_alert_sink(alert_sink),
        );

        let policy = backoff_policy(&config.retry)?;
        let retries =
            Arc::new(RetryScheduler::new(Arc::clone(&errors), policy.clone(), Arc::clone(&clock)));

        let mut registry = ConnectorRegistry::new();
        for connector in connectors {
            registry.register(connector);
        }

        let jobs = SyncJobManager::new(
            ManagerDeps {
                jobs: Arc::new(SqliteJobRepository::new(Arc::clone(&db))),
                schedules: Arc::new(SqliteScheduleRepository::new(Arc::clone(&db))),
                limiter: Arc::clone(&limiter),
                errors: Arc::clone(&errors),
                connectors: registry,
                notifier: Arc::clone(&notifier),
                policy,
                clock: Arc::clone(&clock),
            },
            ManagerSettings::from(&config.scheduler),
        );

        let job_scheduler =
            Arc::new(JobScheduler::new(jobs.clone(), JobSchedulerConfig::from(&config.scheduler)));
        let maintenance_scheduler = Arc::new(MaintenanceScheduler::new(
            jobs.clone(),
            Arc::clone(&limiter),
            MaintenanceSchedulerConfig::from(&config.scheduler),
        ));

        info!(db_path = %db.path().display(), "application context initialised");

        Ok(Self {
            config,
            db,
            clock,
            jobs,
            limiter,
            errors,
            retries,
            notifier,
            job_scheduler,
            maintenance_scheduler,
        })
    }

    /// Reload queued work from storage and start the background schedulers
    /// when enabled. Returns the number of jobs put back on the queue.
    pub async fn start(&self) -> Result<usize> {
        let restored = self.jobs.rebuild_queue().await?;

        if self.config.scheduler.enabled {
            self.job_scheduler.start().await?;
            if let Err(err) = self.maintenance_scheduler.start().await {
                stop_quietly("job", self.job_scheduler.stop().await);
                return Err(err.into());
            }
        } else {
            info!("background schedulers disabled by configuration");
        }

        info!(restored, "sync engine started");
        Ok(restored)
    }

    /// Stop the schedulers, wait for running jobs and flush pending
    /// notifications. Safe to call when `start` was never called.
    pub async fn shutdown(&self) -> Result<()> {
        info!("shutting down sync engine");

        stop_quietly("maintenance", self.maintenance_scheduler.stop().await);
        stop_quietly("job", self.job_scheduler.stop().await);

        self.retries.shutdown();
        self.jobs.drain().await;
        self.errors.settle().await;
        self.notifier.settle().await;

        info!("sync engine stopped");
        Ok(())
    }

    /// Check health of the database, schedulers and queue.
    pub async fn health_check(&self) -> HealthStatus {
        let mut status = HealthStatus::new()
            .add_component(self.check_database_health().await)
            .with_load(self.jobs.queued_count(), self.jobs.running_count());

        if self.config.scheduler.enabled {
            status = status
                .add_component(scheduler_health("job_scheduler", self.job_scheduler.is_running()))
                .add_component(scheduler_health(
                    "maintenance_scheduler",
                    self.maintenance_scheduler.is_running(),
                ));
        }

        status.calculate_score();
        status
    }

    async fn check_database_health(&self) -> ComponentHealth {
        let db = Arc::clone(&self.db);
        match tokio::task::spawn_blocking(move || db.health_check()).await {
            Ok(Ok(())) => ComponentHealth::healthy("database"),
            Ok(Err(err)) => {
                warn!(error = %err, "database health check failed");
                ComponentHealth::unhealthy("database", format!("query failed: {err}"))
            }
            Err(err) => {
                warn!(error = %err, "database health check task panicked");
                ComponentHealth::unhealthy("database", format!("task panic: {err}"))
            }
        }
    }
}

fn scheduler_health(name: &str, running: bool) -> ComponentHealth {
    if running {
        ComponentHealth::healthy(name)
    } else {
        ComponentHealth::unhealthy(name, "not running")
    }
}

fn stop_quietly(name: &str, result: std::result::Result<(), SchedulerError>) {
    match result {
        Ok(()) | Err(SchedulerError::NotRunning) => {}
        Err(err) => warn!(scheduler = name, error = %err, "scheduler did not stop cleanly"),
    }
}

/// The one backoff policy shared by job retries and the retry scheduler.
pub fn backoff_policy(config: &RetryConfig) -> Result<BackoffPolicy> {
    BackoffPolicy::new(
        Duration::from_millis(config.base_delay_ms),
        Duration::from_millis(config.max_delay_ms),
        config.backoff_multiplier,
    )
    .map(|policy| policy.with_jitter(config.jitter))
    .map_err(|err| CrmSyncError::Config(format!("invalid retry settings: {err}")))
}
