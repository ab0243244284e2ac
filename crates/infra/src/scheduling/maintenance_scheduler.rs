//! Housekeeping loop: promotes jobs whose time has come, materializes due
//! schedules, evicts finished rate-limit windows and archives stale jobs.

use std::sync::Arc;
use std::time::Duration;

use crmsync_core::{RateLimiter, SyncJobManager};
use crmsync_domain::SchedulerConfig;
use futures::FutureExt;
use tracing::{info, instrument, warn};

use super::error::SchedulerResult;
use super::periodic::PeriodicTask;

/// Timing for the housekeeping loop.
#[derive(Debug, Clone)]
pub struct MaintenanceSchedulerConfig {
    /// Pause between passes.
    pub interval: Duration,
    /// Upper bound for one pass.
    pub pass_timeout: Duration,
    /// How long `stop` waits for the loop task.
    pub join_timeout: Duration,
}

impl Default for MaintenanceSchedulerConfig {
    fn default() -> Self {
        Self::from(&SchedulerConfig::default())
    }
}

impl From<&SchedulerConfig> for MaintenanceSchedulerConfig {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            interval: config.maintenance_interval(),
            pass_timeout: Duration::from_secs(60),
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// Runs [`run_pass`] on a fixed interval.
pub struct MaintenanceScheduler {
    manager: SyncJobManager,
    limiter: Arc<RateLimiter>,
    task: PeriodicTask,
}

impl MaintenanceScheduler {
    /// Stopped scheduler; call `start` to begin.
    pub fn new(
        manager: SyncJobManager,
        limiter: Arc<RateLimiter>,
        config: MaintenanceSchedulerConfig,
    ) -> Self {
        let task = PeriodicTask::new(
            "maintenance",
            config.interval,
            config.pass_timeout,
            config.join_timeout,
        );
        Self { manager, limiter, task }
    }

    /// Spawn the loop. Fails if it is already running.
    #[instrument(skip(self))]
    pub async fn start(&self) -> SchedulerResult<()> {
        let manager = self.manager.clone();
        let limiter = Arc::clone(&self.limiter);
        self.task
            .start(Box::new(move || {
                let manager = manager.clone();
                let limiter = Arc::clone(&limiter);
                async move {
                    run_pass(&manager, &limiter).await;
                    Ok(())
                }
                .boxed()
            }))
            .await
    }

    /// Stop the loop and wait up to the join timeout for it to exit.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> SchedulerResult<()> {
        self.task.stop().await
    }

    /// Whether the loop task is live.
    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }
}

/// One housekeeping pass. Each step is independent; a failing step is
/// logged and does not stop the others.
pub async fn run_pass(manager: &SyncJobManager, limiter: &RateLimiter) -> MaintenanceReport {
    let mut report = MaintenanceReport::default();

    match manager.promote_ready().await {
        Ok(n) => report.promoted = n,
        Err(e) => warn!(error = %e, "promoting ready jobs failed"),
    }
    match manager.expand_schedules().await {
        Ok(n) => report.materialized = n,
        Err(e) => warn!(error = %e, "expanding schedules failed"),
    }
    match limiter.sweep_expired().await {
        Ok(n) => report.evicted_windows = n,
        Err(e) => warn!(error = %e, "sweeping rate-limit windows failed"),
    }
    match manager.archive_stale().await {
        Ok(n) => report.archived = n,
        Err(e) => warn!(error = %e, "archiving stale jobs failed"),
    }

    if report != MaintenanceReport::default() {
        info!(
            promoted = report.promoted,
            materialized = report.materialized,
            evicted_windows = report.evicted_windows,
            archived = report.archived,
            "maintenance pass finished"
        );
    }
    report
}

/// Counts from one housekeeping pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    /// Deferred jobs moved into the queue.
    pub promoted: usize,
    /// Jobs created from due schedules.
    pub materialized: usize,
    /// Finished rate-limit buckets dropped.
    pub evicted_windows: usize,
    /// Terminal jobs moved out of the live table.
    pub archived: usize,
}
