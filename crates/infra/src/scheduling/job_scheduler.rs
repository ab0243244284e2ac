//! Dispatch loop for the job manager.
//!
//! Every tick asks the manager to start as many ready jobs as concurrency
//! allows. Stopping cancels the loop first and then waits for in-flight
//! executions, so no job is left half-persisted on shutdown.

use std::time::Duration;

use crmsync_core::SyncJobManager;
use crmsync_domain::SchedulerConfig;
use futures::FutureExt;
use tracing::{debug, instrument};

use super::error::SchedulerResult;
use super::periodic::PeriodicTask;

/// Timing for the dispatch loop.
#[derive(Debug, Clone)]
pub struct JobSchedulerConfig {
    /// Pause between dispatch passes.
    pub tick_interval: Duration,
    /// Upper bound for a single dispatch pass.
    pub tick_timeout: Duration,
    /// How long `stop` waits for the loop task.
    pub join_timeout: Duration,
}

impl Default for JobSchedulerConfig {
    fn default() -> Self {
        Self::from(&SchedulerConfig::default())
    }
}

impl From<&SchedulerConfig> for JobSchedulerConfig {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            tick_interval: config.tick_interval(),
            tick_timeout: Duration::from_secs(30),
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// Drives [`SyncJobManager::tick`] on a fixed interval.
pub struct JobScheduler {
    manager: SyncJobManager,
    task: PeriodicTask,
}

impl JobScheduler {
    /// Stopped scheduler; call `start` to begin ticking.
    pub fn new(manager: SyncJobManager, config: JobSchedulerConfig) -> Self {
        let task = PeriodicTask::new(
            "jobs",
            config.tick_interval,
            config.tick_timeout,
            config.join_timeout,
        );
        Self { manager, task }
    }

    /// Spawn the loop. Fails if it is already running.
    #[instrument(skip(self))]
    pub async fn start(&self) -> SchedulerResult<()> {
        let manager = self.manager.clone();
        self.task
            .start(Box::new(move || {
                let manager = manager.clone();
                async move {
                    let started = manager.tick().await?;
                    if started > 0 {
                        debug!(started, "dispatch tick started jobs");
                    }
                    Ok(())
                }
                .boxed()
            }))
            .await
    }

    /// Stop dispatching and wait for running jobs to finish.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> SchedulerResult<()> {
        self.task.stop().await?;
        self.manager.drain().await;
        Ok(())
    }

    /// Whether the loop task is live.
    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }
}
