//! Start/stop lifecycle for an interval-driven background loop.

use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::{SchedulerError, SchedulerResult};

/// One pass of a periodic loop. Errors are logged and the loop keeps going.
pub(crate) type Pass = Box<dyn Fn() -> BoxFuture<'static, crmsync_domain::Result<()>> + Send + Sync>;

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub(crate) struct PeriodicTask {
    name: &'static str,
    interval: Duration,
    pass_timeout: Duration,
    join_timeout: Duration,
    running: Mutex<Option<Running>>,
}

impl PeriodicTask {
    pub(crate) fn new(
        name: &'static str,
        interval: Duration,
        pass_timeout: Duration,
        join_timeout: Duration,
    ) -> Self {
        Self { name, interval, pass_timeout, join_timeout, running: Mutex::new(None) }
    }

    pub(crate) async fn start(&self, pass: Pass) -> SchedulerResult<()> {
        let mut running = self.running.lock().await;
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return Err(SchedulerError::AlreadyRunning);
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_loop(
            self.name,
            self.interval,
            self.pass_timeout,
            cancel.clone(),
            pass,
        ));
        *running = Some(Running { cancel, handle });

        info!(scheduler = self.name, interval = ?self.interval, "scheduler started");
        Ok(())
    }

    pub(crate) async fn stop(&self) -> SchedulerResult<()> {
        let Some(Running { cancel, handle }) = self.running.lock().await.take() else {
            return Err(SchedulerError::NotRunning);
        };

        cancel.cancel();
        tokio::time::timeout(self.join_timeout, handle)
            .await
            .map_err(|_| SchedulerError::Timeout { operation: "stop", duration: self.join_timeout })??;

        info!(scheduler = self.name, "scheduler stopped");
        Ok(())
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running
            .try_lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|r| !r.handle.is_finished()))
            .unwrap_or(false)
    }
}

async fn run_loop(
    name: &'static str,
    interval: Duration,
    pass_timeout: Duration,
    cancel: CancellationToken,
    pass: Pass,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(scheduler = name, "loop cancelled");
                break;
            }
            _ = ticker.tick() => {
                match tokio::time::timeout(pass_timeout, pass()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(scheduler = name, error = %e, "scheduled pass failed"),
                    Err(_) => warn!(scheduler = name, timeout = ?pass_timeout, "scheduled pass timed out"),
                }
            }
        }
    }
}
