//! Recurring schedules and their expansion into jobs

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use crmsync_common::time::recurrence::parse_timezone;
use crmsync_common::Recurrence;
use crmsync_domain::{CrmSyncError, Result, ScheduleSpec, SyncSchedule};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::manager::SyncJobManager;

fn parse_rule(interval: &str, timezone: &str) -> Result<(Recurrence, Tz)> {
    let recurrence = Recurrence::parse(interval)
        .map_err(|e| CrmSyncError::InvalidInput(format!("interval {interval:?}: {e}")))?;
    let tz = parse_timezone(timezone).map_err(|e| CrmSyncError::InvalidInput(e.to_string()))?;
    Ok((recurrence, tz))
}

impl SyncJobManager {
    /// Validate and persist a schedule. The first run is `start_at` or the
    /// first occurrence after now.
    #[instrument(skip(self, spec), fields(user_id = %spec.user_id, interval = %spec.interval))]
    pub async fn create_schedule(&self, spec: ScheduleSpec) -> Result<SyncSchedule> {
        if spec.user_id.trim().is_empty() {
            return Err(CrmSyncError::InvalidInput("user_id is required".into()));
        }
        let (recurrence, tz) = parse_rule(&spec.interval, &spec.timezone)?;
        let now = self.inner.clock.now();
        let next_run_at = match spec.start_at {
            Some(start) => start,
            None => recurrence.next_after(now, tz).ok_or_else(|| {
                CrmSyncError::InvalidInput(format!("interval {:?} never fires", spec.interval))
            })?,
        };

        let schedule = SyncSchedule {
            id: Uuid::now_v7(),
            user_id: spec.user_id,
            provider: spec.provider,
            job_type: spec.job_type,
            direction: spec.direction,
            interval: spec.interval,
            timezone: spec.timezone,
            enabled: true,
            priority: spec.priority,
            config: spec.config,
            next_run_at,
            last_run_at: None,
            created_at: now,
        };
        self.inner.schedules.insert(&schedule).await?;
        info!(schedule_id = %schedule.id, next_run_at = %schedule.next_run_at, "schedule created");
        Ok(schedule)
    }

    /// Enable or disable a schedule. Re-enabling recomputes the next run from
    /// now, so missed runs are not replayed.
    pub async fn set_schedule_enabled(&self, id: Uuid, enabled: bool) -> Result<SyncSchedule> {
        let mut schedule = self
            .inner
            .schedules
            .get(id)
            .await?
            .ok_or_else(|| CrmSyncError::NotFound(format!("schedule {id}")))?;
        if schedule.enabled != enabled {
            schedule.enabled = enabled;
            if enabled {
                schedule.next_run_at = self.next_occurrence(&schedule, self.inner.clock.now())?;
            }
            self.inner.schedules.update(&schedule).await?;
        }
        Ok(schedule)
    }

    /// All of a user's schedules, enabled or not.
    pub async fn list_schedules(&self, user_id: &str) -> Result<Vec<SyncSchedule>> {
        self.inner.schedules.list_for_user(user_id).await
    }

    /// Submit one job per due schedule and advance each schedule. Missed
    /// occurrences are not replayed: the next run is computed from now.
    pub async fn expand_schedules(&self) -> Result<usize> {
        let now = self.inner.clock.now();
        let mut submitted = 0;

        for mut schedule in self.inner.schedules.list_due(now).await? {
            match self.submit(schedule.job_spec(now)).await {
                Ok(job_id) => {
                    submitted += 1;
                    info!(schedule_id = %schedule.id, job_id = %job_id, "scheduled sync job created");
                }
                Err(err) => {
                    warn!(schedule_id = %schedule.id, error = %err, "scheduled submission rejected");
                }
            }

            schedule.last_run_at = Some(now);
            match self.next_occurrence(&schedule, now) {
                Ok(next) => schedule.next_run_at = next,
                Err(err) => {
                    warn!(schedule_id = %schedule.id, error = %err, "schedule disabled");
                    schedule.enabled = false;
                }
            }
            self.inner.schedules.update(&schedule).await?;
        }
        Ok(submitted)
    }

    fn next_occurrence(&self, schedule: &SyncSchedule, after: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let (recurrence, tz) = parse_rule(&schedule.interval, &schedule.timezone)?;
        recurrence.next_after(after, tz).ok_or_else(|| {
            CrmSyncError::InvalidState(format!("schedule {} has no future occurrence", schedule.id))
        })
    }
}
