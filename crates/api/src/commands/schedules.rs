//! Recurring sync schedule commands.

use crmsync_domain::{Result, ScheduleSpec, SyncSchedule};
use uuid::Uuid;

use crate::context::AppContext;
use crate::utils::execute_command;

/// Register a recurring sync. The interval and timezone are parsed here, so a
/// bad expression fails the call instead of a later maintenance pass.
pub async fn create_schedule(ctx: &AppContext, spec: ScheduleSpec) -> Result<SyncSchedule> {
    execute_command("schedules::create_schedule", || ctx.jobs.create_schedule(spec)).await
}

/// A user's schedules.
pub async fn list_schedules(ctx: &AppContext, user_id: &str) -> Result<Vec<SyncSchedule>> {
    execute_command("schedules::list_schedules", || ctx.jobs.list_schedules(user_id)).await
}

/// Pause or resume a schedule.
pub async fn set_schedule_enabled(
    ctx: &AppContext,
    schedule_id: Uuid,
    enabled: bool,
) -> Result<SyncSchedule> {
    execute_command("schedules::set_schedule_enabled", || {
        ctx.jobs.set_schedule_enabled(schedule_id, enabled)
    })
    .await
}
