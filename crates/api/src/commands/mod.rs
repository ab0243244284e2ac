//! Command facade
//!
//! Every command takes the [`AppContext`](crate::context::AppContext) plus
//! typed arguments, logs `command_execution_success/failure` with its
//! duration, and returns the domain `Result`.

pub mod errors;
pub mod health;
pub mod jobs;
pub mod rate_limits;
pub mod schedules;

pub use errors::{get_error_logs, get_error_stats, handle_error, resolve_error, HandleErrorRequest};
pub use health::get_app_health;
pub use jobs::{cancel_job, get_job, get_metrics, list_jobs, retry_job, submit_job, ListJobsQuery};
pub use rate_limits::{
    add_credits, check_rate_limit, get_usage_history, get_user_quota, record_usage,
    RecordUsageRequest,
};
pub use schedules::{create_schedule, list_schedules, set_schedule_enabled};
