//! Background schedulers
//!
//! Both schedulers share one lifecycle: `start` spawns an interval loop
//! guarded by a cancellation token, `stop` cancels it and joins the task
//! with a timeout. A failing pass is logged and the loop keeps running.

pub mod error;
pub mod job_scheduler;
pub mod maintenance_scheduler;
mod periodic;

pub use error::{SchedulerError, SchedulerResult};
pub use job_scheduler::{JobScheduler, JobSchedulerConfig};
pub use maintenance_scheduler::{
    run_pass as run_maintenance_pass, MaintenanceReport, MaintenanceScheduler,
    MaintenanceSchedulerConfig,
};
