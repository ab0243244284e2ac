//! Sync job lifecycle: submission, queueing, dispatch, execution, retry

mod execution;
pub mod manager;
pub mod ports;
pub mod queue;
mod schedule;

pub use manager::{ManagerSettings, SyncJobManager};
pub use ports::{JobRepository, ScheduleRepository};
pub use queue::JobQueue;
