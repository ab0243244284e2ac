//! SQLite persistence for jobs, schedules, error records and quotas

mod codec;
pub mod error_repository;
pub mod job_repository;
pub mod manager;
pub mod quota_repository;
pub mod schedule_repository;

pub use error_repository::SqliteErrorRepository;
pub use job_repository::SqliteJobRepository;
pub use manager::*;
pub use quota_repository::{SqliteQuotaRepository, SqliteUsageLog};
pub use schedule_repository::SqliteScheduleRepository;
