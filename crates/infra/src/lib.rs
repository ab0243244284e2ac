//! # CrmSync Infrastructure
//!
//! Infrastructure implementations of the `crmsync-core` ports.
//!
//! This crate contains:
//! - SQLite repositories for jobs, schedules, error records, quotas and usage
//! - The in-memory window counter store
//! - HTTP webhook delivery and the log-backed email sender
//! - Background schedulers driving the job manager
//! - Configuration loading
//!
//! ## Architecture
//! - Implements traits defined in `crmsync-core`
//! - Contains all "impure" code (I/O, timers, environment)

pub mod config;
pub mod counters;
pub mod database;
pub mod errors;
pub mod http;
pub mod notifications;
pub mod scheduling;

pub use counters::InMemoryCounterStore;
pub use database::*;
pub use errors::InfraError;
pub use http::{HttpClient, HttpClientBuilder};
pub use notifications::{HttpWebhookSender, LogEmailSender};
pub use scheduling::{
    JobScheduler, JobSchedulerConfig, MaintenanceScheduler, MaintenanceSchedulerConfig,
    SchedulerError, SchedulerResult,
};
