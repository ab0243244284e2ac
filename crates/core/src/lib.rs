//! # CrmSync Core
//!
//! Business logic of the sync engine - no infrastructure dependencies.
//!
//! This crate contains:
//! - The job manager (queue, dispatch, execution, retry, schedules)
//! - The rate limiter and quota tracker
//! - Error classification, persistence, alerting and retry scheduling
//! - Port interfaces for storage, connectors and notifications
//!
//! ## Architecture Principles
//! - Depends only on `crmsync-common` and `crmsync-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits

pub mod connectors;
pub mod failures;
pub mod jobs;
pub mod notify;
pub mod rate_limit;

pub use connectors::{
    ConnectorError, ConnectorRegistry, Contact, NotImplementedConnector, SyncConnector,
    SyncOptions,
};
pub use failures::{
    AlertPolicy, AlertSink, Classification, ErrorHandler, ErrorRepository, RetryHandle,
    RetryOperation, RetryOutcome, RetryScheduler,
};
pub use jobs::manager::ManagerDeps;
pub use jobs::{JobQueue, JobRepository, ManagerSettings, ScheduleRepository, SyncJobManager};
pub use notify::{EmailSender, NotificationDispatcher, WebhookSender};
pub use rate_limit::{CounterStore, QuotaRepository, RateLimiter, UsageLogRepository};
