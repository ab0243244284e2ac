//! Domain types and models

pub mod failure;
pub mod job;
pub mod metrics;
pub mod notification;
pub mod quota;
pub mod schedule;

pub use failure::{
    AlertTrigger, ErrorAlert, ErrorContext, ErrorHandlingOptions, ErrorLogFilter, ErrorRecord,
    ErrorStats, ErrorType, FailureDetails, Severity,
};
pub use job::{
    ConflictResolution, JobFilter, JobSpec, JobStatus, JobType, Provider, RecordError,
    SyncDirection, SyncJob, SyncJobConfig, SyncJobResult,
};
pub use metrics::SyncMetrics;
pub use notification::{EmailMessage, JobWebhookPayload};
pub use quota::{DenialReason, EndpointLimit, RateLimitDecision, UsageEvent, UserQuota};
pub use schedule::{ScheduleSpec, SyncSchedule};
