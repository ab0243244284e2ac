//! Error classification, persistence, alerting and retry scheduling

pub mod classifier;
pub mod handler;
pub mod ports;
pub mod retry;

pub use classifier::Classification;
pub use handler::{AlertPolicy, ErrorHandler};
pub use ports::{AlertSink, ErrorRepository};
pub use retry::{RetryHandle, RetryOperation, RetryOutcome, RetryScheduler};
