//! CRM connector boundary
//!
//! One [`SyncConnector`] per provider. Providers without an implementation
//! resolve to [`NotImplementedConnector`] so a job against them fails with a
//! classified, non-retryable error instead of silently succeeding.

pub mod ports;
pub mod registry;

pub use ports::{ConnectorError, Contact, SyncConnector, SyncOptions};
pub use registry::{run_job, ConnectorRegistry, NotImplementedConnector};
