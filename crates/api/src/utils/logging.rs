//! Tracing subscriber setup and command logging helpers.

use std::time::Duration;

use crmsync_domain::{CrmSyncError, LoggingConfig};
use tracing::{info, warn};
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `config.level`. Calling this twice returns a
/// `Config` error instead of panicking, so tests and embedders can call it
/// freely.
pub fn init(config: &LoggingConfig) -> Result<(), CrmSyncError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|err| {
            CrmSyncError::Config(format!("invalid log filter '{}': {err}", config.level))
        })?;

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json {
        registry.with(fmt::layer().json().with_current_span(true).with_target(true)).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    installed
        .map_err(|err| CrmSyncError::Config(format!("tracing subscriber already set: {err}")))
}

/// Log the outcome of a command with structured fields.
///
/// `command` should be a stable identifier such as `"jobs::submit_job"` and
/// must not carry user data.
#[inline]
pub fn log_command_execution(command: &str, elapsed: Duration, error: Option<&CrmSyncError>) {
    let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

    match error {
        None => info!(command, duration_ms, "command_execution_success"),
        Some(err) => warn!(
            command,
            duration_ms,
            error_type = err.label(),
            error = %err,
            "command_execution_failure"
        ),
    }
}
