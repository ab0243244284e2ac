//! Time utilities and abstractions
//!
//! - **[`clock`]**: wall-clock abstraction with a mock for deterministic tests
//! - **[`cron`]**: five-field cron expression parsing and evaluation
//! - **[`recurrence`]**: schedule interval expressions (named, fixed, cron)

#[cfg(feature = "runtime")]
pub mod clock;
pub mod cron;
pub mod recurrence;
