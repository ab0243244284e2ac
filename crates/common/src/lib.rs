//! Shared utilities for the CrmSync crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: cron and recurrence parsing, backoff math
//! - `runtime`: clock abstraction with a controllable mock for tests

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod retry;
#[cfg(feature = "foundation")]
pub mod time;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "foundation")]
pub use retry::{BackoffPolicy, BackoffPolicyError};
#[cfg(feature = "runtime")]
pub use time::clock::{Clock, MockClock, SharedClock, SystemClock};
#[cfg(feature = "foundation")]
pub use time::cron::{CronExpression, CronParseError};
#[cfg(feature = "foundation")]
pub use time::recurrence::{Recurrence, RecurrenceError};
