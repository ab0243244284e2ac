//! Retry policy shared by the job manager and the standalone error retry path.
//!
//! Both callers compute delays through [`BackoffPolicy`] so the formula cannot
//! drift between them.

mod backoff;
mod constants;

pub use backoff::{BackoffPolicy, BackoffPolicyError};
pub use constants::{
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY, JITTER_RATIO,
    MAX_BACKOFF_EXPONENT,
};
