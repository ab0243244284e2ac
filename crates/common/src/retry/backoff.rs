// Exponential backoff with optional +/-25% jitter
use std::time::Duration;

use rand::Rng;
use thiserror::Error;

use super::constants::{
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY, JITTER_RATIO,
    MAX_BACKOFF_EXPONENT,
};

/// Validation failures for [`BackoffPolicy`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BackoffPolicyError {
    #[error("base_delay must be greater than zero")]
    ZeroBaseDelay,

    #[error("base_delay ({base:?}) cannot be greater than max_delay ({max:?})")]
    BaseExceedsMax { base: Duration, max: Duration },

    #[error("backoff_multiplier must be a finite value >= 1.0, got {0}")]
    InvalidMultiplier(f64),
}

/// Delay calculator for retries.
///
/// `delay(n) = min(base * multiplier^n, max)`; with jitter enabled the result
/// is shifted by a uniform offset in `[-25%, +25%]` of itself and clamped so
/// it never drops below `base`.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    base_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            jitter: true,
        }
    }
}

impl BackoffPolicy {
    /// Create a validated policy with jitter enabled.
    pub fn new(
        base_delay: Duration,
        max_delay: Duration,
        multiplier: f64,
    ) -> Result<Self, BackoffPolicyError> {
        if base_delay.is_zero() {
            return Err(BackoffPolicyError::ZeroBaseDelay);
        }
        if base_delay > max_delay {
            return Err(BackoffPolicyError::BaseExceedsMax { base: base_delay, max: max_delay });
        }
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(BackoffPolicyError::InvalidMultiplier(multiplier));
        }

        Ok(Self { base_delay, max_delay, multiplier, jitter: true })
    }

    /// Enable or disable jitter.
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before the first retry, and the floor under jitter.
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Cap on any single delay.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Growth factor per retry.
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn jitter_enabled(&self) -> bool {
        self.jitter
    }

    /// Delay before the retry that follows `retry_count` previous retries.
    pub fn delay(&self, retry_count: u32) -> Duration {
        self.delay_with_rng(retry_count, &mut rand::thread_rng())
    }

    /// Same as [`delay`](Self::delay) with a caller-provided RNG.
    pub fn delay_with_rng<R: Rng>(&self, retry_count: u32, rng: &mut R) -> Duration {
        let capped = self.exponential_delay(retry_count);
        if !self.jitter {
            return capped;
        }

        let millis = capped.as_secs_f64() * 1000.0;
        let offset = rng.gen_range(-JITTER_RATIO..=JITTER_RATIO) * millis;
        let jittered = Duration::from_secs_f64(((millis + offset) / 1000.0).max(0.0));

        jittered.max(self.base_delay)
    }

    /// Delay without jitter, capped at `max_delay`.
    pub fn exponential_delay(&self, retry_count: u32) -> Duration {
        let exponent = retry_count.min(MAX_BACKOFF_EXPONENT);
        let exponent = i32::try_from(exponent).unwrap_or(i32::MAX);
        let base_secs = self.base_delay.as_secs_f64();
        let scaled = base_secs * self.multiplier.powi(exponent);

        if !scaled.is_finite() || scaled >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }

        Duration::from_secs_f64(scaled)
    }
}
