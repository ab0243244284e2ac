//! Fixed-window bucket arithmetic
//!
//! A bucket is `floor(epoch_ms / window_ms)`; it resets at
//! `(bucket + 1) * window_ms`.

use chrono::{DateTime, Utc};
use crmsync_domain::constants::{DAY_WINDOW_MS, HOUR_WINDOW_MS, MINUTE_WINDOW_MS};
use crmsync_domain::{DenialReason, EndpointLimit, Provider};

/// Counting window, checked in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Window {
    /// Calendar-aligned minute.
    Minute,
    /// Calendar-aligned hour.
    Hour,
    /// UTC day.
    Day,
}

impl Window {
    /// Every window, shortest first.
    pub const ALL: [Self; 3] = [Self::Minute, Self::Hour, Self::Day];

    /// Window length in milliseconds.
    pub const fn millis(self) -> i64 {
        match self {
            Self::Minute => MINUTE_WINDOW_MS,
            Self::Hour => HOUR_WINDOW_MS,
            Self::Day => DAY_WINDOW_MS,
        }
    }

    /// Name used in counter keys.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
        }
    }

    /// Ceiling for this window on `limit`.
    pub const fn ceiling(self, limit: &EndpointLimit) -> u64 {
        match self {
            Self::Minute => limit.requests_per_minute,
            Self::Hour => limit.requests_per_hour,
            Self::Day => limit.requests_per_day,
        }
    }

    /// Reason reported when this window is full.
    pub const fn denial(self) -> DenialReason {
        match self {
            Self::Minute => DenialReason::MinuteLimit,
            Self::Hour => DenialReason::HourLimit,
            Self::Day => DenialReason::DayLimit,
        }
    }
}

/// The bucket of one window that contains a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowBucket {
    /// Window this bucket belongs to.
    pub window: Window,
    /// `floor(epoch_ms / window_ms)`.
    pub index: i64,
    /// Epoch milliseconds at which the next bucket starts.
    pub reset_at_ms: i64,
}

impl WindowBucket {
    /// Bucket of `window` containing `epoch_ms`.
    pub fn at(window: Window, epoch_ms: i64) -> Self {
        let index = epoch_ms.div_euclid(window.millis());
        Self { window, index, reset_at_ms: (index + 1) * window.millis() }
    }

    /// Counter key: `{user}:{provider}:{endpoint}:{window}:{bucket}`.
    pub fn key(&self, user_id: &str, provider: Provider, endpoint: &str) -> String {
        format!("{user_id}:{provider}:{endpoint}:{}:{}", self.window.as_str(), self.index)
    }

    /// [`reset_at_ms`](Self::reset_at_ms) as a timestamp.
    pub fn reset_time(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.reset_at_ms).unwrap_or(DateTime::UNIX_EPOCH)
    }

    /// Milliseconds from `epoch_ms` until this bucket resets, at least 1.
    pub fn millis_until_reset(&self, epoch_ms: i64) -> u64 {
        u64::try_from(self.reset_at_ms - epoch_ms).unwrap_or(0).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_boundaries() {
        let bucket = WindowBucket::at(Window::Minute, 120_500);
        assert_eq!(bucket.index, 2);
        assert_eq!(bucket.reset_at_ms, 180_000);
        assert_eq!(bucket.millis_until_reset(120_500), 59_500);

        let edge = WindowBucket::at(Window::Minute, 180_000);
        assert_eq!(edge.index, 3);
    }

    #[test]
    fn key_layout() {
        let bucket = WindowBucket::at(Window::Hour, 7_200_000);
        assert_eq!(bucket.key("u1", Provider::Hubspot, "contacts"), "u1:hubspot:contacts:hour:2");
    }

    #[test]
    fn ceilings_follow_window() {
        let limit = EndpointLimit::new(Provider::Hunter, "contacts", 1, 2, 3, 1);
        let ceilings: Vec<u64> = Window::ALL.iter().map(|w| w.ceiling(&limit)).collect();
        assert_eq!(ceilings, vec![1, 2, 3]);
    }
}
