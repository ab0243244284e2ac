//! Quota, rate-limit and usage types.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::job::Provider;
use crate::impl_domain_enum_conversions;

/// Per-user consumption ceilings and credit balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuota {
    pub user_id: String,
    pub daily_usage: u64,
    pub monthly_usage: u64,
    pub daily_limit: u64,
    pub monthly_limit: u64,
    pub api_credits: u64,
    /// UTC date `daily_usage` was last reset.
    pub last_reset_date: NaiveDate,
    /// First day of the UTC month `monthly_usage` was last reset.
    pub last_monthly_reset: NaiveDate,
    pub updated_at: DateTime<Utc>,
}

impl UserQuota {
    pub fn new(
        user_id: impl Into<String>,
        daily_limit: u64,
        monthly_limit: u64,
        api_credits: u64,
        now: DateTime<Utc>,
    ) -> Self {
        let today = now.date_naive();
        Self {
            user_id: user_id.into(),
            daily_usage: 0,
            monthly_usage: 0,
            daily_limit,
            monthly_limit,
            api_credits,
            last_reset_date: today,
            last_monthly_reset: month_start(today),
            updated_at: now,
        }
    }

    /// The `(day, month start)` reset markers current at `now`.
    pub fn reset_marks(now: DateTime<Utc>) -> (NaiveDate, NaiveDate) {
        let today = now.date_naive();
        (today, month_start(today))
    }

    /// Zero usage counters whose period ended. Returns whether anything
    /// changed; calling it again on the same day is a no-op.
    pub fn apply_resets(&mut self, now: DateTime<Utc>) -> bool {
        let (today, this_month) = Self::reset_marks(now);
        let mut changed = false;

        if self.last_reset_date != today {
            self.daily_usage = 0;
            self.last_reset_date = today;
            changed = true;
        }

        if self.last_monthly_reset != this_month {
            self.monthly_usage = 0;
            self.last_monthly_reset = this_month;
            changed = true;
        }

        if changed {
            self.updated_at = now;
        }
        changed
    }

    pub fn daily_remaining(&self) -> u64 {
        self.daily_limit.saturating_sub(self.daily_usage)
    }

    pub fn monthly_remaining(&self) -> u64 {
        self.monthly_limit.saturating_sub(self.monthly_usage)
    }
}

fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Static request ceilings and cost for one provider endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointLimit {
    pub provider: Provider,
    pub endpoint: String,
    pub requests_per_minute: u64,
    pub requests_per_hour: u64,
    pub requests_per_day: u64,
    pub credits_per_request: u64,
}

impl EndpointLimit {
    pub fn new(
        provider: Provider,
        endpoint: impl Into<String>,
        per_minute: u64,
        per_hour: u64,
        per_day: u64,
        credits_per_request: u64,
    ) -> Self {
        Self {
            provider,
            endpoint: endpoint.into(),
            requests_per_minute: per_minute,
            requests_per_hour: per_hour,
            requests_per_day: per_day,
            credits_per_request,
        }
    }
}

/// Why a rate-limit check denied a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    InsufficientCredits,
    DailyQuota,
    MonthlyQuota,
    MinuteLimit,
    HourLimit,
    DayLimit,
}

impl_domain_enum_conversions!(DenialReason {
    InsufficientCredits => "insufficient_credits",
    DailyQuota => "daily_quota",
    MonthlyQuota => "monthly_quota",
    MinuteLimit => "minute_limit",
    HourLimit => "hour_limit",
    DayLimit => "day_limit",
});

/// Result of an admission check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining_requests: u64,
    pub reset_time: DateTime<Utc>,
    /// Milliseconds until the blocking window or quota resets.
    pub retry_after_ms: Option<u64>,
    pub credits_required: u64,
    pub credits_remaining: u64,
    pub denial: Option<DenialReason>,
}

impl RateLimitDecision {
    /// Earliest instant worth re-checking, when the denial has one.
    pub fn retry_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let retry_after = self.retry_after_ms?;
        let millis = i64::try_from(retry_after).ok()?;
        now.checked_add_signed(chrono::Duration::milliseconds(millis))
    }
}

/// Durable audit entry for one provider call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageEvent {
    pub id: Uuid,
    pub user_id: String,
    pub provider: Provider,
    pub endpoint: String,
    pub success: bool,
    pub response_time_ms: u64,
    pub error_message: Option<String>,
    pub credits_charged: u64,
    pub recorded_at: DateTime<Utc>,
}
