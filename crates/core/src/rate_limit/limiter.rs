//! Admission control for provider calls
//!
//! `check` walks credits, quota, then the minute/hour/day windows and denies
//! on the first exhausted resource. `record` books a finished call: every
//! call is logged, only successful ones consume counters, quota and credits.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};
use crmsync_common::SharedClock;
use crmsync_domain::{
    CrmSyncError, DenialReason, EndpointLimit, Provider, QuotaConfig, RateLimitDecision, Result,
    UsageEvent, UserQuota,
};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::ports::{CounterStore, QuotaRepository, UsageLogRepository};
use super::windows::{Window, WindowBucket};

/// Multi-window rate limiter with per-user quota and credits.
pub struct RateLimiter {
    limits: HashMap<(Provider, String), EndpointLimit>,
    defaults: QuotaConfig,
    quotas: Arc<dyn QuotaRepository>,
    usage: Arc<dyn UsageLogRepository>,
    counters: Arc<dyn CounterStore>,
    clock: SharedClock,
}

impl RateLimiter {
    /// Limiter over `limits`, creating quota rows from `defaults` on first use.
    pub fn new(
        limits: Vec<EndpointLimit>,
        defaults: QuotaConfig,
        quotas: Arc<dyn QuotaRepository>,
        usage: Arc<dyn UsageLogRepository>,
        counters: Arc<dyn CounterStore>,
        clock: SharedClock,
    ) -> Self {
        let limits = limits
            .into_iter()
            .map(|limit| ((limit.provider, limit.endpoint.clone()), limit))
            .collect();
        Self { limits, defaults, quotas, usage, counters, clock }
    }

    /// Static ceilings for an endpoint.
    pub fn endpoint_limit(&self, provider: Provider, endpoint: &str) -> Result<&EndpointLimit> {
        self.limits.get(&(provider, endpoint.to_string())).ok_or_else(|| {
            CrmSyncError::Config(format!("no endpoint limits configured for {provider}/{endpoint}"))
        })
    }

    /// Decide whether one more call is admitted. Has no side effects apart
    /// from persisting a due quota reset.
    #[instrument(skip(self))]
    pub async fn check(
        &self,
        user_id: &str,
        provider: Provider,
        endpoint: &str,
    ) -> Result<RateLimitDecision> {
        let limit = self.endpoint_limit(provider, endpoint)?;
        let now = self.clock.now();
        let now_ms = now.timestamp_millis();
        let quota = self.load_quota(user_id, now).await?;
        let cost = limit.credits_per_request;

        let denied = |reason: DenialReason, reset_time: DateTime<Utc>, retry_after_ms| {
            debug!(user_id, %provider, endpoint, reason = %reason, "rate limit denied");
            RateLimitDecision {
                allowed: false,
                remaining_requests: 0,
                reset_time,
                retry_after_ms,
                credits_required: cost,
                credits_remaining: quota.api_credits,
                denial: Some(reason),
            }
        };

        // Credits only refill through add_credits, so there is no reset to wait for.
        if quota.api_credits < cost {
            return Ok(denied(DenialReason::InsufficientCredits, now, None));
        }

        if quota.daily_usage >= quota.daily_limit {
            let reset = next_utc_midnight(now);
            return Ok(denied(DenialReason::DailyQuota, reset, Some(millis_between(now, reset))));
        }
        if quota.monthly_usage >= quota.monthly_limit {
            let reset = next_month_start(now);
            return Ok(denied(DenialReason::MonthlyQuota, reset, Some(millis_between(now, reset))));
        }

        let mut remaining = quota.daily_remaining().min(quota.monthly_remaining());
        let mut reset_time = None;
        for window in Window::ALL {
            let bucket = WindowBucket::at(window, now_ms);
            let count = self.counters.get(&bucket.key(user_id, provider, endpoint)).await?;
            let ceiling = window.ceiling(limit);
            if count >= ceiling {
                return Ok(denied(
                    window.denial(),
                    bucket.reset_time(),
                    Some(bucket.millis_until_reset(now_ms)),
                ));
            }
            remaining = remaining.min(ceiling - count);
            reset_time.get_or_insert(bucket.reset_time());
        }

        Ok(RateLimitDecision {
            allowed: true,
            remaining_requests: remaining,
            reset_time: reset_time.unwrap_or(now),
            retry_after_ms: None,
            credits_required: cost,
            credits_remaining: quota.api_credits,
            denial: None,
        })
    }

    /// Book a finished call.
    #[instrument(skip(self, error_message))]
    pub async fn record(
        &self,
        user_id: &str,
        provider: Provider,
        endpoint: &str,
        success: bool,
        response_time_ms: u64,
        error_message: Option<String>,
    ) -> Result<UsageEvent> {
        let now = self.clock.now();
        let cost = match self.endpoint_limit(provider, endpoint) {
            Ok(limit) => limit.credits_per_request,
            Err(err) => {
                warn!(error = %err, "recording usage for an unconfigured endpoint");
                0
            }
        };

        let event = UsageEvent {
            id: Uuid::now_v7(),
            user_id: user_id.to_string(),
            provider,
            endpoint: endpoint.to_string(),
            success,
            response_time_ms,
            error_message,
            credits_charged: if success { cost } else { 0 },
            recorded_at: now,
        };
        self.usage.append(&event).await?;

        if success {
            let now_ms = now.timestamp_millis();
            for window in Window::ALL {
                let bucket = WindowBucket::at(window, now_ms);
                self.counters
                    .increment(&bucket.key(user_id, provider, endpoint), bucket.reset_at_ms)
                    .await?;
            }
            self.load_quota(user_id, now).await?;
            self.quotas.record_usage(user_id, cost, now).await?;
        }

        Ok(event)
    }

    /// Current quota with any due daily/monthly reset applied.
    pub async fn get_user_quota(&self, user_id: &str) -> Result<UserQuota> {
        self.load_quota(user_id, self.clock.now()).await
    }

    /// Top up a user's credit balance; returns the new balance.
    #[instrument(skip(self))]
    pub async fn add_credits(&self, user_id: &str, amount: u64) -> Result<u64> {
        if amount == 0 {
            return Err(CrmSyncError::InvalidInput("credit amount must be positive".into()));
        }
        let now = self.clock.now();
        self.load_quota(user_id, now).await?;
        self.quotas.add_credits(user_id, amount, now).await
    }

    /// Drop counters of windows that already ended.
    pub async fn sweep_expired(&self) -> Result<usize> {
        let evicted = self.counters.evict_expired(self.clock.now().timestamp_millis()).await?;
        if evicted > 0 {
            debug!(evicted, "evicted expired rate-limit buckets");
        }
        Ok(evicted)
    }

    /// Most recent usage events first.
    pub async fn usage_history(&self, user_id: &str, limit: usize) -> Result<Vec<UsageEvent>> {
        self.usage.recent(user_id, limit).await
    }

    /// Creation and resets are conditional writes; a full-row save here
    /// would overwrite concurrent usage or credit updates.
    async fn load_quota(&self, user_id: &str, now: DateTime<Utc>) -> Result<UserQuota> {
        let Some(quota) = self.quotas.get(user_id).await? else {
            let fresh = UserQuota::new(
                user_id,
                self.defaults.daily_limit,
                self.defaults.monthly_limit,
                self.defaults.initial_credits,
                now,
            );
            return self.quotas.create_if_absent(&fresh).await;
        };
        if !quota.clone().apply_resets(now) {
            return Ok(quota);
        }

        debug!(user_id, "quota usage reset");
        self.quotas
            .reset_elapsed(user_id, now)
            .await?
            .ok_or_else(|| CrmSyncError::NotFound(format!("quota for user {user_id}")))
    }
}

fn millis_between(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    u64::try_from((to - from).num_milliseconds()).unwrap_or(0).max(1)
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0).map_or(DateTime::UNIX_EPOCH, |naive| naive.and_utc())
}

fn next_utc_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now.date_naive();
    midnight(today.checked_add_days(Days::new(1)).unwrap_or(today))
}

fn next_month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now.date_naive();
    let first = today.with_day(1).unwrap_or(today);
    midnight(first.checked_add_months(Months::new(1)).unwrap_or(first))
}
