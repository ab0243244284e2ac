//! Shared test helpers for `crmsync-core` integration tests.
//!
//! [`Harness`] wires the real services to in-memory ports and a
//! [`MockClock`] so tests can focus on behaviour instead of boilerplate.

#![allow(dead_code)]

pub mod connectors;
pub mod notifications;
pub mod repositories;

use std::sync::Arc;
use std::time::Duration;

use crmsync_common::{BackoffPolicy, MockClock};
use crmsync_core::{
    AlertPolicy, ConnectorRegistry, ErrorHandler, ManagerDeps, ManagerSettings,
    NotificationDispatcher, RateLimiter, SyncJobManager,
};
use crmsync_domain::{default_rate_limits, EndpointLimit, QuotaConfig};

use self::connectors::ScriptedConnector;
use self::notifications::{RecordingAlertSink, RecordingEmail, RecordingWebhook};
use self::repositories::{
    MockCounterStore, MockErrorRepository, MockJobRepository, MockQuotaRepository,
    MockScheduleRepository, MockUsageLog,
};

/// Monday 2024-06-03 10:00:30 UTC, mid-minute so window resets are in the future.
pub fn test_clock() -> MockClock {
    MockClock::at_ymd_hms(2024, 6, 3, 10, 0, 30)
}

/// Backoff without jitter: 1s, 2s, 4s ... capped at 60s.
pub fn test_policy() -> BackoffPolicy {
    BackoffPolicy::new(Duration::from_secs(1), Duration::from_secs(60), 2.0)
        .unwrap()
        .with_jitter(false)
}

pub struct Harness {
    pub clock: MockClock,
    pub jobs: MockJobRepository,
    pub schedules: MockScheduleRepository,
    pub errors: MockErrorRepository,
    pub quotas: MockQuotaRepository,
    pub usage: MockUsageLog,
    pub counters: MockCounterStore,
    pub email: RecordingEmail,
    pub webhook: RecordingWebhook,
    pub alerts: RecordingAlertSink,
    pub limiter: Arc<RateLimiter>,
    pub handler: Arc<ErrorHandler>,
    pub manager: SyncJobManager,
}

impl Harness {
    pub fn new(connectors: Vec<ScriptedConnector>) -> Self {
        Self::with_settings(connectors, ManagerSettings::default(), default_rate_limits())
    }

    pub fn with_settings(
        connectors: Vec<ScriptedConnector>,
        settings: ManagerSettings,
        limits: Vec<EndpointLimit>,
    ) -> Self {
        let clock = test_clock();
        let jobs = MockJobRepository::new();
        let schedules = MockScheduleRepository::default();
        let errors = MockErrorRepository::default();
        let quotas = MockQuotaRepository::default();
        let usage = MockUsageLog::default();
        let counters = MockCounterStore::default();
        let email = RecordingEmail::default();
        let webhook = RecordingWebhook::default();
        let alerts = RecordingAlertSink::default();

        let limiter = Arc::new(RateLimiter::new(
            limits,
            QuotaConfig::default(),
            Arc::new(quotas.clone()),
            Arc::new(usage.clone()),
            Arc::new(counters.clone()),
            clock.shared(),
        ));
        let handler = Arc::new(
            ErrorHandler::new(Arc::new(errors.clone()), clock.shared())
                .with_policy(AlertPolicy::default())
                .with_alert_sink(Arc::new(alerts.clone())),
        );
        let notifier = Arc::new(
            NotificationDispatcher::new()
                .with_email(Arc::new(email.clone()))
                .with_webhook(Arc::new(webhook.clone())),
        );

        let mut registry = ConnectorRegistry::new();
        for connector in connectors {
            registry.register(Arc::new(connector));
        }

        let manager = SyncJobManager::new(
            ManagerDeps {
                jobs: Arc::new(jobs.clone()),
                schedules: Arc::new(schedules.clone()),
                limiter: Arc::clone(&limiter),
                errors: Arc::clone(&handler),
                connectors: registry,
                notifier,
                policy: test_policy(),
                clock: clock.shared(),
            },
            settings,
        );

        Self {
            clock,
            jobs,
            schedules,
            errors,
            quotas,
            usage,
            counters,
            email,
            webhook,
            alerts,
            limiter,
            handler,
            manager,
        }
    }

    /// One dispatch tick, then wait for every started execution.
    pub async fn run_tick(&self) -> usize {
        let started = self.manager.tick().await.unwrap();
        self.manager.drain().await;
        started
    }

    pub fn advance(&self, duration: Duration) {
        self.clock.advance(duration);
    }
}
