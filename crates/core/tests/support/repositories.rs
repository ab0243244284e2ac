//! In-memory mocks for the core storage ports
//!
//! Each mock keeps its rows behind a `std::sync::Mutex` and mirrors the
//! ordering and filtering contracts of the SQLite adapters.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crmsync_core::{
    CounterStore, ErrorRepository, JobRepository, QuotaRepository, ScheduleRepository,
    UsageLogRepository,
};
use crmsync_domain::{
    CrmSyncError, ErrorLogFilter, ErrorRecord, JobFilter, JobStatus, Result as DomainResult,
    SyncJob, SyncSchedule, UsageEvent, UserQuota,
};
use tokio::sync::oneshot;
use uuid::Uuid;

/// In-memory mock for `JobRepository`.
#[derive(Default, Clone)]
pub struct MockJobRepository {
    jobs: Arc<Mutex<HashMap<Uuid, SyncJob>>>,
    archived: Arc<Mutex<Vec<SyncJob>>>,
    read_gate: Arc<Mutex<Option<ReadGate>>>,
}

struct ReadGate {
    reached: oneshot::Sender<()>,
    release: oneshot::Receiver<()>,
}

/// Holds the next `get` after it has read its row, so a test can interleave
/// other writes before the caller sees the (now stale) snapshot.
pub struct HeldRead {
    reached: Option<oneshot::Receiver<()>>,
    release: oneshot::Sender<()>,
}

impl HeldRead {
    /// Wait until a caller is parked inside `get`.
    pub async fn reached(&mut self) {
        if let Some(reached) = self.reached.take() {
            reached.await.unwrap();
        }
    }

    pub fn release(self) {
        let _ = self.release.send(());
    }
}

impl MockJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a row directly, bypassing the manager.
    pub fn seed(&self, job: SyncJob) {
        self.jobs.lock().unwrap().insert(job.id, job);
    }

    pub fn snapshot(&self, id: Uuid) -> Option<SyncJob> {
        self.jobs.lock().unwrap().get(&id).cloned()
    }

    pub fn archived_count(&self) -> usize {
        self.archived.lock().unwrap().len()
    }

    /// Park the next `get` call until the returned handle is released.
    pub fn hold_next_read(&self) -> HeldRead {
        let (reached_tx, reached_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        *self.read_gate.lock().unwrap() =
            Some(ReadGate { reached: reached_tx, release: release_rx });
        HeldRead { reached: Some(reached_rx), release: release_tx }
    }
}

#[async_trait]
impl JobRepository for MockJobRepository {
    async fn insert(&self, job: &SyncJob) -> DomainResult<()> {
        self.jobs.lock().unwrap().insert(job.id, job.clone());
        Ok(())
    }

    async fn update(&self, job: &SyncJob) -> DomainResult<()> {
        let mut jobs = self.jobs.lock().unwrap();
        match jobs.get_mut(&job.id) {
            Some(row) => {
                *row = job.clone();
                Ok(())
            }
            None => Err(CrmSyncError::NotFound(format!("sync job {}", job.id))),
        }
    }

    async fn update_if_status(&self, job: &SyncJob, expected: JobStatus) -> DomainResult<bool> {
        let mut jobs = self.jobs.lock().unwrap();
        match jobs.get_mut(&job.id) {
            Some(row) if row.status == expected => {
                *row = job.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<SyncJob>> {
        let row = self.jobs.lock().unwrap().get(&id).cloned();
        let gate = self.read_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.reached.send(());
            let _ = gate.release.await;
        }
        Ok(row)
    }

    async fn list_for_user(&self, user_id: &str, filter: &JobFilter) -> DomainResult<Vec<SyncJob>> {
        let mut jobs: Vec<SyncJob> = self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|job| job.user_id == user_id && filter.matches(job))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        jobs.truncate(filter.limit);
        Ok(jobs)
    }

    async fn list_by_status(&self, status: JobStatus) -> DomainResult<Vec<SyncJob>> {
        Ok(self.jobs.lock().unwrap().values().filter(|job| job.status == status).cloned().collect())
    }

    async fn list_ready(&self, now: DateTime<Utc>) -> DomainResult<Vec<SyncJob>> {
        Ok(self.jobs.lock().unwrap().values().filter(|job| job.is_ready(now)).cloned().collect())
    }

    async fn list_since(&self, user_id: &str, since: DateTime<Utc>) -> DomainResult<Vec<SyncJob>> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|job| job.user_id == user_id && job.created_at >= since)
            .cloned()
            .collect())
    }

    async fn archive_terminal_before(&self, cutoff: DateTime<Utc>) -> DomainResult<usize> {
        let mut jobs = self.jobs.lock().unwrap();
        let stale: Vec<Uuid> = jobs
            .values()
            .filter(|job| job.is_terminal() && job.completed_at.unwrap_or(job.updated_at) < cutoff)
            .map(|job| job.id)
            .collect();
        let mut archived = self.archived.lock().unwrap();
        for id in &stale {
            if let Some(job) = jobs.remove(id) {
                archived.push(job);
            }
        }
        Ok(stale.len())
    }
}

/// In-memory mock for `ScheduleRepository`.
#[derive(Default, Clone)]
pub struct MockScheduleRepository {
    schedules: Arc<Mutex<HashMap<Uuid, SyncSchedule>>>,
}

#[async_trait]
impl ScheduleRepository for MockScheduleRepository {
    async fn insert(&self, schedule: &SyncSchedule) -> DomainResult<()> {
        self.schedules.lock().unwrap().insert(schedule.id, schedule.clone());
        Ok(())
    }

    async fn update(&self, schedule: &SyncSchedule) -> DomainResult<()> {
        self.schedules.lock().unwrap().insert(schedule.id, schedule.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<SyncSchedule>> {
        Ok(self.schedules.lock().unwrap().get(&id).cloned())
    }

    async fn list_for_user(&self, user_id: &str) -> DomainResult<Vec<SyncSchedule>> {
        Ok(self
            .schedules
            .lock()
            .unwrap()
            .values()
            .filter(|schedule| schedule.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_due(&self, now: DateTime<Utc>) -> DomainResult<Vec<SyncSchedule>> {
        Ok(self
            .schedules
            .lock()
            .unwrap()
            .values()
            .filter(|schedule| schedule.is_due(now))
            .cloned()
            .collect())
    }
}

/// In-memory mock for `ErrorRepository`.
#[derive(Default, Clone)]
pub struct MockErrorRepository {
    records: Arc<Mutex<Vec<ErrorRecord>>>,
}

impl MockErrorRepository {
    pub fn all(&self) -> Vec<ErrorRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl ErrorRepository for MockErrorRepository {
    async fn insert(&self, record: &ErrorRecord) -> DomainResult<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn insert_and_count(
        &self,
        record: &ErrorRecord,
        since: DateTime<Utc>,
    ) -> DomainResult<u64> {
        let mut records = self.records.lock().unwrap();
        records.push(record.clone());
        let in_window =
            records.iter().filter(|row| row.user_id == record.user_id && row.created_at >= since);
        Ok(in_window.count() as u64)
    }

    async fn update(&self, record: &ErrorRecord) -> DomainResult<()> {
        let mut records = self.records.lock().unwrap();
        match records.iter_mut().find(|row| row.id == record.id) {
            Some(row) => {
                *row = record.clone();
                Ok(())
            }
            None => Err(CrmSyncError::NotFound(format!("error record {}", record.id))),
        }
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<ErrorRecord>> {
        Ok(self.records.lock().unwrap().iter().find(|row| row.id == id).cloned())
    }

    async fn list(&self, user_id: &str, filter: &ErrorLogFilter) -> DomainResult<Vec<ErrorRecord>> {
        let mut rows: Vec<ErrorRecord> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.user_id == user_id && filter.matches(row))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        rows.truncate(filter.limit);
        Ok(rows)
    }

    async fn list_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> DomainResult<Vec<ErrorRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.user_id == user_id && row.created_at >= since)
            .cloned()
            .collect())
    }

    async fn count_since(&self, user_id: &str, since: DateTime<Utc>) -> DomainResult<u64> {
        Ok(self.list_since(user_id, since).await?.len() as u64)
    }
}

/// Wraps [`MockErrorRepository`] and yields to the scheduler around every
/// write so concurrent handlers interleave between calls.
#[derive(Default, Clone)]
pub struct YieldingErrorRepository {
    inner: MockErrorRepository,
}

impl YieldingErrorRepository {
    pub fn new(inner: MockErrorRepository) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ErrorRepository for YieldingErrorRepository {
    async fn insert(&self, record: &ErrorRecord) -> DomainResult<()> {
        tokio::task::yield_now().await;
        self.inner.insert(record).await?;
        tokio::task::yield_now().await;
        Ok(())
    }

    async fn insert_and_count(
        &self,
        record: &ErrorRecord,
        since: DateTime<Utc>,
    ) -> DomainResult<u64> {
        tokio::task::yield_now().await;
        let count = self.inner.insert_and_count(record, since).await?;
        tokio::task::yield_now().await;
        Ok(count)
    }

    async fn update(&self, record: &ErrorRecord) -> DomainResult<()> {
        tokio::task::yield_now().await;
        self.inner.update(record).await
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<ErrorRecord>> {
        self.inner.get(id).await
    }

    async fn list(&self, user_id: &str, filter: &ErrorLogFilter) -> DomainResult<Vec<ErrorRecord>> {
        self.inner.list(user_id, filter).await
    }

    async fn list_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> DomainResult<Vec<ErrorRecord>> {
        self.inner.list_since(user_id, since).await
    }

    async fn count_since(&self, user_id: &str, since: DateTime<Utc>) -> DomainResult<u64> {
        tokio::task::yield_now().await;
        self.inner.count_since(user_id, since).await
    }
}

/// In-memory mock for `QuotaRepository`.
#[derive(Default, Clone)]
pub struct MockQuotaRepository {
    quotas: Arc<Mutex<HashMap<String, UserQuota>>>,
    saves: Arc<Mutex<usize>>,
}

impl MockQuotaRepository {
    pub fn seed(&self, quota: UserQuota) {
        self.quotas.lock().unwrap().insert(quota.user_id.clone(), quota);
    }

    /// Number of row writes made by creations and resets.
    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap()
    }
}

#[async_trait]
impl QuotaRepository for MockQuotaRepository {
    async fn get(&self, user_id: &str) -> DomainResult<Option<UserQuota>> {
        Ok(self.quotas.lock().unwrap().get(user_id).cloned())
    }

    async fn save(&self, quota: &UserQuota) -> DomainResult<()> {
        *self.saves.lock().unwrap() += 1;
        self.quotas.lock().unwrap().insert(quota.user_id.clone(), quota.clone());
        Ok(())
    }

    async fn create_if_absent(&self, quota: &UserQuota) -> DomainResult<UserQuota> {
        let mut quotas = self.quotas.lock().unwrap();
        let stored = quotas.entry(quota.user_id.clone()).or_insert_with(|| {
            *self.saves.lock().unwrap() += 1;
            quota.clone()
        });
        Ok(stored.clone())
    }

    async fn reset_elapsed(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<UserQuota>> {
        let mut quotas = self.quotas.lock().unwrap();
        let Some(quota) = quotas.get_mut(user_id) else {
            return Ok(None);
        };
        if quota.apply_resets(now) {
            *self.saves.lock().unwrap() += 1;
        }
        Ok(Some(quota.clone()))
    }

    async fn record_usage(
        &self,
        user_id: &str,
        credits: u64,
        now: DateTime<Utc>,
    ) -> DomainResult<UserQuota> {
        let mut quotas = self.quotas.lock().unwrap();
        let quota = quotas
            .get_mut(user_id)
            .ok_or_else(|| CrmSyncError::NotFound(format!("quota for {user_id}")))?;
        quota.daily_usage += 1;
        quota.monthly_usage += 1;
        quota.api_credits = quota.api_credits.saturating_sub(credits);
        quota.updated_at = now;
        Ok(quota.clone())
    }

    async fn add_credits(&self, user_id: &str, amount: u64, now: DateTime<Utc>) -> DomainResult<u64> {
        let mut quotas = self.quotas.lock().unwrap();
        let quota = quotas
            .get_mut(user_id)
            .ok_or_else(|| CrmSyncError::NotFound(format!("quota for {user_id}")))?;
        quota.api_credits += amount;
        quota.updated_at = now;
        Ok(quota.api_credits)
    }
}

type ReadHook = Box<dyn FnOnce(&MockQuotaRepository) + Send>;

/// Wraps [`MockQuotaRepository`] and runs a hook right after the next
/// `get`, so another writer lands between a snapshot read and the write
/// that follows it.
#[derive(Clone)]
pub struct InterleavedQuotaRepository {
    inner: MockQuotaRepository,
    after_read: Arc<Mutex<Option<ReadHook>>>,
}

impl InterleavedQuotaRepository {
    pub fn new(inner: MockQuotaRepository) -> Self {
        Self { inner, after_read: Arc::default() }
    }

    pub fn after_next_read(&self, hook: impl FnOnce(&MockQuotaRepository) + Send + 'static) {
        *self.after_read.lock().unwrap() = Some(Box::new(hook));
    }
}

#[async_trait]
impl QuotaRepository for InterleavedQuotaRepository {
    async fn get(&self, user_id: &str) -> DomainResult<Option<UserQuota>> {
        let snapshot = self.inner.get(user_id).await?;
        let hook = self.after_read.lock().unwrap().take();
        if let Some(hook) = hook {
            hook(&self.inner);
        }
        Ok(snapshot)
    }

    async fn save(&self, quota: &UserQuota) -> DomainResult<()> {
        self.inner.save(quota).await
    }

    async fn create_if_absent(&self, quota: &UserQuota) -> DomainResult<UserQuota> {
        self.inner.create_if_absent(quota).await
    }

    async fn reset_elapsed(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<UserQuota>> {
        self.inner.reset_elapsed(user_id, now).await
    }

    async fn record_usage(
        &self,
        user_id: &str,
        credits: u64,
        now: DateTime<Utc>,
    ) -> DomainResult<UserQuota> {
        self.inner.record_usage(user_id, credits, now).await
    }

    async fn add_credits(&self, user_id: &str, amount: u64, now: DateTime<Utc>) -> DomainResult<u64> {
        self.inner.add_credits(user_id, amount, now).await
    }
}

/// In-memory mock for `UsageLogRepository`.
#[derive(Default, Clone)]
pub struct MockUsageLog {
    events: Arc<Mutex<Vec<UsageEvent>>>,
}

impl MockUsageLog {
    pub fn all(&self) -> Vec<UsageEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl UsageLogRepository for MockUsageLog {
    async fn append(&self, event: &UsageEvent) -> DomainResult<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn recent(&self, user_id: &str, limit: usize) -> DomainResult<Vec<UsageEvent>> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|event| event.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

/// In-memory mock for `CounterStore`.
#[derive(Default, Clone)]
pub struct MockCounterStore {
    counters: Arc<Mutex<HashMap<String, (u64, i64)>>>,
}

impl MockCounterStore {
    pub fn len(&self) -> usize {
        self.counters.lock().unwrap().len()
    }
}

#[async_trait]
impl CounterStore for MockCounterStore {
    async fn get(&self, key: &str) -> DomainResult<u64> {
        Ok(self.counters.lock().unwrap().get(key).map_or(0, |(count, _)| *count))
    }

    async fn increment(&self, key: &str, reset_at_ms: i64) -> DomainResult<u64> {
        let mut counters = self.counters.lock().unwrap();
        let entry = counters.entry(key.to_string()).or_insert((0, reset_at_ms));
        entry.0 += 1;
        Ok(entry.0)
    }

    async fn evict_expired(&self, now_ms: i64) -> DomainResult<usize> {
        let mut counters = self.counters.lock().unwrap();
        let before = counters.len();
        counters.retain(|_, (_, reset_at)| *reset_at > now_ms);
        Ok(before - counters.len())
    }
}
