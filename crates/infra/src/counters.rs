//! Process-local rate-limit counters.
//!
//! Counters live in memory only. A restart forgets the current windows, and
//! several processes sharing one database each keep their own counts.

use async_trait::async_trait;
use crmsync_core::CounterStore;
use crmsync_domain::Result;
use dashmap::DashMap;

/// `key -> (count, reset_at_ms)`
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    counters: DashMap<String, (u64, i64)>,
}

impl InMemoryCounterStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Live keys, including windows not yet swept.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Whether no counter is held.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn get(&self, key: &str) -> Result<u64> {
        Ok(self.counters.get(key).map_or(0, |entry| entry.0))
    }

    async fn increment(&self, key: &str, reset_at_ms: i64) -> Result<u64> {
        let mut entry = self.counters.entry(key.to_string()).or_insert((0, reset_at_ms));
        entry.0 = entry.0.saturating_add(1);
        entry.1 = entry.1.max(reset_at_ms);
        Ok(entry.0)
    }

    async fn evict_expired(&self, now_ms: i64) -> Result<usize> {
        let before = self.counters.len();
        self.counters.retain(|_, (_, reset_at)| *reset_at > now_ms);
        Ok(before.saturating_sub(self.counters.len()))
    }
}
