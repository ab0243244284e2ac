//! In-memory dispatch queue
//!
//! Ordered by priority (higher first), then `scheduled_at` (earlier first),
//! then insertion order. Entries that are not due yet stay queued and are
//! skipped by [`JobQueue::take_ready`].

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use crmsync_domain::SyncJob;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct QueueKey {
    priority: Reverse<i32>,
    scheduled_at: DateTime<Utc>,
    seq: u64,
    id: Uuid,
}

/// Priority queue of pending job ids.
#[derive(Debug, Default)]
pub struct JobQueue {
    order: BTreeSet<QueueKey>,
    index: HashMap<Uuid, QueueKey>,
    next_seq: u64,
}

impl JobQueue {
    /// Empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `job`, replacing an existing entry for the same id so a
    /// rescheduled job moves to its new position.
    pub fn push(&mut self, job: &SyncJob) {
        self.remove(job.id);
        let key = QueueKey {
            priority: Reverse(job.priority),
            scheduled_at: job.scheduled_at,
            seq: self.next_seq,
            id: job.id,
        };
        self.next_seq += 1;
        self.order.insert(key);
        self.index.insert(job.id, key);
    }

    /// Drop `id` from the queue. Returns whether it was queued.
    pub fn remove(&mut self, id: Uuid) -> bool {
        match self.index.remove(&id) {
            Some(key) => self.order.remove(&key),
            None => false,
        }
    }

    /// Whether `id` is waiting to run.
    pub fn contains(&self, id: Uuid) -> bool {
        self.index.contains_key(&id)
    }

    /// Number of queued jobs.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Remove and return up to `max` due ids in dispatch order.
    pub fn take_ready(&mut self, now: DateTime<Utc>, max: usize) -> Vec<Uuid> {
        let ready: Vec<QueueKey> = self
            .order
            .iter()
            .filter(|key| key.scheduled_at <= now)
            .take(max)
            .copied()
            .collect();
        for key in &ready {
            self.order.remove(key);
            self.index.remove(&key.id);
        }
        ready.into_iter().map(|key| key.id).collect()
    }

    /// Drop every entry; used before a rebuild from storage.
    pub fn clear(&mut self) {
        self.order.clear();
        self.index.clear();
    }
}
