// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process at-least-once queue with leases and dead-lettering.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::warn;

/// A leased queue item. The lease must be passed back to [`StageQueue::ack`]
/// or [`StageQueue::nack`]; dropping it silently leaves the item to expire
/// and redeliver.
#[derive(Debug)]
pub struct Lease<T> {
    pub payload: T,
    item_id: u64,
    /// Which delivery this is, 1-based. Redeliveries observe > 1.
    pub delivery: u32,
}

/// Queue introspection snapshot for health endpoints.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct QueueStats {
    pub name: String,
    pub depth: usize,
    pub in_flight: usize,
    pub dead: usize,
}

struct Item<T> {
    id: u64,
    payload: T,
    /// Expired leases and nacks both count against the failure budget.
    /// Releases do not.
    failures: u32,
    /// Total times this item was handed out.
    deliveries: u32,
}

struct Leased<T> {
    item: Item<T>,
    expires_at: Instant,
}

struct Inner<T> {
    next_id: u64,
    pending: VecDeque<Item<T>>,
    leased: HashMap<u64, Leased<T>>,
    dead: Vec<T>,
}

/// FIFO at-least-once queue feeding one pipeline stage.
pub struct StageQueue<T> {
    name: String,
    max_failures: u32,
    inner: Mutex<Inner<T>>,
    notify: Notify,
}

impl<T: Clone + Send + 'static> StageQueue<T> {
    /// `max_failures` bounds deliveries before an item dead-letters.
    pub fn new(name: impl Into<String>, max_failures: u32) -> Self {
        Self {
            name: name.into(),
            max_failures: max_failures.max(1),
            inner: Mutex::new(Inner {
                next_id: 0,
                pending: VecDeque::new(),
                leased: HashMap::new(),
                dead: Vec::new(),
            }),
            notify: Notify::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Publish one item.
    pub fn push(&self, payload: T) {
        {
            let mut inner = self.inner.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.pending.push_back(Item { id, payload, failures: 0, deliveries: 0 });
        }
        self.notify.notify_one();
    }

    /// Publish a batch, preserving order.
    pub fn push_all(&self, payloads: impl IntoIterator<Item = T>) {
        let mut count = 0;
        {
            let mut inner = self.inner.lock();
            for payload in payloads {
                let id = inner.next_id;
                inner.next_id += 1;
                inner.pending.push_back(Item { id, payload, failures: 0, deliveries: 0 });
                count += 1;
            }
        }
        for _ in 0..count {
            self.notify.notify_one();
        }
    }

    /// Lease the next pending item, if any, until `now + visibility`.
    pub fn try_receive(&self, visibility: Duration, now: Instant) -> Option<Lease<T>> {
        let mut inner = self.inner.lock();
        let mut item = inner.pending.pop_front()?;
        item.deliveries += 1;
        let lease = Lease {
            payload: item.payload.clone(),
            item_id: item.id,
            delivery: item.deliveries,
        };
        inner.leased.insert(item.id, Leased { item, expires_at: now + visibility });
        Some(lease)
    }

    /// Wait for the next item. `now` is sampled per attempt so tests can
    /// drive a fake clock.
    pub async fn receive(&self, visibility: Duration, now: impl Fn() -> Instant) -> Lease<T> {
        loop {
            if let Some(lease) = self.try_receive(visibility, now()) {
                return lease;
            }
            self.notify.notified().await;
        }
    }

    /// Acknowledge a completed lease. Returns `false` when the lease already
    /// expired and the item was redelivered — the completed work is benign
    /// (idempotent downstream), so callers just drop the lease.
    pub fn ack(&self, lease: &Lease<T>) -> bool {
        let mut inner = self.inner.lock();
        match inner.leased.remove(&lease.item_id) {
            Some(_) => true,
            None => {
                warn!(queue = %self.name, item = lease.item_id, "ack after lease expiry");
                false
            }
        }
    }

    /// Return a leased item to the queue without counting a failure.
    ///
    /// For consumers whose expensive work already succeeded and only the
    /// cheap, idempotent follow-up must be retried: the item redelivers
    /// indefinitely on this path and can never dead-letter from it.
    pub fn release(&self, lease: &Lease<T>) {
        let released = {
            let mut inner = self.inner.lock();
            match inner.leased.remove(&lease.item_id) {
                Some(leased) => {
                    inner.pending.push_back(leased.item);
                    true
                }
                None => false,
            }
        };
        if released {
            self.notify.notify_one();
        }
    }

    /// Return a leased item for redelivery (or dead-letter it once its
    /// failure budget is spent).
    pub fn nack(&self, lease: &Lease<T>) {
        let redelivered = {
            let mut inner = self.inner.lock();
            match inner.leased.remove(&lease.item_id) {
                Some(leased) => {
                    self.requeue_or_bury(&mut inner, leased.item);
                    true
                }
                None => false,
            }
        };
        if redelivered {
            self.notify.notify_one();
        }
    }

    /// Move expired leases back to pending. Returns how many were redelivered.
    pub fn redeliver_expired(&self, now: Instant) -> usize {
        let redelivered = {
            let mut inner = self.inner.lock();
            let expired: Vec<u64> = inner
                .leased
                .iter()
                .filter(|(_, l)| l.expires_at <= now)
                .map(|(id, _)| *id)
                .collect();
            for id in &expired {
                if let Some(leased) = inner.leased.remove(id) {
                    warn!(queue = %self.name, item = id, "lease expired, redelivering");
                    self.requeue_or_bury(&mut inner, leased.item);
                }
            }
            expired.len()
        };
        for _ in 0..redelivered {
            self.notify.notify_one();
        }
        redelivered
    }

    fn requeue_or_bury(&self, inner: &mut Inner<T>, mut item: Item<T>) {
        item.failures += 1;
        if item.failures >= self.max_failures {
            warn!(queue = %self.name, item = item.id, failures = item.failures, "dead-lettering item");
            inner.dead.push(item.payload);
        } else {
            inner.pending.push_back(item);
        }
    }

    /// Payloads that exhausted their failure budget.
    pub fn dead_items(&self) -> Vec<T> {
        self.inner.lock().dead.clone()
    }

    pub fn stats(&self) -> QueueStats {
        let inner = self.inner.lock();
        QueueStats {
            name: self.name.clone(),
            depth: inner.pending.len(),
            in_flight: inner.leased.len(),
            dead: inner.dead.len(),
        }
    }

    /// Total items ever published (monotonic). Used by fan-out tests.
    pub fn published(&self) -> u64 {
        self.inner.lock().next_id
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
