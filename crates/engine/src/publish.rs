// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stage fan-out publishing seam.
//!
//! The coordinator publishes through this trait so dispatch failures can be
//! exercised in tests; the production implementation wraps the in-process
//! stage queues and cannot fail.

use plr_core::{MarkerJob, TileJob};
use plr_queue::StageQueue;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("queue publish failed: {0}")]
pub struct PublishError(pub String);

/// Downstream job publisher used during stage fan-out.
pub trait StagePublisher: Send + Sync {
    fn publish_tiles(&self, jobs: Vec<TileJob>) -> Result<(), PublishError>;
    fn publish_markers(&self, jobs: Vec<MarkerJob>) -> Result<(), PublishError>;
}

/// Production publisher over the in-process stage queues.
pub struct QueuePublisher {
    tiles: Arc<StageQueue<TileJob>>,
    markers: Arc<StageQueue<MarkerJob>>,
}

impl QueuePublisher {
    pub fn new(tiles: Arc<StageQueue<TileJob>>, markers: Arc<StageQueue<MarkerJob>>) -> Self {
        Self { tiles, markers }
    }
}

impl StagePublisher for QueuePublisher {
    fn publish_tiles(&self, jobs: Vec<TileJob>) -> Result<(), PublishError> {
        self.tiles.push_all(jobs);
        Ok(())
    }

    fn publish_markers(&self, jobs: Vec<MarkerJob>) -> Result<(), PublishError> {
        self.markers.push_all(jobs);
        Ok(())
    }
}

/// Publisher with injectable failures, for dispatch-crash tests.
#[cfg(any(test, feature = "test-support"))]
pub struct FlakyPublisher {
    inner: QueuePublisher,
    fail_tiles: std::sync::atomic::AtomicU32,
    fail_markers: std::sync::atomic::AtomicU32,
}

#[cfg(any(test, feature = "test-support"))]
impl FlakyPublisher {
    pub fn new(tiles: Arc<StageQueue<TileJob>>, markers: Arc<StageQueue<MarkerJob>>) -> Self {
        Self {
            inner: QueuePublisher::new(tiles, markers),
            fail_tiles: std::sync::atomic::AtomicU32::new(0),
            fail_markers: std::sync::atomic::AtomicU32::new(0),
        }
    }

    /// Make the next `n` tile publishes fail.
    pub fn fail_next_tiles(&self, n: u32) {
        self.fail_tiles.store(n, std::sync::atomic::Ordering::SeqCst);
    }

    /// Make the next `n` marker publishes fail.
    pub fn fail_next_markers(&self, n: u32) {
        self.fail_markers.store(n, std::sync::atomic::Ordering::SeqCst);
    }

    fn take_failure(counter: &std::sync::atomic::AtomicU32) -> bool {
        counter
            .fetch_update(
                std::sync::atomic::Ordering::SeqCst,
                std::sync::atomic::Ordering::SeqCst,
                |n| n.checked_sub(1),
            )
            .is_ok()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl StagePublisher for FlakyPublisher {
    fn publish_tiles(&self, jobs: Vec<TileJob>) -> Result<(), PublishError> {
        if Self::take_failure(&self.fail_tiles) {
            return Err(PublishError("injected tile publish failure".into()));
        }
        self.inner.publish_tiles(jobs)
    }

    fn publish_markers(&self, jobs: Vec<MarkerJob>) -> Result<(), PublishError> {
        if Self::take_failure(&self.fail_markers) {
            return Err(PublishError("injected marker publish failure".into()));
        }
        self.inner.publish_markers(jobs)
    }
}
