// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stage worker loop.
//!
//! Workers are interchangeable across stages: lease a job, perform the
//! stage's side effect through the raster adapter, persist artifacts and the
//! sheet row, then post the completion to the coordinator. The queue message
//! is acked only after the completion was accepted, so a crash anywhere
//! replays the job; every step downstream is idempotent.

mod markers;
mod metadata;
mod tiles;

pub use markers::MarkerStage;
pub use metadata::MetadataStage;
pub use tiles::TileStage;

use crate::adapters::RasterError;
use crate::error::RuntimeError;
use async_trait::async_trait;
use plr_core::{Clock, PipelineConfig, Stage, UploadId};
use plr_queue::{Lease, StageQueue};
use plr_storage::{ObjectStoreError, StoreError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("raster call failed: {0}")]
    Raster(#[from] RasterError),

    #[error("object store error: {0}")]
    Object(#[from] ObjectStoreError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("artifact encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("sheet row missing for upload {upload_id} sheet {sheet_number}")]
    SheetRowMissing { upload_id: UploadId, sheet_number: u32 },

    #[error("completion rejected: {0}")]
    Completion(RuntimeError),
}

/// One pipeline stage's processing logic.
#[async_trait]
pub trait StageHandler: Send + Sync + 'static {
    type Job: Clone + Send + Sync + 'static;

    fn stage(&self) -> Stage;

    /// Perform the stage side effect and persist artifacts + sheet row.
    async fn process(&self, job: &Self::Job) -> Result<(), WorkerError>;

    /// Post the stage completion to the coordinator.
    async fn complete(&self, job: &Self::Job) -> Result<(), WorkerError>;

    /// Called when processing exhausted its attempts for this delivery.
    async fn record_failure(&self, _job: &Self::Job) {}
}

/// Generic worker loop around one stage queue.
pub struct StageWorker<H: StageHandler, C: Clock> {
    handler: Arc<H>,
    queue: Arc<StageQueue<H::Job>>,
    clock: C,
    attempts: u32,
    visibility: Duration,
}

const RETRY_BACKOFF: Duration = Duration::from_millis(250);

impl<H: StageHandler, C: Clock> StageWorker<H, C> {
    pub fn new(
        handler: Arc<H>,
        queue: Arc<StageQueue<H::Job>>,
        clock: C,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            handler,
            queue,
            clock,
            attempts: config.worker_attempts.max(1),
            visibility: Duration::from_millis(config.lease_ms),
        }
    }

    /// Consume the queue until cancelled.
    pub async fn run(self, cancel: CancellationToken) {
        loop {
            let lease = tokio::select! {
                _ = cancel.cancelled() => break,
                lease = self.queue.receive(self.visibility, || self.clock.now()) => lease,
            };
            self.handle(lease).await;
        }
    }

    /// Process one leased job. Exposed for deterministic tests.
    pub async fn handle(&self, lease: Lease<H::Job>) {
        let stage = self.handler.stage();

        let mut processed = false;
        for attempt in 1..=self.attempts {
            match self.handler.process(&lease.payload).await {
                Ok(()) => {
                    processed = true;
                    break;
                }
                Err(e) => {
                    warn!(%stage, attempt, error = %e, "stage processing failed");
                    if attempt < self.attempts {
                        tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                    }
                }
            }
        }

        if !processed {
            self.handler.record_failure(&lease.payload).await;
            self.queue.nack(&lease);
            return;
        }

        match self.handler.complete(&lease.payload).await {
            Ok(()) => {
                self.queue.ack(&lease);
            }
            Err(e) => {
                // The stage work is already persisted; only the completion
                // post failed. Release rather than nack: the repost is
                // idempotent and must retry for as long as the deadline
                // allows, never dead-letter.
                warn!(%stage, error = %e, "completion post failed, releasing for repost");
                self.queue.release(&lease);
            }
        }
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
