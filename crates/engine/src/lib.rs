// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! plr-engine: the plan-processing pipeline runtime.
//!
//! One single-writer coordinator actor per upload drives the stage chain
//! (metadata → tiles → markers), fanning the next stage out exactly once per
//! boundary and arming a deadline alarm that is disarmed only on completion.
//! Stage workers consume the queues, call the opaque rasterizer/OCR service
//! through adapter traits, persist their artifacts, and post completions
//! back to the coordinator.

mod adapters;
mod coordinator;
mod error;
mod executor;
mod intake;
mod pool;
mod publish;
mod scheduler;
mod worker;

#[cfg(test)]
mod test_helpers;

pub use adapters::{
    HttpRasterClient, MarkerHit, RasterClient, RasterError, RasterPage, TileImage, TileLevel,
    TileSet,
};
pub use coordinator::Coordinator;
pub use error::RuntimeError;
pub use executor::Executor;
pub use intake::{Intake, IntakeError, IntakeOutcome, IntakeRequest};
pub use pool::CoordinatorPool;
pub use publish::{PublishError, QueuePublisher, StagePublisher};
pub use scheduler::Scheduler;
pub use worker::{
    MarkerStage, MetadataStage, StageHandler, StageWorker, TileStage, WorkerError,
};

#[cfg(any(test, feature = "test-support"))]
pub use adapters::FakeRaster;
#[cfg(any(test, feature = "test-support"))]
pub use publish::FlakyPublisher;

use plr_core::{Clock, PipelineConfig};
use plr_storage::Store;
use std::sync::Arc;

/// Shared dependencies of every coordinator actor.
pub struct Engine<C: Clock> {
    pub(crate) store: Arc<Store>,
    pub(crate) executor: Executor<C>,
    pub(crate) clock: C,
    pub(crate) marker_context: regex::Regex,
    pub(crate) default_timeout_ms: u64,
}

impl<C: Clock> Engine<C> {
    pub fn new(
        store: Arc<Store>,
        publisher: Arc<dyn StagePublisher>,
        scheduler: Arc<parking_lot::Mutex<Scheduler>>,
        clock: C,
        config: &PipelineConfig,
    ) -> Result<Self, RuntimeError> {
        let marker_context = regex::Regex::new(&config.marker_context_regex)?;
        Ok(Self {
            executor: Executor::new(Arc::clone(&store), publisher, scheduler, clock.clone()),
            store,
            clock,
            marker_context,
            default_timeout_ms: config.timeout_ms,
        })
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn executor(&self) -> &Executor<C> {
        &self.executor
    }
}
