// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Effect executor

use crate::error::RuntimeError;
use crate::publish::StagePublisher;
use crate::scheduler::Scheduler;
use parking_lot::Mutex;
use plr_core::{Clock, Effect};
use plr_storage::Store;
use std::sync::Arc;
use std::time::Duration;

/// Executes coordinator effects against the queues, the scheduler, and the
/// processing-job table.
pub struct Executor<C: Clock> {
    store: Arc<Store>,
    publisher: Arc<dyn StagePublisher>,
    scheduler: Arc<Mutex<Scheduler>>,
    clock: C,
}

impl<C: Clock> Executor<C> {
    pub fn new(
        store: Arc<Store>,
        publisher: Arc<dyn StagePublisher>,
        scheduler: Arc<Mutex<Scheduler>>,
        clock: C,
    ) -> Self {
        Self { store, publisher, scheduler, clock }
    }

    pub fn scheduler(&self) -> Arc<Mutex<Scheduler>> {
        Arc::clone(&self.scheduler)
    }

    /// Execute a single effect with tracing.
    pub fn execute(&self, effect: Effect) -> Result<(), RuntimeError> {
        let info: String =
            effect.fields().iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(" ");
        let op = effect.name();
        if effect.verbose() {
            tracing::info!("executing effect={} {}", op, info);
        }

        let result = self.execute_inner(effect);
        if let Err(e) = &result {
            tracing::error!(error = %e, "error effect={} {}", op, info);
        }
        result
    }

    /// Execute multiple effects in order, stopping at the first failure.
    pub fn execute_all(&self, effects: Vec<Effect>) -> Result<(), RuntimeError> {
        for effect in effects {
            self.execute(effect)?;
        }
        Ok(())
    }

    fn execute_inner(&self, effect: Effect) -> Result<(), RuntimeError> {
        match effect {
            Effect::EnqueueTileJobs { jobs } => {
                self.publisher.publish_tiles(jobs)?;
                Ok(())
            }
            Effect::EnqueueMarkerJobs { jobs } => {
                self.publisher.publish_markers(jobs)?;
                Ok(())
            }
            Effect::SetDeadline { id, duration_ms } => {
                self.scheduler.lock().set_timer(
                    id.to_string(),
                    Duration::from_millis(duration_ms),
                    self.clock.now(),
                );
                Ok(())
            }
            Effect::CancelDeadline { id } => {
                self.scheduler.lock().cancel_timer(id.as_str());
                Ok(())
            }
            Effect::JobProcessing { upload_id } => {
                self.store.update_job(&upload_id, |j| j.mark_processing(chrono::Utc::now()))?;
                Ok(())
            }
            Effect::JobComplete { upload_id } => {
                self.store.update_job(&upload_id, |j| j.mark_complete(chrono::Utc::now()))?;
                Ok(())
            }
            Effect::JobFailed { upload_id, error } => {
                self.store
                    .update_job(&upload_id, |j| j.mark_failed(error.clone(), chrono::Utc::now()))?;
                Ok(())
            }
            Effect::JobDiagnostic { upload_id, error } => {
                self.store
                    .update_job(&upload_id, |j| j.record_error(error.clone(), chrono::Utc::now()))?;
                Ok(())
            }
        }
    }
}
