// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-writer actor pool keyed by upload id.
//!
//! One tokio task per live upload drains an inbox of commands, so handlers
//! for a given upload run strictly serially. Actors spawn on demand: an
//! `initialize` creates a fresh one, any other command rehydrates from the
//! stored coordinator row (re-arming its alarm) or reports the upload as
//! uninitialized.

use crate::coordinator::Coordinator;
use crate::error::RuntimeError;
use crate::Engine;
use parking_lot::Mutex;
use plr_core::{Clock, CoordinatorError, CoordinatorState, PipelineProgress, TimerId, UploadId};
use plr_storage::CoordinatorRow;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::info;

type ProgressReply = oneshot::Sender<Result<PipelineProgress, RuntimeError>>;

pub(crate) enum Command {
    Initialize {
        total_sheets: u32,
        timeout_ms: Option<u64>,
        reply: oneshot::Sender<Result<CoordinatorState, RuntimeError>>,
    },
    SheetComplete { sheet_number: u32, valid_sheets: Vec<String>, reply: ProgressReply },
    TileComplete { sheet_number: u32, reply: ProgressReply },
    MarkerComplete { sheet_number: u32, reply: ProgressReply },
    RetryDispatch { reply: ProgressReply },
    Progress { reply: ProgressReply },
    Alarm,
}

/// Pool of per-upload coordinator actors.
pub struct CoordinatorPool<C: Clock> {
    engine: Arc<Engine<C>>,
    actors: Mutex<HashMap<String, mpsc::Sender<Command>>>,
}

impl<C: Clock> CoordinatorPool<C> {
    pub fn new(engine: Arc<Engine<C>>) -> Self {
        Self { engine, actors: Mutex::new(HashMap::new()) }
    }

    pub fn engine(&self) -> &Arc<Engine<C>> {
        &self.engine
    }

    /// Number of live actor tasks.
    pub fn active(&self) -> usize {
        self.actors.lock().len()
    }

    /// Respawn actors for every stored non-terminal pipeline, re-arming
    /// their deadline alarms. Called once at daemon startup.
    pub fn rehydrate_incomplete(&self) -> usize {
        let rows = self.engine.store.scan_incomplete();
        let count = rows.len();
        for row in rows {
            let upload_id = row.state.upload_id.clone();
            self.sender_for(&upload_id, false);
        }
        if count > 0 {
            info!(count, "rehydrated in-flight pipelines");
        }
        count
    }

    pub async fn initialize(
        &self,
        upload_id: &UploadId,
        total_sheets: u32,
        timeout_ms: Option<u64>,
    ) -> Result<CoordinatorState, RuntimeError> {
        let tx = self
            .sender_for(upload_id, true)
            .ok_or_else(|| RuntimeError::ActorGone(upload_id.clone()))?;
        let (reply, rx) = oneshot::channel();
        tx.send(Command::Initialize { total_sheets, timeout_ms, reply })
            .await
            .map_err(|_| RuntimeError::ActorGone(upload_id.clone()))?;
        rx.await.map_err(|_| RuntimeError::ActorGone(upload_id.clone()))?
    }

    pub async fn sheet_complete(
        &self,
        upload_id: &UploadId,
        sheet_number: u32,
        valid_sheets: Vec<String>,
    ) -> Result<PipelineProgress, RuntimeError> {
        self.send_progress(upload_id, |reply| Command::SheetComplete {
            sheet_number,
            valid_sheets,
            reply,
        })
        .await
    }

    pub async fn tile_complete(
        &self,
        upload_id: &UploadId,
        sheet_number: u32,
    ) -> Result<PipelineProgress, RuntimeError> {
        self.send_progress(upload_id, |reply| Command::TileComplete { sheet_number, reply }).await
    }

    pub async fn marker_complete(
        &self,
        upload_id: &UploadId,
        sheet_number: u32,
    ) -> Result<PipelineProgress, RuntimeError> {
        self.send_progress(upload_id, |reply| Command::MarkerComplete { sheet_number, reply })
            .await
    }

    pub async fn retry_dispatch(
        &self,
        upload_id: &UploadId,
    ) -> Result<PipelineProgress, RuntimeError> {
        self.send_progress(upload_id, |reply| Command::RetryDispatch { reply }).await
    }

    pub async fn progress(&self, upload_id: &UploadId) -> Result<PipelineProgress, RuntimeError> {
        self.send_progress(upload_id, |reply| Command::Progress { reply }).await
    }

    /// Deliver a fired deadline alarm. Alarms for unknown uploads are
    /// dropped.
    pub async fn alarm(&self, upload_id: &UploadId) {
        if let Some(tx) = self.sender_for(upload_id, false) {
            let _ = tx.send(Command::Alarm).await;
        }
    }

    async fn send_progress(
        &self,
        upload_id: &UploadId,
        make: impl FnOnce(ProgressReply) -> Command,
    ) -> Result<PipelineProgress, RuntimeError> {
        let Some(tx) = self.sender_for(upload_id, false) else {
            return Err(CoordinatorError::NotInitialized(upload_id.clone()).into());
        };
        let (reply, rx) = oneshot::channel();
        tx.send(make(reply)).await.map_err(|_| RuntimeError::ActorGone(upload_id.clone()))?;
        rx.await.map_err(|_| RuntimeError::ActorGone(upload_id.clone()))?
    }

    /// Look up (or spawn) the actor for an upload. With `create_missing`
    /// false, uploads without a stored row yield `None`.
    fn sender_for(&self, upload_id: &UploadId, create_missing: bool) -> Option<mpsc::Sender<Command>> {
        let mut actors = self.actors.lock();
        if let Some(tx) = actors.get(upload_id.as_str()) {
            return Some(tx.clone());
        }

        let row = self.engine.store.load_coordinator(upload_id);
        if row.is_none() && !create_missing {
            return None;
        }
        if let Some(row) = &row {
            self.rearm_alarm(row);
        }

        let (tx, rx) = mpsc::channel(64);
        let coordinator =
            Coordinator::from_row(Arc::clone(&self.engine), upload_id.clone(), row);
        tokio::spawn(run_actor(coordinator, rx));
        actors.insert(upload_id.to_string(), tx.clone());
        Some(tx)
    }

    /// Re-arm a rehydrated row's alarm from its persisted wake time. An
    /// already-past deadline fires on the monitor's next tick, never early.
    fn rearm_alarm(&self, row: &CoordinatorRow) {
        if row.state.status.is_terminal() {
            return;
        }
        let Some(wake_at) = row.wake_at else { return };
        let now_ms = self.engine.clock.epoch_ms();
        let remaining = Duration::from_millis(wake_at.saturating_sub(now_ms));
        self.engine.executor.scheduler().lock().set_timer(
            TimerId::deadline(&row.state.upload_id).to_string(),
            remaining,
            self.engine.clock.now(),
        );
    }
}

async fn run_actor<C: Clock>(mut coordinator: Coordinator<C>, mut rx: mpsc::Receiver<Command>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            Command::Initialize { total_sheets, timeout_ms, reply } => {
                let _ = reply.send(coordinator.initialize(total_sheets, timeout_ms));
            }
            Command::SheetComplete { sheet_number, valid_sheets, reply } => {
                let _ = reply.send(coordinator.sheet_complete(sheet_number, valid_sheets));
            }
            Command::TileComplete { sheet_number, reply } => {
                let _ = reply.send(coordinator.tile_complete(sheet_number));
            }
            Command::MarkerComplete { sheet_number, reply } => {
                let _ = reply.send(coordinator.marker_complete(sheet_number));
            }
            Command::RetryDispatch { reply } => {
                let _ = reply.send(coordinator.retry_dispatch());
            }
            Command::Progress { reply } => {
                let _ = reply.send(coordinator.progress());
            }
            Command::Alarm => coordinator.alarm(),
        }
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
