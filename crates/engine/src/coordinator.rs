// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-upload pipeline coordinator.
//!
//! All handlers run inside the upload's single-writer actor, so there is no
//! concurrency within one upload. Completion recording is set-insert
//! idempotent; the stage-boundary transition is additionally latched on the
//! current status, so replayed completions can never fan a stage out twice.
//! The latch status (`triggering_*`) is persisted before any downstream
//! enqueue: a crash mid-fan-out leaves the row identifying the plan as
//! needing operator retry instead of silently re-dispatching.

use crate::error::RuntimeError;
use crate::Engine;
use plr_core::{
    Clock, CoordinatorError, CoordinatorState, Effect, MarkerJob, PipelineProgress,
    PipelineStatus, ProcessingJob, Stage, TileJob, TimerId, UploadId,
};
use plr_storage::CoordinatorRow;
use std::sync::Arc;
use tracing::{error, info, warn};

/// `last_error` written when the deadline alarm fails a pipeline.
pub(crate) const TIMEOUT_MESSAGE: &str =
    "Processing timeout - not all steps completed within time limit";

/// Coordinator actor state for one upload.
pub struct Coordinator<C: Clock> {
    engine: Arc<Engine<C>>,
    upload_id: UploadId,
    state: Option<CoordinatorState>,
    wake_at: Option<u64>,
}

impl<C: Clock> Coordinator<C> {
    /// Build from a stored row (rehydration) or empty (fresh upload).
    pub fn from_row(
        engine: Arc<Engine<C>>,
        upload_id: UploadId,
        row: Option<CoordinatorRow>,
    ) -> Self {
        let (state, wake_at) = match row {
            Some(row) => (Some(row.state), row.wake_at),
            None => (None, None),
        };
        Self { engine, upload_id, state, wake_at }
    }

    /// Create the durable state and arm the deadline alarm.
    ///
    /// Idempotent for identical inputs; divergent re-initialization is an
    /// error so a duplicate upload can never silently change shape.
    pub fn initialize(
        &mut self,
        total_sheets: u32,
        timeout_ms: Option<u64>,
    ) -> Result<CoordinatorState, RuntimeError> {
        if total_sheets == 0 {
            return Err(CoordinatorError::InvalidTotalSheets.into());
        }

        if let Some(state) = &self.state {
            if state.matches_init(&self.upload_id, total_sheets) {
                info!(upload = %self.upload_id, "re-initialize with identical inputs, no-op");
                return Ok(state.clone());
            }
            return Err(CoordinatorError::AlreadyInitializedDifferently {
                upload_id: self.upload_id.clone(),
                existing: state.total_sheets,
                requested: total_sheets,
            }
            .into());
        }

        let timeout_ms = timeout_ms.unwrap_or(self.engine.default_timeout_ms);
        let now_ms = self.engine.clock.epoch_ms();
        let state = CoordinatorState::new(self.upload_id.clone(), total_sheets, now_ms);

        self.state = Some(state.clone());
        self.wake_at = Some(now_ms + timeout_ms);
        self.persist()?;

        self.engine.executor.execute(Effect::SetDeadline {
            id: TimerId::deadline(&self.upload_id),
            duration_ms: timeout_ms,
        })?;

        info!(upload = %self.upload_id, total_sheets, timeout_ms, "pipeline initialized");
        Ok(state)
    }

    /// Record a metadata extraction completion; fan tiles out when the
    /// stage is full.
    ///
    /// `valid_sheets` is accepted for wire compatibility and unused: marker
    /// context is re-derived from the sheet rows at the marker boundary.
    pub fn sheet_complete(
        &mut self,
        sheet_number: u32,
        valid_sheets: Vec<String>,
    ) -> Result<PipelineProgress, RuntimeError> {
        let _ = valid_sheets;
        let state = self.state_mut()?;
        let newly = state.record(Stage::Metadata, sheet_number)?;

        if newly && state.completed_sheets.len() == 1 {
            self.note_job(Effect::JobProcessing { upload_id: self.upload_id.clone() });
        }

        let state = self.state_ref()?;
        if state.stage_full(Stage::Metadata) && state.status == PipelineStatus::InProgress {
            self.set_status(PipelineStatus::TriggeringTiles);
            self.persist()?;
            if let Err(e) = self.run_tile_dispatch() {
                error!(
                    upload = %self.upload_id,
                    error = %e,
                    "tile fan-out failed, pipeline parked until deadline or operator retry"
                );
                self.note_job(Effect::JobDiagnostic {
                    upload_id: self.upload_id.clone(),
                    error: format!("tile dispatch failed: {e}"),
                });
            }
        } else if newly {
            self.persist()?;
        }

        Ok(self.state_ref()?.progress())
    }

    /// Record a tile completion; fan markers out when the stage is full.
    ///
    /// Completions arriving in unexpected statuses are absorbed (the set
    /// still grows) but trigger nothing: the status latch owns transitions.
    pub fn tile_complete(&mut self, sheet_number: u32) -> Result<PipelineProgress, RuntimeError> {
        let state = self.state_mut()?;
        let newly = state.record(Stage::Tiles, sheet_number)?;

        let state = self.state_ref()?;
        if state.stage_full(Stage::Tiles) && state.status == PipelineStatus::TilesInProgress {
            self.set_status(PipelineStatus::TriggeringMarkers);
            self.persist()?;
            if let Err(e) = self.run_marker_dispatch() {
                error!(
                    upload = %self.upload_id,
                    error = %e,
                    "marker fan-out failed, pipeline parked until deadline or operator retry"
                );
                self.note_job(Effect::JobDiagnostic {
                    upload_id: self.upload_id.clone(),
                    error: format!("marker dispatch failed: {e}"),
                });
            }
        } else if newly {
            self.persist()?;
        }

        Ok(self.state_ref()?.progress())
    }

    /// Record a marker completion; finish the pipeline when the stage is
    /// full. The alarm is disarmed before the terminal status is persisted.
    pub fn marker_complete(&mut self, sheet_number: u32) -> Result<PipelineProgress, RuntimeError> {
        let state = self.state_mut()?;
        let newly = state.record(Stage::Markers, sheet_number)?;

        let state = self.state_ref()?;
        if state.stage_full(Stage::Markers) && state.status == PipelineStatus::MarkersInProgress {
            self.engine
                .executor
                .execute(Effect::CancelDeadline { id: TimerId::deadline(&self.upload_id) })?;
            self.wake_at = None;
            self.set_status(PipelineStatus::Complete);
            self.persist()?;
            self.note_job(Effect::JobComplete { upload_id: self.upload_id.clone() });
            info!(upload = %self.upload_id, "pipeline complete");
        } else if newly {
            self.persist()?;
        }

        Ok(self.state_ref()?.progress())
    }

    /// Deadline alarm callback. Fails every pipeline that has not reached
    /// `complete`; fires after completion are ignored.
    pub fn alarm(&mut self) {
        let Some(state) = self.state.as_mut() else {
            warn!(upload = %self.upload_id, "alarm fired for unknown coordinator state");
            return;
        };
        if state.status.is_terminal() {
            return;
        }

        warn!(
            upload = %self.upload_id,
            status = %state.status,
            sheets = state.completed_sheets.len(),
            tiles = state.completed_tiles.len(),
            markers = state.completed_markers.len(),
            "deadline alarm fired, failing pipeline"
        );
        state.status = PipelineStatus::FailedTimeout;
        self.wake_at = None;
        if let Err(e) = self.persist() {
            error!(upload = %self.upload_id, error = %e, "failed to persist timeout state");
        }
        self.note_job(Effect::JobFailed {
            upload_id: self.upload_id.clone(),
            error: TIMEOUT_MESSAGE.to_string(),
        });
    }

    /// Operator re-drive of a fan-out that previously failed mid-dispatch.
    /// Only legal from a `triggering_*` latch; dispatch errors are returned
    /// to the operator instead of swallowed.
    pub fn retry_dispatch(&mut self) -> Result<PipelineProgress, RuntimeError> {
        let status = self.state_ref()?.status;
        match status {
            PipelineStatus::TriggeringTiles => self.run_tile_dispatch()?,
            PipelineStatus::TriggeringMarkers => self.run_marker_dispatch()?,
            status => return Err(CoordinatorError::NotRetryable { status }.into()),
        }
        info!(upload = %self.upload_id, "operator retry-dispatch succeeded");
        Ok(self.state_ref()?.progress())
    }

    /// Read-only progress snapshot.
    pub fn progress(&self) -> Result<PipelineProgress, RuntimeError> {
        Ok(self.state_ref()?.progress())
    }

    // === fan-out ===

    /// Enqueue one TileJob per plan sheet, then advance to `tiles_in_progress`.
    fn run_tile_dispatch(&mut self) -> Result<(), RuntimeError> {
        let state = self.state_ref()?;
        let job = self.require_job()?;
        let sheets = self.engine.store.sheets_for_upload(&self.upload_id);
        if sheets.is_empty() {
            return Err(RuntimeError::NoSheetRows(self.upload_id.clone()));
        }

        let jobs: Vec<TileJob> = sheets
            .iter()
            .map(|s| TileJob {
                upload_id: self.upload_id.clone(),
                sheet_id: s.id.clone(),
                sheet_number: s.sheet_number,
                sheet_key: s.sheet_key.clone(),
                plan_id: job.plan_id.clone(),
                project_id: job.project_id.clone(),
                organization_id: job.organization_id.clone(),
                total_sheets: state.total_sheets,
            })
            .collect();
        let count = jobs.len();

        self.engine.executor.execute(Effect::EnqueueTileJobs { jobs })?;
        info!(upload = %self.upload_id, jobs = count, "tile jobs enqueued");

        self.set_status(PipelineStatus::TilesInProgress);
        self.persist()
    }

    /// Marker fan-out: query extracted sheets, derive the cross-reference
    /// context, enqueue one MarkerJob per sheet, then advance to
    /// `markers_in_progress`. Zero extracted sheets aborts the fan-out.
    fn run_marker_dispatch(&mut self) -> Result<(), RuntimeError> {
        let state = self.state_ref()?;
        let job = self.require_job()?;
        let sheets = self.engine.store.extracted_sheets(&self.upload_id);
        if sheets.is_empty() {
            return Err(CoordinatorError::NoExtractedSheets(self.upload_id.clone()).into());
        }

        let valid_sheets: Vec<String> = sheets
            .iter()
            .filter_map(|s| s.sheet_name.as_deref())
            .filter(|name| self.engine.marker_context.is_match(name))
            .map(str::to_string)
            .collect();

        let jobs: Vec<MarkerJob> = sheets
            .iter()
            .map(|s| MarkerJob {
                upload_id: self.upload_id.clone(),
                plan_id: job.plan_id.clone(),
                organization_id: job.organization_id.clone(),
                project_id: job.project_id.clone(),
                sheet_id: s.id.clone(),
                sheet_number: s.sheet_number,
                sheet_key: s.sheet_key.clone(),
                total_sheets: state.total_sheets,
                valid_sheets: valid_sheets.clone(),
            })
            .collect();
        let count = jobs.len();

        self.engine.executor.execute(Effect::EnqueueMarkerJobs { jobs })?;
        info!(
            upload = %self.upload_id,
            jobs = count,
            context = valid_sheets.len(),
            "marker jobs enqueued"
        );

        self.set_status(PipelineStatus::MarkersInProgress);
        self.persist()
    }

    // === helpers ===

    fn state_ref(&self) -> Result<&CoordinatorState, RuntimeError> {
        self.state
            .as_ref()
            .ok_or_else(|| CoordinatorError::NotInitialized(self.upload_id.clone()).into())
    }

    fn state_mut(&mut self) -> Result<&mut CoordinatorState, RuntimeError> {
        self.state
            .as_mut()
            .ok_or_else(|| CoordinatorError::NotInitialized(self.upload_id.clone()).into())
    }

    fn set_status(&mut self, next: PipelineStatus) {
        if let Some(state) = self.state.as_mut() {
            if !state.status.can_advance_to(next) {
                warn!(
                    upload = %self.upload_id,
                    from = %state.status,
                    to = %next,
                    "refusing non-monotonic status transition"
                );
                return;
            }
            state.status = next;
        }
    }

    /// Persist the durable row. Must happen before any reply that implies
    /// the contained state.
    fn persist(&self) -> Result<(), RuntimeError> {
        let state = self.state_ref()?;
        self.engine
            .store
            .save_coordinator(CoordinatorRow { state: state.clone(), wake_at: self.wake_at })?;
        Ok(())
    }

    fn require_job(&self) -> Result<ProcessingJob, RuntimeError> {
        self.engine
            .store
            .get_job(&self.upload_id)
            .ok_or_else(|| plr_storage::StoreError::JobNotFound(self.upload_id.clone()).into())
    }

    /// Execute a processing-job row effect, logging instead of failing:
    /// the job row is a projection and must never wedge coordination.
    fn note_job(&self, effect: Effect) {
        if let Err(e) = self.engine.executor.execute(effect) {
            warn!(upload = %self.upload_id, error = %e, "processing-job update failed");
        }
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
