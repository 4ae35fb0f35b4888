// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable per-upload coordinator state.
//!
//! One `CoordinatorState` exists per upload. All mutation happens inside the
//! upload's single-writer actor; completion recording is set-insert
//! idempotent so queue redeliveries are harmless.

use crate::error::CoordinatorError;
use crate::stage::Stage;
use crate::status::PipelineStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

crate::define_id! {
    /// Identifier of one uploaded plan PDF.
    ///
    /// Upload IDs are externally generated by the client; `generate()` exists
    /// for tests and tooling.
    pub struct UploadId("upl-");
}

/// Durable state of one upload's pipeline coordinator.
///
/// Completion sets use `BTreeSet` so the JSON serialization is canonical:
/// the same logical state always serializes to the same bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorState {
    pub upload_id: UploadId,
    pub total_sheets: u32,
    pub completed_sheets: BTreeSet<u32>,
    pub completed_tiles: BTreeSet<u32>,
    pub completed_markers: BTreeSet<u32>,
    pub status: PipelineStatus,
    /// Epoch milliseconds at initialization.
    pub created_at: u64,
}

impl CoordinatorState {
    /// Fresh state as written by `initialize`.
    pub fn new(upload_id: UploadId, total_sheets: u32, created_at: u64) -> Self {
        Self {
            upload_id,
            total_sheets,
            completed_sheets: BTreeSet::new(),
            completed_tiles: BTreeSet::new(),
            completed_markers: BTreeSet::new(),
            status: PipelineStatus::InProgress,
            created_at,
        }
    }

    /// Whether a repeated `initialize` carries the same inputs.
    pub fn matches_init(&self, upload_id: &UploadId, total_sheets: u32) -> bool {
        self.upload_id == *upload_id && self.total_sheets == total_sheets
    }

    /// Record one stage completion for a sheet.
    ///
    /// Returns `true` if the sheet was newly inserted, `false` on replay.
    /// Out-of-range sheet numbers are rejected so the sets stay within
    /// `{1..total_sheets}`.
    pub fn record(&mut self, stage: Stage, sheet_number: u32) -> Result<bool, CoordinatorError> {
        if sheet_number == 0 || sheet_number > self.total_sheets {
            return Err(CoordinatorError::SheetOutOfRange {
                sheet_number,
                total_sheets: self.total_sheets,
            });
        }
        Ok(self.completions_mut(stage).insert(sheet_number))
    }

    /// Whether every sheet has completed the given stage.
    pub fn stage_full(&self, stage: Stage) -> bool {
        self.completions(stage).len() as u32 == self.total_sheets
    }

    pub fn completions(&self, stage: Stage) -> &BTreeSet<u32> {
        match stage {
            Stage::Metadata => &self.completed_sheets,
            Stage::Tiles => &self.completed_tiles,
            Stage::Markers => &self.completed_markers,
        }
    }

    fn completions_mut(&mut self, stage: Stage) -> &mut BTreeSet<u32> {
        match stage {
            Stage::Metadata => &mut self.completed_sheets,
            Stage::Tiles => &mut self.completed_tiles,
            Stage::Markers => &mut self.completed_markers,
        }
    }

    /// Integer percentage of completed metadata extraction (0–100).
    ///
    /// Weighted by the first stage only, even after the pipeline has moved
    /// into the tile or marker stages.
    pub fn percent(&self) -> u8 {
        if self.total_sheets == 0 {
            return 0;
        }
        ((self.completed_sheets.len() as u64 * 100) / self.total_sheets as u64) as u8
    }

    /// Read-only snapshot for the progress endpoint and completion replies.
    pub fn progress(&self) -> PipelineProgress {
        PipelineProgress {
            upload_id: self.upload_id.clone(),
            total_sheets: self.total_sheets,
            completed_sheets: self.completed_sheets.iter().copied().collect(),
            completed_tiles: self.completed_tiles.iter().copied().collect(),
            completed_markers: self.completed_markers.iter().copied().collect(),
            status: self.status,
            created_at: self.created_at,
            progress: self.percent(),
        }
    }
}

/// Snapshot of coordinator progress returned to clients.
///
/// Sheet lists are ascending (sourced from ordered sets).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineProgress {
    pub upload_id: UploadId,
    pub total_sheets: u32,
    pub completed_sheets: Vec<u32>,
    pub completed_tiles: Vec<u32>,
    pub completed_markers: Vec<u32>,
    pub status: PipelineStatus,
    pub created_at: u64,
    /// Integer 0–100, metadata-stage weighted.
    pub progress: u8,
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
