// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Effects represent side effects the coordinator needs to perform

use crate::stage::{MarkerJob, TileJob};
use crate::state::UploadId;
use crate::timer::TimerId;
use serde::{Deserialize, Serialize};

/// Effects executed by the engine on behalf of a coordinator handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Effect {
    // === Fan-out ===
    /// Publish one TileJob per sheet onto the tile queue
    EnqueueTileJobs { jobs: Vec<TileJob> },

    /// Publish one MarkerJob per sheet onto the marker queue
    EnqueueMarkerJobs { jobs: Vec<MarkerJob> },

    // === Deadline alarm ===
    /// Arm the upload's deadline alarm
    SetDeadline { id: TimerId, duration_ms: u64 },

    /// Disarm the upload's deadline alarm
    CancelDeadline { id: TimerId },

    // === Processing-job row updates ===
    /// Promote the job row to `processing` (first sheet completion)
    JobProcessing { upload_id: UploadId },

    /// Mark the job row `complete`
    JobComplete { upload_id: UploadId },

    /// Mark the job row `failed` with a diagnostic
    JobFailed { upload_id: UploadId, error: String },

    /// Record a diagnostic on the job row without a status change
    JobDiagnostic { upload_id: UploadId, error: String },
}

impl Effect {
    /// Effect name for log spans (e.g., "enqueue_tile_jobs")
    pub fn name(&self) -> &'static str {
        match self {
            Effect::EnqueueTileJobs { .. } => "enqueue_tile_jobs",
            Effect::EnqueueMarkerJobs { .. } => "enqueue_marker_jobs",
            Effect::SetDeadline { .. } => "set_deadline",
            Effect::CancelDeadline { .. } => "cancel_deadline",
            Effect::JobProcessing { .. } => "job_processing",
            Effect::JobComplete { .. } => "job_complete",
            Effect::JobFailed { .. } => "job_failed",
            Effect::JobDiagnostic { .. } => "job_diagnostic",
        }
    }

    /// Key-value pairs for structured logging
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        match self {
            Effect::EnqueueTileJobs { jobs } => vec![("jobs", jobs.len().to_string())],
            Effect::EnqueueMarkerJobs { jobs } => vec![("jobs", jobs.len().to_string())],
            Effect::SetDeadline { id, duration_ms } => vec![
                ("timer_id", id.to_string()),
                ("duration_ms", duration_ms.to_string()),
            ],
            Effect::CancelDeadline { id } => vec![("timer_id", id.to_string())],
            Effect::JobProcessing { upload_id } => vec![("upload_id", upload_id.to_string())],
            Effect::JobComplete { upload_id } => vec![("upload_id", upload_id.to_string())],
            Effect::JobFailed { upload_id, error } => {
                vec![("upload_id", upload_id.to_string()), ("error", error.clone())]
            }
            Effect::JobDiagnostic { upload_id, error } => {
                vec![("upload_id", upload_id.to_string()), ("error", error.clone())]
            }
        }
    }

    /// Whether to log both 'started' and 'completed' or just one line,
    /// to control verbosity for frequent effects.
    pub fn verbose(&self) -> bool {
        !matches!(self, Effect::SetDeadline { .. } | Effect::CancelDeadline { .. })
    }
}

#[cfg(test)]
#[path = "effect_tests.rs"]
mod tests;
