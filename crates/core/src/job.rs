// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Processing-job and plan-sheet rows.
//!
//! One `ProcessingJob` row tracks the externally visible status of an upload;
//! `PlanSheet` rows are written per page by the stage workers. Both mirror
//! the relational layout clients read through the thin status API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::UploadId;

crate::define_id! {
    /// Identifier of one plan sheet (one page of an upload).
    pub struct SheetId("sht-");
}

/// Externally visible status of an upload's processing job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Complete,
    Failed,
}

crate::wire_display! {
    JobStatus {
        Pending => "pending",
        Processing => "processing",
        Complete => "complete",
        Failed => "failed",
    }
}

/// One row per upload, created by intake and owned by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingJob {
    pub upload_id: UploadId,
    pub plan_id: String,
    pub project_id: String,
    pub organization_id: String,
    pub status: JobStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ProcessingJob {
    pub fn new(
        upload_id: UploadId,
        plan_id: impl Into<String>,
        project_id: impl Into<String>,
        organization_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            upload_id,
            plan_id: plan_id.into(),
            project_id: project_id.into(),
            organization_id: organization_id.into(),
            status: JobStatus::Pending,
            started_at: None,
            completed_at: None,
            last_error: None,
            updated_at: now,
        }
    }

    /// Promote `pending → processing` on the first sheet completion.
    /// Replays after the first promotion are no-ops.
    pub fn mark_processing(&mut self, now: DateTime<Utc>) {
        if self.status == JobStatus::Pending {
            self.status = JobStatus::Processing;
            self.started_at = Some(now);
            self.updated_at = now;
        }
    }

    pub fn mark_complete(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Complete;
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    pub fn mark_failed(&mut self, error: impl Into<String>, now: DateTime<Utc>) {
        self.status = JobStatus::Failed;
        self.last_error = Some(error.into());
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    /// Record a diagnostic without changing status (swallowed dispatch
    /// failures land here so a later timeout is attributable).
    pub fn record_error(&mut self, error: impl Into<String>, now: DateTime<Utc>) {
        self.last_error = Some(error.into());
        self.updated_at = now;
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, JobStatus::Complete | JobStatus::Failed)
    }
}

/// Metadata-extraction status of one sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataStatus {
    Pending,
    Extracted,
    Failed,
}

crate::wire_display! {
    MetadataStatus {
        Pending => "pending",
        Extracted => "extracted",
        Failed => "failed",
    }
}

/// Status of a downstream per-sheet stage (tiles, markers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Done,
    Failed,
}

crate::wire_display! {
    StageStatus {
        Pending => "pending",
        Done => "done",
        Failed => "failed",
    }
}

/// One row per page of an upload.
///
/// Inserted as a placeholder by intake, filled in by the metadata worker
/// before it posts `sheet-complete`, then updated in place by later stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSheet {
    pub id: SheetId,
    pub upload_id: UploadId,
    pub plan_id: String,
    /// 1-based page index.
    pub sheet_number: u32,
    /// Extracted label (e.g. "A5"); absent until metadata extraction ran,
    /// or when the page carries no recognizable title block.
    pub sheet_name: Option<String>,
    /// Object-store key of the rasterized page.
    pub sheet_key: String,
    pub metadata_status: MetadataStatus,
    pub tile_status: StageStatus,
    pub marker_status: StageStatus,
}

impl PlanSheet {
    /// Placeholder row as inserted by intake before any worker ran.
    pub fn placeholder(upload_id: UploadId, plan_id: impl Into<String>, sheet_number: u32) -> Self {
        Self {
            id: SheetId::generate(),
            upload_id,
            plan_id: plan_id.into(),
            sheet_number,
            sheet_name: None,
            sheet_key: String::new(),
            metadata_status: MetadataStatus::Pending,
            tile_status: StageStatus::Pending,
            marker_status: StageStatus::Pending,
        }
    }
}

crate::test_builder! {
    PlanSheet via PlanSheetBuilder {
        text {
            upload_id: UploadId = "upl-test",
            plan_id: String = "plan-1",
            sheet_key: String = "",
        }
        plain {
            id: SheetId = SheetId::generate(),
            sheet_number: u32 = 1,
            metadata_status: MetadataStatus = MetadataStatus::Pending,
            tile_status: StageStatus = StageStatus::Pending,
            marker_status: StageStatus = StageStatus::Pending,
        }
        maybe {
            sheet_name: String,
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
