// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline stages and the queue payloads that fan out per sheet.
//!
//! Payload field names follow the wire convention (camelCase) so queue
//! messages match what external tooling and the mobile client expect.

use crate::job::SheetId;
use crate::state::UploadId;
use serde::{Deserialize, Serialize};

/// The three internally-parallel pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Metadata,
    Tiles,
    Markers,
}

crate::wire_display! {
    Stage {
        Metadata => "metadata",
        Tiles => "tiles",
        Markers => "markers",
    }
}

/// Stage-1 job: rasterize one page and extract its sheet metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataJob {
    pub upload_id: UploadId,
    pub sheet_number: u32,
    /// Object-store key of the rasterized page (written by the worker).
    pub sheet_key: String,
    pub plan_id: String,
    pub project_id: String,
    pub organization_id: String,
}

/// Stage-2 job: generate deep-zoom tiles for one sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileJob {
    pub upload_id: UploadId,
    pub sheet_id: SheetId,
    pub sheet_number: u32,
    pub sheet_key: String,
    pub plan_id: String,
    pub project_id: String,
    pub organization_id: String,
    pub total_sheets: u32,
}

/// Stage-3 job: detect callout markers on one sheet.
///
/// `valid_sheets` is the cross-reference context: extracted sheet names that
/// match the marker reference format, ascending by sheet number. An empty
/// list means the detector runs without context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerJob {
    pub upload_id: UploadId,
    pub plan_id: String,
    pub organization_id: String,
    pub project_id: String,
    pub sheet_id: SheetId,
    pub sheet_number: u32,
    pub sheet_key: String,
    pub total_sheets: u32,
    pub valid_sheets: Vec<String>,
}

#[cfg(test)]
#[path = "stage_tests.rs"]
mod tests;
