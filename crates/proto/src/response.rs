// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Response DTOs.

use plr_core::{
    CoordinatorState, MetadataStatus, PipelineProgress, PipelineStatus, PlanSheet, SheetId,
    StageStatus, UploadId,
};
use serde::{Deserialize, Serialize};

/// Error payload for 4xx/5xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }
}

/// `POST /plans/{id}/initialize` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializeResponse {
    pub success: bool,
    pub state: CoordinatorState,
}

/// Compact progress block returned from completion posts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub completed_sheets: u32,
    pub completed_tiles: u32,
    pub completed_markers: u32,
    pub total_sheets: u32,
    pub status: PipelineStatus,
}

impl From<&PipelineProgress> for ProgressSummary {
    fn from(p: &PipelineProgress) -> Self {
        Self {
            completed_sheets: p.completed_sheets.len() as u32,
            completed_tiles: p.completed_tiles.len() as u32,
            completed_markers: p.completed_markers.len() as u32,
            total_sheets: p.total_sheets,
            status: p.status,
        }
    }
}

/// `POST /plans/{id}/{sheet,tile,marker}-complete` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteResponse {
    pub success: bool,
    pub progress: ProgressSummary,
}

impl From<&PipelineProgress> for CompleteResponse {
    fn from(p: &PipelineProgress) -> Self {
        Self { success: true, progress: p.into() }
    }
}

/// `POST /uploads` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub upload_id: UploadId,
    pub total_sheets: u32,
}

/// One `plan_sheets` row as shown to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetView {
    pub id: SheetId,
    pub sheet_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_name: Option<String>,
    pub sheet_key: String,
    pub metadata_status: MetadataStatus,
    pub tile_status: StageStatus,
    pub marker_status: StageStatus,
}

impl From<PlanSheet> for SheetView {
    fn from(s: PlanSheet) -> Self {
        Self {
            id: s.id,
            sheet_number: s.sheet_number,
            sheet_name: s.sheet_name,
            sheet_key: s.sheet_key,
            metadata_status: s.metadata_status,
            tile_status: s.tile_status,
            marker_status: s.marker_status,
        }
    }
}

/// `GET /plans/{id}/sheets` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetListResponse {
    pub sheets: Vec<SheetView>,
}

/// Per-queue block of the health response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueHealth {
    pub name: String,
    pub depth: usize,
    pub in_flight: usize,
    pub dead: usize,
}

/// `GET /healthz` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub active_coordinators: usize,
    pub queues: Vec<QueueHealth>,
}

/// `GET /queues/{name}/dead` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadItemsResponse {
    pub items: Vec<serde_json::Value>,
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
