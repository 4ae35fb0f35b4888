// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use plr_core::{CoordinatorState, Stage};

fn progress() -> PipelineProgress {
    let mut state = CoordinatorState::new(UploadId::new("u1"), 3, 1000);
    state.record(Stage::Metadata, 1).unwrap();
    state.record(Stage::Metadata, 2).unwrap();
    state.record(Stage::Tiles, 1).unwrap();
    state.progress()
}

#[test]
fn summary_counts_from_progress() {
    let summary = ProgressSummary::from(&progress());
    assert_eq!(summary.completed_sheets, 2);
    assert_eq!(summary.completed_tiles, 1);
    assert_eq!(summary.completed_markers, 0);
    assert_eq!(summary.total_sheets, 3);
}

#[test]
fn complete_response_wire_shape() {
    let response = CompleteResponse::from(&progress());
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["progress"]["completedSheets"], 2);
    assert_eq!(json["progress"]["totalSheets"], 3);
    assert_eq!(json["progress"]["status"], "in_progress");
}

#[test]
fn sheet_view_drops_internal_columns() {
    let sheet = plr_core::PlanSheet::placeholder(UploadId::new("u1"), "plan-1", 4);
    let view = SheetView::from(sheet.clone());
    let json = serde_json::to_value(&view).unwrap();
    assert_eq!(json["sheetNumber"], 4);
    assert_eq!(json["metadataStatus"], "pending");
    // upload/plan ids live in the path, not in each row
    assert!(json.get("uploadId").is_none());
    assert!(json.get("planId").is_none());
}

#[test]
fn api_error_round_trips() {
    let err = ApiError::new("not found");
    let json = serde_json::to_string(&err).unwrap();
    assert_eq!(json, r#"{"error":"not found"}"#);
}
