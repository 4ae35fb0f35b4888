// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;

fn state(total: u32) -> CoordinatorState {
    CoordinatorState::new(UploadId::new("upl-1"), total, 1_000_000)
}

#[test]
fn new_state_starts_in_progress_and_empty() {
    let s = state(3);
    assert_eq!(s.status, PipelineStatus::InProgress);
    assert!(s.completed_sheets.is_empty());
    assert!(s.completed_tiles.is_empty());
    assert!(s.completed_markers.is_empty());
    assert_eq!(s.percent(), 0);
}

#[test]
fn record_is_set_insert_idempotent() {
    let mut s = state(3);
    assert!(s.record(Stage::Metadata, 2).unwrap());
    assert!(!s.record(Stage::Metadata, 2).unwrap());
    assert_eq!(s.completed_sheets.len(), 1);
}

#[test]
fn record_rejects_out_of_range() {
    let mut s = state(3);
    assert!(matches!(
        s.record(Stage::Metadata, 0),
        Err(CoordinatorError::SheetOutOfRange { sheet_number: 0, total_sheets: 3 })
    ));
    assert!(matches!(
        s.record(Stage::Tiles, 4),
        Err(CoordinatorError::SheetOutOfRange { sheet_number: 4, total_sheets: 3 })
    ));
    assert!(s.completed_sheets.is_empty());
    assert!(s.completed_tiles.is_empty());
}

#[test]
fn stage_full_after_all_sheets() {
    let mut s = state(2);
    s.record(Stage::Tiles, 2).unwrap();
    assert!(!s.stage_full(Stage::Tiles));
    s.record(Stage::Tiles, 1).unwrap();
    assert!(s.stage_full(Stage::Tiles));
    // Other stages unaffected
    assert!(!s.stage_full(Stage::Metadata));
    assert!(!s.stage_full(Stage::Markers));
}

#[test]
fn percent_tracks_metadata_stage_only() {
    let mut s = state(4);
    s.record(Stage::Metadata, 1).unwrap();
    assert_eq!(s.percent(), 25);
    s.record(Stage::Metadata, 2).unwrap();
    assert_eq!(s.percent(), 50);
    // Tile completions do not move the percentage
    s.record(Stage::Tiles, 1).unwrap();
    assert_eq!(s.percent(), 50);
}

#[test]
fn progress_snapshot_lists_are_ascending() {
    let mut s = state(3);
    s.record(Stage::Metadata, 3).unwrap();
    s.record(Stage::Metadata, 1).unwrap();
    s.record(Stage::Metadata, 2).unwrap();
    let p = s.progress();
    assert_eq!(p.completed_sheets, vec![1, 2, 3]);
    assert_eq!(p.progress, 100);
    assert_eq!(p.status, PipelineStatus::InProgress);
}

#[test]
fn matches_init_compares_inputs() {
    let s = state(3);
    assert!(s.matches_init(&UploadId::new("upl-1"), 3));
    assert!(!s.matches_init(&UploadId::new("upl-1"), 4));
    assert!(!s.matches_init(&UploadId::new("upl-2"), 3));
}

#[test]
fn progress_serializes_camel_case() {
    let p = state(2).progress();
    let json = serde_json::to_value(&p).unwrap();
    assert!(json.get("uploadId").is_some());
    assert!(json.get("totalSheets").is_some());
    assert!(json.get("completedSheets").is_some());
    assert!(json.get("createdAt").is_some());
}

proptest! {
    /// Serialized state reloads byte-equal for the same logical state:
    /// BTreeSet ordering makes the JSON canonical.
    #[test]
    fn state_json_round_trips_byte_equal(
        total in 1u32..40,
        sheets in proptest::collection::btree_set(1u32..40, 0..20),
        tiles in proptest::collection::btree_set(1u32..40, 0..20),
    ) {
        let mut s = state(total);
        for n in sheets.into_iter().filter(|n| *n <= total) {
            s.record(Stage::Metadata, n).unwrap();
        }
        for n in tiles.into_iter().filter(|n| *n <= total) {
            s.record(Stage::Tiles, n).unwrap();
        }

        let bytes = serde_json::to_vec(&s).unwrap();
        let reloaded: CoordinatorState = serde_json::from_slice(&bytes).unwrap();
        prop_assert_eq!(&reloaded, &s);
        let rewritten = serde_json::to_vec(&reloaded).unwrap();
        prop_assert_eq!(rewritten, bytes);
    }
}
