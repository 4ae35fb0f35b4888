// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::{TimeZone, Utc};
use plr_core::{JobStatus, MetadataStatus, PipelineStatus, PlanSheet, Stage, StageStatus};
use tempfile::tempdir;

fn now() -> chrono::DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).single().unwrap()
}

fn job(upload: &str) -> ProcessingJob {
    ProcessingJob::new(UploadId::new(upload), "plan-1", "proj-1", "org-1", now())
}

#[test]
fn create_job_rejects_duplicates() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();

    store.create_job(job("u1")).unwrap();
    let err = store.create_job(job("u1")).unwrap_err();
    assert!(matches!(err, StoreError::DuplicateJob(id) if id == "u1"));
}

#[test]
fn update_job_persists_across_reopen() {
    let dir = tempdir().unwrap();
    {
        let store = Store::open(dir.path()).unwrap();
        store.create_job(job("u1")).unwrap();
        store
            .update_job(&UploadId::new("u1"), |j| j.mark_processing(now()))
            .unwrap();
    }

    let store = Store::open(dir.path()).unwrap();
    let loaded = store.get_job(&UploadId::new("u1")).unwrap();
    assert_eq!(loaded.status, JobStatus::Processing);
    assert!(loaded.started_at.is_some());
}

#[test]
fn update_missing_job_errors() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();
    let err = store
        .update_job(&UploadId::new("ghost"), |j| j.mark_complete(now()))
        .unwrap_err();
    assert!(matches!(err, StoreError::JobNotFound(_)));
}

#[test]
fn sheets_for_upload_are_ordered_and_scoped() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();

    store
        .insert_sheets(vec![
            PlanSheet::builder().upload_id("u1").sheet_number(3).build(),
            PlanSheet::builder().upload_id("u1").sheet_number(1).build(),
            PlanSheet::builder().upload_id("u2").sheet_number(2).build(),
        ])
        .unwrap();

    let sheets = store.sheets_for_upload(&UploadId::new("u1"));
    assert_eq!(sheets.len(), 2);
    assert_eq!(sheets[0].sheet_number, 1);
    assert_eq!(sheets[1].sheet_number, 3);
}

#[test]
fn extracted_sheets_filters_metadata_status() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();

    store
        .insert_sheets(vec![
            PlanSheet::builder()
                .upload_id("u1")
                .sheet_number(2)
                .metadata_status(MetadataStatus::Extracted)
                .sheet_name("A6")
                .build(),
            PlanSheet::builder().upload_id("u1").sheet_number(1).build(),
            PlanSheet::builder()
                .upload_id("u1")
                .sheet_number(3)
                .metadata_status(MetadataStatus::Failed)
                .build(),
        ])
        .unwrap();

    let extracted = store.extracted_sheets(&UploadId::new("u1"));
    assert_eq!(extracted.len(), 1);
    assert_eq!(extracted[0].sheet_number, 2);
}

#[test]
fn upsert_sheet_double_update_is_benign() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();

    let mut sheet = PlanSheet::builder().upload_id("u1").sheet_number(1).build();
    sheet.tile_status = StageStatus::Done;
    store.upsert_sheet(sheet.clone()).unwrap();
    store.upsert_sheet(sheet.clone()).unwrap();

    let loaded = store.get_sheet(&sheet.id).unwrap();
    assert_eq!(loaded, sheet);
    assert_eq!(store.sheets_for_upload(&UploadId::new("u1")).len(), 1);
}

#[test]
fn coordinator_round_trip_and_scan() {
    let dir = tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();

    let mut active = CoordinatorState::new(UploadId::new("u1"), 3, 1000);
    active.record(Stage::Metadata, 1).unwrap();
    store
        .save_coordinator(CoordinatorRow { state: active.clone(), wake_at: Some(901_000) })
        .unwrap();

    let mut done = CoordinatorState::new(UploadId::new("u2"), 1, 1000);
    done.status = PipelineStatus::Complete;
    store.save_coordinator(CoordinatorRow { state: done, wake_at: None }).unwrap();

    let mut timed_out = CoordinatorState::new(UploadId::new("u3"), 1, 1000);
    timed_out.status = PipelineStatus::FailedTimeout;
    store.save_coordinator(CoordinatorRow { state: timed_out, wake_at: None }).unwrap();

    let loaded = store.load_coordinator(&UploadId::new("u1")).unwrap();
    assert_eq!(loaded.state, active);
    assert_eq!(loaded.wake_at, Some(901_000));

    let incomplete = store.scan_incomplete();
    assert_eq!(incomplete.len(), 1);
    assert_eq!(incomplete[0].state.upload_id, "u1");
}

#[test]
fn coordinator_state_survives_reopen() {
    let dir = tempdir().unwrap();
    let state = CoordinatorState::new(UploadId::new("u1"), 5, 42);
    {
        let store = Store::open(dir.path()).unwrap();
        store
            .save_coordinator(CoordinatorRow { state: state.clone(), wake_at: Some(900_042) })
            .unwrap();
    }

    let store = Store::open(dir.path()).unwrap();
    let row = store.load_coordinator(&UploadId::new("u1")).unwrap();
    assert_eq!(row.state, state);
}
