// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn marker_job_wire_shape() {
    let job = MarkerJob {
        upload_id: UploadId::new("u1"),
        plan_id: "plan-1".into(),
        organization_id: "org-1".into(),
        project_id: "proj-1".into(),
        sheet_id: SheetId::new("sht-abc"),
        sheet_number: 2,
        sheet_key: "organizations/org-1/projects/proj-1/plans/plan-1/sheets/2/page.pdf".into(),
        total_sheets: 3,
        valid_sheets: vec!["A5".into(), "S12".into()],
    };

    let json = serde_json::to_value(&job).unwrap();
    assert_eq!(json["uploadId"], "u1");
    assert_eq!(json["sheetNumber"], 2);
    assert_eq!(json["totalSheets"], 3);
    assert_eq!(json["validSheets"], serde_json::json!(["A5", "S12"]));
    assert_eq!(json["organizationId"], "org-1");

    let back: MarkerJob = serde_json::from_value(json).unwrap();
    assert_eq!(back, job);
}

#[test]
fn metadata_job_round_trips() {
    let job = MetadataJob {
        upload_id: UploadId::new("u1"),
        sheet_number: 1,
        sheet_key: "k".into(),
        plan_id: "p".into(),
        project_id: "pr".into(),
        organization_id: "o".into(),
    };
    let json = serde_json::to_string(&job).unwrap();
    let back: MetadataJob = serde_json::from_str(&json).unwrap();
    assert_eq!(back, job);
}

#[test]
fn stage_display() {
    assert_eq!(Stage::Metadata.to_string(), "metadata");
    assert_eq!(Stage::Tiles.to_string(), "tiles");
    assert_eq!(Stage::Markers.to_string(), "markers");
}
