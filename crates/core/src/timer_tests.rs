// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn deadline_id_round_trips() {
    let upload = UploadId::new("upl-abc123");
    let id = TimerId::deadline(&upload);
    assert_eq!(id.as_str(), "deadline:upl-abc123");

    match id.kind() {
        Some(TimerKind::Deadline { upload_id }) => assert_eq!(upload_id, "upl-abc123"),
        other => panic!("unexpected kind: {other:?}"),
    }
}

#[parameterized(
    empty = { "" },
    bare_prefix = { "deadline:" },
    unknown = { "liveness:job-1" },
    random = { "tmr-xyz" },
)]
fn unrecognized_ids_parse_to_none(id: &str) {
    assert!(TimerKind::parse(id).is_none());
}

#[test]
fn kind_to_timer_id_is_canonical() {
    let kind = TimerKind::Deadline { upload_id: "u7" };
    assert_eq!(kind.to_timer_id().as_str(), "deadline:u7");
}
