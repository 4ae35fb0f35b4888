// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use plr_core::keys::PlanKeys;
use tempfile::tempdir;
use yare::parameterized;

#[tokio::test]
async fn put_get_round_trip() {
    let dir = tempdir().unwrap();
    let store = DirObjectStore::new(dir.path());
    let keys = PlanKeys::new("org-1", "proj-1", "plan-1");

    let key = keys.sheet_pdf(1);
    store.put(&key, b"pdf bytes").await.unwrap();

    assert!(store.exists(&key).await.unwrap());
    assert_eq!(store.get(&key).await.unwrap(), b"pdf bytes");
}

#[tokio::test]
async fn put_is_idempotent_by_key() {
    let dir = tempdir().unwrap();
    let store = DirObjectStore::new(dir.path());

    store.put("a/b/c.jpg", b"one").await.unwrap();
    store.put("a/b/c.jpg", b"one").await.unwrap();
    assert_eq!(store.get("a/b/c.jpg").await.unwrap(), b"one");
}

#[tokio::test]
async fn missing_object_is_not_found() {
    let dir = tempdir().unwrap();
    let store = DirObjectStore::new(dir.path());

    assert!(!store.exists("nope/missing.dzi").await.unwrap());
    let err = store.get("nope/missing.dzi").await.unwrap_err();
    assert!(matches!(err, ObjectStoreError::NotFound(_)));
}

#[parameterized(
    empty = { "" },
    absolute = { "/etc/passwd" },
    traversal = { "a/../../escape" },
)]
fn bad_keys_are_rejected(key: &str) {
    let dir = tempdir().unwrap();
    let store = DirObjectStore::new(dir.path());
    assert!(store.resolve(key).is_err());
}
