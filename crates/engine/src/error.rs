// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error type

use plr_core::{CoordinatorError, UploadId};
use thiserror::Error;

/// Errors surfaced by coordinator operations and effect execution.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    #[error("store error: {0}")]
    Store(#[from] plr_storage::StoreError),

    #[error("dispatch failed: {0}")]
    Publish(#[from] crate::publish::PublishError),

    #[error("invalid marker context regex: {0}")]
    MarkerRegex(#[from] regex::Error),

    #[error("no plan_sheets rows found for upload {0}")]
    NoSheetRows(UploadId),

    #[error("coordinator actor gone for upload {0}")]
    ActorGone(UploadId),
}

impl RuntimeError {
    /// Whether this error is the benign "unknown upload" case a worker
    /// should treat as retriable (no ack).
    pub fn is_not_initialized(&self) -> bool {
        matches!(self, RuntimeError::Coordinator(CoordinatorError::NotInitialized(_)))
    }
}
