// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordinator error taxonomy.

use crate::state::UploadId;
use thiserror::Error;

/// Errors a coordinator operation can surface to its caller.
///
/// Workers treat `NotInitialized` as "do not ack"; intake treats
/// `AlreadyInitializedDifferently` as fatal for the upload attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinatorError {
    #[error("coordinator not initialized for upload {0}")]
    NotInitialized(UploadId),

    #[error(
        "upload {upload_id} already initialized with {existing} sheets, \
         re-init requested {requested}"
    )]
    AlreadyInitializedDifferently {
        upload_id: UploadId,
        existing: u32,
        requested: u32,
    },

    #[error("total_sheets must be at least 1")]
    InvalidTotalSheets,

    #[error("sheet number {sheet_number} outside 1..={total_sheets}")]
    SheetOutOfRange { sheet_number: u32, total_sheets: u32 },

    #[error("no extracted sheets found for upload {0}, marker dispatch aborted")]
    NoExtractedSheets(UploadId),

    #[error("retry-dispatch only valid from a triggering status, current status is {status}")]
    NotRetryable { status: crate::status::PipelineStatus },
}
