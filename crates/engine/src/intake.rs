// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Upload intake.
//!
//! Validates the PDF, stores the original, determines the page count, seeds
//! the job and sheet rows, initializes the coordinator, and only then
//! enqueues the metadata jobs. The coordinator must exist before any worker
//! can post a completion; if the final enqueue fails the deadline alarm
//! still caps the partial job.

use crate::adapters::{RasterClient, RasterError};
use crate::error::RuntimeError;
use crate::pool::CoordinatorPool;
use plr_core::keys::PlanKeys;
use plr_core::{Clock, MetadataJob, PlanSheet, ProcessingJob, UploadId};
use plr_queue::StageQueue;
use plr_storage::{ObjectStore, ObjectStoreError, Store, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("upload body is not a PDF")]
    InvalidPdf,

    #[error("upload {0} already exists")]
    Duplicate(UploadId),

    #[error("rasterizer reported {0} pages")]
    BadPageCount(u32),

    #[error("rasterizer error: {0}")]
    Raster(#[from] RasterError),

    #[error("object store error: {0}")]
    Object(#[from] ObjectStoreError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Identifiers accompanying an uploaded plan PDF.
#[derive(Debug, Clone)]
pub struct IntakeRequest {
    pub upload_id: UploadId,
    pub plan_id: String,
    pub project_id: String,
    pub organization_id: String,
}

/// Result of a successful intake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeOutcome {
    pub upload_id: UploadId,
    pub total_sheets: u32,
}

/// Intake endpoint logic.
pub struct Intake<C: Clock> {
    store: Arc<Store>,
    objects: Arc<dyn ObjectStore>,
    raster: Arc<dyn RasterClient>,
    pool: Arc<CoordinatorPool<C>>,
    metadata_queue: Arc<StageQueue<MetadataJob>>,
}

impl<C: Clock> Intake<C> {
    pub fn new(
        store: Arc<Store>,
        objects: Arc<dyn ObjectStore>,
        raster: Arc<dyn RasterClient>,
        pool: Arc<CoordinatorPool<C>>,
        metadata_queue: Arc<StageQueue<MetadataJob>>,
    ) -> Self {
        Self { store, objects, raster, pool, metadata_queue }
    }

    /// Process one validated upload end to end.
    pub async fn handle_upload(
        &self,
        request: IntakeRequest,
        pdf: &[u8],
    ) -> Result<IntakeOutcome, IntakeError> {
        if !pdf.starts_with(b"%PDF-") {
            return Err(IntakeError::InvalidPdf);
        }
        if self.store.get_job(&request.upload_id).is_some() {
            return Err(IntakeError::Duplicate(request.upload_id));
        }

        let keys = PlanKeys::new(
            request.organization_id.clone(),
            request.project_id.clone(),
            request.plan_id.clone(),
        );
        self.objects.put(&keys.original_pdf(), pdf).await?;

        let total_sheets = self.raster.page_count(pdf).await?;
        if total_sheets == 0 {
            return Err(IntakeError::BadPageCount(total_sheets));
        }

        self.store.create_job(ProcessingJob::new(
            request.upload_id.clone(),
            request.plan_id.clone(),
            request.project_id.clone(),
            request.organization_id.clone(),
            chrono::Utc::now(),
        ))?;
        let sheets: Vec<PlanSheet> = (1..=total_sheets)
            .map(|n| {
                let mut sheet = PlanSheet::placeholder(
                    request.upload_id.clone(),
                    request.plan_id.clone(),
                    n,
                );
                sheet.sheet_key = keys.sheet_pdf(n);
                sheet
            })
            .collect();
        self.store.insert_sheets(sheets)?;

        // Coordinator first, metadata jobs second: a worker completion for a
        // nonexistent coordinator would be refused and dead-letter.
        self.pool.initialize(&request.upload_id, total_sheets, None).await?;

        for sheet_number in 1..=total_sheets {
            self.metadata_queue.push(MetadataJob {
                upload_id: request.upload_id.clone(),
                sheet_number,
                sheet_key: keys.sheet_pdf(sheet_number),
                plan_id: request.plan_id.clone(),
                project_id: request.project_id.clone(),
                organization_id: request.organization_id.clone(),
            });
        }

        info!(upload = %request.upload_id, total_sheets, "upload accepted");
        Ok(IntakeOutcome { upload_id: request.upload_id, total_sheets })
    }
}

#[cfg(test)]
#[path = "intake_tests.rs"]
mod tests;
