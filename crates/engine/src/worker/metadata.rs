// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stage 1: rasterize one page and extract its sheet metadata.

use super::{StageHandler, WorkerError};
use crate::adapters::RasterClient;
use crate::pool::CoordinatorPool;
use async_trait::async_trait;
use plr_core::keys::PlanKeys;
use plr_core::{Clock, MetadataJob, MetadataStatus, Stage};
use plr_storage::{ObjectStore, Store};
use std::sync::Arc;
use tracing::warn;

pub struct MetadataStage<C: Clock> {
    store: Arc<Store>,
    objects: Arc<dyn ObjectStore>,
    raster: Arc<dyn RasterClient>,
    pool: Arc<CoordinatorPool<C>>,
}

impl<C: Clock> MetadataStage<C> {
    pub fn new(
        store: Arc<Store>,
        objects: Arc<dyn ObjectStore>,
        raster: Arc<dyn RasterClient>,
        pool: Arc<CoordinatorPool<C>>,
    ) -> Self {
        Self { store, objects, raster, pool }
    }

    fn sheet_row(&self, job: &MetadataJob) -> Result<plr_core::PlanSheet, WorkerError> {
        self.store.sheet_by_number(&job.upload_id, job.sheet_number).ok_or_else(|| {
            WorkerError::SheetRowMissing {
                upload_id: job.upload_id.clone(),
                sheet_number: job.sheet_number,
            }
        })
    }
}

#[async_trait]
impl<C: Clock> StageHandler for MetadataStage<C> {
    type Job = MetadataJob;

    fn stage(&self) -> Stage {
        Stage::Metadata
    }

    async fn process(&self, job: &MetadataJob) -> Result<(), WorkerError> {
        let keys = PlanKeys::new(
            job.organization_id.as_str(),
            job.project_id.as_str(),
            job.plan_id.as_str(),
        );
        let original = self.objects.get(&keys.original_pdf()).await?;
        let page = self.raster.rasterize_page(&original, job.sheet_number).await?;

        self.objects.put(&job.sheet_key, &page.page_pdf).await?;

        let mut sheet = self.sheet_row(job)?;
        sheet.sheet_name = page.sheet_name;
        sheet.sheet_key = job.sheet_key.clone();
        sheet.metadata_status = MetadataStatus::Extracted;
        self.store.upsert_sheet(sheet)?;
        Ok(())
    }

    async fn complete(&self, job: &MetadataJob) -> Result<(), WorkerError> {
        // Pass the extracted label along; the coordinator re-derives marker
        // context from the rows at fan-out regardless.
        let valid_sheets: Vec<String> =
            self.sheet_row(job)?.sheet_name.into_iter().collect();
        self.pool
            .sheet_complete(&job.upload_id, job.sheet_number, valid_sheets)
            .await
            .map_err(WorkerError::Completion)?;
        Ok(())
    }

    async fn record_failure(&self, job: &MetadataJob) {
        let Ok(mut sheet) = self.sheet_row(job) else { return };
        sheet.metadata_status = MetadataStatus::Failed;
        if let Err(e) = self.store.upsert_sheet(sheet) {
            warn!(upload = %job.upload_id, sheet = job.sheet_number, error = %e, "failed to record extraction failure");
        }
    }
}
