// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stage 3: detect callout markers on one sheet.
//!
//! Detected markers are written as a JSON artifact next to the sheet's
//! tiles; the relational row only tracks the stage status.

use super::{StageHandler, WorkerError};
use crate::adapters::RasterClient;
use crate::pool::CoordinatorPool;
use async_trait::async_trait;
use plr_core::keys::PlanKeys;
use plr_core::{Clock, MarkerJob, Stage, StageStatus};
use plr_storage::{ObjectStore, Store};
use std::sync::Arc;
use tracing::warn;

pub struct MarkerStage<C: Clock> {
    store: Arc<Store>,
    objects: Arc<dyn ObjectStore>,
    raster: Arc<dyn RasterClient>,
    pool: Arc<CoordinatorPool<C>>,
}

impl<C: Clock> MarkerStage<C> {
    pub fn new(
        store: Arc<Store>,
        objects: Arc<dyn ObjectStore>,
        raster: Arc<dyn RasterClient>,
        pool: Arc<CoordinatorPool<C>>,
    ) -> Self {
        Self { store, objects, raster, pool }
    }

    fn sheet_row(&self, job: &MarkerJob) -> Result<plr_core::PlanSheet, WorkerError> {
        self.store.get_sheet(&job.sheet_id).ok_or_else(|| WorkerError::SheetRowMissing {
            upload_id: job.upload_id.clone(),
            sheet_number: job.sheet_number,
        })
    }
}

#[async_trait]
impl<C: Clock> StageHandler for MarkerStage<C> {
    type Job = MarkerJob;

    fn stage(&self) -> Stage {
        Stage::Markers
    }

    async fn process(&self, job: &MarkerJob) -> Result<(), WorkerError> {
        let page = self.objects.get(&job.sheet_key).await?;
        let markers = self.raster.detect_markers(&page, &job.valid_sheets).await?;

        let keys = PlanKeys::new(
            job.organization_id.as_str(),
            job.project_id.as_str(),
            job.plan_id.as_str(),
        );
        let payload = serde_json::to_vec(&markers)?;
        self.objects.put(&keys.markers(job.sheet_number), &payload).await?;

        let mut sheet = self.sheet_row(job)?;
        sheet.marker_status = StageStatus::Done;
        self.store.upsert_sheet(sheet)?;
        Ok(())
    }

    async fn complete(&self, job: &MarkerJob) -> Result<(), WorkerError> {
        self.pool
            .marker_complete(&job.upload_id, job.sheet_number)
            .await
            .map_err(WorkerError::Completion)?;
        Ok(())
    }

    async fn record_failure(&self, job: &MarkerJob) {
        let Ok(mut sheet) = self.sheet_row(job) else { return };
        sheet.marker_status = StageStatus::Failed;
        if let Err(e) = self.store.upsert_sheet(sheet) {
            warn!(upload = %job.upload_id, sheet = job.sheet_number, error = %e, "failed to record marker failure");
        }
    }
}
