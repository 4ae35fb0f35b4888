// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stage 2: generate the deep-zoom tile pyramid for one sheet.

use super::{StageHandler, WorkerError};
use crate::adapters::RasterClient;
use crate::pool::CoordinatorPool;
use async_trait::async_trait;
use plr_core::keys::PlanKeys;
use plr_core::{Clock, Stage, StageStatus, TileJob};
use plr_storage::{ObjectStore, Store};
use std::sync::Arc;
use tracing::warn;

pub struct TileStage<C: Clock> {
    store: Arc<Store>,
    objects: Arc<dyn ObjectStore>,
    raster: Arc<dyn RasterClient>,
    pool: Arc<CoordinatorPool<C>>,
}

impl<C: Clock> TileStage<C> {
    pub fn new(
        store: Arc<Store>,
        objects: Arc<dyn ObjectStore>,
        raster: Arc<dyn RasterClient>,
        pool: Arc<CoordinatorPool<C>>,
    ) -> Self {
        Self { store, objects, raster, pool }
    }

    fn sheet_row(&self, job: &TileJob) -> Result<plr_core::PlanSheet, WorkerError> {
        self.store.get_sheet(&job.sheet_id).ok_or_else(|| WorkerError::SheetRowMissing {
            upload_id: job.upload_id.clone(),
            sheet_number: job.sheet_number,
        })
    }
}

#[async_trait]
impl<C: Clock> StageHandler for TileStage<C> {
    type Job = TileJob;

    fn stage(&self) -> Stage {
        Stage::Tiles
    }

    async fn process(&self, job: &TileJob) -> Result<(), WorkerError> {
        let page = self.objects.get(&job.sheet_key).await?;
        let tiles = self.raster.generate_tiles(&page).await?;

        let keys = PlanKeys::new(
            job.organization_id.as_str(),
            job.project_id.as_str(),
            job.plan_id.as_str(),
        );
        for level in &tiles.levels {
            for tile in &level.tiles {
                let key = keys.tile(job.sheet_number, level.level, tile.col, tile.row);
                self.objects.put(&key, &tile.jpeg).await?;
            }
        }
        self.objects.put(&keys.dzi_manifest(job.sheet_number), tiles.dzi.as_bytes()).await?;

        let mut sheet = self.sheet_row(job)?;
        sheet.tile_status = StageStatus::Done;
        self.store.upsert_sheet(sheet)?;
        Ok(())
    }

    async fn complete(&self, job: &TileJob) -> Result<(), WorkerError> {
        self.pool
            .tile_complete(&job.upload_id, job.sheet_number)
            .await
            .map_err(WorkerError::Completion)?;
        Ok(())
    }

    async fn record_failure(&self, job: &TileJob) {
        let Ok(mut sheet) = self.sheet_row(job) else { return };
        sheet.tile_status = StageStatus::Failed;
        if let Err(e) = self.store.upsert_sheet(sheet) {
            warn!(upload = %job.upload_id, sheet = job.sheet_number, error = %e, "failed to record tile failure");
        }
    }
}
