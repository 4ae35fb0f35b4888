// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stage-worker tests: the full lease → process → complete → ack cycle
//! against fake raster and directory object stores.

use super::*;
use crate::adapters::{FakeRaster, RasterClient};
use crate::intake::{Intake, IntakeRequest};
use crate::test_helpers::{setup, TestContext};
use plr_core::{FakeClock, JobStatus, MetadataStatus, PipelineStatus, StageStatus, UploadId};
use plr_storage::{DirObjectStore, ObjectStore};

const PDF: &[u8] = b"%PDF-1.4 fake plan content";

struct Rig {
    ctx: TestContext,
    objects: Arc<DirObjectStore>,
    raster: Arc<FakeRaster>,
}

/// Run intake for `pages` pages so queues and rows look exactly as they do
/// in production when the workers start.
async fn rig(pages: u32) -> Rig {
    let ctx = setup();
    let objects = Arc::new(DirObjectStore::new(ctx.dir.path().join("objects")));
    let raster = Arc::new(FakeRaster::new(pages));
    for page in 1..=pages {
        raster.set_sheet_name(page, format!("A{page}"));
    }
    let intake = Intake::new(
        Arc::clone(&ctx.store),
        Arc::clone(&objects) as Arc<dyn ObjectStore>,
        Arc::clone(&raster) as Arc<dyn RasterClient>,
        Arc::clone(&ctx.pool),
        Arc::clone(&ctx.metadata),
    );
    intake
        .handle_upload(
            IntakeRequest {
                upload_id: UploadId::new("u1"),
                plan_id: "plan-1".to_string(),
                project_id: "proj-1".to_string(),
                organization_id: "org-1".to_string(),
            },
            PDF,
        )
        .await
        .unwrap();
    Rig { ctx, objects, raster }
}

impl Rig {
    fn metadata_worker(&self) -> StageWorker<MetadataStage<FakeClock>, FakeClock> {
        StageWorker::new(
            Arc::new(MetadataStage::new(
                Arc::clone(&self.ctx.store),
                Arc::clone(&self.objects) as Arc<dyn ObjectStore>,
                Arc::clone(&self.raster) as Arc<dyn RasterClient>,
                Arc::clone(&self.ctx.pool),
            )),
            Arc::clone(&self.ctx.metadata),
            self.ctx.clock.clone(),
            &self.ctx.config,
        )
    }

    fn tile_worker(&self) -> StageWorker<TileStage<FakeClock>, FakeClock> {
        StageWorker::new(
            Arc::new(TileStage::new(
                Arc::clone(&self.ctx.store),
                Arc::clone(&self.objects) as Arc<dyn ObjectStore>,
                Arc::clone(&self.raster) as Arc<dyn RasterClient>,
                Arc::clone(&self.ctx.pool),
            )),
            Arc::clone(&self.ctx.tiles),
            self.ctx.clock.clone(),
            &self.ctx.config,
        )
    }

    fn marker_worker(&self) -> StageWorker<MarkerStage<FakeClock>, FakeClock> {
        StageWorker::new(
            Arc::new(MarkerStage::new(
                Arc::clone(&self.ctx.store),
                Arc::clone(&self.objects) as Arc<dyn ObjectStore>,
                Arc::clone(&self.raster) as Arc<dyn RasterClient>,
                Arc::clone(&self.ctx.pool),
            )),
            Arc::clone(&self.ctx.markers),
            self.ctx.clock.clone(),
            &self.ctx.config,
        )
    }

    /// Drain one stage queue through its worker.
    async fn drain<H>(&self, worker: &StageWorker<H, FakeClock>, queue: &StageQueue<H::Job>)
    where
        H: StageHandler,
    {
        while let Some(lease) =
            queue.try_receive(Duration::from_secs(30), self.ctx.clock.now())
        {
            worker.handle(lease).await;
        }
    }
}

#[tokio::test]
async fn metadata_worker_extracts_and_acks() {
    let rig = rig(2).await;
    let worker = rig.metadata_worker();

    let lease = rig
        .ctx
        .metadata
        .try_receive(Duration::from_secs(30), rig.ctx.clock.now())
        .unwrap();
    let sheet_number = lease.payload.sheet_number;
    worker.handle(lease).await;

    let sheet = rig.ctx.store.sheet_by_number(&UploadId::new("u1"), sheet_number).unwrap();
    assert_eq!(sheet.metadata_status, MetadataStatus::Extracted);
    assert_eq!(sheet.sheet_name.as_deref(), Some(format!("A{sheet_number}").as_str()));
    assert!(rig.objects.exists(&sheet.sheet_key).await.unwrap());

    let progress = rig.ctx.pool.progress(&UploadId::new("u1")).await.unwrap();
    assert_eq!(progress.completed_sheets, vec![sheet_number]);
    assert_eq!(rig.ctx.metadata.stats().in_flight, 0, "job acked");
}

#[tokio::test(start_paused = true)]
async fn exhausted_processing_nacks_and_records_failure() {
    let rig = rig(1).await;
    // Fail more times than the worker retries in one delivery
    rig.raster.fail_next_rasterize(rig.ctx.config.worker_attempts);
    let worker = rig.metadata_worker();

    let lease = rig
        .ctx
        .metadata
        .try_receive(Duration::from_secs(30), rig.ctx.clock.now())
        .unwrap();
    worker.handle(lease).await;

    let sheet = rig.ctx.store.sheet_by_number(&UploadId::new("u1"), 1).unwrap();
    assert_eq!(sheet.metadata_status, MetadataStatus::Failed);
    // Nacked: available for redelivery, coordinator saw nothing
    assert_eq!(rig.ctx.metadata.stats().depth, 1);
    let progress = rig.ctx.pool.progress(&UploadId::new("u1")).await.unwrap();
    assert!(progress.completed_sheets.is_empty());

    // The redelivery succeeds once the service recovers
    let lease = rig
        .ctx
        .metadata
        .try_receive(Duration::from_secs(30), rig.ctx.clock.now())
        .unwrap();
    assert_eq!(lease.delivery, 2);
    worker.handle(lease).await;
    let sheet = rig.ctx.store.sheet_by_number(&UploadId::new("u1"), 1).unwrap();
    assert_eq!(sheet.metadata_status, MetadataStatus::Extracted);
}

#[tokio::test]
async fn rejected_completion_is_not_acked() {
    let rig = rig(1).await;
    let worker = rig.metadata_worker();

    // A job for an upload the coordinator never saw
    rig.ctx.seed_job("ghost");
    rig.ctx.seed_sheets("ghost", &[Some("A1")]);
    rig.ctx.metadata.push(plr_core::MetadataJob {
        upload_id: UploadId::new("ghost"),
        sheet_number: 1,
        sheet_key: rig
            .ctx
            .store
            .sheet_by_number(&UploadId::new("ghost"), 1)
            .unwrap()
            .sheet_key,
        plan_id: "plan-1".to_string(),
        project_id: "proj-1".to_string(),
        organization_id: "org-1".to_string(),
    });

    // Skip the real upload's job, take the ghost job
    let real = rig
        .ctx
        .metadata
        .try_receive(Duration::from_secs(30), rig.ctx.clock.now())
        .unwrap();
    rig.ctx.metadata.ack(&real);
    let ghost = rig
        .ctx
        .metadata
        .try_receive(Duration::from_secs(30), rig.ctx.clock.now())
        .unwrap();
    worker.handle(ghost).await;

    // Completion was refused (NotInitialized): released for redelivery,
    // not counted against the dead-letter budget
    assert_eq!(rig.ctx.metadata.stats().depth, 1);
    assert_eq!(rig.ctx.metadata.stats().in_flight, 0);
    assert!(rig.ctx.metadata.dead_items().is_empty());
}

#[tokio::test]
async fn completion_failures_repost_indefinitely() {
    let rig = rig(1).await;
    let worker = rig.metadata_worker();

    rig.ctx.seed_job("ghost");
    rig.ctx.seed_sheets("ghost", &[Some("A1")]);
    rig.ctx.metadata.push(plr_core::MetadataJob {
        upload_id: UploadId::new("ghost"),
        sheet_number: 1,
        sheet_key: rig
            .ctx
            .store
            .sheet_by_number(&UploadId::new("ghost"), 1)
            .unwrap()
            .sheet_key,
        plan_id: "plan-1".to_string(),
        project_id: "proj-1".to_string(),
        organization_id: "org-1".to_string(),
    });
    let real = rig
        .ctx
        .metadata
        .try_receive(Duration::from_secs(30), rig.ctx.clock.now())
        .unwrap();
    rig.ctx.metadata.ack(&real);

    // The coordinator is unreachable for far more deliveries than the
    // failure budget allows; the job must survive every one of them.
    for _ in 0..10 {
        let lease = rig
            .ctx
            .metadata
            .try_receive(Duration::from_secs(30), rig.ctx.clock.now())
            .unwrap();
        worker.handle(lease).await;
    }
    assert!(rig.ctx.metadata.dead_items().is_empty());
    assert_eq!(rig.ctx.metadata.stats().depth, 1);

    // Once the coordinator exists, the next repost lands and acks
    rig.ctx.pool.initialize(&UploadId::new("ghost"), 1, None).await.unwrap();
    let lease = rig
        .ctx
        .metadata
        .try_receive(Duration::from_secs(30), rig.ctx.clock.now())
        .unwrap();
    worker.handle(lease).await;

    let progress = rig.ctx.pool.progress(&UploadId::new("ghost")).await.unwrap();
    assert_eq!(progress.completed_sheets, vec![1]);
    assert_eq!(rig.ctx.metadata.stats().depth, 0);
    assert_eq!(rig.ctx.metadata.stats().in_flight, 0);
}

#[tokio::test]
async fn workers_drive_pipeline_to_complete() {
    let rig = rig(3).await;

    rig.drain(&rig.metadata_worker(), &rig.ctx.metadata).await;
    assert_eq!(
        rig.ctx.pool.progress(&UploadId::new("u1")).await.unwrap().status,
        PipelineStatus::TilesInProgress
    );

    rig.drain(&rig.tile_worker(), &rig.ctx.tiles).await;
    assert_eq!(
        rig.ctx.pool.progress(&UploadId::new("u1")).await.unwrap().status,
        PipelineStatus::MarkersInProgress
    );

    rig.drain(&rig.marker_worker(), &rig.ctx.markers).await;
    let progress = rig.ctx.pool.progress(&UploadId::new("u1")).await.unwrap();
    assert_eq!(progress.status, PipelineStatus::Complete);
    assert_eq!(rig.ctx.store.get_job(&UploadId::new("u1")).unwrap().status, JobStatus::Complete);

    // Per-sheet rows and artifacts all landed
    let keys = plr_core::keys::PlanKeys::new("org-1", "proj-1", "plan-1");
    for sheet in rig.ctx.store.sheets_for_upload(&UploadId::new("u1")) {
        assert_eq!(sheet.tile_status, StageStatus::Done);
        assert_eq!(sheet.marker_status, StageStatus::Done);
        assert!(rig.objects.exists(&keys.dzi_manifest(sheet.sheet_number)).await.unwrap());
        assert!(rig.objects.exists(&keys.markers(sheet.sheet_number)).await.unwrap());
        assert!(rig.objects.exists(&keys.tile(sheet.sheet_number, 0, 0, 0)).await.unwrap());
    }

    // MarkerJobs carried the extracted labels as context
    let markers_artifact = rig.objects.get(&keys.markers(1)).await.unwrap();
    let hits: Vec<crate::adapters::MarkerHit> =
        serde_json::from_slice(&markers_artifact).unwrap();
    assert_eq!(hits.len(), 3);
}
