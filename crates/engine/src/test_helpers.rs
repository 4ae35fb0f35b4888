// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests.

use crate::pool::CoordinatorPool;
use crate::publish::{FlakyPublisher, StagePublisher};
use crate::scheduler::Scheduler;
use crate::Engine;
use parking_lot::Mutex;
use plr_core::{
    Clock, FakeClock, MarkerJob, MetadataJob, MetadataStatus, PipelineConfig, PlanSheet, TileJob,
    TimerKind, UploadId,
};
use plr_queue::StageQueue;
use plr_storage::Store;
use std::sync::Arc;

pub(crate) struct TestContext {
    pub dir: Arc<tempfile::TempDir>,
    pub config: PipelineConfig,
    pub clock: FakeClock,
    pub store: Arc<Store>,
    pub metadata: Arc<StageQueue<MetadataJob>>,
    pub tiles: Arc<StageQueue<TileJob>>,
    pub markers: Arc<StageQueue<MarkerJob>>,
    pub publisher: Arc<FlakyPublisher>,
    pub scheduler: Arc<Mutex<Scheduler>>,
    pub engine: Arc<Engine<FakeClock>>,
    pub pool: Arc<CoordinatorPool<FakeClock>>,
}

pub(crate) fn setup() -> TestContext {
    setup_with_config(PipelineConfig::default())
}

pub(crate) fn setup_with_config(config: PipelineConfig) -> TestContext {
    let dir = Arc::new(tempfile::tempdir().unwrap());
    let clock = FakeClock::new();
    build(dir, config, clock)
}

fn build(dir: Arc<tempfile::TempDir>, config: PipelineConfig, clock: FakeClock) -> TestContext {
    let store = Arc::new(Store::open(dir.path().join("store")).unwrap());
    let metadata = Arc::new(StageQueue::new(config.metadata_queue.clone(), 3));
    let tiles = Arc::new(StageQueue::new(config.tile_queue.clone(), 3));
    let markers = Arc::new(StageQueue::new(config.marker_queue.clone(), 3));
    let publisher = Arc::new(FlakyPublisher::new(Arc::clone(&tiles), Arc::clone(&markers)));
    let scheduler = Arc::new(Mutex::new(Scheduler::new()));

    let engine = Arc::new(
        Engine::new(
            Arc::clone(&store),
            Arc::clone(&publisher) as Arc<dyn StagePublisher>,
            Arc::clone(&scheduler),
            clock.clone(),
            &config,
        )
        .unwrap(),
    );
    let pool = Arc::new(CoordinatorPool::new(Arc::clone(&engine)));

    TestContext {
        dir,
        config,
        clock,
        store,
        metadata,
        tiles,
        markers,
        publisher,
        scheduler,
        engine,
        pool,
    }
}

impl TestContext {
    /// Simulate a daemon restart: reopen the store from the same data dir
    /// with a fresh scheduler, pool, and queues. Wall-clock time carries
    /// over; the monotonic clock restarts, as it would across processes.
    pub fn restart(&self) -> TestContext {
        let clock = FakeClock::new();
        clock.set_epoch_ms(self.clock.epoch_ms());
        build(Arc::clone(&self.dir), self.config.clone(), clock)
    }

    /// Insert the processing-job row intake would have created.
    pub fn seed_job(&self, upload: &str) {
        self.store
            .create_job(plr_core::ProcessingJob::new(
                UploadId::new(upload),
                "plan-1",
                "proj-1",
                "org-1",
                chrono::Utc::now(),
            ))
            .unwrap();
    }

    /// Insert one extracted sheet row per name (None = no label extracted).
    pub fn seed_sheets(&self, upload: &str, names: &[Option<&str>]) {
        let sheets: Vec<PlanSheet> = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let n = i as u32 + 1;
                let mut builder = PlanSheet::builder()
                    .upload_id(upload)
                    .sheet_number(n)
                    .sheet_key(format!("organizations/org-1/projects/proj-1/plans/plan-1/sheets/{n}/page.pdf"))
                    .metadata_status(MetadataStatus::Extracted);
                if let Some(name) = name {
                    builder = builder.sheet_name(*name);
                }
                builder.build()
            })
            .collect();
        self.store.insert_sheets(sheets).unwrap();
    }

    /// Deliver any due deadline alarms, as the daemon monitor loop would.
    pub async fn fire_due_alarms(&self) {
        let fired = self.scheduler.lock().fired_timers(self.clock.now());
        for id in fired {
            if let Some(TimerKind::Deadline { upload_id }) = id.kind() {
                self.pool.alarm(&UploadId::new(upload_id)).await;
            }
        }
    }
}
