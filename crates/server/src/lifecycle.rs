// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and shutdown.
//!
//! Startup order: lock the data dir, open the store, rebuild actors for
//! every non-terminal pipeline (re-arming their deadline alarms), then start
//! the listener, the monitor, and the stage workers. Shutdown cancels the
//! token, lets workers finish or nack their in-flight job, and drops the
//! lock last.

use crate::{listener, monitor, AppState};
use fs2::FileExt;
use parking_lot::Mutex;
use plr_core::{Clock, PipelineConfig, SystemClock};
use plr_engine::{
    CoordinatorPool, Engine, HttpRasterClient, Intake, MarkerStage, MetadataStage, QueuePublisher,
    RasterClient, RuntimeError, Scheduler, StagePublisher, StageWorker, TileStage,
};
use plr_queue::StageQueue;
use plr_storage::{DirObjectStore, ObjectStore, Store, StoreError};
use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Queue failure budget before a stage job dead-letters.
const QUEUE_MAX_FAILURES: u32 = 5;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("another daemon holds the lock on {0}")]
    LockHeld(std::path::PathBuf),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// A running daemon instance.
pub struct Daemon<C: Clock> {
    state: Arc<AppState<C>>,
    addr: SocketAddr,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    // Held for the daemon's lifetime; releasing it frees the data dir.
    _lock: std::fs::File,
}

impl Daemon<SystemClock> {
    /// Start with the production adapters: system clock and the HTTP
    /// rasterizer client from the configured URL.
    pub async fn start(config: PipelineConfig) -> Result<Self, LifecycleError> {
        let raster = Arc::new(HttpRasterClient::new(&config.raster_url));
        Self::start_with(config, raster, SystemClock).await
    }
}

impl<C: Clock> Daemon<C> {
    /// Start with injected raster adapter and clock (used by tests).
    pub async fn start_with(
        config: PipelineConfig,
        raster: Arc<dyn RasterClient>,
        clock: C,
    ) -> Result<Self, LifecycleError> {
        std::fs::create_dir_all(&config.data_dir)?;

        // Exclusive lock first: two daemons over one data dir would race
        // the store's table files.
        let lock_path = config.data_dir.join("plrd.lock");
        let mut lock = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;
        lock.try_lock_exclusive().map_err(|_| LifecycleError::LockHeld(lock_path))?;
        lock.set_len(0)?;
        writeln!(lock, "{}", std::process::id())?;

        let store = Arc::new(Store::open(config.data_dir.join("store"))?);
        let objects: Arc<dyn ObjectStore> =
            Arc::new(DirObjectStore::new(config.data_dir.join("objects")));

        let metadata = Arc::new(StageQueue::new(config.metadata_queue.clone(), QUEUE_MAX_FAILURES));
        let tiles = Arc::new(StageQueue::new(config.tile_queue.clone(), QUEUE_MAX_FAILURES));
        let markers = Arc::new(StageQueue::new(config.marker_queue.clone(), QUEUE_MAX_FAILURES));
        let publisher: Arc<dyn StagePublisher> =
            Arc::new(QueuePublisher::new(Arc::clone(&tiles), Arc::clone(&markers)));
        let scheduler = Arc::new(Mutex::new(Scheduler::new()));

        let engine = Arc::new(Engine::new(
            Arc::clone(&store),
            publisher,
            Arc::clone(&scheduler),
            clock.clone(),
            &config,
        )?);
        let pool = Arc::new(CoordinatorPool::new(engine));
        let rehydrated = pool.rehydrate_incomplete();

        let intake = Arc::new(Intake::new(
            Arc::clone(&store),
            Arc::clone(&objects),
            Arc::clone(&raster),
            Arc::clone(&pool),
            Arc::clone(&metadata),
        ));

        let tcp = TcpListener::bind(&config.listen_addr).await?;
        let addr = tcp.local_addr()?;

        let state = Arc::new(AppState {
            config,
            store: Arc::clone(&store),
            pool: Arc::clone(&pool),
            intake,
            metadata: Arc::clone(&metadata),
            tiles: Arc::clone(&tiles),
            markers: Arc::clone(&markers),
            scheduler,
            clock: clock.clone(),
            start_time: Instant::now(),
        });

        let cancel = CancellationToken::new();
        let mut tasks = Vec::new();

        tasks.push(tokio::spawn(listener::run_listener(
            tcp,
            Arc::clone(&state),
            cancel.clone(),
        )));
        tasks.push(tokio::spawn(monitor::run_monitor(Arc::clone(&state), cancel.clone())));

        for _ in 0..state.config.workers_per_stage {
            let worker = StageWorker::new(
                Arc::new(MetadataStage::new(
                    Arc::clone(&store),
                    Arc::clone(&objects),
                    Arc::clone(&raster),
                    Arc::clone(&pool),
                )),
                Arc::clone(&metadata),
                clock.clone(),
                &state.config,
            );
            tasks.push(tokio::spawn(worker.run(cancel.clone())));

            let worker = StageWorker::new(
                Arc::new(TileStage::new(
                    Arc::clone(&store),
                    Arc::clone(&objects),
                    Arc::clone(&raster),
                    Arc::clone(&pool),
                )),
                Arc::clone(&tiles),
                clock.clone(),
                &state.config,
            );
            tasks.push(tokio::spawn(worker.run(cancel.clone())));

            let worker = StageWorker::new(
                Arc::new(MarkerStage::new(
                    Arc::clone(&store),
                    Arc::clone(&objects),
                    Arc::clone(&raster),
                    Arc::clone(&pool),
                )),
                Arc::clone(&markers),
                clock.clone(),
                &state.config,
            );
            tasks.push(tokio::spawn(worker.run(cancel.clone())));
        }

        info!(%addr, rehydrated, workers = state.config.workers_per_stage * 3, "daemon started");
        Ok(Self { state, addr, cancel, tasks, _lock: lock })
    }

    /// Address the listener is bound to (useful with a port-0 config).
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn state(&self) -> &Arc<AppState<C>> {
        &self.state
    }

    /// Stop accepting, cancel background loops, and wait for them.
    pub async fn shutdown(self) {
        info!("daemon shutting down");
        self.cancel.cancel();
        for task in self.tasks {
            let _ = task.await;
        }
    }
}
