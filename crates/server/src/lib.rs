// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! plr-server: the Planroom pipeline daemon.
//!
//! Hosts the coordinator actor pool, the stage queues and workers, the
//! deadline monitor, and the HTTP control plane. One process owns one data
//! dir, enforced by an exclusive lock file.

mod lifecycle;
mod listener;
mod monitor;

pub use lifecycle::{Daemon, LifecycleError};

use parking_lot::Mutex;
use plr_core::{Clock, MetadataJob, PipelineConfig, TileJob};
use plr_engine::{CoordinatorPool, Intake, Scheduler};
use plr_queue::StageQueue;
use plr_storage::Store;
use std::sync::Arc;
use std::time::Instant;

/// Shared context for request handlers and background loops.
pub struct AppState<C: Clock> {
    pub config: PipelineConfig,
    pub store: Arc<Store>,
    pub pool: Arc<CoordinatorPool<C>>,
    pub intake: Arc<Intake<C>>,
    pub metadata: Arc<StageQueue<MetadataJob>>,
    pub tiles: Arc<StageQueue<TileJob>>,
    pub markers: Arc<StageQueue<plr_core::MarkerJob>>,
    pub scheduler: Arc<Mutex<Scheduler>>,
    pub clock: C,
    pub start_time: Instant,
}
