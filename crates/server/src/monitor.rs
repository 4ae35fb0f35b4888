// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic maintenance loop: delivers fired deadline alarms to their
//! coordinators and redelivers expired queue leases.

use crate::AppState;
use plr_core::{Clock, TimerKind, UploadId};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

const TICK: Duration = Duration::from_millis(500);

pub(crate) async fn run_monitor<C: Clock>(state: Arc<AppState<C>>, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(TICK);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => tick(&state).await,
        }
    }
}

async fn tick<C: Clock>(state: &Arc<AppState<C>>) {
    let now = state.clock.now();

    let fired = state.scheduler.lock().fired_timers(now);
    for id in fired {
        match id.kind() {
            Some(TimerKind::Deadline { upload_id }) => {
                state.pool.alarm(&UploadId::new(upload_id)).await;
            }
            None => warn!(timer = %id, "dropping unrecognized timer"),
        }
    }

    state.metadata.redeliver_expired(now);
    state.tiles.redeliver_expired(now);
    state.markers.redeliver_expired(now);
}
