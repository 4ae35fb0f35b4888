// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! plr-queue: at-least-once stage queues for pipeline fan-out.
//!
//! A [`StageQueue`] hands out leased items with a visibility timeout.
//! Consumers ack after their side effects are durable. An expired lease or
//! an explicit nack redelivers the item until its failure budget is spent,
//! after which it dead-letters; a release redelivers without touching the
//! budget, for work that succeeded but whose idempotent follow-up must be
//! reposted. Consumers must treat redelivery as normal.

mod queue;

pub use queue::{Lease, QueueStats, StageQueue};
