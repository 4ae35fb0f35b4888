// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timer identifier type for tracking scheduled deadline alarms.
//!
//! Timer IDs are structured strings so a fired timer routes back to the
//! upload that armed it after a restart, without any in-memory lookup.

use crate::state::UploadId;

crate::define_id! {
    /// Unique identifier for a scheduled timer.
    pub struct TimerId("tmr-");
}

impl TimerId {
    /// Deadline alarm for one upload's pipeline.
    pub fn deadline(upload_id: &UploadId) -> Self {
        TimerKind::Deadline { upload_id: upload_id.as_str() }.to_timer_id()
    }

    /// Parse this timer ID into a typed `TimerKind`.
    pub fn kind(&self) -> Option<TimerKind<'_>> {
        TimerKind::parse(self.as_str())
    }
}

/// Parsed representation of a timer ID for type-safe routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerKind<'a> {
    Deadline { upload_id: &'a str },
}

impl<'a> TimerKind<'a> {
    /// Parse a timer ID string into a typed `TimerKind`.
    ///
    /// Returns `None` for unrecognized timer ID formats.
    pub fn parse(id: &'a str) -> Option<TimerKind<'a>> {
        if let Some(rest) = id.strip_prefix("deadline:") {
            if rest.is_empty() {
                return None;
            }
            return Some(TimerKind::Deadline { upload_id: rest });
        }
        None
    }

    /// Format this `TimerKind` back into a canonical `TimerId`.
    pub fn to_timer_id(&self) -> TimerId {
        match self {
            TimerKind::Deadline { upload_id } => TimerId::new(format!("deadline:{upload_id}")),
        }
    }
}

#[cfg(test)]
#[path = "timer_tests.rs"]
mod tests;
