// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timer bookkeeping for [`crate::engine::DelayedEngine`]: each `start()`
//! call books a delivery at `now + delay` and is handed back to the caller
//! once a driver loop observes it has fired.

use saga_core::JobState;
use std::collections::HashMap;
use std::time::{Duration, Instant};

struct PendingDelivery {
    fires_at: Instant,
    jobs: Vec<JobState>,
}

/// Books deferred job redeliveries and reports which have fired.
#[derive(Default)]
pub(crate) struct Scheduler {
    pending: HashMap<u64, PendingDelivery>,
    next_id: u64,
}

impl Scheduler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Book a delivery of `jobs` at `now + delay`, returning its id.
    pub(crate) fn schedule(&mut self, jobs: Vec<JobState>, delay: Duration, now: Instant) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.pending.insert(id, PendingDelivery { fires_at: now + delay, jobs });
        id
    }

    /// Cancel a booked delivery, returning its jobs if it had not fired yet.
    pub(crate) fn cancel(&mut self, id: u64) -> Option<Vec<JobState>> {
        self.pending.remove(&id).map(|p| p.jobs)
    }

    /// Drain every delivery whose deadline has passed.
    pub(crate) fn fired(&mut self, now: Instant) -> Vec<Vec<JobState>> {
        let fired_ids: Vec<u64> = self
            .pending
            .iter()
            .filter(|(_, p)| p.fires_at <= now)
            .map(|(id, _)| *id)
            .collect();

        fired_ids
            .into_iter()
            .filter_map(|id| self.pending.remove(&id).map(|p| p.jobs))
            .collect()
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.fires_at).min()
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
