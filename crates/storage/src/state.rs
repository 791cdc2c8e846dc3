// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state built from WAL replay.

use saga_core::{ChunkId, ChunkState, JobId, JobState, StepId, StepState};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A fact recorded to the WAL. State is derived by folding these in order.
///
/// # Idempotency requirement
///
/// All variants MUST be idempotent under [`MaterializedState::apply_event`]:
/// applying the same event twice must produce the same state as applying it
/// once, since recovery replays every unprocessed entry from the last
/// durable snapshot. Handlers use assignment (`=`), never accumulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProviderEvent {
    JobsCreated(Vec<JobState>),
    JobsSaved(Vec<JobState>),
    StepsSaved(Vec<StepState>),
    ChunksSaved(Vec<ChunkState>),
    ChunksInserted(Vec<ChunkState>),
}

/// Materialized state built from WAL operations.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MaterializedState {
    pub jobs: HashMap<JobId, JobState>,
    #[serde(default)]
    pub steps: HashMap<StepId, StepState>,
    #[serde(default)]
    pub chunks: HashMap<ChunkId, ChunkState>,
}

impl MaterializedState {
    pub fn get_job(&self, id: &JobId) -> Option<&JobState> {
        self.jobs.get(id)
    }

    pub fn get_step(&self, id: &StepId) -> Option<&StepState> {
        self.steps.get(id)
    }

    /// Chunks belonging to `step_id`, ordered by `chunk_index` ascending.
    pub fn chunks_for_step(&self, step_id: &StepId) -> Vec<&ChunkState> {
        let mut chunks: Vec<&ChunkState> = self
            .chunks
            .values()
            .filter(|c| &c.parent_step_id == step_id)
            .collect();
        chunks.sort_by_key(|c| c.chunk_index);
        chunks
    }

    /// Apply an event to derive state changes. Idempotent — see the
    /// contract on [`ProviderEvent`].
    pub fn apply_event(&mut self, event: &ProviderEvent) {
        match event {
            ProviderEvent::JobsCreated(jobs) | ProviderEvent::JobsSaved(jobs) => {
                for job in jobs {
                    self.jobs.insert(job.id.clone(), job.clone());
                }
            }
            ProviderEvent::StepsSaved(steps) => {
                for step in steps {
                    self.steps.insert(step.id.clone(), step.clone());
                }
            }
            ProviderEvent::ChunksSaved(chunks) | ProviderEvent::ChunksInserted(chunks) => {
                for chunk in chunks {
                    self.chunks.insert(chunk.id.clone(), chunk.clone());
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
