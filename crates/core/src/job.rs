// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job, Step and Chunk state, and the cross-transaction cursor types a Step
//! uses to hand work back to the orchestrator.

use crate::clock::Clock;
use crate::status::{ChunkStatus, Direction, JobStatus, StepStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

crate::define_id! {
    /// Identity of one saga instance.
    pub struct JobId;
}

crate::define_id! {
    /// Identity of one compensatable stage of a job.
    pub struct StepId;
}

crate::define_id! {
    /// Identity of one short transaction's worth of work inside a step.
    pub struct ChunkId;
}

/// Caller-opaque descriptor requesting another chunk of the same step.
///
/// The orchestrator never interprets `hint`; it is round-tripped back to the
/// step on the next invocation alongside `progress_state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextChunkRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// What a [`crate::step::Step`] call returns: whether the current chunk is
/// done, its partial result, the advanced progress cursor, whether another
/// chunk is requested, and a rollback hint for compensation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepCompletionState {
    pub is_chunk_completed: bool,
    #[serde(default)]
    pub partial_result: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_progress_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_chunk: Option<NextChunkRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_values: Option<Value>,
}

impl StepCompletionState {
    /// A step signals "the step itself is done" with this shape: the current
    /// chunk finished and no further chunk was requested.
    pub fn step_done(&self) -> bool {
        self.is_chunk_completed && self.next_chunk.is_none()
    }
}

/// One short transaction's worth of work inside a step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkState {
    pub id: ChunkId,
    pub parent_step_id: StepId,
    pub chunk_index: u32,
    pub status: ChunkStatus,
    #[serde(default)]
    pub result: Value,
    /// Opaque rollback hint captured at execute time, read during compensate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_values: Option<Value>,
}

/// One compensatable stage of a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepState {
    pub id: StepId,
    pub parent_job_id: JobId,
    pub step_index: u32,
    pub status: StepStatus,
    /// Identifier resolved at run time to a [`crate::step::Step`] implementation.
    pub step_executor_name: String,
    /// Opaque mapping provided at creation; read-only to the orchestrator.
    #[serde(default)]
    pub payload: Value,
    /// Aggregated final value once the step is Completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Opaque cursor advanced by the step across chunk boundaries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_state: Option<String>,
    pub current_chunk_index: u32,
    pub total_chunks: u32,
    #[serde(default)]
    pub chunks: Vec<ChunkState>,
}

impl StepState {
    /// Every chunk owned by this step is Completed (invariant 2's chunk half).
    pub fn all_chunks_completed(&self) -> bool {
        !self.chunks.is_empty() && self.chunks.iter().all(|c| c.status == ChunkStatus::Completed)
    }
}

/// Configuration for creating a new job via the provider's `create_jobs`.
#[derive(Debug, Clone, Default)]
pub struct JobConfig {
    /// Caller-supplied identity; providers assign one when `None`.
    pub id: Option<String>,
    pub step_executor_names: Vec<String>,
    pub step_payloads: Vec<Value>,
    pub finalizer_name: Option<String>,
    pub vars: HashMap<String, String>,
}

/// Master record of one saga instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobState {
    pub id: JobId,
    pub status: JobStatus,
    pub direction: Direction,
    /// Ranges over `[-1, total_steps]`; see invariant 1 of the saga state machine.
    pub current_step_index: i32,
    pub total_steps: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finalizer_name: Option<String>,
    #[serde(default)]
    pub finalizer_executed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_error_details: Option<Value>,
    #[serde(default)]
    pub steps: Vec<StepState>,
    /// Optimistic-lock version (§9 open question Q3): bumped on every save.
    #[serde(default)]
    pub version: u64,
}

impl JobState {
    /// Construct a New job from a config; step scaffolding is derived from
    /// `config.step_executor_names` with one Pending step per entry.
    pub fn new(id: JobId, config: &JobConfig, _clock: &impl Clock) -> Self {
        let total_steps = config.step_executor_names.len() as u32;
        let mut payloads = config.step_payloads.iter().cloned();
        let steps = config
            .step_executor_names
            .iter()
            .enumerate()
            .map(|(index, name)| StepState {
                id: StepId::new(format!("{}-step-{}", id.as_str(), index)),
                parent_job_id: id.clone(),
                step_index: index as u32,
                status: StepStatus::Pending,
                step_executor_name: name.clone(),
                payload: payloads.next().unwrap_or(Value::Null),
                result: None,
                progress_state: None,
                current_chunk_index: 0,
                total_chunks: 0,
                chunks: Vec::new(),
            })
            .collect();

        Self {
            id,
            status: JobStatus::New,
            direction: Direction::Down,
            current_step_index: 0,
            total_steps,
            finalizer_name: config.finalizer_name.clone(),
            finalizer_executed: false,
            final_error_details: None,
            steps,
            version: 0,
        }
    }

    /// The step the orchestrator should act on next, or `None` at either
    /// terminal boundary (`current_step_index == total_steps` or `== -1`).
    pub fn current_step(&self) -> Option<&StepState> {
        if self.current_step_index < 0 || self.current_step_index as u32 >= self.total_steps {
            None
        } else {
            self.steps.get(self.current_step_index as usize)
        }
    }

    pub fn current_step_mut(&mut self) -> Option<&mut StepState> {
        if self.current_step_index < 0 || self.current_step_index as u32 >= self.total_steps {
            None
        } else {
            self.steps.get_mut(self.current_step_index as usize)
        }
    }

    /// `currentStepIndex = totalSteps`: the Down boundary (job Completed).
    pub fn at_down_boundary(&self) -> bool {
        self.current_step_index as u32 == self.total_steps
    }

    /// `currentStepIndex = -1`: the Up boundary (terminal compensation).
    pub fn at_up_boundary(&self) -> bool {
        self.current_step_index == -1
    }
}

/// Builder for [`JobState`] with test defaults, mirroring the teacher's
/// `*Builder` pattern for entity construction in tests.
#[cfg(any(test, feature = "test-support"))]
pub struct JobStateBuilder {
    id: JobId,
    status: JobStatus,
    direction: Direction,
    current_step_index: i32,
    steps: Vec<StepState>,
    finalizer_name: Option<String>,
}

#[cfg(any(test, feature = "test-support"))]
impl Default for JobStateBuilder {
    fn default() -> Self {
        Self {
            id: JobId::new("job-1"),
            status: JobStatus::New,
            direction: Direction::Down,
            current_step_index: 0,
            steps: Vec::new(),
            finalizer_name: None,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl JobStateBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = JobId::new(id);
        self
    }

    pub fn status(mut self, status: JobStatus) -> Self {
        self.status = status;
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn current_step_index(mut self, index: i32) -> Self {
        self.current_step_index = index;
        self
    }

    pub fn finalizer_name(mut self, name: impl Into<String>) -> Self {
        self.finalizer_name = Some(name.into());
        self
    }

    pub fn step(mut self, executor_name: impl Into<String>) -> Self {
        let index = self.steps.len() as u32;
        self.steps.push(StepState {
            id: StepId::new(format!("{}-step-{}", self.id.as_str(), index)),
            parent_job_id: self.id.clone(),
            step_index: index,
            status: StepStatus::Pending,
            step_executor_name: executor_name.into(),
            payload: Value::Null,
            result: None,
            progress_state: None,
            current_chunk_index: 0,
            total_chunks: 0,
            chunks: Vec::new(),
        });
        self
    }

    pub fn build(self) -> JobState {
        JobState {
            id: self.id,
            status: self.status,
            direction: self.direction,
            current_step_index: self.current_step_index,
            total_steps: self.steps.len() as u32,
            finalizer_name: self.finalizer_name,
            finalizer_executed: false,
            final_error_details: None,
            steps: self.steps,
            version: 0,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl JobState {
    pub fn builder() -> JobStateBuilder {
        JobStateBuilder::default()
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
