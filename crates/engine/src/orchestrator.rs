// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Drives one Job through a single short transaction: one chunk of work in
//! whichever direction the job currently travels, per the state-transition
//! table of §4.4. Persists through the Provider and returns, leaving the
//! Engine (§4.8) to schedule the next invocation.

use crate::context::Context;
use crate::finalizer::FinalizerRegistry;
use crate::retrier::{is_retries_exhausted, Retrier};
use crate::step::StepRegistry;
use saga_core::{
    ChunkId, ChunkState, ChunkStatus, Direction, JobState, JobStatus, StepInitializationError, StepStatus,
};
use saga_storage::{Provider, ProviderError};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("step initialization error: {0}")]
    StepInit(#[from] StepInitializationError),
}

/// Whether the failing step's own `compensate` is invoked as part of the
/// Down→Up pivot. `Always` is the only variant implemented: the failing
/// step's compensate always runs before earlier steps are unwound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailingStepCompensationPolicy {
    Always,
}

/// The concrete thing this invocation did to the job, steps, and chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// A chunk ran (Down) and the step is not yet finished.
    ExecuteChunk,
    /// The current step finished and the job advanced to the next index.
    StepCompleted,
    /// A chunk was compensated (Up) and the step is not yet compensated.
    CompensateChunk,
    /// The current step finished compensating and the job stepped back.
    StepCompensated,
    /// The job reached a terminal status this invocation.
    FinalizeTerminal(JobStatus),
}

/// Coarser view of [`Action`] for callers that only care about progress
/// shape, not which direction produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    ChunkExecuted,
    StepAdvanced,
    Terminal(JobStatus),
}

impl From<&Action> for RunOutcome {
    fn from(action: &Action) -> Self {
        match action {
            Action::ExecuteChunk | Action::CompensateChunk => RunOutcome::ChunkExecuted,
            Action::StepCompleted | Action::StepCompensated => RunOutcome::StepAdvanced,
            Action::FinalizeTerminal(status) => RunOutcome::Terminal(*status),
        }
    }
}

/// Runs one job forward (Down) or through compensation (Up) by exactly one
/// chunk's worth of work per invocation, matching the teacher's one-job
/// transaction shape but over Steps and Chunks instead of pipeline stages.
pub struct SingleJobOrchestrator {
    steps: StepRegistry,
    finalizers: FinalizerRegistry,
    retrier: Retrier,
    compensation_policy: FailingStepCompensationPolicy,
}

impl SingleJobOrchestrator {
    pub fn new(steps: StepRegistry, finalizers: FinalizerRegistry, retrier: Retrier) -> Self {
        Self { steps, finalizers, retrier, compensation_policy: FailingStepCompensationPolicy::Always }
    }

    pub fn compensation_policy(&self) -> FailingStepCompensationPolicy {
        self.compensation_policy
    }

    pub async fn run(
        &self,
        ctx: &Context<'_>,
        provider: &dyn Provider,
    ) -> Result<RunOutcome, OrchestratorError> {
        let mut job = ctx.job().await?;

        if job.status.is_terminal() {
            return Ok(RunOutcome::Terminal(job.status));
        }

        if matches!(job.status, JobStatus::New | JobStatus::Pending) {
            job.status = JobStatus::InProgress;
        }

        let action = match job.direction {
            Direction::Down => self.step_down(&mut job, ctx, provider).await?,
            Direction::Up => self.step_up(&mut job, ctx, provider).await?,
        };

        let outcome = RunOutcome::from(&action);
        self.finalize_if_terminal(&mut job);
        provider.save_jobs(vec![job.clone()]).await?;
        ctx.set_job(job);

        Ok(outcome)
    }

    async fn step_down(
        &self,
        job: &mut JobState,
        ctx: &Context<'_>,
        provider: &dyn Provider,
    ) -> Result<Action, OrchestratorError> {
        if job.at_down_boundary() {
            job.status = JobStatus::Completed;
            return Ok(Action::FinalizeTerminal(JobStatus::Completed));
        }

        let step_index = job.current_step_index as usize;
        let step_id = job.steps[step_index].id.clone();
        if job.steps[step_index].status == StepStatus::Pending {
            job.steps[step_index].status = StepStatus::InProgress;
        }

        let (chunk_index_in_vec, is_new_chunk) = self.ensure_current_chunk(job, step_index);

        let step_impl = self.steps.resolve(&job.steps[step_index].step_executor_name)?;
        ctx.set_job(job.clone());
        let span = tracing::info_span!("step", job_id = %job.id, step_index, direction = %Direction::Down);
        let started = std::time::Instant::now();
        let outcome = { let _enter = span.enter(); self.retrier.execute(|| step_impl.execute(ctx)).await };
        tracing::info!(parent: &span, elapsed_ms = started.elapsed().as_millis() as u64, outcome = %outcome_label(&outcome), "step attempt finished");

        match outcome {
            Ok(completion) => {
                let chunk_completed = completion.is_chunk_completed;
                let step_finished = completion.step_done();
                let next_chunk_requested = completion.next_chunk.is_some();

                let step = &mut job.steps[step_index];
                let chunk = &mut step.chunks[chunk_index_in_vec];
                chunk.result = completion.partial_result.clone();
                chunk.previous_values = completion.previous_values.clone();
                chunk.status = if chunk_completed { ChunkStatus::Completed } else { ChunkStatus::InProgress };
                step.progress_state = completion.next_progress_state.clone();
                let chunk_snapshot = chunk.clone();

                if is_new_chunk {
                    provider.insert_chunks(vec![chunk_snapshot]).await?;
                } else {
                    provider.save_chunks(vec![chunk_snapshot]).await?;
                }

                if step_finished {
                    let step = &mut job.steps[step_index];
                    step.status = StepStatus::Completed;
                    let result = crate::aggregator::aggregate(step_impl.as_ref(), ctx, provider, &step_id).await?;
                    step.result = Some(result);
                    provider.save_steps(vec![step.clone()]).await?;
                    job.current_step_index += 1;
                    Ok(Action::StepCompleted)
                } else {
                    let step = &mut job.steps[step_index];
                    if next_chunk_requested && chunk_completed {
                        step.current_chunk_index += 1;
                        step.total_chunks += 1;
                    }
                    provider.save_steps(vec![step.clone()]).await?;
                    Ok(Action::ExecuteChunk)
                }
            }
            Err(failure) => {
                let step = &mut job.steps[step_index];
                step.status = StepStatus::Failed;
                provider.save_steps(vec![step.clone()]).await?;

                if is_retries_exhausted(&failure) {
                    job.direction = Direction::Up;
                    job.status = JobStatus::AwaitingCompensation;
                    Ok(Action::ExecuteChunk)
                } else {
                    job.status = JobStatus::Failed;
                    job.final_error_details = Some(error_to_value(&failure.0));
                    Ok(Action::FinalizeTerminal(JobStatus::Failed))
                }
            }
        }
    }

    async fn step_up(
        &self,
        job: &mut JobState,
        ctx: &Context<'_>,
        provider: &dyn Provider,
    ) -> Result<Action, OrchestratorError> {
        if job.at_up_boundary() {
            job.status = JobStatus::Failed;
            return Ok(Action::FinalizeTerminal(JobStatus::Failed));
        }

        debug_assert_eq!(self.compensation_policy, FailingStepCompensationPolicy::Always);

        let step_index = job.current_step_index as usize;
        if matches!(job.steps[step_index].status, StepStatus::Failed | StepStatus::Completed) {
            job.steps[step_index].status = StepStatus::Compensating;
        }

        let (chunk_index_in_vec, is_new_chunk) = self.ensure_current_chunk(job, step_index);

        let step_impl = self.steps.resolve(&job.steps[step_index].step_executor_name)?;
        ctx.set_job(job.clone());
        let span = tracing::info_span!("step", job_id = %job.id, step_index, direction = %Direction::Up);
        let started = std::time::Instant::now();
        let outcome = { let _enter = span.enter(); self.retrier.execute(|| step_impl.compensate(ctx)).await };
        tracing::info!(parent: &span, elapsed_ms = started.elapsed().as_millis() as u64, outcome = %outcome_label(&outcome), "compensate attempt finished");

        match outcome {
            Ok(completion) => {
                let step_finished = completion.step_done();

                let step = &mut job.steps[step_index];
                let chunk = &mut step.chunks[chunk_index_in_vec];
                chunk.result = completion.partial_result.clone();
                chunk.status =
                    if completion.is_chunk_completed { ChunkStatus::Completed } else { ChunkStatus::InProgress };
                step.progress_state = completion.next_progress_state.clone();
                let chunk_snapshot = chunk.clone();

                if is_new_chunk {
                    provider.insert_chunks(vec![chunk_snapshot]).await?;
                } else {
                    provider.save_chunks(vec![chunk_snapshot]).await?;
                }

                if step_finished {
                    let step = &mut job.steps[step_index];
                    step.status = StepStatus::Compensated;
                    provider.save_steps(vec![step.clone()]).await?;
                    job.current_step_index -= 1;
                    Ok(Action::StepCompensated)
                } else {
                    let step = &mut job.steps[step_index];
                    provider.save_steps(vec![step.clone()]).await?;
                    Ok(Action::CompensateChunk)
                }
            }
            Err(failure) => {
                let step = &mut job.steps[step_index];
                step.status = StepStatus::Failed;
                provider.save_steps(vec![step.clone()]).await?;

                job.status = JobStatus::CompensationFailed;
                job.final_error_details = Some(error_to_value(&failure.0));
                Ok(Action::FinalizeTerminal(JobStatus::CompensationFailed))
            }
        }
    }

    /// Ensure `job.steps[step_index]` has a chunk at `current_chunk_index`,
    /// scaffolding one if this is its first visit. Returns the chunk's
    /// position in `step.chunks` (not `chunk_index`, which is a stable
    /// business id, unlike this position) so callers can index back into it
    /// without a fallible re-`find`.
    fn ensure_current_chunk(&self, job: &mut JobState, step_index: usize) -> (usize, bool) {
        let step = &mut job.steps[step_index];
        let chunk_index = step.current_chunk_index;
        if let Some(pos) = step.chunks.iter().position(|c| c.chunk_index == chunk_index) {
            step.chunks[pos].status = ChunkStatus::InProgress;
            return (pos, false);
        }

        let id = ChunkId::new(format!("{}-chunk-{}", step.id.as_str(), chunk_index));
        step.chunks.push(ChunkState {
            id,
            parent_step_id: step.id.clone(),
            chunk_index,
            status: ChunkStatus::InProgress,
            result: Value::Null,
            previous_values: None,
        });
        if step.total_chunks <= chunk_index {
            step.total_chunks = chunk_index + 1;
        }
        (step.chunks.len() - 1, true)
    }

    /// Invoke the job's finalizer exactly once, guarded by `finalizer_executed`.
    /// A finalizer's own failure is logged, never propagated (§7): it must
    /// never change the terminal status it was handed.
    fn finalize_if_terminal(&self, job: &mut JobState) {
        if !job.status.is_terminal() || job.finalizer_executed {
            return;
        }
        if let Some(name) = job.finalizer_name.clone() {
            match self.finalizers.resolve(&name) {
                Some(finalizer) => finalizer.on_finish(job),
                None => tracing::error!(finalizer = %name, "finalizer not found in registry"),
            }
        }
        job.finalizer_executed = true;
    }
}

fn error_to_value(error: &saga_core::SerializableError) -> Value {
    serde_json::to_value(error).unwrap_or_else(|_| Value::String(error.to_string()))
}

fn outcome_label<T>(outcome: &Result<T, saga_core::PermanentFailure>) -> &'static str {
    match outcome {
        Ok(_) => "ok",
        Err(e) if is_retries_exhausted(e) => "exhausted",
        Err(_) => "permanent",
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;

#[cfg(test)]
#[path = "orchestrator_proptests.rs"]
mod proptests;
