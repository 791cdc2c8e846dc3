// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-through accessor to one Job's state for the lifetime of a single
//! orchestrator invocation, grounded on the teacher's `Executor` holding a
//! cached `Arc<Mutex<MaterializedState>>`.

use parking_lot::Mutex;
use saga_core::{ChunkState, JobId, JobState, StepState};
use saga_storage::{Provider, ProviderError};

/// Bound to one [`JobId`]. The first call to [`Context::job`] loads the job
/// through the Provider and caches it; subsequent reads in the same `run()`
/// call are free. The orchestrator mutates the cached copy via
/// [`Context::set_job`] and the batch orchestrator drains it with
/// [`Context::into_job`] to flush at the end of the transaction.
pub struct Context<'p> {
    provider: &'p dyn Provider,
    job_id: JobId,
    job: Mutex<Option<JobState>>,
}

impl<'p> Context<'p> {
    pub fn new(provider: &'p dyn Provider, job_id: JobId) -> Self {
        Self { provider, job_id, job: Mutex::new(None) }
    }

    /// Bind a context to a job that is already loaded, bypassing the reload
    /// (mirrors the Provider contract's "a preloaded job bypasses reload").
    pub fn preloaded(provider: &'p dyn Provider, job: JobState) -> Self {
        let job_id = job.id.clone();
        Self { provider, job_id, job: Mutex::new(Some(job)) }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// The current job state, loading it through the Provider on first use.
    pub async fn job(&self) -> Result<JobState, ProviderError> {
        if let Some(job) = self.job.lock().clone() {
            return Ok(job);
        }
        let mut loaded = self.provider.get_job_states(std::slice::from_ref(&self.job_id)).await?;
        let job = loaded
            .pop()
            .ok_or_else(|| ProviderError::JobNotFound(self.job_id.clone()))?;
        *self.job.lock() = Some(job.clone());
        Ok(job)
    }

    pub async fn current_step(&self) -> Result<Option<StepState>, ProviderError> {
        Ok(self.job().await?.current_step().cloned())
    }

    /// The chunk the Step is about to act on: the one at `current_chunk_index`,
    /// or `None` if no chunk has been started yet.
    pub async fn current_chunk(&self) -> Result<Option<ChunkState>, ProviderError> {
        let step = match self.current_step().await? {
            Some(step) => step,
            None => return Ok(None),
        };
        Ok(step.chunks.get(step.current_chunk_index as usize).cloned())
    }

    /// Replace the cached job with the orchestrator's in-progress mutation.
    pub fn set_job(&self, job: JobState) {
        *self.job.lock() = Some(job);
    }

    /// Hand the final mutated job back out for the batch orchestrator to persist.
    pub fn into_job(self) -> Option<JobState> {
        self.job.into_inner()
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
