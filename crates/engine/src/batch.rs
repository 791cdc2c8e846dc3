// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Limit-aware batch driver: pops jobs off a FIFO queue, runs one
//! orchestrator transaction per job, and requeues whatever didn't finish
//! this pass (§4.9/§6.4). Stops early once the [`crate::budget::Budget`]
//! says the process is out of room, requeuing the remainder untouched.

use crate::budget::Budget;
use crate::context::Context;
use crate::engine::{Engine, PublishingError};
use crate::orchestrator::{OrchestratorError, RunOutcome, SingleJobOrchestrator};
use saga_core::{JobId, JobState, SerializableError};
use saga_storage::Provider;
use std::collections::VecDeque;

/// A job that could not even be driven through one orchestrator invocation
/// (provider failure, unresolvable step/finalizer name, missing `jobId`) —
/// distinct from a job whose saga logic itself ended a step Failed.
#[derive(Debug)]
pub struct CriticalFailure {
    pub job_id: JobId,
    pub error: SerializableError,
}

/// Outcome of one [`BatchOrchestrator::run_batch`] call.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Jobs that reached a terminal status this pass.
    pub terminal: Vec<JobId>,
    /// Jobs the budget ceiling cut off before they could finish; handed to
    /// the retry engine exactly once before this report is returned.
    pub requeued: Vec<JobId>,
    pub critical_failures: Vec<CriticalFailure>,
    /// Set if `retryEngine.start` itself only partially succeeded on the
    /// requeue list — the caller can react to the failed subset (§7).
    pub retry_publish_failure: Option<PublishingError>,
}

/// Drives a batch of jobs to completion or to the budget ceiling, whichever
/// comes first. Never materializes more than one job's state at a time.
/// Whatever doesn't finish this pass is hand off to `retry_engine` for a
/// fresh transaction (§4.5 step 5).
pub struct BatchOrchestrator<'p> {
    single: SingleJobOrchestrator,
    provider: &'p dyn Provider,
    retry_engine: &'p dyn Engine,
    budget: Budget,
}

impl<'p> BatchOrchestrator<'p> {
    pub fn new(
        single: SingleJobOrchestrator,
        provider: &'p dyn Provider,
        retry_engine: &'p dyn Engine,
        budget: Budget,
    ) -> Self {
        Self { single, provider, retry_engine, budget }
    }

    pub async fn run_batch(&self, jobs: Vec<JobState>) -> BatchReport {
        let mut report = BatchReport::default();
        let mut queue: VecDeque<JobState> = VecDeque::new();

        for job in jobs {
            if job.id.as_str().is_empty() {
                report.critical_failures.push(CriticalFailure {
                    job_id: job.id,
                    error: SerializableError::new("MissingJobId", "job has no jobId; skipped"),
                });
                continue;
            }
            queue.push_back(job);
        }

        let mut requeued_jobs: Vec<JobState> = Vec::new();

        while let Some(job) = queue.pop_front() {
            if !self.budget.can_continue() {
                queue.push_front(job);
                requeued_jobs.extend(queue);
                break;
            }

            let job_id = job.id.clone();
            self.budget.counters().record_mutations(1);

            let ctx = Context::preloaded(self.provider, job);
            match self.single.run(&ctx, self.provider).await {
                Ok(RunOutcome::Terminal(_)) => report.terminal.push(job_id),
                Ok(RunOutcome::ChunkExecuted | RunOutcome::StepAdvanced) => {
                    if let Some(advanced) = ctx.into_job() {
                        queue.push_back(advanced);
                    } else {
                        report.critical_failures.push(CriticalFailure {
                            job_id,
                            error: SerializableError::new("ContextLost", "job vanished from context after a successful run"),
                        });
                    }
                }
                Err(err) => report.critical_failures.push(to_critical_failure(job_id, err)),
            }
        }

        if !requeued_jobs.is_empty() {
            report.requeued = requeued_jobs.iter().map(|job| job.id.clone()).collect();
            if let Err(publish_err) = self.retry_engine.start(requeued_jobs).await {
                report.retry_publish_failure = Some(publish_err);
            }
        }

        report
    }
}

fn to_critical_failure(job_id: JobId, err: OrchestratorError) -> CriticalFailure {
    CriticalFailure { job_id, error: SerializableError::from_std(&err) }
}

#[cfg(test)]
#[path = "batch_tests.rs"]
mod tests;
