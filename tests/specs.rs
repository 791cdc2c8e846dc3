// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Black-box scenarios driven against a real [`FileProvider`], exercising
//! the orchestrator end to end the way a caller actually would: build a
//! job, invoke `run`/`run_batch` the documented number of times, and assert
//! on the persisted state afterwards.

use async_trait::async_trait;
use saga_core::{JobConfig, NextChunkRequest, StepCompletionState};
use saga_engine::{
    Budget, BatchAggregator, BatchOrchestrator, Context, Finalizable, FinalizerRegistry, ImmediateEngine, Retrier,
    SingleJobOrchestrator, Step, StepError, StepRegistry, StepResult,
};
use saga_core::{ChunkState, JobStatus, StepStatus};
use saga_storage::{FileProvider, Provider};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn provider() -> (tempfile::TempDir, FileProvider) {
    let dir = tempfile::tempdir().expect("tempdir");
    let provider = FileProvider::open(dir.path()).expect("open provider");
    (dir, provider)
}

struct TrivialStep;

#[async_trait]
impl Step for TrivialStep {
    async fn execute(&self, _ctx: &Context<'_>) -> StepResult {
        Ok(StepCompletionState { is_chunk_completed: true, partial_result: json!("ok"), ..Default::default() })
    }

    async fn compensate(&self, _ctx: &Context<'_>) -> StepResult {
        Ok(StepCompletionState { is_chunk_completed: true, ..Default::default() })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("downstream unavailable")]
struct Unavailable;

/// Always returns a retryable error; with `Retrier::new(1)` this exhausts on
/// the very first attempt, pivoting the job to Up on the next run.
struct AlwaysFailsStep;

#[async_trait]
impl Step for AlwaysFailsStep {
    async fn execute(&self, _ctx: &Context<'_>) -> StepResult {
        Err(StepError::retryable(Unavailable))
    }

    async fn compensate(&self, _ctx: &Context<'_>) -> StepResult {
        Ok(StepCompletionState { is_chunk_completed: true, ..Default::default() })
    }
}

struct PermanentStep;

#[async_trait]
impl Step for PermanentStep {
    async fn execute(&self, _ctx: &Context<'_>) -> StepResult {
        Err(StepError::permanent("card issuer rejected the charge"))
    }

    async fn compensate(&self, _ctx: &Context<'_>) -> StepResult {
        Ok(StepCompletionState { is_chunk_completed: true, ..Default::default() })
    }
}

/// Succeeds on execute, but its own compensate always fails permanently.
struct FailsToCompensateStep;

#[async_trait]
impl Step for FailsToCompensateStep {
    async fn execute(&self, _ctx: &Context<'_>) -> StepResult {
        Ok(StepCompletionState { is_chunk_completed: true, partial_result: json!("charged"), ..Default::default() })
    }

    async fn compensate(&self, _ctx: &Context<'_>) -> StepResult {
        Err(StepError::permanent("refund API is down"))
    }
}

/// Requests three chunks, then stops. Declares a [`BatchAggregator`] that
/// concatenates partial results with commas.
struct ChunkedStep;

#[async_trait]
impl Step for ChunkedStep {
    async fn execute(&self, ctx: &Context<'_>) -> StepResult {
        let step = ctx.current_step().await.map_err(|e| StepError::permanent(e.to_string()))?;
        let chunk_index = step.map(|s| s.current_chunk_index).unwrap_or(0);
        let partial = json!(format!("R-{chunk_index}"));
        let next_chunk = if chunk_index < 2 { Some(NextChunkRequest { hint: None }) } else { None };
        Ok(StepCompletionState { is_chunk_completed: true, partial_result: partial, next_chunk, ..Default::default() })
    }

    async fn compensate(&self, _ctx: &Context<'_>) -> StepResult {
        Ok(StepCompletionState { is_chunk_completed: true, ..Default::default() })
    }

    fn batch_aggregator(&self) -> Option<&dyn BatchAggregator> {
        Some(self)
    }
}

#[async_trait]
impl BatchAggregator for ChunkedStep {
    async fn start_aggregation(&self, _ctx: &Context<'_>) -> Value {
        json!("")
    }

    async fn execute_aggregation(&self, _ctx: &Context<'_>, state: Value, chunk_batch: &[ChunkState]) -> Value {
        let mut acc = state.as_str().unwrap_or_default().to_string();
        for chunk in chunk_batch {
            if !acc.is_empty() {
                acc.push(',');
            }
            acc.push_str(chunk.result.as_str().unwrap_or_default());
        }
        json!(acc)
    }

    async fn finish_aggregation(&self, _ctx: &Context<'_>, state: Value) -> Value {
        state
    }
}

#[derive(Default)]
struct CountingFinalizer(Arc<AtomicUsize>);

impl Finalizable for CountingFinalizer {
    fn on_finish(&self, _final_job: &saga_core::JobState) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn config(steps: &[&str]) -> JobConfig {
    JobConfig {
        id: None,
        step_executor_names: steps.iter().map(|s| s.to_string()).collect(),
        step_payloads: steps.iter().map(|_| Value::Null).collect(),
        finalizer_name: Some("finish".to_string()),
        vars: Default::default(),
    }
}

#[tokio::test]
async fn s1_two_step_happy_path_completes_and_finalizes_once() {
    let (_dir, provider) = provider();
    let finished = Arc::new(AtomicUsize::new(0));

    let mut steps = StepRegistry::new();
    steps.register("s", || Box::new(TrivialStep) as Box<dyn Step>);
    let mut finalizers = FinalizerRegistry::new();
    finalizers.register("finish", CountingFinalizer(finished.clone()));
    let orchestrator = SingleJobOrchestrator::new(steps, finalizers, Retrier::new(3));

    let jobs = provider.create_jobs(vec![config(&["s", "s"])]).await.unwrap();
    let job_id = jobs[0].id.clone();

    for _ in 0..2 {
        let ctx = Context::new(&provider, job_id.clone());
        orchestrator.run(&ctx, &provider).await.unwrap();
    }

    let job = provider.get_job_states(std::slice::from_ref(&job_id)).await.unwrap().remove(0);
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.current_step_index, 2);
    assert!(job.steps.iter().all(|s| s.status == StepStatus::Completed));
    assert_eq!(finished.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn s2_reversible_failure_pivots_up_and_ends_failed() {
    let (_dir, provider) = provider();

    let mut steps = StepRegistry::new();
    steps.register("s", || Box::new(TrivialStep) as Box<dyn Step>);
    steps.register("f", || Box::new(AlwaysFailsStep) as Box<dyn Step>);
    let orchestrator = SingleJobOrchestrator::new(steps, FinalizerRegistry::new(), Retrier::new(1));

    let jobs = provider.create_jobs(vec![config(&["s", "f"])]).await.unwrap();
    let job_id = jobs[0].id.clone();

    // run -> step0 completes; run -> step1 fails, direction flips Up;
    // run -> step1.compensate; run -> step0.compensate; run -> terminal.
    for _ in 0..5 {
        let ctx = Context::new(&provider, job_id.clone());
        orchestrator.run(&ctx, &provider).await.unwrap();
    }

    let job = provider.get_job_states(std::slice::from_ref(&job_id)).await.unwrap().remove(0);
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.current_step_index, -1);
}

#[tokio::test]
async fn s3_permanent_failure_ends_failed_with_no_compensation() {
    let (_dir, provider) = provider();

    let mut steps = StepRegistry::new();
    steps.register("p", || Box::new(PermanentStep) as Box<dyn Step>);
    let orchestrator = SingleJobOrchestrator::new(steps, FinalizerRegistry::new(), Retrier::new(3));

    let jobs = provider.create_jobs(vec![config(&["p"])]).await.unwrap();
    let job_id = jobs[0].id.clone();

    let ctx = Context::new(&provider, job_id.clone());
    orchestrator.run(&ctx, &provider).await.unwrap();

    let job = provider.get_job_states(std::slice::from_ref(&job_id)).await.unwrap().remove(0);
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.steps[0].status, StepStatus::Failed);
    assert!(job.final_error_details.is_some());
}

#[tokio::test]
async fn s4_chunked_step_aggregates_with_commas() {
    let (_dir, provider) = provider();

    let mut steps = StepRegistry::new();
    steps.register("chunked", || Box::new(ChunkedStep) as Box<dyn Step>);
    let orchestrator = SingleJobOrchestrator::new(steps, FinalizerRegistry::new(), Retrier::new(3));

    let jobs = provider.create_jobs(vec![config(&["chunked"])]).await.unwrap();
    let job_id = jobs[0].id.clone();

    for _ in 0..3 {
        let ctx = Context::new(&provider, job_id.clone());
        orchestrator.run(&ctx, &provider).await.unwrap();
    }

    let job = provider.get_job_states(std::slice::from_ref(&job_id)).await.unwrap().remove(0);
    assert_eq!(job.current_step_index, 1);
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.steps[0].result, Some(json!("R-0,R-1,R-2")));
}

#[tokio::test]
async fn s5_compensation_failure_ends_compensation_failed() {
    let (_dir, provider) = provider();

    let mut steps = StepRegistry::new();
    steps.register("c", || Box::new(FailsToCompensateStep) as Box<dyn Step>);
    steps.register("f", || Box::new(AlwaysFailsStep) as Box<dyn Step>);
    let orchestrator = SingleJobOrchestrator::new(steps, FinalizerRegistry::new(), Retrier::new(1));

    let jobs = provider.create_jobs(vec![config(&["c", "f"])]).await.unwrap();
    let job_id = jobs[0].id.clone();

    // step0 completes; step1 fails -> Up; step1.compensate ok; step0.compensate fails.
    for _ in 0..4 {
        let ctx = Context::new(&provider, job_id.clone());
        orchestrator.run(&ctx, &provider).await.unwrap();
    }

    let job = provider.get_job_states(std::slice::from_ref(&job_id)).await.unwrap().remove(0);
    assert_eq!(job.status, JobStatus::CompensationFailed);
    assert_eq!(job.steps[0].status, StepStatus::Failed);
}

#[tokio::test]
async fn s6_batch_overflow_splits_terminal_from_requeued_with_no_overlap() {
    let (_dir, provider) = provider();

    let mut steps = StepRegistry::new();
    steps.register("s", || Box::new(TrivialStep) as Box<dyn Step>);
    let single = SingleJobOrchestrator::new(steps, FinalizerRegistry::new(), Retrier::new(3));

    let configs: Vec<_> = (0..20).map(|_| config(&["s"])).collect();
    let jobs = provider.create_jobs(configs).await.unwrap();
    assert_eq!(jobs.len(), 20);

    let budget = Budget::with_limits(100, saga_engine::BudgetLimits { max_mutations: 7, ..Default::default() });
    let (retry_engine, mut redelivered) = ImmediateEngine::new(20);
    let batch = BatchOrchestrator::new(single, &provider, &retry_engine, budget);
    let report = batch.run_batch(jobs).await;

    assert!(report.critical_failures.is_empty());
    assert_eq!(report.terminal.len() + report.requeued.len(), 20);
    assert!(report.terminal.len() < 20, "budget of 7 mutations must not cover all 20 one-step jobs");
    assert!(!report.requeued.is_empty());
    assert!(report.retry_publish_failure.is_none());

    let terminal: std::collections::HashSet<_> = report.terminal.iter().collect();
    let requeued: std::collections::HashSet<_> = report.requeued.iter().collect();
    assert!(terminal.is_disjoint(&requeued));

    // retryEngine.start was called exactly once, handing over precisely the requeue list.
    redelivered.close();
    let mut via_engine = Vec::new();
    while let Some(job) = redelivered.recv().await {
        via_engine.push(job.id);
    }
    let via_engine: std::collections::HashSet<_> = via_engine.into_iter().collect();
    assert_eq!(via_engine, requeued.into_iter().cloned().collect());
}
