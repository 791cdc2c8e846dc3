// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Property tests over the single-job and batch orchestrators, checked
//! against randomized job shapes rather than the fixed scenarios in
//! `orchestrator_tests.rs`/`batch_tests.rs`.

use super::*;
use crate::batch::BatchOrchestrator;
use crate::budget::{Budget, BudgetLimits};
use crate::context::Context;
use crate::engine::{Engine, PublishingError};
use crate::error::StepError;
use crate::finalizer::{Finalizable, FinalizerRegistry};
use crate::step::{Step, StepRegistry, StepResult};
use parking_lot::Mutex;
use proptest::prelude::*;
use saga_core::{Direction, JobConfig, JobStatus, StepCompletionState};
use saga_storage::MemoryProvider;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Happy,
    RetryableThenFail,
    Permanent,
}

/// A step whose behavior is fixed at registration and which records every
/// `(step_index, direction)` pair it is invoked with, for ordering checks.
struct ScriptedStep {
    index: usize,
    outcome: Outcome,
    visits: Arc<Mutex<Vec<(usize, Direction)>>>,
}

#[derive(Debug, thiserror::Error)]
#[error("scripted transient failure")]
struct Scripted;

#[async_trait::async_trait]
impl Step for ScriptedStep {
    async fn execute(&self, _ctx: &Context<'_>) -> StepResult {
        self.visits.lock().push((self.index, Direction::Down));
        match self.outcome {
            Outcome::Happy => {
                Ok(StepCompletionState { is_chunk_completed: true, partial_result: json!("ok"), ..Default::default() })
            }
            Outcome::RetryableThenFail => Err(StepError::retryable(Scripted)),
            Outcome::Permanent => Err(StepError::permanent("scripted permanent failure")),
        }
    }

    async fn compensate(&self, _ctx: &Context<'_>) -> StepResult {
        self.visits.lock().push((self.index, Direction::Up));
        Ok(StepCompletionState { is_chunk_completed: true, ..Default::default() })
    }
}

/// Always-succeeds retry engine stand-in; P6 only cares that every input job
/// lands in exactly one bucket, not where a requeued job's redelivery goes.
#[derive(Default)]
struct NoopEngine;

#[async_trait::async_trait]
impl Engine for NoopEngine {
    async fn start(&self, _jobs: Vec<saga_core::JobState>) -> Result<(), PublishingError> {
        Ok(())
    }
}

struct CountingFinalizer(Arc<std::sync::atomic::AtomicUsize>);

impl Finalizable for CountingFinalizer {
    fn on_finish(&self, _final_job: &saga_core::JobState) {
        self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

fn registry_for(outcomes: &[Outcome], visits: Arc<Mutex<Vec<(usize, Direction)>>>) -> (StepRegistry, JobConfig) {
    let mut registry = StepRegistry::new();
    let names: Vec<String> = outcomes
        .iter()
        .enumerate()
        .map(|(i, outcome)| {
            let name = format!("step-{i}");
            let outcome = *outcome;
            let visits = visits.clone();
            registry.register(name.clone(), move || {
                Box::new(ScriptedStep { index: i, outcome, visits: visits.clone() }) as Box<dyn Step>
            });
            name
        })
        .collect();

    let config = JobConfig {
        id: None,
        step_executor_names: names,
        step_payloads: outcomes.iter().map(|_| serde_json::Value::Null).collect(),
        finalizer_name: Some("finish".to_string()),
        vars: Default::default(),
    };
    (registry, config)
}

fn outcomes_strategy(max_steps: usize) -> impl Strategy<Value = Vec<Outcome>> {
    prop::collection::vec(
        prop_oneof![Just(Outcome::Happy), Just(Outcome::RetryableThenFail), Just(Outcome::Permanent)],
        1..=max_steps,
    )
}

/// Only-happy job shapes, for the liveness and ordering properties where a
/// failure would make "terminal in N steps" a different, also-true, story.
fn happy_only_strategy(max_steps: usize) -> impl Strategy<Value = Vec<Outcome>> {
    (1..=max_steps).prop_map(|n| vec![Outcome::Happy; n])
}

proptest! {
    /// P1: starting from New, a bounded number of invocations reaches a
    /// terminal status, for any all-happy job shape.
    #[test]
    fn p1_liveness_under_bounded_invocations(outcomes in happy_only_strategy(6)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let visits = Arc::new(Mutex::new(Vec::new()));
            let (registry, config) = registry_for(&outcomes, visits);
            let orchestrator = SingleJobOrchestrator::new(registry, FinalizerRegistry::new(), Retrier::new(2));
            let provider = MemoryProvider::default();
            let jobs = provider.create_jobs(vec![config]).await.unwrap();
            let job_id = jobs[0].id.clone();

            let max_invocations = outcomes.len() + 2;
            let mut terminal = None;
            for _ in 0..max_invocations {
                let ctx = Context::new(&provider, job_id.clone());
                if let RunOutcome::Terminal(status) = orchestrator.run(&ctx, &provider).await.unwrap() {
                    terminal = Some(status);
                    break;
                }
            }
            prop_assert_eq!(terminal, Some(JobStatus::Completed));
            Ok(())
        })?;
    }

    /// P3: forward visits strictly increase by step index, compensation
    /// visits strictly decrease, and the two phases never interleave.
    #[test]
    fn p3_ordering_is_monotonic_per_direction(outcomes in outcomes_strategy(5)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let visits = Arc::new(Mutex::new(Vec::new()));
            let (registry, config) = registry_for(&outcomes, visits.clone());
            let orchestrator = SingleJobOrchestrator::new(registry, FinalizerRegistry::new(), Retrier::new(1));
            let provider = MemoryProvider::default();
            let jobs = provider.create_jobs(vec![config]).await.unwrap();
            let job_id = jobs[0].id.clone();

            for _ in 0..(outcomes.len() * 4 + 4) {
                let ctx = Context::new(&provider, job_id.clone());
                if let RunOutcome::Terminal(_) = orchestrator.run(&ctx, &provider).await.unwrap() {
                    break;
                }
            }

            let recorded = visits.lock().clone();
            let mut saw_up = false;
            let mut last_down = None;
            let mut last_up = None;
            for (index, direction) in recorded {
                match direction {
                    Direction::Down => {
                        prop_assert!(!saw_up, "forward visit after compensation began");
                        if let Some(last) = last_down {
                            prop_assert!(index >= last, "forward visits must not move backward");
                        }
                        last_down = Some(index);
                    }
                    Direction::Up => {
                        saw_up = true;
                        if let Some(last) = last_up {
                            prop_assert!(index <= last, "compensation visits must not move forward");
                        }
                        last_up = Some(index);
                    }
                }
            }
            Ok(())
        })?;
    }

    /// P4: the finalizer fires at most once per job, and exactly once iff
    /// the job reached a terminal status within the invocation budget.
    #[test]
    fn p4_finalizer_fires_at_most_once(outcomes in outcomes_strategy(5)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let visits = Arc::new(Mutex::new(Vec::new()));
            let (registry, config) = registry_for(&outcomes, visits);
            let finished = Arc::new(std::sync::atomic::AtomicUsize::new(0));
            let mut finalizers = FinalizerRegistry::new();
            finalizers.register("finish", CountingFinalizer(finished.clone()));
            let orchestrator = SingleJobOrchestrator::new(registry, finalizers, Retrier::new(1));
            let provider = MemoryProvider::default();
            let jobs = provider.create_jobs(vec![config]).await.unwrap();
            let job_id = jobs[0].id.clone();

            let max_invocations = outcomes.len() * 4 + 4;
            let mut reached_terminal = false;
            for _ in 0..max_invocations {
                let ctx = Context::new(&provider, job_id.clone());
                if let RunOutcome::Terminal(_) = orchestrator.run(&ctx, &provider).await.unwrap() {
                    reached_terminal = true;
                    break;
                }
            }

            let count = finished.load(std::sync::atomic::Ordering::SeqCst);
            prop_assert!(count <= 1);
            prop_assert_eq!(count == 1, reached_terminal);
            Ok(())
        })?;
    }

    /// P6: every job handed into a batch ends up in exactly one of
    /// `terminal`/`requeued`/`critical_failures`, whatever the budget.
    #[test]
    fn p6_batch_accounts_for_every_job_exactly_once(
        job_count in 1usize..12,
        max_mutations in 0u64..20,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let mut registry = StepRegistry::new();
            registry.register("happy", || Box::new(ScriptedStep {
                index: 0,
                outcome: Outcome::Happy,
                visits: Arc::new(Mutex::new(Vec::new())),
            }) as Box<dyn Step>);
            let single = SingleJobOrchestrator::new(registry, FinalizerRegistry::new(), Retrier::new(1));

            let provider = MemoryProvider::default();
            let configs: Vec<_> = (0..job_count)
                .map(|_| JobConfig {
                    id: None,
                    step_executor_names: vec!["happy".to_string()],
                    step_payloads: vec![serde_json::Value::Null],
                    finalizer_name: None,
                    vars: Default::default(),
                })
                .collect();
            let jobs = provider.create_jobs(configs).await.unwrap();
            let input_ids: std::collections::HashSet<_> = jobs.iter().map(|j| j.id.clone()).collect();

            let budget = Budget::with_limits(95, BudgetLimits { max_mutations, ..Default::default() });
            let retry_engine = NoopEngine;
            let batch = BatchOrchestrator::new(single, &provider, &retry_engine, budget);
            let report = batch.run_batch(jobs).await;

            let mut accounted: std::collections::HashSet<_> = report.terminal.iter().cloned().collect();
            for id in &report.requeued {
                prop_assert!(accounted.insert(id.clone()), "job counted in more than one bucket");
            }
            for failure in &report.critical_failures {
                prop_assert!(accounted.insert(failure.job_id.clone()), "job counted in more than one bucket");
            }
            prop_assert_eq!(accounted, input_ids);
            Ok(())
        })?;
    }
}
