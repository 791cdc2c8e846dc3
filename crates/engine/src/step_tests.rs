// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

struct NoOpStep;

#[async_trait::async_trait]
impl Step for NoOpStep {
    async fn execute(&self, _ctx: &Context<'_>) -> StepResult {
        Ok(StepCompletionState { is_chunk_completed: true, ..Default::default() })
    }

    async fn compensate(&self, _ctx: &Context<'_>) -> StepResult {
        Ok(StepCompletionState { is_chunk_completed: true, ..Default::default() })
    }
}

#[test]
fn resolve_returns_not_found_for_an_unregistered_name() {
    let registry = StepRegistry::new();
    let err = registry.resolve("missing").unwrap_err();
    assert_eq!(err.to_string(), "Could not find class missing");
}

#[test]
fn resolve_constructs_a_fresh_instance_per_call() {
    let mut registry = StepRegistry::new();
    registry.register("noop", || Box::new(NoOpStep) as Box<dyn Step>);

    let a = registry.resolve("noop");
    let b = registry.resolve("noop");
    assert!(a.is_ok());
    assert!(b.is_ok());
}
