// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::context::Context;
use crate::step::{Step, StepResult};
use saga_core::{ChunkId, ChunkStatus, JobConfig};
use saga_storage::MemoryProvider;
use serde_json::json;

fn a_chunk(step_id: &StepId, index: u32, result: &str) -> ChunkState {
    ChunkState {
        id: ChunkId::new(format!("{}-chunk-{index}", step_id.as_str())),
        parent_step_id: step_id.clone(),
        chunk_index: index,
        status: ChunkStatus::Completed,
        result: json!(result),
        previous_values: None,
    }
}

struct CommaJoinStep;

#[async_trait::async_trait]
impl Step for CommaJoinStep {
    async fn execute(&self, _ctx: &Context<'_>) -> StepResult {
        unreachable!("not exercised in these tests")
    }
    async fn compensate(&self, _ctx: &Context<'_>) -> StepResult {
        unreachable!("not exercised in these tests")
    }
    fn batch_aggregator(&self) -> Option<&dyn BatchAggregator> {
        Some(self)
    }
}

#[async_trait::async_trait]
impl BatchAggregator for CommaJoinStep {
    async fn start_aggregation(&self, _ctx: &Context<'_>) -> Value {
        json!([])
    }

    async fn execute_aggregation(&self, _ctx: &Context<'_>, state: Value, chunk_batch: &[ChunkState]) -> Value {
        let mut parts: Vec<String> = state.as_array().unwrap().iter().map(|v| v.as_str().unwrap().to_string()).collect();
        parts.extend(chunk_batch.iter().map(|c| c.result.as_str().unwrap().to_string()));
        json!(parts)
    }

    async fn finish_aggregation(&self, _ctx: &Context<'_>, state: Value) -> Value {
        let parts: Vec<String> = state.as_array().unwrap().iter().map(|v| v.as_str().unwrap().to_string()).collect();
        json!(parts.join(","))
    }
}

struct ConcatSimpleStep;

#[async_trait::async_trait]
impl Step for ConcatSimpleStep {
    async fn execute(&self, _ctx: &Context<'_>) -> StepResult {
        unreachable!("not exercised in these tests")
    }
    async fn compensate(&self, _ctx: &Context<'_>) -> StepResult {
        unreachable!("not exercised in these tests")
    }
    fn simple_aggregator(&self) -> Option<&dyn SimpleAggregator> {
        Some(self)
    }
}

impl SimpleAggregator for ConcatSimpleStep {
    fn aggregate(&self, chunks: &[ChunkState]) -> Value {
        let parts: Vec<String> = chunks.iter().map(|c| c.result.as_str().unwrap().to_string()).collect();
        json!(parts.join(","))
    }
}

fn a_config() -> JobConfig {
    JobConfig {
        id: None,
        step_executor_names: vec!["join".to_string()],
        step_payloads: Vec::new(),
        finalizer_name: None,
        vars: Default::default(),
    }
}

#[tokio::test]
async fn batch_aggregator_pages_through_chunks_and_joins_with_comma() {
    let provider = MemoryProvider::default();
    let jobs = provider.create_jobs(vec![a_config()]).await.unwrap();
    let step_id = jobs[0].steps[0].id.clone();

    let chunks = vec![a_chunk(&step_id, 0, "R-0"), a_chunk(&step_id, 1, "R-1"), a_chunk(&step_id, 2, "R-2")];
    provider.insert_chunks(chunks).await.unwrap();

    let ctx = Context::preloaded(&provider, jobs[0].clone());
    let step = CommaJoinStep;
    let result = aggregate(&step, &ctx, &provider, &step_id).await.unwrap();
    assert_eq!(result, json!("R-0,R-1,R-2"));
}

#[tokio::test]
async fn simple_and_batch_aggregators_agree_on_the_same_chunks() {
    let provider = MemoryProvider::default();
    let jobs = provider.create_jobs(vec![a_config()]).await.unwrap();
    let step_id = jobs[0].steps[0].id.clone();

    let chunks = vec![a_chunk(&step_id, 0, "a"), a_chunk(&step_id, 1, "b"), a_chunk(&step_id, 2, "c")];
    provider.insert_chunks(chunks).await.unwrap();

    let ctx = Context::preloaded(&provider, jobs[0].clone());
    let simple_result = aggregate(&ConcatSimpleStep, &ctx, &provider, &step_id).await.unwrap();
    let batch_result = aggregate(&CommaJoinStep, &ctx, &provider, &step_id).await.unwrap();
    assert_eq!(simple_result, batch_result);
}

struct NoAggregatorStep;

#[async_trait::async_trait]
impl Step for NoAggregatorStep {
    async fn execute(&self, _ctx: &Context<'_>) -> StepResult {
        unreachable!("not exercised in these tests")
    }
    async fn compensate(&self, _ctx: &Context<'_>) -> StepResult {
        unreachable!("not exercised in these tests")
    }
}

#[tokio::test]
async fn no_aggregator_capability_falls_back_to_the_single_chunks_result() {
    let provider = MemoryProvider::default();
    let jobs = provider.create_jobs(vec![a_config()]).await.unwrap();
    let step_id = jobs[0].steps[0].id.clone();
    provider.insert_chunks(vec![a_chunk(&step_id, 0, "only")]).await.unwrap();

    let ctx = Context::preloaded(&provider, jobs[0].clone());
    let result = aggregate(&NoAggregatorStep, &ctx, &provider, &step_id).await.unwrap();
    assert_eq!(result, json!("only"));
}
