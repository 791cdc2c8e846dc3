// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Result aggregation over a Step's chunks at completion (§4.6). The batch
//! mode pages through the Provider rather than materializing the full chunk
//! list, the only scalable shape per the §9 design note.

use crate::context::Context;
use saga_core::{ChunkState, StepId};
use saga_storage::{ChunkPageCursor, Provider, ProviderError};
use serde_json::Value;

/// Page size for both aggregation modes, grounded on the teacher's WAL
/// `FLUSH_THRESHOLD` sizing convention (bound memory, not correctness).
pub const AGGREGATION_PAGE_SIZE: usize = 100;

/// Single-shot aggregation: small result sets, the whole chunk list at once.
pub trait SimpleAggregator: Send + Sync {
    fn aggregate(&self, chunks: &[ChunkState]) -> Value;
}

/// Streaming aggregation: an accumulator folded page by page.
#[async_trait::async_trait]
pub trait BatchAggregator: Send + Sync {
    async fn start_aggregation(&self, ctx: &Context<'_>) -> Value;
    async fn execute_aggregation(&self, ctx: &Context<'_>, state: Value, chunk_batch: &[ChunkState]) -> Value;
    async fn finish_aggregation(&self, ctx: &Context<'_>, state: Value) -> Value;
}

/// Runs whichever aggregation capability the Step declares, or falls back to
/// the single chunk's own result per invariant 2 ("or is the single chunk's
/// result") when the Step declares neither.
pub async fn aggregate(
    step: &dyn crate::step::Step,
    ctx: &Context<'_>,
    provider: &dyn Provider,
    step_id: &StepId,
) -> Result<Value, ProviderError> {
    if let Some(aggregator) = step.simple_aggregator() {
        let chunks = collect_all_chunks(provider, step_id).await?;
        return Ok(aggregator.aggregate(&chunks));
    }

    if let Some(aggregator) = step.batch_aggregator() {
        let mut state = aggregator.start_aggregation(ctx).await;
        let mut cursor: Option<ChunkPageCursor> = None;
        loop {
            let page = provider.get_chunks_for_step(step_id, cursor, AGGREGATION_PAGE_SIZE).await?;
            state = aggregator.execute_aggregation(ctx, state, &page.chunks).await;
            cursor = page.next_cursor;
            if cursor.is_none() {
                break;
            }
        }
        return Ok(aggregator.finish_aggregation(ctx, state).await);
    }

    let chunks = collect_all_chunks(provider, step_id).await?;
    Ok(chunks.last().map(|c| c.result.clone()).unwrap_or(Value::Null))
}

async fn collect_all_chunks(provider: &dyn Provider, step_id: &StepId) -> Result<Vec<ChunkState>, ProviderError> {
    let mut chunks = Vec::new();
    let mut cursor: Option<ChunkPageCursor> = None;
    loop {
        let page = provider.get_chunks_for_step(step_id, cursor, AGGREGATION_PAGE_SIZE).await?;
        cursor = page.next_cursor;
        chunks.extend(page.chunks);
        if cursor.is_none() {
            break;
        }
    }
    Ok(chunks)
}

#[cfg(test)]
#[path = "aggregator_tests.rs"]
mod tests;
