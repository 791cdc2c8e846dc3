// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A fixed two-step demo pipeline (charge a card, ship an item) exercising
//! the full contract: a reversible failure on `ship_item` compensates
//! `charge_card` via a refund.

use saga_core::{JobConfig, StepCompletionState};
use saga_engine::{Context, Step, StepError, StepRegistry, StepResult};
use serde_json::json;

struct ChargeCard;

#[async_trait::async_trait]
impl Step for ChargeCard {
    async fn execute(&self, ctx: &Context<'_>) -> StepResult {
        let step = ctx.current_step().await.map_err(|e| StepError::permanent(e.to_string()))?;
        let amount = step.and_then(|s| s.payload.get("amount_cents").cloned()).unwrap_or(json!(0));
        tracing::info!(%amount, "charging card");
        Ok(StepCompletionState {
            is_chunk_completed: true,
            partial_result: json!({"charged_cents": amount}),
            previous_values: Some(json!({"amount_cents": amount})),
            ..Default::default()
        })
    }

    async fn compensate(&self, ctx: &Context<'_>) -> StepResult {
        let chunk = ctx.current_chunk().await.map_err(|e| StepError::permanent(e.to_string()))?;
        let refunded = chunk.and_then(|c| c.previous_values).unwrap_or(json!(null));
        tracing::info!(%refunded, "refunding card");
        Ok(StepCompletionState { is_chunk_completed: true, partial_result: json!({"refunded": refunded}), ..Default::default() })
    }
}

struct ShipItem;

#[derive(Debug, thiserror::Error)]
#[error("carrier temporarily unavailable")]
struct CarrierUnavailable;

#[async_trait::async_trait]
impl Step for ShipItem {
    async fn execute(&self, ctx: &Context<'_>) -> StepResult {
        let step = ctx.current_step().await.map_err(|e| StepError::permanent(e.to_string()))?;
        let should_fail = step.and_then(|s| s.payload.get("simulate_shipping_failure").and_then(|v| v.as_bool())).unwrap_or(false);
        if should_fail {
            return Err(StepError::retryable(CarrierUnavailable));
        }
        Ok(StepCompletionState { is_chunk_completed: true, partial_result: json!({"shipped": true}), ..Default::default() })
    }

    async fn compensate(&self, _ctx: &Context<'_>) -> StepResult {
        Ok(StepCompletionState { is_chunk_completed: true, ..Default::default() })
    }
}

pub fn registry() -> StepRegistry {
    let mut registry = StepRegistry::new();
    registry.register("charge_card", || Box::new(ChargeCard) as Box<dyn Step>);
    registry.register("ship_item", || Box::new(ShipItem) as Box<dyn Step>);
    registry
}

/// `simulate_shipping_failure` lets the demo exercise either the happy path
/// or the compensation path on demand.
pub fn demo_job_config(simulate_shipping_failure: bool) -> JobConfig {
    JobConfig {
        id: None,
        step_executor_names: vec!["charge_card".to_string(), "ship_item".to_string()],
        step_payloads: vec![
            json!({"amount_cents": 4999}),
            json!({"simulate_shipping_failure": simulate_shipping_failure}),
        ],
        finalizer_name: None,
        vars: Default::default(),
    }
}
