// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dynamic Step resolution, replacing reflective class lookup (§9 design
//! note) with an explicit name → factory registry populated at process start.

use crate::aggregator::{BatchAggregator, SimpleAggregator};
use crate::context::Context;
use crate::error::StepError;
use saga_core::{StepCompletionState, StepInitializationError};
use std::collections::HashMap;
use std::sync::Arc;

pub type StepResult = Result<StepCompletionState, StepError>;

/// A user-supplied compensatable unit of work, resolved at run time by name.
#[async_trait::async_trait]
pub trait Step: Send + Sync {
    async fn execute(&self, ctx: &Context<'_>) -> StepResult;
    async fn compensate(&self, ctx: &Context<'_>) -> StepResult;

    /// Single-shot aggregation capability (§4.6 mode 1).
    fn simple_aggregator(&self) -> Option<&dyn SimpleAggregator> {
        None
    }

    /// Streaming aggregation capability (§4.6 mode 2).
    fn batch_aggregator(&self) -> Option<&dyn BatchAggregator> {
        None
    }
}

/// Constructs one [`Step`] instance per resolution, mirroring the teacher's
/// convention of a fresh handler per invocation rather than a shared singleton.
pub trait StepFactory: Send + Sync {
    fn create(&self) -> Box<dyn Step>;
}

impl<F> StepFactory for F
where
    F: Fn() -> Box<dyn Step> + Send + Sync,
{
    fn create(&self) -> Box<dyn Step> {
        (self)()
    }
}

/// Name → factory registry populated once at process start. The only
/// process-wide state the orchestrator depends on (§9).
#[derive(Default)]
pub struct StepRegistry {
    factories: HashMap<String, Arc<dyn StepFactory>>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, factory: impl StepFactory + 'static) {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Resolve `name` to a runnable Step. "Could not find class" is a
    /// wire-compatible error prefix, not a literal reflective lookup.
    pub fn resolve(&self, name: &str) -> Result<Box<dyn Step>, StepInitializationError> {
        self.factories
            .get(name)
            .map(|factory| factory.create())
            .ok_or_else(|| StepInitializationError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
#[path = "step_tests.rs"]
mod tests;
