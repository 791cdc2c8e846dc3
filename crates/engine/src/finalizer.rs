// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal callback invoked at most once per Job (§4.10/§6.3).

use saga_core::JobState;
use std::collections::HashMap;
use std::sync::Arc;

/// A terminal hook, resolved by `finalizer_name` the same way a Step is
/// resolved by `step_executor_name`. Read-only access to the final state;
/// errors it wants to surface must be logged internally via `tracing::error!`
/// rather than propagated, so a misbehaving finalizer never changes the
/// terminal status it was handed (§7).
pub trait Finalizable: Send + Sync {
    fn on_finish(&self, final_job: &JobState);
}

/// Name → instance registry for finalizers, mirroring [`crate::step::StepRegistry`].
/// Finalizers are shared singletons rather than one-per-invocation: unlike a
/// Step they hold no per-chunk state, so there is nothing to isolate.
#[derive(Default, Clone)]
pub struct FinalizerRegistry {
    finalizers: HashMap<String, Arc<dyn Finalizable>>,
}

impl FinalizerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, finalizer: impl Finalizable + 'static) {
        self.finalizers.insert(name.into(), Arc::new(finalizer));
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Finalizable>> {
        self.finalizers.get(name).cloned()
    }
}

#[cfg(test)]
#[path = "finalizer_tests.rs"]
mod tests;
