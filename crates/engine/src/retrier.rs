// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded-attempt execution of a Step call (§9 design note: a result sum
//! type stands in for throw/catch across module boundaries).

use crate::step::StepResult;
use saga_core::{PermanentFailure, SerializableError, StepCompletionState};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::StepError;

/// `type_name` the Retrier stamps on a `PermanentFailure` it constructs
/// itself after exhausting retries, distinguishing "ran out of attempts on a
/// retryable error" (the orchestrator's Down pivot, §4.4) from a Step
/// raising `PermanentFailure` natively (no pivot, no compensation).
pub const EXHAUSTED_TYPE_NAME: &str = "RetrierExhausted";

/// Whether `failure` was synthesized by [`Retrier::execute`] exhausting its
/// attempts, as opposed to a Step's own `PermanentFailure`.
pub fn is_retries_exhausted(failure: &PermanentFailure) -> bool {
    failure.0.type_name == EXHAUSTED_TYPE_NAME
}

/// Pluggable delay between retry attempts. The core specifies no delay; this
/// is the seam an implementation hangs one on without touching the contract.
pub trait Backoff: Send + Sync {
    fn delay(&self, attempt: u32) -> Duration;
}

/// Default: no delay between attempts.
pub struct NoBackoff;

impl Backoff for NoBackoff {
    fn delay(&self, _attempt: u32) -> Duration {
        Duration::ZERO
    }
}

/// Runs an action up to `max_attempts` times. A [`StepError::Permanent`] is
/// never retried; any other error is retried until attempts are exhausted,
/// at which point a `PermanentFailure` with a fixed message is raised.
pub struct Retrier {
    max_attempts: u32,
    backoff: Option<Arc<dyn Backoff>>,
}

impl Retrier {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts: max_attempts.max(1), backoff: None }
    }

    pub fn with_backoff(max_attempts: u32, backoff: Arc<dyn Backoff>) -> Self {
        Self { max_attempts: max_attempts.max(1), backoff: Some(backoff) }
    }

    pub async fn execute<F, Fut>(&self, action: F) -> Result<StepCompletionState, PermanentFailure>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = StepResult>,
    {
        for attempt in 1..=self.max_attempts {
            match action().await {
                Ok(state) => return Ok(state),
                Err(StepError::Permanent(e)) => return Err(e),
                Err(StepError::Retryable(_)) if attempt < self.max_attempts => {
                    if let Some(backoff) = &self.backoff {
                        tokio::time::sleep(backoff.delay(attempt)).await;
                    }
                }
                Err(StepError::Retryable(_)) => break,
            }
        }
        Err(PermanentFailure(SerializableError::new(
            EXHAUSTED_TYPE_NAME,
            format!("Action failed after {} attempts.", self.max_attempts),
        )))
    }
}

#[cfg(test)]
#[path = "retrier_tests.rs"]
mod tests;
