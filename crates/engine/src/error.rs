// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the orchestration engine.

use saga_core::{PermanentFailure, SerializableError, StepInitializationError};
use thiserror::Error;

/// What a [`crate::step::Step`] call can fail with (§9 design note: a result
/// sum type replacing exceptions-for-control-flow).
#[derive(Debug, Error)]
pub enum StepError {
    /// Any failure other than `Permanent` — the retrier retries it, and a
    /// reversible failure during Down flips the job's direction to Up.
    #[error("{0}")]
    Retryable(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// Not retried, no compensation attempted: the job ends terminally Failed
    /// (or Compensation_Failed during Up).
    #[error("{0}")]
    Permanent(PermanentFailure),
}

impl StepError {
    pub fn retryable(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Retryable(Box::new(error))
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent(PermanentFailure::new(message))
    }

    pub fn to_serializable(&self) -> SerializableError {
        match self {
            StepError::Retryable(e) => SerializableError::from_std(e.as_ref()),
            StepError::Permanent(e) => e.0.clone(),
        }
    }
}

impl From<StepInitializationError> for StepError {
    fn from(error: StepInitializationError) -> Self {
        StepError::Permanent(error.into())
    }
}

/// Errors surfaced by the engine crate's transports and orchestrators that
/// are not part of the saga state machine itself.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("provider error: {0}")]
    Provider(#[from] saga_storage::ProviderError),
    #[error(transparent)]
    Publishing(#[from] super::engine::PublishingError),
}
