// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared across the orchestrator, and the wire-serializable
//! error chain persisted on a failed job.

use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use thiserror::Error;

/// One failed mutation within a bulk DML-style call: record index, a status
/// code/message pair, and the fields implicated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DmlError {
    pub record_index: usize,
    pub status_code: String,
    pub status_message: String,
    #[serde(default)]
    pub fields: Vec<String>,
}

/// A serializable snapshot of an error chain, suitable for persisting on
/// `JobState::final_error_details` and round-tripping through `serde_json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableError {
    pub type_name: String,
    pub message: String,
    #[serde(default)]
    pub stack: Vec<String>,
    #[serde(default)]
    pub dml_errors: Vec<DmlError>,
    #[serde(default)]
    pub cause: Option<Box<SerializableError>>,
}

impl SerializableError {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            stack: Vec::new(),
            dml_errors: Vec::new(),
            cause: None,
        }
    }

    pub fn with_dml_errors(mut self, errors: Vec<DmlError>) -> Self {
        self.dml_errors = errors;
        self
    }

    /// Walk `source()` to build the full cause chain.
    pub fn from_std(error: &(dyn StdError + 'static)) -> Self {
        let mut node = Self::new(std::any::type_name_of_val(error), error.to_string());
        if let Some(source) = error.source() {
            node.cause = Some(Box::new(Self::from_std(source)));
        }
        node
    }
}

impl std::fmt::Display for SerializableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.type_name, self.message)
    }
}

/// A step could not be resolved to a runnable implementation. Always maps to
/// [`PermanentFailure`] — an unresolvable class name cannot be retried.
#[derive(Debug, Error)]
pub enum StepInitializationError {
    #[error("Could not find class {0}")]
    NotFound(String),
    #[error("failed to construct step {name}")]
    ConstructionFailed {
        name: String,
        #[source]
        cause: Box<dyn StdError + Send + Sync>,
    },
}

/// Raised synchronously by the provider facade for malformed input: a null
/// job state, an unrecognized id, an invalid DML access-mode combination.
#[derive(Debug, Error)]
#[error("validation error: {0}")]
pub struct ValidationError(pub String);

/// Non-retryable failure: the retrier rethrows it immediately, and the
/// orchestrator ends the job Failed (or Compensation_Failed during Up).
#[derive(Debug, Error)]
#[error("{0}")]
pub struct PermanentFailure(pub SerializableError);

impl PermanentFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self(SerializableError::new("PermanentFailure", message))
    }
}

impl From<StepInitializationError> for PermanentFailure {
    fn from(error: StepInitializationError) -> Self {
        PermanentFailure(SerializableError::from_std(&error))
    }
}

impl From<ValidationError> for PermanentFailure {
    fn from(error: ValidationError) -> Self {
        PermanentFailure(SerializableError::from_std(&error))
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
