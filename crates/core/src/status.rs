// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status and direction enums for the saga state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of travel through a job's steps.
///
/// `Down` is forward execution; `Up` is compensation, triggered by a
/// reversible failure and walking steps in decreasing index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Down,
    Up,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Down => write!(f, "Down"),
            Direction::Up => write!(f, "Up"),
        }
    }
}

/// Status of a [`crate::job::JobState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    New,
    Pending,
    InProgress,
    AwaitingCompensation,
    Completed,
    Failed,
    #[serde(rename = "Compensation_Failed")]
    CompensationFailed,
}

impl JobStatus {
    /// Whether this status is terminal (Completed, Failed, or Compensation_Failed).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::CompensationFailed
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::New => write!(f, "New"),
            JobStatus::Pending => write!(f, "Pending"),
            JobStatus::InProgress => write!(f, "InProgress"),
            JobStatus::AwaitingCompensation => write!(f, "AwaitingCompensation"),
            JobStatus::Completed => write!(f, "Completed"),
            JobStatus::Failed => write!(f, "Failed"),
            JobStatus::CompensationFailed => write!(f, "Compensation_Failed"),
        }
    }
}

/// Status of a [`crate::job::StepState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Compensating,
    Compensated,
    Failed,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "Pending"),
            StepStatus::InProgress => write!(f, "InProgress"),
            StepStatus::Completed => write!(f, "Completed"),
            StepStatus::Compensating => write!(f, "Compensating"),
            StepStatus::Compensated => write!(f, "Compensated"),
            StepStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// Status of a [`crate::job::ChunkState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl fmt::Display for ChunkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkStatus::Pending => write!(f, "Pending"),
            ChunkStatus::InProgress => write!(f, "InProgress"),
            ChunkStatus::Completed => write!(f, "Completed"),
            ChunkStatus::Failed => write!(f, "Failed"),
        }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
