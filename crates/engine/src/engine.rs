// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pluggable transport that schedules the next orchestrator invocation
//! (§4.6/§6.1). Two implementations ship: an immediate in-process hand-off
//! and a delayed one built on the teacher's timer-bookkeeping idiom.

use crate::scheduler::Scheduler;
use parking_lot::Mutex;
use saga_core::{JobId, JobState, SerializableError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;

/// Raised when scheduling partially fails (§4.8).
#[derive(Debug, Error)]
#[error("publishing error: {} succeeded, {} failed", successful_jobs.len(), failed_jobs.len())]
pub struct PublishingError {
    pub successful_jobs: Vec<JobId>,
    pub failed_jobs: Vec<JobId>,
    pub errors_by_index: HashMap<usize, SerializableError>,
}

/// Durably (within this process) schedules another transaction for a set of
/// jobs. Both the main and retry engine slots (§4.5/Q2) share this contract;
/// the batch orchestrator never distinguishes them semantically.
#[async_trait::async_trait]
pub trait Engine: Send + Sync {
    async fn start(&self, jobs: Vec<JobState>) -> Result<(), PublishingError>;
}

/// Pushes jobs onto an in-process channel a caller drains to drive the next
/// Batch Orchestrator invocation. Used by the CLI's single-process demo loop
/// and by tests; the channel stands in for a durable external transport.
pub struct ImmediateEngine {
    tx: mpsc::Sender<JobState>,
}

impl ImmediateEngine {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<JobState>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait::async_trait]
impl Engine for ImmediateEngine {
    async fn start(&self, jobs: Vec<JobState>) -> Result<(), PublishingError> {
        let mut successful = Vec::new();
        let mut failed = Vec::new();
        let mut errors_by_index = HashMap::new();

        for (index, job) in jobs.into_iter().enumerate() {
            let id = job.id.clone();
            match self.tx.send(job).await {
                Ok(()) => successful.push(id),
                Err(err) => {
                    errors_by_index.insert(index, SerializableError::new("SendError", err.to_string()));
                    failed.push(id);
                }
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(PublishingError { successful_jobs: successful, failed_jobs: failed, errors_by_index })
        }
    }
}

/// Wraps an [`ImmediateEngine`] with the teacher's [`Scheduler`] timer
/// bookkeeping to defer delivery by a fixed `Duration`, modeling a
/// delayed-retry transport. A background task polls for fired deliveries and
/// forwards them to the wrapped engine.
pub struct DelayedEngine {
    inner: Arc<ImmediateEngine>,
    delay: Duration,
    scheduler: Arc<Mutex<Scheduler>>,
}

impl DelayedEngine {
    pub fn new(inner: ImmediateEngine, delay: Duration) -> Self {
        let scheduler = Arc::new(Mutex::new(Scheduler::new()));
        let engine = Self { inner: Arc::new(inner), delay, scheduler };
        engine.spawn_driver();
        engine
    }

    fn spawn_driver(&self) {
        let scheduler = self.scheduler.clone();
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(50));
            loop {
                ticker.tick().await;
                let batches = scheduler.lock().fired(Instant::now());
                for batch in batches {
                    if let Err(err) = inner.start(batch).await {
                        tracing::error!(failed = err.failed_jobs.len(), "delayed redelivery failed");
                    }
                }
            }
        });
    }
}

#[async_trait::async_trait]
impl Engine for DelayedEngine {
    async fn start(&self, jobs: Vec<JobState>) -> Result<(), PublishingError> {
        self.scheduler.lock().schedule(jobs, self.delay, Instant::now());
        Ok(())
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
