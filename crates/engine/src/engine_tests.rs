// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use saga_core::JobStateBuilder;
use std::time::Duration;

fn a_job(id: &str) -> JobState {
    JobStateBuilder::default().id(id).build()
}

#[tokio::test]
async fn immediate_engine_delivers_every_job_on_the_channel() {
    let (engine, mut rx) = ImmediateEngine::new(8);
    engine.start(vec![a_job("job-1"), a_job("job-2")]).await.unwrap();

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();
    assert_eq!(first.id.as_str(), "job-1");
    assert_eq!(second.id.as_str(), "job-2");
}

#[tokio::test]
async fn immediate_engine_reports_failures_once_the_receiver_drops() {
    let (engine, rx) = ImmediateEngine::new(8);
    drop(rx);

    let result = engine.start(vec![a_job("job-1")]).await;
    let err = result.unwrap_err();
    assert_eq!(err.failed_jobs.len(), 1);
    assert!(err.successful_jobs.is_empty());
}

#[tokio::test]
async fn delayed_engine_forwards_after_the_configured_delay() {
    let (immediate, mut rx) = ImmediateEngine::new(8);
    let delayed = DelayedEngine::new(immediate, Duration::from_millis(20));

    delayed.start(vec![a_job("job-1")]).await.unwrap();

    let delivered = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
    assert_eq!(delivered.id.as_str(), "job-1");
}
