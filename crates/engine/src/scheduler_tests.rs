// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use saga_core::clock::FakeClock;
use saga_core::{JobConfig, JobId};

fn a_job(id: &str) -> JobState {
    let clock = FakeClock::new(0);
    let cfg = JobConfig {
        id: None,
        step_executor_names: vec!["charge_card".to_string()],
        step_payloads: Vec::new(),
        finalizer_name: None,
        vars: Default::default(),
    };
    JobState::new(JobId::new(id), &cfg, &clock)
}

#[test]
fn fired_is_empty_before_the_deadline() {
    let base = Instant::now();
    let mut scheduler = Scheduler::new();
    scheduler.schedule(vec![a_job("job-1")], Duration::from_secs(10), base);

    assert!(scheduler.has_pending());
    let fired = scheduler.fired(base + Duration::from_secs(5));
    assert!(fired.is_empty());
    assert!(scheduler.has_pending());
}

#[test]
fn fired_drains_deliveries_past_their_deadline() {
    let base = Instant::now();
    let mut scheduler = Scheduler::new();
    scheduler.schedule(vec![a_job("job-1")], Duration::from_secs(10), base);

    let fired = scheduler.fired(base + Duration::from_secs(10));
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0][0].id.as_str(), "job-1");
    assert!(!scheduler.has_pending());
}

#[test]
fn cancel_removes_a_booked_delivery() {
    let base = Instant::now();
    let mut scheduler = Scheduler::new();
    let id = scheduler.schedule(vec![a_job("job-1")], Duration::from_secs(10), base);

    let cancelled = scheduler.cancel(id);
    assert!(cancelled.is_some());

    let fired = scheduler.fired(base + Duration::from_secs(20));
    assert!(fired.is_empty());
}

#[test]
fn deliveries_fire_independently() {
    let base = Instant::now();
    let mut scheduler = Scheduler::new();
    scheduler.schedule(vec![a_job("fast")], Duration::from_secs(5), base);
    scheduler.schedule(vec![a_job("slow")], Duration::from_secs(20), base);

    let fired = scheduler.fired(base + Duration::from_secs(6));
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0][0].id.as_str(), "fast");
    assert!(scheduler.has_pending(), "slow delivery should still be pending");

    let fired = scheduler.fired(base + Duration::from_secs(21));
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0][0].id.as_str(), "slow");
    assert!(!scheduler.has_pending());
}

#[test]
fn next_deadline_returns_the_earliest_pending() {
    let base = Instant::now();
    let mut scheduler = Scheduler::new();
    scheduler.schedule(vec![a_job("later")], Duration::from_secs(30), base);
    scheduler.schedule(vec![a_job("sooner")], Duration::from_secs(10), base);

    assert_eq!(scheduler.next_deadline(), Some(base + Duration::from_secs(10)));
}

#[test]
fn empty_scheduler_has_no_deadline() {
    let scheduler = Scheduler::new();
    assert!(!scheduler.has_pending());
    assert!(scheduler.next_deadline().is_none());
}
