// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::state::ProviderEvent;
use saga_core::clock::FakeClock;
use saga_core::{JobConfig, JobId, JobState};
use std::fs;
use std::io::Write;
use tempfile::tempdir;

fn a_job_created_event(id: &str) -> ProviderEvent {
    let clock = FakeClock::new(0);
    let cfg = JobConfig {
        id: None,
        step_executor_names: vec!["charge_card".to_string()],
        step_payloads: Vec::new(),
        finalizer_name: None,
        vars: Default::default(),
    };
    ProviderEvent::JobsCreated(vec![JobState::new(JobId::new(id), &cfg, &clock)])
}

#[test]
fn append_then_flush_then_read_back() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.jsonl");
    let mut wal = Wal::open(&path, 0).unwrap();

    let seq = wal.append(&a_job_created_event("job-1")).unwrap();
    assert_eq!(seq, 1);
    wal.flush().unwrap();

    let entry = wal.next_unprocessed().unwrap().unwrap();
    assert_eq!(entry.seq, 1);
}

#[test]
fn next_unprocessed_flushes_pending_writes_implicitly() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.jsonl");
    let mut wal = Wal::open(&path, 0).unwrap();

    wal.append(&a_job_created_event("job-1")).unwrap();
    // No explicit flush() call.
    let entry = wal.next_unprocessed().unwrap();
    assert!(entry.is_some());
}

#[test]
fn mark_processed_advances_processed_seq() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.jsonl");
    let mut wal = Wal::open(&path, 0).unwrap();

    wal.append(&a_job_created_event("job-1")).unwrap();
    wal.flush().unwrap();
    wal.mark_processed(1);
    assert_eq!(wal.processed_seq(), 1);
}

#[test]
fn reopen_resumes_from_processed_seq() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.jsonl");

    {
        let mut wal = Wal::open(&path, 0).unwrap();
        wal.append(&a_job_created_event("job-1")).unwrap();
        wal.append(&a_job_created_event("job-2")).unwrap();
        wal.flush().unwrap();
        wal.mark_processed(1);
    }

    let mut wal = Wal::open(&path, 1).unwrap();
    let entry = wal.next_unprocessed().unwrap().unwrap();
    assert_eq!(entry.seq, 2);
}

#[test]
fn truncate_before_drops_processed_entries() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.jsonl");
    let mut wal = Wal::open(&path, 0).unwrap();

    wal.append(&a_job_created_event("job-1")).unwrap();
    wal.append(&a_job_created_event("job-2")).unwrap();
    wal.append(&a_job_created_event("job-3")).unwrap();
    wal.flush().unwrap();
    wal.mark_processed(2);

    wal.truncate_before(3).unwrap();

    let remaining = wal.entries_after(0).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].seq, 3);
}

#[test]
fn entries_after_returns_only_newer_entries() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.jsonl");
    let mut wal = Wal::open(&path, 0).unwrap();

    wal.append(&a_job_created_event("job-1")).unwrap();
    wal.append(&a_job_created_event("job-2")).unwrap();
    wal.flush().unwrap();

    let entries = wal.entries_after(1).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].seq, 2);
}

#[test]
fn corrupt_trailing_entry_is_rotated_to_bak_on_open() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wal.jsonl");

    {
        let mut wal = Wal::open(&path, 0).unwrap();
        wal.append(&a_job_created_event("job-1")).unwrap();
        wal.flush().unwrap();
    }

    let mut f = fs::OpenOptions::new().append(true).open(&path).unwrap();
    f.write_all(b"not valid json\n").unwrap();
    drop(f);

    let wal = Wal::open(&path, 0).unwrap();
    assert_eq!(wal.write_seq(), 1, "only the valid entry should survive");
    assert!(path.with_extension("bak").exists());
}

#[test]
fn needs_flush_is_false_for_empty_buffer() {
    let dir = tempdir().unwrap();
    let wal = Wal::open(&dir.path().join("wal.jsonl"), 0).unwrap();
    assert!(!wal.needs_flush());
}
