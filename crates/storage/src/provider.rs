// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The durable persistence contract for jobs, steps, and chunks.
//!
//! [`FileProvider`] is backed by a JSONL WAL with group commit and periodic
//! zstd snapshots, grounded on [`crate::wal`] / [`crate::checkpoint`].
//! [`MemoryProvider`] skips durability entirely and backs unit tests.
//!
//! Both share the same read-through [`TransactionCache`]: reads within one
//! transaction are served from the cache until [`Provider::invalidate_cache`]
//! clears it at the transaction boundary.

use async_trait::async_trait;
use parking_lot::Mutex;
use saga_core::clock::{Clock, SystemClock};
use saga_core::id::{IdGen, UuidIdGen};
use saga_core::{ChunkId, ChunkState, JobConfig, JobId, JobState, StepId, StepState};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

use crate::checkpoint::{CheckpointError, Checkpointer};
use crate::snapshot::{Snapshot, SnapshotError};
use crate::state::{MaterializedState, ProviderEvent};
use crate::wal::{Wal, WalError};

/// Flush the WAL to a fresh snapshot after this many group-committed writes.
const CHECKPOINT_EVERY_N_WRITES: usize = 200;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("job not found: {0}")]
    JobNotFound(JobId),
    #[error("step not found: {0}")]
    StepNotFound(StepId),
    #[error("version conflict saving job {id}: expected {expected}, found {found}")]
    VersionConflict { id: JobId, expected: u64, found: u64 },
    #[error("wal error: {0}")]
    Wal(#[from] WalError),
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
}

/// Opaque cursor over a step's chunks, ordered by `chunk_index` ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPageCursor(pub u32);

#[derive(Debug, Clone)]
pub struct ChunkPage {
    pub chunks: Vec<ChunkState>,
    pub next_cursor: Option<ChunkPageCursor>,
}

/// Per-transaction read-through cache, keyed by job id.
///
/// Cleared by [`Provider::invalidate_cache`] at the end of a transaction;
/// never consulted across transaction boundaries.
#[derive(Default)]
pub struct TransactionCache {
    jobs: Mutex<HashMap<JobId, JobState>>,
}

impl TransactionCache {
    fn get(&self, id: &JobId) -> Option<JobState> {
        self.jobs.lock().get(id).cloned()
    }

    fn put(&self, job: JobState) {
        self.jobs.lock().insert(job.id.clone(), job);
    }

    fn clear(&self) {
        self.jobs.lock().clear();
    }
}

/// Durable, stateful contract the orchestrator uses to read and write job,
/// step, and chunk records.
///
/// Every batch operation is idempotent on empty input: `Vec::new()` in
/// yields `Vec::new()` (or `Ok(())`) out, never an error.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn create_jobs(&self, configs: Vec<JobConfig>) -> Result<Vec<JobState>, ProviderError>;
    async fn get_job_states(&self, ids: &[JobId]) -> Result<Vec<JobState>, ProviderError>;
    async fn save_jobs(&self, jobs: Vec<JobState>) -> Result<(), ProviderError>;
    async fn save_steps(&self, steps: Vec<StepState>) -> Result<(), ProviderError>;
    async fn save_chunks(&self, chunks: Vec<ChunkState>) -> Result<(), ProviderError>;
    async fn insert_chunks(&self, chunks: Vec<ChunkState>) -> Result<(), ProviderError>;

    async fn get_chunks_for_step(
        &self,
        step_id: &StepId,
        page_cursor: Option<ChunkPageCursor>,
        page_size: usize,
    ) -> Result<ChunkPage, ProviderError>;

    /// Drop the transaction-local cache, forcing the next read to go to the
    /// materialized state.
    fn invalidate_cache(&self);
}

fn paginate(mut chunks: Vec<ChunkState>, cursor: Option<ChunkPageCursor>, page_size: usize) -> ChunkPage {
    chunks.sort_by_key(|c| c.chunk_index);
    if let Some(ChunkPageCursor(after)) = cursor {
        chunks.retain(|c| c.chunk_index > after);
    }
    let next_cursor = if chunks.len() > page_size {
        chunks.truncate(page_size);
        chunks.last().map(|c| ChunkPageCursor(c.chunk_index))
    } else {
        None
    };
    ChunkPage { chunks, next_cursor }
}

/// Bump a job's optimistic-lock version, rejecting stale writers.
///
/// Resolves the cross-transaction mutual exclusion open question: a caller
/// that read a job at version N and saves it must still see version N in
/// the materialized state, or the save is rejected.
fn apply_version_lock(existing: Option<&JobState>, incoming: &mut JobState) -> Result<(), ProviderError> {
    if let Some(existing) = existing {
        if existing.version != incoming.version {
            return Err(ProviderError::VersionConflict {
                id: incoming.id.clone(),
                expected: existing.version,
                found: incoming.version,
            });
        }
    }
    incoming.version += 1;
    Ok(())
}

/// In-memory provider with no persistence; backs unit and property tests.
pub struct MemoryProvider<G: IdGen = UuidIdGen, C: Clock = SystemClock> {
    state: Mutex<MaterializedState>,
    cache: TransactionCache,
    id_gen: G,
    clock: C,
}

impl MemoryProvider<UuidIdGen, SystemClock> {
    pub fn new() -> Self {
        Self::with_id_gen_and_clock(UuidIdGen, SystemClock)
    }
}

impl Default for MemoryProvider<UuidIdGen, SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: IdGen, C: Clock> MemoryProvider<G, C> {
    pub fn with_id_gen_and_clock(id_gen: G, clock: C) -> Self {
        Self {
            state: Mutex::new(MaterializedState::default()),
            cache: TransactionCache::default(),
            id_gen,
            clock,
        }
    }
}

#[async_trait]
impl<G: IdGen, C: Clock> Provider for MemoryProvider<G, C> {
    async fn create_jobs(&self, configs: Vec<JobConfig>) -> Result<Vec<JobState>, ProviderError> {
        if configs.is_empty() {
            return Ok(Vec::new());
        }
        let jobs: Vec<JobState> = configs
            .into_iter()
            .map(|config| {
                let id = JobId::new(config.id.clone().unwrap_or_else(|| self.id_gen.next()));
                JobState::new(id, &config, &self.clock)
            })
            .collect();

        let mut state = self.state.lock();
        state.apply_event(&ProviderEvent::JobsCreated(jobs.clone()));
        for job in &jobs {
            self.cache.put(job.clone());
        }
        Ok(jobs)
    }

    async fn get_job_states(&self, ids: &[JobId]) -> Result<Vec<JobState>, ProviderError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(cached) = self.cache.get(id) {
                out.push(cached);
                continue;
            }
            let state = self.state.lock();
            let job = state.get_job(id).ok_or_else(|| ProviderError::JobNotFound(id.clone()))?.clone();
            drop(state);
            self.cache.put(job.clone());
            out.push(job);
        }
        Ok(out)
    }

    async fn save_jobs(&self, mut jobs: Vec<JobState>) -> Result<(), ProviderError> {
        if jobs.is_empty() {
            return Ok(());
        }
        let mut state = self.state.lock();
        for job in &mut jobs {
            apply_version_lock(state.get_job(&job.id), job)?;
        }
        state.apply_event(&ProviderEvent::JobsSaved(jobs.clone()));
        drop(state);
        for job in jobs {
            self.cache.put(job);
        }
        Ok(())
    }

    async fn save_steps(&self, steps: Vec<StepState>) -> Result<(), ProviderError> {
        if steps.is_empty() {
            return Ok(());
        }
        self.state.lock().apply_event(&ProviderEvent::StepsSaved(steps));
        Ok(())
    }

    async fn save_chunks(&self, chunks: Vec<ChunkState>) -> Result<(), ProviderError> {
        if chunks.is_empty() {
            return Ok(());
        }
        self.state.lock().apply_event(&ProviderEvent::ChunksSaved(chunks));
        Ok(())
    }

    async fn insert_chunks(&self, chunks: Vec<ChunkState>) -> Result<(), ProviderError> {
        if chunks.is_empty() {
            return Ok(());
        }
        self.state.lock().apply_event(&ProviderEvent::ChunksInserted(chunks));
        Ok(())
    }

    async fn get_chunks_for_step(
        &self,
        step_id: &StepId,
        page_cursor: Option<ChunkPageCursor>,
        page_size: usize,
    ) -> Result<ChunkPage, ProviderError> {
        let state = self.state.lock();
        let chunks: Vec<ChunkState> = state.chunks_for_step(step_id).into_iter().cloned().collect();
        Ok(paginate(chunks, page_cursor, page_size))
    }

    fn invalidate_cache(&self) {
        self.cache.clear();
    }
}

/// File-backed provider: a JSONL WAL with group commit plus periodic
/// zstd-compressed snapshots, grounded on [`crate::wal::Wal`] and
/// [`crate::checkpoint::Checkpointer`].
pub struct FileProvider<G: IdGen = UuidIdGen, C: Clock = SystemClock> {
    state: Mutex<MaterializedState>,
    wal: Mutex<Wal>,
    checkpointer: Checkpointer,
    cache: TransactionCache,
    id_gen: G,
    clock: C,
    writes_since_checkpoint: AtomicUsize,
}

impl FileProvider<UuidIdGen, SystemClock> {
    /// Open (or create) a provider rooted at `base_dir`, recovering from the
    /// last snapshot and replaying any unprocessed WAL entries.
    pub fn open(base_dir: &Path) -> Result<Self, ProviderError> {
        Self::open_with_id_gen_and_clock(base_dir, UuidIdGen, SystemClock)
    }
}

impl<G: IdGen, C: Clock> FileProvider<G, C> {
    pub fn open_with_id_gen_and_clock(base_dir: &Path, id_gen: G, clock: C) -> Result<Self, ProviderError> {
        let snapshot_path = base_dir.join("snapshot.json");
        let wal_path = base_dir.join("wal.jsonl");

        let snapshot = Snapshot::load(&snapshot_path)?;
        let (mut state, processed_seq) = match snapshot {
            Some(s) => (s.state, s.seq),
            None => (MaterializedState::default(), 0),
        };

        let mut wal = Wal::open(&wal_path, processed_seq)?;
        while let Some(entry) = wal.next_unprocessed()? {
            state.apply_event(&entry.event);
            wal.mark_processed(entry.seq);
        }

        Ok(Self {
            state: Mutex::new(state),
            wal: Mutex::new(wal),
            checkpointer: Checkpointer::new(snapshot_path),
            cache: TransactionCache::default(),
            id_gen,
            clock,
            writes_since_checkpoint: AtomicUsize::new(0),
        })
    }

    fn append(&self, event: ProviderEvent) -> Result<(), ProviderError> {
        self.state.lock().apply_event(&event);

        let mut wal = self.wal.lock();
        let seq = wal.append(&event)?;
        if wal.needs_flush() {
            wal.flush()?;
        }
        wal.mark_processed(seq);
        drop(wal);

        if self.writes_since_checkpoint.fetch_add(1, Ordering::SeqCst) + 1 >= CHECKPOINT_EVERY_N_WRITES {
            self.checkpoint()?;
        }
        Ok(())
    }

    /// Force a synchronous checkpoint and truncate the WAL through it.
    pub fn checkpoint(&self) -> Result<(), ProviderError> {
        let mut wal = self.wal.lock();
        wal.flush()?;
        let seq = wal.write_seq();
        let state = self.state.lock().clone();

        let result = self.checkpointer.checkpoint_sync(seq, &state)?;
        wal.truncate_before(result.seq)?;
        self.writes_since_checkpoint.store(0, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl<G: IdGen, C: Clock> Provider for FileProvider<G, C> {
    async fn create_jobs(&self, configs: Vec<JobConfig>) -> Result<Vec<JobState>, ProviderError> {
        if configs.is_empty() {
            return Ok(Vec::new());
        }
        let jobs: Vec<JobState> = configs
            .into_iter()
            .map(|config| {
                let id = JobId::new(config.id.clone().unwrap_or_else(|| self.id_gen.next()));
                JobState::new(id, &config, &self.clock)
            })
            .collect();

        self.append(ProviderEvent::JobsCreated(jobs.clone()))?;
        for job in &jobs {
            self.cache.put(job.clone());
        }
        Ok(jobs)
    }

    async fn get_job_states(&self, ids: &[JobId]) -> Result<Vec<JobState>, ProviderError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(cached) = self.cache.get(id) {
                out.push(cached);
                continue;
            }
            let job = {
                let state = self.state.lock();
                state.get_job(id).ok_or_else(|| ProviderError::JobNotFound(id.clone()))?.clone()
            };
            self.cache.put(job.clone());
            out.push(job);
        }
        Ok(out)
    }

    async fn save_jobs(&self, mut jobs: Vec<JobState>) -> Result<(), ProviderError> {
        if jobs.is_empty() {
            return Ok(());
        }
        {
            let state = self.state.lock();
            for job in &mut jobs {
                apply_version_lock(state.get_job(&job.id), job)?;
            }
        }
        self.append(ProviderEvent::JobsSaved(jobs.clone()))?;
        for job in jobs {
            self.cache.put(job);
        }
        Ok(())
    }

    async fn save_steps(&self, steps: Vec<StepState>) -> Result<(), ProviderError> {
        if steps.is_empty() {
            return Ok(());
        }
        self.append(ProviderEvent::StepsSaved(steps))
    }

    async fn save_chunks(&self, chunks: Vec<ChunkState>) -> Result<(), ProviderError> {
        if chunks.is_empty() {
            return Ok(());
        }
        self.append(ProviderEvent::ChunksSaved(chunks))
    }

    async fn insert_chunks(&self, chunks: Vec<ChunkState>) -> Result<(), ProviderError> {
        if chunks.is_empty() {
            return Ok(());
        }
        self.append(ProviderEvent::ChunksInserted(chunks))
    }

    async fn get_chunks_for_step(
        &self,
        step_id: &StepId,
        page_cursor: Option<ChunkPageCursor>,
        page_size: usize,
    ) -> Result<ChunkPage, ProviderError> {
        let state = self.state.lock();
        let chunks: Vec<ChunkState> = state.chunks_for_step(step_id).into_iter().cloned().collect();
        Ok(paginate(chunks, page_cursor, page_size))
    }

    fn invalidate_cache(&self) {
        self.cache.clear();
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
