// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Durable persistence for the saga orchestrator: an event-sourced WAL,
//! periodic zstd snapshots, schema migration, and the [`Provider`] contract
//! built on top of them.

mod checkpoint;
mod migration;
mod provider;
mod snapshot;
mod state;
mod wal;

pub use checkpoint::{
    CheckpointError, CheckpointHandle, CheckpointResult, CheckpointWriter, Checkpointer,
    FsCheckpointWriter, load_snapshot,
};
pub use migration::{Migration, MigrationError, MigrationRegistry};
pub use provider::{
    ChunkPage, ChunkPageCursor, FileProvider, MemoryProvider, Provider, ProviderError,
    TransactionCache,
};
pub use snapshot::{Snapshot, SnapshotError, CURRENT_SNAPSHOT_VERSION};
pub use state::{MaterializedState, ProviderEvent};
pub use wal::{Wal, WalEntry, WalError};
