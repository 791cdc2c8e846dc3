// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `saga-storage`'s `Provider` trait has no enumeration operation, only
//! lookup by id. The CLI keeps its own append-only sidecar of job ids next
//! to the data directory so `tick` knows what to load.

use anyhow::{Context, Result};
use saga_core::JobId;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

pub fn index_path(data_dir: &Path) -> PathBuf {
    data_dir.join("job_ids.jsonl")
}

pub fn append(path: &Path, id: &JobId) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening job index {}", path.display()))?;
    writeln!(file, "{}", id.as_str()).context("appending to job index")?;
    Ok(())
}

pub fn load(path: &Path) -> Result<Vec<JobId>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading job index {}", path.display()))?;
    Ok(raw.lines().filter(|line| !line.is_empty()).map(|line| JobId::new(line.to_string())).collect())
}
