// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resolves `saga.toml`: explicit `--config` path, then `./saga.toml`, then
//! built-in defaults, mirroring the teacher's namespace-resolution fallback.

use anyhow::{Context, Result};
use saga_engine::BudgetLimits;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SagaConfig {
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub wal: WalConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BudgetConfig {
    #[serde(default = "default_safety_factor")]
    pub safety_factor: u8,
    pub max_queries: Option<u64>,
    pub max_mutations: Option<u64>,
    pub max_cpu_ms: Option<u64>,
    pub max_heap_bytes: Option<u64>,
}

fn default_safety_factor() -> u8 {
    80
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            safety_factor: default_safety_factor(),
            max_queries: None,
            max_mutations: None,
            max_cpu_ms: None,
            max_heap_bytes: None,
        }
    }
}

impl BudgetConfig {
    pub fn limits(&self) -> BudgetLimits {
        let defaults = BudgetLimits::default();
        BudgetLimits {
            max_queries: self.max_queries.unwrap_or(defaults.max_queries),
            max_mutations: self.max_mutations.unwrap_or(defaults.max_mutations),
            max_cpu_ms: self.max_cpu_ms.unwrap_or(defaults.max_cpu_ms),
            max_heap_bytes: self.max_heap_bytes.unwrap_or(defaults.max_heap_bytes),
        }
    }
}

/// Parsed for forward compatibility with `saga-storage`'s WAL tuning; not
/// yet threaded into `FileProvider::open`, which still uses its own fixed
/// flush/checkpoint constants.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct WalConfig {
    pub flush_interval_ms: Option<u64>,
    pub flush_threshold: Option<usize>,
    pub snapshot_interval: Option<usize>,
}

impl SagaConfig {
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None if Path::new("./saga.toml").exists() => Some(Path::new("./saga.toml").to_path_buf()),
            None => None,
        };

        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config file {}", path.display()))
    }
}
