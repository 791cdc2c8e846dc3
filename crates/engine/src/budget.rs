// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-transaction resource ceiling (§6.4). Ambient counters are sampled via
//! `sysinfo`, pulled in from `saworbit-orbit` in the retrieval pack for
//! process/system resource sampling since the teacher's own dependency graph
//! has no equivalent.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use sysinfo::{Pid, System};

/// Ceilings the Budget watches. Defaults model a generic serverless
/// single-transaction limit, not a specific platform's numbers.
#[derive(Debug, Clone, Copy)]
pub struct BudgetLimits {
    pub max_queries: u64,
    pub max_mutations: u64,
    pub max_cpu_ms: u64,
    pub max_heap_bytes: u64,
}

impl Default for BudgetLimits {
    fn default() -> Self {
        Self {
            max_queries: 10_000,
            max_mutations: 500,
            max_cpu_ms: 10_000,
            max_heap_bytes: 512 * 1024 * 1024,
        }
    }
}

/// Ambient counters incremented by the Provider as it performs reads and
/// writes. Shared via `Arc` so the Provider and the Budget see the same counts.
#[derive(Debug, Default)]
pub struct BudgetCounters {
    queries: AtomicU64,
    mutations: AtomicU64,
}

impl BudgetCounters {
    pub fn record_query(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_mutations(&self, count: u64) {
        self.mutations.fetch_add(count, Ordering::Relaxed);
    }

    pub fn queries(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    pub fn mutations(&self) -> u64 {
        self.mutations.load(Ordering::Relaxed)
    }
}

/// Read-only resource guard for one Batch-Orchestrator transaction.
/// `safety_factor` clamps into `[50, 95]`; `can_continue()` returns false as
/// soon as any counter reaches that percentage of its limit.
pub struct Budget {
    safety_factor: u8,
    limits: BudgetLimits,
    counters: Arc<BudgetCounters>,
    started_at: Instant,
    pid: Pid,
}

impl Budget {
    pub fn new(safety_factor: u8) -> Self {
        Self::with_limits(safety_factor, BudgetLimits::default())
    }

    pub fn with_limits(safety_factor: u8, limits: BudgetLimits) -> Self {
        Self {
            safety_factor: safety_factor.clamp(50, 95),
            limits,
            counters: Arc::new(BudgetCounters::default()),
            started_at: Instant::now(),
            pid: Pid::from_u32(std::process::id()),
        }
    }

    pub fn counters(&self) -> Arc<BudgetCounters> {
        self.counters.clone()
    }

    pub fn safety_factor(&self) -> u8 {
        self.safety_factor
    }

    fn threshold(&self, limit: u64) -> u64 {
        (limit as f64 * self.safety_factor as f64 / 100.0) as u64
    }

    pub fn can_continue(&self) -> bool {
        if self.counters.queries() >= self.threshold(self.limits.max_queries) {
            return false;
        }
        if self.counters.mutations() >= self.threshold(self.limits.max_mutations) {
            return false;
        }
        if self.started_at.elapsed().as_millis() as u64 >= self.threshold(self.limits.max_cpu_ms) {
            return false;
        }
        if let Some(rss) = self.sample_rss_bytes() {
            if rss >= self.threshold(self.limits.max_heap_bytes) {
                return false;
            }
        }
        true
    }

    fn sample_rss_bytes(&self) -> Option<u64> {
        let mut sys = System::new_all();
        sys.refresh_all();
        sys.process(self.pid).map(|process| process.memory())
    }
}

#[cfg(test)]
#[path = "budget_tests.rs"]
mod tests;
