// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! saga - thin CLI front end: create jobs, tick a batch, inspect status.
//! Demonstrates the Provider/Engine/Orchestrator contracts end-to-end
//! without a daemon or IPC surface (see DESIGN.md).

mod config;
mod job_index;
mod steps;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use saga_core::JobId;
use saga_engine::{Budget, BatchOrchestrator, FinalizerRegistry, ImmediateEngine, Retrier, SingleJobOrchestrator};
use saga_storage::{FileProvider, Provider};
use std::path::PathBuf;

use crate::config::SagaConfig;

#[derive(Parser)]
#[command(name = "saga", version, about = "Durable saga orchestrator")]
struct Cli {
    /// Path to saga.toml; falls back to ./saga.toml, then built-in defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Durable state directory (WAL + snapshot).
    #[arg(long, global = true, default_value = "./saga-data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a job from the built-in demo pipeline (charge_card -> ship_item).
    Submit {
        /// Simulate a reversible failure in ship_item, exercising compensation.
        #[arg(long)]
        fail_shipping: bool,
    },
    /// Drive every known non-terminal job through one batch pass.
    Tick,
    /// Print one job's current state as JSON.
    Status { job_id: String },
    /// Submit a demo job and tick it in-process until it reaches a terminal status.
    Demo {
        #[arg(long)]
        fail_shipping: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = SagaConfig::resolve(cli.config.as_deref())?;
    std::fs::create_dir_all(&cli.data_dir).context("creating data directory")?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(cli, config))
}

fn orchestrator() -> SingleJobOrchestrator {
    SingleJobOrchestrator::new(steps::registry(), FinalizerRegistry::new(), Retrier::new(3))
}

async fn run(cli: Cli, config: SagaConfig) -> Result<()> {
    let provider = FileProvider::open(&cli.data_dir).context("opening saga data directory")?;
    let index_path = job_index::index_path(&cli.data_dir);

    match cli.command {
        Commands::Submit { fail_shipping } => {
            let jobs = provider.create_jobs(vec![steps::demo_job_config(fail_shipping)]).await?;
            job_index::append(&index_path, &jobs[0].id)?;
            println!("created job {}", jobs[0].id);
        }
        Commands::Tick => {
            let ids = job_index::load(&index_path)?;
            let jobs = provider.get_job_states(&ids).await?;
            let pending: Vec<_> = jobs.into_iter().filter(|j| !j.status.is_terminal()).collect();
            let (retry_engine, mut redelivered) = ImmediateEngine::new(pending.len().max(1));
            let batch = BatchOrchestrator::new(
                orchestrator(),
                &provider,
                &retry_engine,
                Budget::with_limits(config.budget.safety_factor, config.budget.limits()),
            );
            let report = batch.run_batch(pending).await;
            println!(
                "{} terminal, {} requeued, {} critical failures",
                report.terminal.len(),
                report.requeued.len(),
                report.critical_failures.len()
            );
            redelivered.close();
        }
        Commands::Status { job_id } => {
            let jobs = provider.get_job_states(&[JobId::new(job_id)]).await?;
            println!("{}", serde_json::to_string_pretty(&jobs)?);
        }
        Commands::Demo { fail_shipping } => {
            let jobs = provider.create_jobs(vec![steps::demo_job_config(fail_shipping)]).await?;
            job_index::append(&index_path, &jobs[0].id)?;

            let (retry_engine, mut redelivered) = ImmediateEngine::new(jobs.len().max(1));
            let batch = BatchOrchestrator::new(
                orchestrator(),
                &provider,
                &retry_engine,
                Budget::with_limits(config.budget.safety_factor, config.budget.limits()),
            );
            let mut pending = jobs;
            loop {
                let report = batch.run_batch(pending).await;
                for id in &report.terminal {
                    let job = provider.get_job_states(std::slice::from_ref(id)).await?.remove(0);
                    println!("job {} finished: {}", job.id, job.status);
                }
                if report.requeued.is_empty() {
                    break;
                }
                pending = Vec::with_capacity(report.requeued.len());
                while pending.len() < report.requeued.len() {
                    match redelivered.recv().await {
                        Some(job) => pending.push(job),
                        None => break,
                    }
                }
            }
            redelivered.close();
        }
    }

    Ok(())
}
