//! Coordinator module
//!
//! Runs one target: spawns the fixed worker pool for each pass, drives the
//! heartbeat from the collecting thread while workers run, and rolls the
//! statistics tiers into cycle and global totals.
//!
//! Pass structure:
//!
//! - Linear runs with both directions enabled write the range first, then
//!   read it back in a second pass with a fresh pool.
//! - Every other run is one pass with both directions mixed.
//! - Cyclic runs repeat the passes until the cycle count, the run time or a
//!   stop signal ends them, reporting cycle statistics after each.
//!
//! Workers report back over a crossbeam channel; the collector wakes at
//! least every [`TICK`] to check the heartbeat and the run time limit.

use crate::context::RunContext;
use crate::device::DeviceOpener;
use crate::environment::TestEnvironment;
use crate::error::FailureKind;
use crate::output::text;
use crate::scheduler::Operation;
use crate::stats::{format_report, Report, ReportKind, StatBlock};
use crate::util::time::Timestamp;
use crate::worker::{Worker, WorkerSummary};
use crate::{Result, TestConfig};
use anyhow::Context;
use crossbeam::channel::{self, RecvTimeoutError};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Longest the collector sleeps between checks
pub const TICK: Duration = Duration::from_millis(100);

/// Outcome of a complete run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub device: PathBuf,
    pub passed: bool,
    /// Cycles started, 1 for non-cyclic runs
    pub cycles: u64,
    pub elapsed_secs: f64,
    pub config: TestConfig,
    pub totals: StatBlock,
    pub report: Report,
    pub workers: Vec<WorkerSummary>,
}

/// Drives the worker pool of one target
pub struct Coordinator {
    env: Arc<TestEnvironment>,
    ctx: Arc<RunContext>,
    opener: Arc<dyn DeviceOpener>,
    seed: Option<u64>,
    spawned: u64,
}

impl Coordinator {
    pub fn new(config: TestConfig, ctx: Arc<RunContext>, opener: Arc<dyn DeviceOpener>) -> Self {
        Self {
            env: Arc::new(TestEnvironment::new(config)),
            ctx,
            opener,
            seed: None,
            spawned: 0,
        }
    }

    /// Seed every worker's generator from `seed` instead of entropy
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn environment(&self) -> &Arc<TestEnvironment> {
        &self.env
    }

    /// Run every pass and cycle, then report totals
    pub fn run(&mut self) -> Result<RunSummary> {
        let env = Arc::clone(&self.env);
        let config = env.config();
        log::info!("Starting {}", config);

        let mut workers: Vec<WorkerSummary> = (0..config.threads)
            .map(|id| WorkerSummary {
                id,
                ..Default::default()
            })
            .collect();

        let passes: Vec<Operation> =
            if config.is_linear_passes() && config.reads_enabled() && config.writes_enabled() {
                vec![Operation::Writer, Operation::Reader]
            } else {
                vec![config.initial_operation()]
            };

        let mut cycle = 0u64;
        loop {
            cycle += 1;
            if config.flags.cyclic {
                env.reset_counts();
                log::info!("Starting cycle {}", cycle);
            }

            for &op in &passes {
                env.begin_pass(op);
                self.run_pass(op, &mut workers)?;
                if self.should_stop() {
                    break;
                }
            }

            let times = env.action().times;
            let mut stats = env.stats();
            stats.update_cycle(config, &times);
            drop(stats);
            if config.flags.cyclic {
                let report = format_report(ReportKind::Cycle, &env, self.ctx.elapsed());
                text::log_report(&report);
            }
            env.stats().update_global();

            if !config.flags.cyclic
                || self.should_stop()
                || config.cycles.is_some_and(|n| cycle >= n)
            {
                break;
            }
        }

        let report = format_report(ReportKind::Total, &env, self.ctx.elapsed());
        text::log_report(&report);

        let passed = !env.failed() && !self.ctx.failed();
        if passed {
            log::info!("Test passed: {}", config.device.display());
        } else {
            log::error!("Test failed: {}", config.device.display());
        }

        let totals = env.stats().global;
        Ok(RunSummary {
            device: config.device.clone(),
            passed,
            cycles: cycle,
            elapsed_secs: self.ctx.elapsed().as_secs_f64(),
            config: config.clone(),
            totals,
            report,
            workers,
        })
    }

    fn should_stop(&self) -> bool {
        !self.ctx.should_run() || (self.env.config().flags.fail_fast && self.env.failed())
    }

    fn next_seed(&mut self) -> Option<u64> {
        let seed = self.seed.map(|s| s.wrapping_add(self.spawned));
        self.spawned += 1;
        seed
    }

    /// Spawn the pool, collect summaries and beat the heartbeat until every
    /// worker has returned
    fn run_pass(&mut self, op: Operation, workers: &mut [WorkerSummary]) -> Result<()> {
        let env = Arc::clone(&self.env);
        let config = env.config();
        let (tx, rx) = channel::unbounded();

        let mut handles = Vec::with_capacity(config.threads);
        for id in 0..config.threads {
            let mut worker = Worker::new(id, Arc::clone(&env), Arc::clone(&self.ctx), Arc::clone(&self.opener));
            if let Some(seed) = self.next_seed() {
                worker = worker.with_seed(seed);
            }
            let tx = tx.clone();
            let handle = std::thread::Builder::new()
                .name(format!("diskpulse-{}", id))
                .spawn(move || {
                    let result = worker.run();
                    let _ = tx.send((id, result));
                })
                .with_context(|| format!("Failed to spawn worker thread {}", id))?;
            handles.push(handle);
        }
        drop(tx);

        let heartbeat = (config.heartbeat_secs > 0).then(|| Duration::from_secs(config.heartbeat_secs));
        let mut last_beat = Timestamp::now();
        let mut remaining = config.threads;

        while remaining > 0 {
            match rx.recv_timeout(TICK) {
                Ok((id, Ok(summary))) => {
                    merge_summary(&mut workers[id], summary);
                    remaining -= 1;
                }
                Ok((id, Err(err))) => {
                    log::error!("Thread {}: {}", id, err);
                    workers[id].failed = true;
                    workers[id].last_failure = Some(err.kind());
                    env.action().test.failed = true;
                    self.ctx.mark_failed();
                    remaining -= 1;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            if let Some(limit) = config.run_time_secs {
                if self.ctx.elapsed() >= Duration::from_secs(limit) && !self.ctx.stop_requested() {
                    log::info!("Run time of {} seconds reached, stopping", limit);
                    self.ctx.request_stop();
                }
            }

            if let Some(interval) = heartbeat {
                let since = last_beat.elapsed();
                if since >= interval {
                    self.heartbeat(op, since);
                    last_beat = Timestamp::now();
                }
            }
        }

        for handle in handles {
            if handle.join().is_err() {
                anyhow::bail!("Worker thread panicked");
            }
        }

        // Charge the tail of the pass that no heartbeat covered
        env.stats().record_heartbeat_time(config, op, last_beat.elapsed());
        Ok(())
    }

    fn heartbeat(&self, op: Operation, elapsed: Duration) {
        let config = self.env.config();
        self.env.stats().record_heartbeat_time(config, op, elapsed);

        let report = format_report(ReportKind::Heartbeat, &self.env, self.ctx.elapsed());
        text::log_report(&report);

        let times = self.env.action().times;
        self.env.stats().update_cycle(config, &times);
    }
}

fn merge_summary(into: &mut WorkerSummary, from: WorkerSummary) {
    into.writes += from.writes;
    into.reads += from.reads;
    into.failed |= from.failed;
    if from.last_failure.is_some() {
        into.last_failure = from.last_failure;
    }
}

/// Whether any worker recorded a failure of the given kind
pub fn any_failure(summary: &RunSummary, kind: FailureKind) -> bool {
    summary.workers.iter().any(|w| w.last_failure == Some(kind))
}
