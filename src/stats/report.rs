//! Throughput reports
//!
//! A report turns one statistics tier into per-direction throughput and IOPS.
//! Elapsed times below one second count as one second. Outside separate
//! linear passes both directions share one timer, so each direction's
//! time is scaled by its share of the read/write percentage split.

use super::{StatBlock, StatTiers};
use crate::config::TestConfig;
use crate::environment::{RunTimestamps, TestEnvironment};
use crate::util::time::{calculate_iops, calculate_throughput, format_run_time};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

const MIB: f64 = 1024.0 * 1024.0;

/// Which tier a report covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReportKind {
    Heartbeat,
    Cycle,
    Total,
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportKind::Heartbeat => write!(f, "Heartbeat"),
            ReportKind::Cycle => write!(f, "Cycle"),
            ReportKind::Total => write!(f, "Total"),
        }
    }
}

/// One direction of a report
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DirectionReport {
    pub bytes: u64,
    pub count: u64,
    pub secs: f64,
    pub bytes_per_sec: f64,
    pub mib_per_sec: f64,
    pub iops: f64,
}

impl DirectionReport {
    fn new(bytes: u64, count: u64, secs: f64) -> Self {
        let bytes_per_sec = calculate_throughput(bytes, secs);
        Self {
            bytes,
            count,
            secs,
            bytes_per_sec,
            mib_per_sec: bytes_per_sec / MIB,
            iops: calculate_iops(count, secs),
        }
    }
}

/// Rendered statistics for one tier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub kind: ReportKind,
    pub read: Option<DirectionReport>,
    pub write: Option<DirectionReport>,
    /// Whole seconds since the run started, Total reports only
    pub runtime_secs: Option<u64>,
}

impl Report {
    /// STAT lines, reads first
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for (name, dir) in [("Read", &self.read), ("Write", &self.write)] {
            let Some(d) = dir else { continue };
            lines.push(format!(
                "{} {}: {} bytes in {} transfers",
                self.kind, name, d.bytes, d.count
            ));
            lines.push(format!(
                "{} {} throughput: {:.1}B/s ({:.2}MB/s), IOPS {:.1}/s",
                self.kind, name, d.bytes_per_sec, d.mib_per_sec, d.iops
            ));
            lines.push(format!(
                "{} {} Time: {:.2} seconds ({})",
                self.kind,
                name,
                d.secs,
                format_run_time(d.secs as u64)
            ));
        }
        if let Some(secs) = self.runtime_secs {
            lines.push(format!(
                "Total overall runtime: {} seconds ({})",
                secs,
                format_run_time(secs)
            ));
        }
        lines
    }
}

#[inline]
fn at_least_one(secs: f64) -> f64 {
    if secs <= 0.0 {
        1.0
    } else {
        secs
    }
}

/// Build a report from a snapshot of the tiers
///
/// `times` supplies the fallback for Total when no cycle time was ever
/// rolled into global, and `run_time` is the overall run duration.
pub fn build_report(
    kind: ReportKind,
    config: &TestConfig,
    tiers: &StatTiers,
    times: &RunTimestamps,
    run_time: Duration,
) -> Report {
    let block: &StatBlock = match kind {
        ReportKind::Heartbeat => &tiers.heartbeat,
        ReportKind::Cycle => &tiers.cycle,
        ReportKind::Total => &tiers.global,
    };

    let (mut rtime, mut wtime) = match kind {
        // Heartbeat times are reported in whole seconds
        ReportKind::Heartbeat => (block.rtime.trunc(), block.wtime.trunc()),
        ReportKind::Cycle => (block.rtime, block.wtime),
        ReportKind::Total => (
            if block.rtime > 0.0 { block.rtime } else { times.read_secs() },
            if block.wtime > 0.0 { block.wtime } else { times.write_secs() },
        ),
    };

    if !config.is_linear_passes() {
        rtime = rtime * config.read_percent as f64 / 100.0;
        wtime = wtime * config.write_percent as f64 / 100.0;
        if kind == ReportKind::Heartbeat {
            rtime = rtime.trunc();
            wtime = wtime.trunc();
        }
    }

    let rtime = at_least_one(rtime);
    let wtime = at_least_one(wtime);

    Report {
        kind,
        read: config
            .reads_enabled()
            .then(|| DirectionReport::new(block.rbytes, block.rcount, rtime)),
        write: config
            .writes_enabled()
            .then(|| DirectionReport::new(block.wbytes, block.wcount, wtime)),
        runtime_secs: (kind == ReportKind::Total).then(|| run_time.as_secs().max(1)),
    }
}

/// Report for a live environment
///
/// Takes ACTION for the timestamps first and releases it before STATS.
pub fn format_report(kind: ReportKind, env: &TestEnvironment, run_time: Duration) -> Report {
    let times = env.action().times;
    let tiers = env.stats().clone();
    build_report(kind, env.config(), &tiers, &times, run_time)
}
