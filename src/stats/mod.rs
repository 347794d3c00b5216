//! Statistics collection
//!
//! Three-tier accumulators per target:
//!
//! - **heartbeat**: what completed since the last heartbeat report
//! - **cycle**: everything since the last cycle rollup
//! - **global**: everything for the run
//!
//! Workers only ever touch the heartbeat tier (under STATS). The heartbeat
//! driver rolls heartbeat into cycle with [`StatTiers::update_cycle`], and
//! the coordinator rolls cycle into global with [`StatTiers::update_global`]
//! at the end of each cycle. Counts and bytes move losslessly between tiers.
//!
//! # Example
//!
//! ```
//! use diskpulse::stats::StatTiers;
//! use diskpulse::scheduler::Operation;
//!
//! let mut tiers = StatTiers::default();
//! tiers.record_completion(Operation::Writer, 4096);
//! tiers.record_completion(Operation::Reader, 4096);
//!
//! assert_eq!(tiers.heartbeat.wcount, 1);
//! assert_eq!(tiers.heartbeat.rbytes, 4096);
//! ```

pub mod report;

use crate::config::TestConfig;
use crate::environment::RunTimestamps;
use crate::scheduler::Operation;
use serde::Serialize;
use std::time::Duration;

pub use report::{build_report, format_report, DirectionReport, Report, ReportKind};

/// Byte and operation counters per direction with elapsed seconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatBlock {
    pub wbytes: u64,
    pub wcount: u64,
    pub rbytes: u64,
    pub rcount: u64,
    pub wtime: f64,
    pub rtime: f64,
}

impl StatBlock {
    /// Add the counters of `other` (times excluded)
    pub fn add_counts(&mut self, other: &StatBlock) {
        self.wbytes += other.wbytes;
        self.wcount += other.wcount;
        self.rbytes += other.rbytes;
        self.rcount += other.rcount;
    }

    /// Add counters and times of `other`
    pub fn add(&mut self, other: &StatBlock) {
        self.add_counts(other);
        self.wtime += other.wtime;
        self.rtime += other.rtime;
    }

    pub fn total_ops(&self) -> u64 {
        self.wcount + self.rcount
    }

    pub fn total_bytes(&self) -> u64 {
        self.wbytes + self.rbytes
    }
}

/// Heartbeat, cycle and global statistics of one target
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatTiers {
    pub heartbeat: StatBlock,
    pub cycle: StatBlock,
    pub global: StatBlock,
}

impl StatTiers {
    /// Account one completed transfer
    #[inline]
    pub fn record_completion(&mut self, op: Operation, bytes: u64) {
        match op {
            Operation::Writer => {
                self.heartbeat.wbytes += bytes;
                self.heartbeat.wcount += 1;
            }
            Operation::Reader => {
                self.heartbeat.rbytes += bytes;
                self.heartbeat.rcount += 1;
            }
            Operation::None | Operation::Retry => {}
        }
    }

    /// Attribute heartbeat wall time
    ///
    /// Separate linear passes only charge the direction being run; every
    /// other mode runs both directions at once and charges both.
    pub fn record_heartbeat_time(&mut self, config: &TestConfig, pass_op: Operation, elapsed: Duration) {
        let secs = elapsed.as_secs_f64();
        let (write, read) = if config.is_linear_passes() {
            (pass_op == Operation::Writer, pass_op == Operation::Reader)
        } else {
            (true, true)
        };
        if write && config.writes_enabled() {
            self.heartbeat.wtime += secs;
        }
        if read && config.reads_enabled() {
            self.heartbeat.rtime += secs;
        }
    }

    /// Fold heartbeat into cycle and zero heartbeat
    ///
    /// Cyclic runs take the cycle times from the global timestamps; other
    /// runs accumulate the heartbeat times.
    pub fn update_cycle(&mut self, config: &TestConfig, times: &RunTimestamps) {
        self.cycle.add_counts(&self.heartbeat);
        if config.flags.cyclic {
            self.cycle.wtime = times.write_secs();
            self.cycle.rtime = times.read_secs();
        } else {
            self.cycle.wtime += self.heartbeat.wtime;
            self.cycle.rtime += self.heartbeat.rtime;
        }
        self.heartbeat = StatBlock::default();
    }

    /// Fold cycle into global and zero cycle
    pub fn update_global(&mut self) {
        self.global.add(&self.cycle);
        self.cycle = StatBlock::default();
    }
}
