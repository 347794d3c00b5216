//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.
//! Everything ends up in one [`TestConfig`], which is immutable for the
//! duration of a run and shared by every worker of the target.
//!
//! Loading order: TOML file (optional), then CLI overrides
//! ([`toml::merge_cli_with_config`]), then derived values and validation
//! ([`validator::prepare_config`]).

pub mod cli;
pub mod cli_convert;
pub mod toml;
pub mod validator;

use crate::environment::TestState;
use crate::scheduler::Operation;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// How LBAs are chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    /// Monotonic cursors per direction
    #[default]
    Linear,
    /// Uniform random, snapped to the transfer length
    Random,
    /// Ping-pong between the first and last window of the range
    Sweep,
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessMode::Linear => write!(f, "linear"),
            AccessMode::Random => write!(f, "random"),
            AccessMode::Sweep => write!(f, "sweep"),
        }
    }
}

/// What a linear cursor does when it runs off the end of the range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WrapPolicy {
    /// Jump back to `start_lba + offset`
    #[default]
    Start,
    /// Flip direction and walk back through the range
    Reverse,
}

/// Contents written into each transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataPattern {
    /// Every block filled with its own LBA, so misplaced writes are detectable
    #[default]
    Lba,
    /// One seeded buffer shared by all workers
    Golden,
}

/// Boolean test modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ModeFlags {
    /// Alternate reads and writes instead of separate passes
    pub interleaved: bool,
    /// Never write a block twice
    pub write_once: bool,
    /// Verify read data against the expected pattern
    pub compare: bool,
    /// Serialize overlapping in-flight ranges across workers
    pub lba_sync: bool,
    /// Serialize every transfer under the IO lock
    pub serial_io: bool,
    /// Stamp an error marker at LBA 0 when an operation gives up
    pub error_mark: bool,
    /// Re-read a miscompared range into the dump
    pub reread: bool,
    /// Run repeated passes, rolling cycle statistics after each
    pub cyclic: bool,
    /// Draw transfer lengths between `transfer_low` and `transfer_high`
    pub random_transfer: bool,
    /// Stamp LBA and run signature at the head of each block
    pub block_marker: bool,
    /// The target is a raw device, skip the end-of-run sync
    pub raw: bool,
    /// Open with O_DIRECT
    pub direct: bool,
    /// Open with O_SYNC
    pub sync_io: bool,
    /// A failed operation stops every worker of this target
    pub fail_fast: bool,
    /// A failed operation stops every target in the process
    pub kill_all: bool,
}

/// Complete per-target test configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TestConfig {
    /// Device or file under test
    pub device: PathBuf,
    /// Worker threads, also the capacity of the LBA lock registry
    pub threads: usize,
    /// Bytes per LBA
    pub block_size: u64,
    /// Minimum (and default) transfer length in blocks
    pub transfer_low: u64,
    /// Maximum transfer length in blocks when random sizes are enabled
    pub transfer_high: u64,
    pub start_lba: u64,
    pub stop_lba: u64,
    /// Added to every chosen LBA
    pub offset: u64,
    pub read_percent: u8,
    pub write_percent: u8,
    pub mode: AccessMode,
    pub wrap: WrapPolicy,
    pub pattern: DataPattern,
    pub flags: ModeFlags,
    /// Attempts per operation, at least one
    pub retries: u32,
    pub retry_delay_ms: u64,
    /// Inter-operation delay bounds in milliseconds
    pub delay_min_ms: u64,
    pub delay_max_ms: u64,
    /// Total operation budget, derived from the range when unset
    pub seek_limit: Option<u64>,
    /// Wall clock budget for the whole run
    pub run_time_secs: Option<u64>,
    /// Number of passes in cyclic mode, unbounded when unset
    pub cycles: Option<u64>,
    /// Bytes compared per read, 0 means the whole transfer
    pub compare_length: u64,
    /// Sync every N heartbeat writes, 0 disables
    pub sync_interval: u64,
    pub heartbeat_secs: u64,
    /// Seed for the golden buffer
    pub pattern_seed: u64,
    /// Directory receiving `dump_<pid>.dat`
    pub dump_dir: PathBuf,
    /// Command line recorded in dump headers
    pub invocation: String,
    /// JSON summary destination
    pub json_output: Option<PathBuf>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::new(),
            threads: 1,
            block_size: 512,
            transfer_low: 1,
            transfer_high: 1,
            start_lba: 0,
            stop_lba: 0,
            offset: 0,
            read_percent: 100,
            write_percent: 0,
            mode: AccessMode::Linear,
            wrap: WrapPolicy::Start,
            pattern: DataPattern::Lba,
            flags: ModeFlags::default(),
            retries: 1,
            retry_delay_ms: 0,
            delay_min_ms: 0,
            delay_max_ms: 0,
            seek_limit: None,
            run_time_secs: None,
            cycles: None,
            compare_length: 0,
            sync_interval: 0,
            heartbeat_secs: 0,
            pattern_seed: 0x5eed_d15c,
            dump_dir: PathBuf::from("."),
            invocation: String::new(),
            json_output: None,
        }
    }
}

impl TestConfig {
    #[inline]
    pub fn reads_enabled(&self) -> bool {
        self.read_percent > 0
    }

    #[inline]
    pub fn writes_enabled(&self) -> bool {
        self.write_percent > 0
    }

    #[inline]
    pub fn is_linear(&self) -> bool {
        self.mode == AccessMode::Linear
    }

    #[inline]
    pub fn is_random(&self) -> bool {
        self.mode == AccessMode::Random
    }

    #[inline]
    pub fn is_sweep(&self) -> bool {
        self.mode == AccessMode::Sweep
    }

    /// Linear without interleaving: writes and reads run as separate passes
    #[inline]
    pub fn is_linear_passes(&self) -> bool {
        self.is_linear() && !self.flags.interleaved
    }

    /// Start and stop fall in the same `transfer_low` block
    pub fn is_cache_test(&self) -> bool {
        let low = self.transfer_low.max(1);
        self.start_lba / low == self.stop_lba / low
    }

    /// Whether the bitmap has to be consulted at all
    #[inline]
    pub fn tracks_writes(&self) -> bool {
        self.flags.compare || self.flags.write_once
    }

    /// Number of `transfer_low` transfers that fit in the range
    pub fn transfers_in_range(&self) -> u64 {
        let span = self.stop_lba.saturating_sub(self.start_lba) + 1;
        (span / self.transfer_low.max(1)).max(1)
    }

    /// Operation budget for the run
    ///
    /// The configured limit when present, otherwise one pass over the range
    /// per enabled direction.
    pub fn seeks(&self) -> u64 {
        self.seek_limit.unwrap_or_else(|| {
            let passes = if self.reads_enabled() && self.writes_enabled() { 2 } else { 1 };
            self.transfers_in_range() * passes
        })
    }

    /// Random LBA mask: all ones, just covering `stop_lba - start_lba`
    pub fn address_mask(&self) -> u64 {
        all_ones_covering(self.stop_lba.saturating_sub(self.start_lba))
    }

    /// Random delay mask: all ones, just covering the delay spread
    pub fn delay_mask(&self) -> u64 {
        all_ones_covering(self.delay_max_ms.saturating_sub(self.delay_min_ms))
    }

    /// Operation a linear, non-interleaved run starts with
    pub fn initial_operation(&self) -> Operation {
        if self.writes_enabled() {
            Operation::Writer
        } else {
            Operation::Reader
        }
    }

    /// Fresh test state for a new run
    pub fn initial_state(&self) -> TestState {
        TestState::new(self.initial_operation())
    }

    /// Bytes in the largest possible transfer
    pub fn max_transfer_bytes(&self) -> usize {
        (self.transfer_high.max(self.transfer_low) * self.block_size) as usize
    }
}

fn all_ones_covering(span: u64) -> u64 {
    let mut mask: u64 = 1;
    while mask <= span && mask != 1 << 63 {
        mask <<= 1;
    }
    if mask <= span {
        return u64::MAX;
    }
    mask - 1
}

impl fmt::Display for TestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} mode={} lba=[{}, {}]+{} transfer={}",
            self.device.display(),
            self.mode,
            self.start_lba,
            self.stop_lba,
            self.offset,
            self.transfer_low
        )?;
        if self.flags.random_transfer {
            write!(f, ":{}", self.transfer_high)?;
        }
        write!(
            f,
            " r/w={}/{} threads={}",
            self.read_percent, self.write_percent, self.threads
        )
    }
}
