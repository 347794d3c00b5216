//! CLI argument parsing using clap
//!
//! Every option is optional so a TOML file can supply it instead; values
//! given on the command line win (see [`super::toml::merge_cli_with_config`]).

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Addressing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AccessModeArg {
    Linear,
    Random,
    Sweep,
}

/// Linear wrap policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WrapArg {
    /// Jump back to the start of the range
    Start,
    /// Reverse direction at either end
    Reverse,
}

/// Written data pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PatternArg {
    /// Each block carries its own LBA
    Lba,
    /// Seeded buffer shared by all workers
    Golden,
}

/// diskpulse - concurrent block device exerciser
#[derive(Parser, Debug, Default)]
#[command(name = "diskpulse")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Device or file under test
    #[arg(value_name = "DEVICE")]
    pub device: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    // === Basic Options ===
    /// Number of worker threads (default: number of CPUs)
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// Bytes per LBA (e.g., 512, 4k)
    #[arg(short = 'b', long)]
    pub block_size: Option<String>,

    /// Transfer length in blocks, LOW or LOW:HIGH
    #[arg(long, value_name = "LOW[:HIGH]")]
    pub transfer: Option<String>,

    #[arg(long)]
    pub start_lba: Option<u64>,

    #[arg(long)]
    pub stop_lba: Option<u64>,

    /// Added to every chosen LBA
    #[arg(long)]
    pub offset: Option<u64>,

    /// Read percentage (0-100)
    #[arg(long)]
    pub read_percent: Option<u8>,

    /// Write percentage (0-100)
    #[arg(long)]
    pub write_percent: Option<u8>,

    // === Addressing ===
    #[arg(short = 'm', long, value_enum)]
    pub mode: Option<AccessModeArg>,

    #[arg(long, value_enum)]
    pub wrap: Option<WrapArg>,

    /// Alternate reads and writes
    #[arg(long)]
    pub interleaved: bool,

    /// Draw transfer lengths between LOW and HIGH
    #[arg(long)]
    pub random_transfer: bool,

    // === Data ===
    #[arg(long, value_enum)]
    pub pattern: Option<PatternArg>,

    /// Seed for the golden pattern
    #[arg(long)]
    pub pattern_seed: Option<u64>,

    /// Stamp LBA and run signature at the head of each block
    #[arg(long)]
    pub block_marker: bool,

    /// Never write a block twice
    #[arg(long)]
    pub write_once: bool,

    /// Verify read data
    #[arg(long)]
    pub compare: bool,

    /// Bytes compared per read (e.g., 512, 4k), whole transfer when unset
    #[arg(long)]
    pub compare_length: Option<String>,

    /// Re-read miscompared data into the dump
    #[arg(long)]
    pub reread: bool,

    // === Concurrency ===
    /// Serialize overlapping in-flight ranges
    #[arg(long)]
    pub lba_sync: bool,

    /// Serialize every transfer
    #[arg(long)]
    pub serial_io: bool,

    // === Completion ===
    /// Total operation budget
    #[arg(long)]
    pub seeks: Option<u64>,

    /// Wall clock limit (e.g., 60s, 5m, 1h)
    #[arg(short = 'd', long)]
    pub run_time: Option<String>,

    /// Repeat passes over the range
    #[arg(long)]
    pub cyclic: bool,

    /// Number of cyclic passes
    #[arg(long)]
    pub cycles: Option<u64>,

    // === Errors ===
    /// Attempts per operation
    #[arg(long)]
    pub retries: Option<u32>,

    #[arg(long)]
    pub retry_delay_ms: Option<u64>,

    /// Stop this target on the first failed operation
    #[arg(long)]
    pub fail_fast: bool,

    /// Stop every target on the first failed operation
    #[arg(long)]
    pub kill_all: bool,

    /// Write an error marker at LBA 0 when an operation gives up
    #[arg(long)]
    pub error_mark: bool,

    // === Device ===
    /// Open with O_DIRECT
    #[arg(long)]
    pub direct: bool,

    /// Open with O_SYNC
    #[arg(long)]
    pub sync_io: bool,

    /// Sync every N writes
    #[arg(long)]
    pub sync_interval: Option<u64>,

    /// Raw device, skip the final sync
    #[arg(long)]
    pub raw: bool,

    // === Timing ===
    /// Delay between operations in ms, MIN or MIN:MAX
    #[arg(long, value_name = "MIN[:MAX]")]
    pub delay_ms: Option<String>,

    /// Seconds between heartbeat reports, 0 disables
    #[arg(long)]
    pub heartbeat_secs: Option<u64>,

    // === Output ===
    /// Write a JSON summary to this file
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Directory for miscompare dumps
    #[arg(long)]
    pub dump_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags_and_values() {
        let cli = Cli::try_parse_from([
            "diskpulse",
            "/dev/sdx",
            "--transfer",
            "8:64",
            "--mode",
            "random",
            "--write-percent",
            "70",
            "--compare",
            "--lba-sync",
            "-t",
            "4",
        ])
        .unwrap();
        assert_eq!(cli.device, Some(PathBuf::from("/dev/sdx")));
        assert_eq!(cli.transfer.as_deref(), Some("8:64"));
        assert_eq!(cli.mode, Some(AccessModeArg::Random));
        assert_eq!(cli.write_percent, Some(70));
        assert_eq!(cli.threads, Some(4));
        assert!(cli.compare);
        assert!(cli.lba_sync);
        assert!(!cli.write_once);
    }

    #[test]
    fn test_device_is_optional_with_config() {
        let cli = Cli::try_parse_from(["diskpulse", "--config", "run.toml"]).unwrap();
        assert!(cli.device.is_none());
        assert_eq!(cli.config, Some(PathBuf::from("run.toml")));
    }

    #[test]
    fn test_unknown_mode_rejected() {
        assert!(Cli::try_parse_from(["diskpulse", "x", "--mode", "zigzag"]).is_err());
    }
}
