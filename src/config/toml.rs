//! TOML configuration file parsing
//!
//! A file holds one [`TestConfig`] with every field optional, for example:
//!
//! ```toml
//! device = "/dev/sdx"
//! threads = 4
//! transfer_low = 8
//! transfer_high = 128
//! stop_lba = 1048575
//! read_percent = 30
//! write_percent = 70
//! mode = "random"
//!
//! [flags]
//! compare = true
//! lba_sync = true
//! ```

use super::cli::Cli;
use super::cli_convert::{convert_mode, convert_pattern, convert_wrap, parse_duration, parse_range, parse_size};
use super::TestConfig;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<TestConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<TestConfig> {
    let config: TestConfig = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Merge CLI arguments with a base configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: TestConfig) -> Result<TestConfig> {
    if let Some(device) = &cli.device {
        config.device = device.clone();
    }
    if let Some(threads) = cli.threads {
        config.threads = threads;
    }
    if let Some(size) = &cli.block_size {
        config.block_size = parse_size(size).context("Invalid --block-size")?;
    }
    if let Some(transfer) = &cli.transfer {
        let (low, high) = parse_range(transfer).context("Invalid --transfer")?;
        config.transfer_low = low;
        config.transfer_high = high;
    }
    if let Some(lba) = cli.start_lba {
        config.start_lba = lba;
    }
    if let Some(lba) = cli.stop_lba {
        config.stop_lba = lba;
    }
    if let Some(offset) = cli.offset {
        config.offset = offset;
    }

    // Giving only one side of the mix implies the other
    match (cli.read_percent, cli.write_percent) {
        (Some(r), Some(w)) => {
            config.read_percent = r;
            config.write_percent = w;
        }
        (Some(r), None) => {
            config.read_percent = r;
            config.write_percent = 100u8.saturating_sub(r);
        }
        (None, Some(w)) => {
            config.write_percent = w;
            config.read_percent = 100u8.saturating_sub(w);
        }
        (None, None) => {}
    }

    if let Some(mode) = cli.mode {
        config.mode = convert_mode(mode);
    }
    if let Some(wrap) = cli.wrap {
        config.wrap = convert_wrap(wrap);
    }
    if let Some(pattern) = cli.pattern {
        config.pattern = convert_pattern(pattern);
    }
    if let Some(seed) = cli.pattern_seed {
        config.pattern_seed = seed;
    }
    if let Some(len) = &cli.compare_length {
        config.compare_length = parse_size(len).context("Invalid --compare-length")?;
    }

    let flags = &mut config.flags;
    flags.interleaved |= cli.interleaved;
    flags.random_transfer |= cli.random_transfer;
    flags.block_marker |= cli.block_marker;
    flags.write_once |= cli.write_once;
    flags.compare |= cli.compare;
    flags.reread |= cli.reread;
    flags.lba_sync |= cli.lba_sync;
    flags.serial_io |= cli.serial_io;
    flags.cyclic |= cli.cyclic;
    flags.fail_fast |= cli.fail_fast;
    flags.kill_all |= cli.kill_all;
    flags.error_mark |= cli.error_mark;
    flags.direct |= cli.direct;
    flags.sync_io |= cli.sync_io;
    flags.raw |= cli.raw;

    if let Some(seeks) = cli.seeks {
        config.seek_limit = Some(seeks);
    }
    if let Some(run_time) = &cli.run_time {
        config.run_time_secs = Some(parse_duration(run_time).context("Invalid --run-time")?);
    }
    if let Some(cycles) = cli.cycles {
        config.cycles = Some(cycles);
    }
    if let Some(retries) = cli.retries {
        config.retries = retries;
    }
    if let Some(ms) = cli.retry_delay_ms {
        config.retry_delay_ms = ms;
    }
    if let Some(delay) = &cli.delay_ms {
        let (min, max) = parse_range(delay).context("Invalid --delay-ms")?;
        config.delay_min_ms = min;
        config.delay_max_ms = max;
    }
    if let Some(n) = cli.sync_interval {
        config.sync_interval = n;
    }
    if let Some(secs) = cli.heartbeat_secs {
        config.heartbeat_secs = secs;
    }
    if let Some(path) = &cli.json {
        config.json_output = Some(path.clone());
    }
    if let Some(dir) = &cli.dump_dir {
        config.dump_dir = dir.clone();
    }

    Ok(config)
}
