//! Configuration validation

use super::*;
use anyhow::Result;

/// Largest `transfer_low` a random transfer size can be drawn for
pub const MAX_RANDOM_TRANSFER_LOW: u64 = 0xFFF;

/// Validate complete configuration
pub fn validate_config(config: &TestConfig) -> Result<()> {
    validate_target(config)?;
    validate_range(config)?;
    validate_mix(config)?;
    validate_timing(config)?;
    validate_modes(config)?;
    Ok(())
}

/// Fill in values derived from the rest of the configuration
///
/// Fixed-size runs use `transfer_low` for both bounds. A run with no seek
/// limit, no run time and no cyclic repetition gets one pass over the range
/// per enabled direction as its seek limit, so it always terminates.
pub fn apply_derived(config: &mut TestConfig) {
    if !config.flags.random_transfer {
        config.transfer_high = config.transfer_low;
    }
    if config.seek_limit.is_none() && config.run_time_secs.is_none() && !config.flags.cyclic {
        config.seek_limit = Some(config.seeks());
    }
}

/// Derive, then validate
pub fn prepare_config(mut config: TestConfig) -> Result<TestConfig> {
    apply_derived(&mut config);
    validate_config(&config)?;
    Ok(config)
}

fn validate_target(config: &TestConfig) -> Result<()> {
    if config.device.as_os_str().is_empty() {
        anyhow::bail!("No device given; pass DEVICE or set `device` in the config file");
    }

    if config.threads == 0 {
        anyhow::bail!("threads must be at least 1");
    }

    if config.block_size == 0 {
        anyhow::bail!("block_size must be greater than 0");
    }

    if config.flags.direct && config.block_size % 512 != 0 {
        anyhow::bail!(
            "block_size ({}) must be a multiple of 512 for direct I/O",
            config.block_size
        );
    }

    Ok(())
}

fn validate_range(config: &TestConfig) -> Result<()> {
    if config.transfer_low == 0 {
        anyhow::bail!("transfer length must be at least 1 block");
    }

    if config.transfer_high < config.transfer_low {
        anyhow::bail!(
            "transfer high ({}) must not be below transfer low ({})",
            config.transfer_high,
            config.transfer_low
        );
    }

    if config.flags.random_transfer && config.transfer_low > MAX_RANDOM_TRANSFER_LOW {
        anyhow::bail!(
            "transfer low ({}) must be at most {} with random transfer sizes",
            config.transfer_low,
            MAX_RANDOM_TRANSFER_LOW
        );
    }

    if config.start_lba > config.stop_lba {
        anyhow::bail!(
            "start_lba ({}) must not exceed stop_lba ({})",
            config.start_lba,
            config.stop_lba
        );
    }

    let span = config.stop_lba - config.start_lba + 1;
    if span < config.transfer_high {
        anyhow::bail!(
            "LBA range [{}, {}] holds {} blocks, fewer than a {} block transfer",
            config.start_lba,
            config.stop_lba,
            span,
            config.transfer_high
        );
    }

    if config.offset > config.stop_lba - config.start_lba {
        anyhow::bail!(
            "offset ({}) falls outside the LBA range [{}, {}]",
            config.offset,
            config.start_lba,
            config.stop_lba
        );
    }

    let last_byte = config
        .stop_lba
        .checked_add(1)
        .and_then(|blocks| blocks.checked_mul(config.block_size));
    if last_byte.is_none() {
        anyhow::bail!(
            "stop_lba ({}) times block_size ({}) overflows a byte offset",
            config.stop_lba,
            config.block_size
        );
    }

    Ok(())
}

fn validate_mix(config: &TestConfig) -> Result<()> {
    if config.read_percent as u32 + config.write_percent as u32 != 100 {
        anyhow::bail!(
            "read_percent ({}) + write_percent ({}) must equal 100",
            config.read_percent,
            config.write_percent
        );
    }

    if config.flags.compare && !config.reads_enabled() {
        anyhow::bail!("compare needs reads; set read_percent above 0");
    }

    if config.flags.write_once && !config.writes_enabled() {
        anyhow::bail!("write_once needs writes; set write_percent above 0");
    }

    Ok(())
}

fn validate_timing(config: &TestConfig) -> Result<()> {
    if config.delay_min_ms > config.delay_max_ms {
        anyhow::bail!(
            "delay min ({} ms) must not exceed delay max ({} ms)",
            config.delay_min_ms,
            config.delay_max_ms
        );
    }

    if config.run_time_secs == Some(0) {
        anyhow::bail!("run time must be at least 1 second");
    }

    if config.seek_limit == Some(0) {
        anyhow::bail!("seek limit must be at least 1");
    }

    Ok(())
}

fn validate_modes(config: &TestConfig) -> Result<()> {
    let flags = &config.flags;

    if flags.reread && !flags.compare {
        anyhow::bail!("reread only applies with compare");
    }

    if config.compare_length > 0 && !flags.compare {
        anyhow::bail!("compare_length only applies with compare");
    }

    if config.cycles.is_some() && !flags.cyclic {
        anyhow::bail!("cycles only applies to cyclic runs");
    }

    if config.cycles == Some(0) {
        anyhow::bail!("cycles must be at least 1");
    }

    if flags.error_mark && !config.writes_enabled() {
        anyhow::bail!("error_mark needs writes; set write_percent above 0");
    }

    Ok(())
}
