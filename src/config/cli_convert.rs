//! Conversions from CLI strings and enums to configuration values

use super::cli;
use super::{AccessMode, DataPattern, WrapPolicy};
use anyhow::{Context, Result};

/// Split `s` into its leading number and lowercase unit suffix
fn split_unit(s: &str) -> Result<(u64, String)> {
    let s = s.trim();
    let digits = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let num: u64 = s[..digits]
        .parse()
        .with_context(|| format!("Invalid number in '{}'", s))?;
    Ok((num, s[digits..].trim().to_lowercase()))
}

/// Parse a size string (e.g., "512", "4k", "1M") to bytes
pub fn parse_size(s: &str) -> Result<u64> {
    let (num, unit) = split_unit(s)?;
    let multiplier: u64 = match unit.as_str() {
        "" | "b" => 1,
        "k" | "kb" => 1 << 10,
        "m" | "mb" => 1 << 20,
        "g" | "gb" => 1 << 30,
        "t" | "tb" => 1 << 40,
        _ => anyhow::bail!("Invalid size unit '{}' in '{}'. Use k, m, g or t", unit, s),
    };
    num.checked_mul(multiplier)
        .with_context(|| format!("Size out of range: {}", s))
}

/// Parse a duration string (e.g., "90", "60s", "5m", "1h") to seconds
pub fn parse_duration(s: &str) -> Result<u64> {
    let (num, unit) = split_unit(s)?;
    let multiplier = match unit.as_str() {
        "" | "s" | "sec" => 1,
        "m" | "min" => 60,
        "h" | "hr" => 3600,
        "d" => 86400,
        _ => anyhow::bail!("Invalid duration unit '{}' in '{}'. Use s, m, h or d", unit, s),
    };
    Ok(num * multiplier)
}

/// Parse `LOW` or `LOW:HIGH`; a single value is used for both bounds
pub fn parse_range(s: &str) -> Result<(u64, u64)> {
    let parse = |part: &str| -> Result<u64> {
        part.trim()
            .parse()
            .with_context(|| format!("Invalid range '{}'", s))
    };
    match s.split_once(':') {
        Some((low, high)) => Ok((parse(low)?, parse(high)?)),
        None => {
            let value = parse(s)?;
            Ok((value, value))
        }
    }
}

pub fn convert_mode(arg: cli::AccessModeArg) -> AccessMode {
    match arg {
        cli::AccessModeArg::Linear => AccessMode::Linear,
        cli::AccessModeArg::Random => AccessMode::Random,
        cli::AccessModeArg::Sweep => AccessMode::Sweep,
    }
}

pub fn convert_wrap(arg: cli::WrapArg) -> WrapPolicy {
    match arg {
        cli::WrapArg::Start => WrapPolicy::Start,
        cli::WrapArg::Reverse => WrapPolicy::Reverse,
    }
}

pub fn convert_pattern(arg: cli::PatternArg) -> DataPattern {
    match arg {
        cli::PatternArg::Lba => DataPattern::Lba,
        cli::PatternArg::Golden => DataPattern::Golden,
    }
}
