//! Output formatting
//!
//! - [`text`]: STAT lines through the `log` facade and the end-of-run summary
//! - [`json`]: machine-readable run summary written to a file

pub mod json;
pub mod text;

/// Log target of statistics lines, filterable with `RUST_LOG`
pub const STAT_TARGET: &str = "diskpulse::stat";
