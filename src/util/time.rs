//! Timing utilities
//!
//! Monotonic timestamps with microsecond arithmetic, plus the human-readable
//! duration, rate and run-time formatting used by the statistics reports.

use std::time::{Duration, Instant};

/// Monotonic timestamp
///
/// A thin wrapper around `std::time::Instant`, used for the global
/// start/stop times and for timing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    instant: Instant,
}

impl Timestamp {
    /// Current time
    #[inline]
    pub fn now() -> Self {
        Self {
            instant: Instant::now(),
        }
    }

    /// Time elapsed since this timestamp
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.instant.elapsed()
    }

    /// Duration between this timestamp and an earlier one, zero if `earlier`
    /// is actually later
    #[inline]
    pub fn duration_since(&self, earlier: Timestamp) -> Duration {
        self.instant.saturating_duration_since(earlier.instant)
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

/// Microseconds from `start` to `end`
#[inline]
pub fn micros_between(start: Timestamp, end: Timestamp) -> u64 {
    end.duration_since(start).as_micros() as u64
}

/// Format a short duration in human-readable form
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use diskpulse::util::time::format_duration;
///
/// assert_eq!(format_duration(Duration::from_nanos(500)), "500ns");
/// assert_eq!(format_duration(Duration::from_nanos(1500)), "1.50us");
/// assert_eq!(format_duration(Duration::from_micros(2500)), "2.50ms");
/// assert_eq!(format_duration(Duration::from_secs(5)), "5.00s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    const UNITS: [(&str, f64); 3] = [("s", 1e9), ("ms", 1e6), ("us", 1e3)];

    let nanos = duration.as_nanos();
    UNITS
        .iter()
        .find(|(_, scale)| nanos as f64 >= *scale)
        .map(|(unit, scale)| format!("{:.2}{}", nanos as f64 / scale, unit))
        .unwrap_or_else(|| format!("{}ns", nanos))
}

/// Break whole seconds into a `d/h/m/s` run-time string
///
/// ```
/// use diskpulse::util::time::format_run_time;
///
/// assert_eq!(format_run_time(59), "0d 00h 00m 59s");
/// assert_eq!(format_run_time(90_061), "1d 01h 01m 01s");
/// ```
pub fn format_run_time(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    let seconds = secs % 60;
    format!("{}d {:02}h {:02}m {:02}s", days, hours, minutes, seconds)
}

/// Operations per second, zero when no time has passed
pub fn calculate_iops(operations: u64, seconds: f64) -> f64 {
    if seconds > 0.0 {
        operations as f64 / seconds
    } else {
        0.0
    }
}

/// Bytes per second, zero when no time has passed
pub fn calculate_throughput(bytes: u64, seconds: f64) -> f64 {
    if seconds > 0.0 {
        bytes as f64 / seconds
    } else {
        0.0
    }
}

/// Format throughput in human-readable form (B/s, KB/s, MB/s, GB/s)
///
/// # Examples
///
/// ```
/// use diskpulse::util::time::format_throughput;
///
/// assert_eq!(format_throughput(500.0), "500.00 B/s");
/// assert_eq!(format_throughput(1536.0), "1.50 KB/s");
/// assert_eq!(format_throughput(2_621_440.0), "2.50 MB/s");
/// ```
pub fn format_throughput(bytes_per_sec: f64) -> String {
    const UNITS: [&str; 5] = ["B/s", "KB/s", "MB/s", "GB/s", "TB/s"];

    let mut value = bytes_per_sec;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}
