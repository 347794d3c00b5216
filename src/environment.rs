//! Shared per-target test environment
//!
//! One [`TestEnvironment`] exists per target and is shared by all of its
//! workers through an `Arc`. It carries three independent locks:
//!
//! - **ACTION** guards [`ActionState`]: test state, running counts, cursors,
//!   the LBA lock registry, the write bitmap and the global timestamps.
//! - **STATS** guards the heartbeat/cycle/global statistic tiers.
//! - **IO** serializes transfers when serial I/O is configured.
//!
//! STATS and IO are never held while acquiring ACTION.

use crate::config::TestConfig;
use crate::scheduler::{Action, LbaLockRegistry, Operation, WriteBitmap};
use crate::stats::StatTiers;
use crate::util::pattern;
use crate::util::time::{micros_between, Timestamp};
use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, Ordering};

/// Mutable per-target state, read and written under ACTION
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestState {
    /// Current operation of a linear pass
    pub op: Operation,
    /// Direction of the linear cursors
    pub ascending: bool,
    pub writer_first: bool,
    pub reader_first: bool,
    pub failed: bool,
}

impl TestState {
    pub fn new(op: Operation) -> Self {
        Self {
            op,
            ascending: true,
            writer_first: true,
            reader_first: true,
            failed: false,
        }
    }
}

/// Next LBA per direction
///
/// Signed because a descending cursor steps below the start of the range
/// before it wraps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursors {
    pub write: i64,
    pub read: i64,
}

/// Global start/stop times per direction, first writer wins
#[derive(Debug, Clone, Copy, Default)]
pub struct RunTimestamps {
    pub write_start: Option<Timestamp>,
    pub write_stop: Option<Timestamp>,
    pub read_start: Option<Timestamp>,
    pub read_stop: Option<Timestamp>,
}

impl RunTimestamps {
    /// Which directions a timestamp belongs to
    ///
    /// Linear passes only stamp the direction of the current pass.
    fn directions(config: &TestConfig, op: Operation) -> (bool, bool) {
        if config.is_linear_passes() {
            (
                config.writes_enabled() && op == Operation::Writer,
                config.reads_enabled() && op == Operation::Reader,
            )
        } else {
            (config.writes_enabled(), config.reads_enabled())
        }
    }

    pub fn mark_start(&mut self, config: &TestConfig, op: Operation, now: Timestamp) {
        let (write, read) = Self::directions(config, op);
        if write {
            self.write_start.get_or_insert(now);
        }
        if read {
            self.read_start.get_or_insert(now);
        }
    }

    pub fn mark_stop(&mut self, config: &TestConfig, op: Operation, now: Timestamp) {
        let (write, read) = Self::directions(config, op);
        if write {
            self.write_stop.get_or_insert(now);
        }
        if read {
            self.read_stop.get_or_insert(now);
        }
    }

    /// Write elapsed seconds; an unfinished direction counts up to now
    pub fn write_secs(&self) -> f64 {
        span_secs(self.write_start, self.write_stop)
    }

    pub fn read_secs(&self) -> f64 {
        span_secs(self.read_start, self.read_stop)
    }
}

fn span_secs(start: Option<Timestamp>, stop: Option<Timestamp>) -> f64 {
    match start {
        Some(start) => {
            let stop = stop.unwrap_or_else(Timestamp::now);
            micros_between(start, stop) as f64 / 1_000_000.0
        }
        None => 0.0,
    }
}

/// The scheduler's working set
#[derive(Debug)]
pub struct ActionState {
    pub test: TestState,
    pub writes: u64,
    pub reads: u64,
    pub last_action: Action,
    pub cursors: Cursors,
    pub registry: LbaLockRegistry,
    pub bitmap: WriteBitmap,
    pub times: RunTimestamps,
}

impl ActionState {
    pub fn new(config: &TestConfig) -> Self {
        Self {
            test: config.initial_state(),
            writes: 0,
            reads: 0,
            last_action: Action::default(),
            cursors: Cursors::default(),
            registry: LbaLockRegistry::new(config.threads),
            bitmap: WriteBitmap::new(
                config.start_lba,
                config.stop_lba,
                config.offset,
                config.transfer_low,
            ),
            times: RunTimestamps::default(),
        }
    }

    /// Undo the running count of an abandoned action and release its lock
    pub fn rollback(&mut self, action: &Action, lba_sync: bool) {
        if lba_sync {
            self.registry.remove(action);
        }
        match action.op {
            Operation::Writer => self.writes = self.writes.saturating_sub(1),
            _ => self.reads = self.reads.saturating_sub(1),
        }
    }
}

/// Everything the workers of one target share
#[derive(Debug)]
pub struct TestEnvironment {
    config: TestConfig,
    continue_run: AtomicBool,
    action: Mutex<ActionState>,
    stats: Mutex<StatTiers>,
    io: Mutex<()>,
    golden: Vec<u8>,
    signature: u64,
    address_mask: u64,
    delay_mask: u64,
}

impl TestEnvironment {
    pub fn new(config: TestConfig) -> Self {
        let golden = if config.pattern == crate::config::DataPattern::Golden {
            pattern::golden_buffer(config.pattern_seed, config.max_transfer_bytes())
        } else {
            Vec::new()
        };
        Self {
            continue_run: AtomicBool::new(true),
            action: Mutex::new(ActionState::new(&config)),
            stats: Mutex::new(StatTiers::default()),
            io: Mutex::new(()),
            golden,
            signature: rand::random(),
            address_mask: config.address_mask(),
            delay_mask: config.delay_mask(),
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    /// ACTION lock
    #[inline]
    pub fn action(&self) -> MutexGuard<'_, ActionState> {
        self.action.lock()
    }

    /// STATS lock
    #[inline]
    pub fn stats(&self) -> MutexGuard<'_, StatTiers> {
        self.stats.lock()
    }

    /// IO lock
    #[inline]
    pub fn io(&self) -> MutexGuard<'_, ()> {
        self.io.lock()
    }

    #[inline]
    pub fn should_continue(&self) -> bool {
        self.continue_run.load(Ordering::Acquire)
    }

    /// Tell every worker of this target to leave its loop
    pub fn halt(&self) {
        self.continue_run.store(false, Ordering::Release);
    }

    pub fn golden(&self) -> &[u8] {
        &self.golden
    }

    /// Per-run value stamped into block markers
    pub fn signature(&self) -> u64 {
        self.signature
    }

    pub fn address_mask(&self) -> u64 {
        self.address_mask
    }

    pub fn delay_mask(&self) -> u64 {
        self.delay_mask
    }

    pub fn failed(&self) -> bool {
        self.action().test.failed
    }

    /// Arm the environment for the next pass
    ///
    /// Counters and cursors carry over; only the first-time flags and the
    /// operation of the pass change.
    pub fn begin_pass(&self, op: Operation) {
        let mut st = self.action();
        st.test.op = op;
        st.test.writer_first = true;
        st.test.reader_first = true;
        self.continue_run.store(true, Ordering::Release);
    }

    /// Start a new cycle: counters, timestamps and cursors start over
    pub fn reset_counts(&self) {
        let mut st = self.action();
        st.writes = 0;
        st.reads = 0;
        st.last_action = Action::default();
        st.times = RunTimestamps::default();
        let base = (self.config.start_lba + self.config.offset) as i64;
        st.cursors = Cursors {
            write: base,
            read: base,
        };
        if self.config.flags.write_once {
            st.bitmap.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn mixed_config() -> TestConfig {
        TestConfig {
            start_lba: 0,
            stop_lba: 99,
            read_percent: 50,
            write_percent: 50,
            threads: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_first_timestamp_wins() {
        let config = TestConfig {
            mode: crate::config::AccessMode::Random,
            ..mixed_config()
        };
        assert!(!config.is_linear_passes());
        let mut times = RunTimestamps::default();
        let first = Timestamp::now();
        times.mark_start(&config, Operation::Writer, first);
        std::thread::sleep(Duration::from_millis(2));
        times.mark_start(&config, Operation::Reader, Timestamp::now());

        // Mixed runs stamp both directions on the first start
        assert_eq!(times.write_start.map(|t| t.duration_since(first)), Some(Duration::ZERO));
        assert_eq!(times.read_start.map(|t| t.duration_since(first)), Some(Duration::ZERO));
    }

    #[test]
    fn test_write_secs_spans_start_to_stop() {
        let mut times = RunTimestamps {
            write_start: Some(Timestamp::now()),
            ..Default::default()
        };
        std::thread::sleep(Duration::from_millis(20));
        times.write_stop = Some(Timestamp::now());
        let secs = times.write_secs();
        assert!((0.02..5.0).contains(&secs), "{}", secs);
        assert_eq!(times.write_secs(), secs);
    }

    #[test]
    fn test_linear_passes_stamp_current_direction_only() {
        let config = mixed_config();
        assert!(config.is_linear_passes());
        let mut times = RunTimestamps::default();
        times.mark_start(&config, Operation::Writer, Timestamp::now());
        assert!(times.write_start.is_some());
        assert!(times.read_start.is_none());
        assert_eq!(times.read_secs(), 0.0);
    }

    #[test]
    fn test_rollback_restores_counts() {
        let config = TestConfig {
            flags: crate::config::ModeFlags {
                lba_sync: true,
                ..Default::default()
            },
            ..mixed_config()
        };
        let mut st = ActionState::new(&config);
        let action = Action::new(Operation::Writer, 8, 8);
        st.writes = 1;
        st.registry.add(action);
        st.rollback(&action, true);
        assert_eq!(st.writes, 0);
        assert!(st.registry.is_empty());
    }

    #[test]
    fn test_reset_counts_starts_cycle_over() {
        let config = TestConfig {
            start_lba: 16,
            offset: 4,
            ..mixed_config()
        };
        let env = TestEnvironment::new(config);
        {
            let mut st = env.action();
            st.writes = 7;
            st.reads = 3;
            st.cursors = Cursors { write: 64, read: 40 };
            st.times.write_start = Some(Timestamp::now());
        }
        env.reset_counts();
        let st = env.action();
        assert_eq!((st.writes, st.reads), (0, 0));
        assert_eq!(st.cursors, Cursors { write: 20, read: 20 });
        assert!(st.times.write_start.is_none());
    }

    #[test]
    fn test_begin_pass_rearms() {
        let env = TestEnvironment::new(mixed_config());
        env.halt();
        {
            let mut st = env.action();
            st.test.writer_first = false;
            st.writes = 10;
        }
        env.begin_pass(Operation::Reader);
        assert!(env.should_continue());
        let st = env.action();
        assert_eq!(st.test.op, Operation::Reader);
        assert!(st.test.writer_first);
        assert_eq!(st.writes, 10);
    }
}
