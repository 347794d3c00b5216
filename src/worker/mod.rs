//! Worker thread implementation
//!
//! A [`Worker`] is one thread of a target's pool. It opens its own handle on
//! the device and then loops:
//!
//! 1. **Select**: ask the scheduler for the next action under ACTION, yielding
//!    and polling again on `Retry`, leaving on `None`
//! 2. **Delay**: optional fixed or random inter-operation delay
//! 3. **Seek** to `lba * block_size`
//! 4. **Transfer**: writers fill and write, readers read
//! 5. **Verify**: compare runs check read data against the expected pattern
//! 6. **Complete**: account statistics, mark the bitmap, release the range
//!
//! Seek and transfer failures redo the same action until the retry budget is
//! spent. A miscompare or an exhausted budget gives the action up: the test
//! is marked failed, fail-fast stops the target, kill-all stops the process,
//! and the action's count and registry entry are rolled back.
//!
//! # Example
//!
//! ```
//! use diskpulse::config::TestConfig;
//! use diskpulse::context::RunContext;
//! use diskpulse::device::mock::MockOpener;
//! use diskpulse::environment::TestEnvironment;
//! use diskpulse::worker::Worker;
//! use std::sync::Arc;
//!
//! let config = TestConfig {
//!     stop_lba: 63,
//!     transfer_low: 8,
//!     transfer_high: 8,
//!     read_percent: 0,
//!     write_percent: 100,
//!     seek_limit: Some(8),
//!     ..Default::default()
//! };
//! let env = Arc::new(TestEnvironment::new(config));
//! let opener = Arc::new(MockOpener::new(64 * 512));
//!
//! let worker = Worker::new(0, env, Arc::new(RunContext::default()), opener);
//! let summary = worker.run()?;
//! assert_eq!(summary.writes, 8);
//! assert!(!summary.failed);
//! # Ok::<(), diskpulse::ExerciserError>(())
//! ```

use crate::context::RunContext;
use crate::device::{Device, DeviceOpener, OpenFlags};
use crate::environment::TestEnvironment;
use crate::error::{ExerciserError, FailureKind};
use crate::scheduler::{pick_next_action, Action, Operation};
use crate::util::buffer::{AlignedBuffer, DEFAULT_ALIGNMENT};
use crate::util::dump::{self, DumpSection, MiscompareReport};
use crate::util::pattern;
use crate::util::time::Timestamp;
use log::Level;
use rand::{RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::Serialize;
use std::io;
use std::sync::Arc;
use std::time::Duration;

/// Written at LBA 0 when an operation gives up and error marking is on
pub const ERROR_MARKER: &[u8] = b"DISKPULSE ERROR OCCURRED";

/// What one worker did, returned when its thread ends
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerSummary {
    pub id: usize,
    /// Completed writes
    pub writes: u64,
    /// Completed reads
    pub reads: u64,
    /// An operation was given up or the end-of-run sync/close failed
    pub failed: bool,
    /// Kind of the most recent failure, retried ones included
    pub last_failure: Option<FailureKind>,
}

/// One thread of a target's pool
pub struct Worker {
    id: usize,
    env: Arc<TestEnvironment>,
    ctx: Arc<RunContext>,
    opener: Arc<dyn DeviceOpener>,
    rng: Xoshiro256PlusPlus,
    summary: WorkerSummary,
}

impl Worker {
    pub fn new(
        id: usize,
        env: Arc<TestEnvironment>,
        ctx: Arc<RunContext>,
        opener: Arc<dyn DeviceOpener>,
    ) -> Self {
        Self {
            id,
            env,
            ctx,
            opener,
            rng: Xoshiro256PlusPlus::from_entropy(),
            summary: WorkerSummary {
                id,
                ..Default::default()
            },
        }
    }

    /// Replace the entropy-seeded generator with a fixed seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        self
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Run until the scheduler runs dry or a stop signal arrives
    ///
    /// # Errors
    ///
    /// Buffer allocation and open failures end the thread before any I/O.
    /// Every other failure is recorded in the summary and the environment.
    pub fn run(mut self) -> Result<WorkerSummary, ExerciserError> {
        let env = Arc::clone(&self.env);
        let config = env.config();
        let bytes = config.max_transfer_bytes();

        let mut data = AlignedBuffer::try_new(bytes, DEFAULT_ALIGNMENT)?;
        let mut expected = AlignedBuffer::try_new(bytes, DEFAULT_ALIGNMENT)?;

        let mut device = self
            .opener
            .open(&config.device, OpenFlags::from_config(config))
            .map_err(|source| ExerciserError::OpenFailure {
                path: config.device.clone(),
                source,
            })?;

        log::debug!("Thread {}: started on {}", self.id, config.device.display());
        {
            let mut st = env.action();
            let op = st.test.op;
            st.times.mark_start(config, op, Timestamp::now());
        }

        // Action being redone after a retryable failure, with attempts left
        let mut pending: Option<(Action, u32)> = None;

        while self.keep_running() {
            let (action, attempts_left) = match pending.take() {
                Some(retry) => retry,
                None => {
                    let Some(action) = self.next_action() else {
                        break;
                    };
                    self.delay();
                    (action, config.retries.max(1))
                }
            };

            match self.perform(device.as_mut(), &action, &mut data, &mut expected) {
                Ok(()) => self.complete(&action),
                Err(err) => {
                    self.summary.last_failure = Some(err.kind());
                    if err.is_retryable() && attempts_left > 1 {
                        log::warn!("Thread {}: {}, retrying {}", self.id, err, action);
                        if config.retry_delay_ms > 0 {
                            std::thread::sleep(Duration::from_millis(config.retry_delay_ms));
                        }
                        pending = Some((action, attempts_left - 1));
                    } else {
                        self.give_up(device.as_mut(), &action, &err);
                    }
                }
            }
        }

        // Stopped in the middle of a retry
        if let Some((action, _)) = pending {
            env.action().rollback(&action, config.flags.lba_sync);
        }

        {
            let mut st = env.action();
            let op = st.test.op;
            st.times.mark_stop(config, op, Timestamp::now());
        }

        if config.writes_enabled() && !config.flags.raw {
            if let Err(source) = device.sync() {
                self.fail_run(ExerciserError::SyncFailure { source });
            }
        }
        if let Err(source) = device.close() {
            self.fail_run(ExerciserError::CloseFailure { source });
        }

        log::debug!(
            "Thread {}: done, {} writes, {} reads",
            self.id,
            self.summary.writes,
            self.summary.reads
        );
        Ok(self.summary)
    }

    #[inline]
    fn keep_running(&self) -> bool {
        self.env.should_continue() && self.ctx.should_run()
    }

    /// Poll the scheduler until it hands out a transfer
    fn next_action(&mut self) -> Option<Action> {
        let env = Arc::clone(&self.env);
        loop {
            if !self.keep_running() {
                return None;
            }
            let action = {
                let mut st = env.action();
                // A pass ended by another worker while we waited for the lock
                if !env.should_continue() {
                    return None;
                }
                let action = pick_next_action(env.config(), &mut st, env.address_mask(), &mut self.rng);
                // One worker reaching the end of a cyclic pass ends it for all
                if action.op == Operation::None && env.config().flags.cyclic {
                    env.halt();
                }
                action
            };
            match action.op {
                Operation::Retry => std::thread::yield_now(),
                Operation::None => return None,
                _ => return Some(action),
            }
        }
    }

    fn delay(&mut self) {
        let config = self.env.config();
        let (min, max) = (config.delay_min_ms, config.delay_max_ms);
        let ms = if min == max {
            min
        } else {
            let mask = self.env.delay_mask();
            loop {
                let ms = (self.rng.next_u64() & mask) + min;
                if ms <= max {
                    break ms;
                }
            }
        };
        if ms > 0 {
            std::thread::sleep(Duration::from_millis(ms));
        }
    }

    /// Seek, transfer and verify one action
    fn perform(
        &self,
        device: &mut dyn Device,
        action: &Action,
        data: &mut [u8],
        expected: &mut [u8],
    ) -> Result<(), ExerciserError> {
        let env = &self.env;
        let config = env.config();
        let len = action.byte_len(config.block_size);

        seek_to(device, action, config.block_size)?;

        match action.op {
            Operation::Writer => {
                let buf = &mut data[..len];
                pattern::fill_expected(buf, action.lba, config, env.golden(), env.signature());
                let result = {
                    let _io = config.flags.serial_io.then(|| env.io());
                    device.write(buf)
                };
                check_transfer(action, result, len)?;

                if config.sync_interval > 0 {
                    let _action = env.action();
                    let wcount = env.stats().heartbeat.wcount;
                    if wcount % config.sync_interval == 0 {
                        device
                            .sync()
                            .map_err(|source| ExerciserError::SyncFailure { source })?;
                    }
                }
            }
            Operation::Reader => {
                let result = {
                    let _io = config.flags.serial_io.then(|| env.io());
                    device.read(&mut data[..len])
                };
                check_transfer(action, result, len)?;

                if config.flags.compare {
                    self.verify(device, action, &data[..len], &mut expected[..len])?;
                }
            }
            Operation::None | Operation::Retry => {}
        }
        Ok(())
    }

    fn verify(
        &self,
        device: &mut dyn Device,
        action: &Action,
        actual: &[u8],
        expected: &mut [u8],
    ) -> Result<(), ExerciserError> {
        let env = &self.env;
        let config = env.config();
        let len = actual.len();
        let cmp_len = match config.compare_length as usize {
            0 => len,
            n if n > len => len,
            n => n,
        };

        pattern::fill_expected(expected, action.lba, config, env.golden(), env.signature());
        match pattern::first_difference(&expected[..cmp_len], &actual[..cmp_len]) {
            None => Ok(()),
            Some(offset) => {
                self.report_miscompare(device, action, offset, expected, actual);
                Err(ExerciserError::DataMiscompare {
                    lba: action.lba,
                    byte_offset: offset,
                })
            }
        }
    }

    fn report_miscompare(
        &self,
        device: &mut dyn Device,
        action: &Action,
        offset: usize,
        expected: &[u8],
        actual: &[u8],
    ) {
        let config = self.env.config();
        let _dump = self.ctx.dump_lock();

        log::error!(
            "Thread {}: Data miscompare at lba {} (0x{:x}), byte offset {} (0x{:x})",
            self.id,
            action.lba,
            action.lba,
            offset,
            offset
        );
        log::error!("Thread {}: expected {}", self.id, dump::row_at(expected, offset).trim_end());
        log::error!("Thread {}: actual   {}", self.id, dump::row_at(actual, offset).trim_end());

        let reread = if config.flags.reread {
            match self.reread(device, action, actual.len()) {
                Ok(buf) => Some(buf),
                Err(e) => {
                    log::warn!("Thread {}: reread of lba {} failed: {}", self.id, action.lba, e);
                    None
                }
            }
        } else {
            None
        };

        let mut sections: Vec<(DumpSection, &[u8])> =
            vec![(DumpSection::Expected, expected), (DumpSection::Actual, actual)];
        if let Some(buf) = &reread {
            sections.push((DumpSection::Reread, &buf[..]));
        }

        let report = MiscompareReport {
            invocation: &config.invocation,
            target: &config.device,
            thread: self.id,
            lba: action.lba,
            byte_offset: offset,
        };
        let path = dump::dump_path(&config.dump_dir, self.ctx.pid());
        if let Err(e) = dump::write_dump(&path, &report, &sections) {
            log::warn!("Thread {}: could not write {}: {}", self.id, path.display(), e);
        }
    }

    fn reread(&self, device: &mut dyn Device, action: &Action, len: usize) -> Result<AlignedBuffer, ExerciserError> {
        let mut buf = AlignedBuffer::try_new(len, DEFAULT_ALIGNMENT)?;
        seek_to(device, action, self.env.config().block_size)?;
        let result = device.read(&mut buf);
        check_transfer(action, result, len)?;
        Ok(buf)
    }

    fn complete(&mut self, action: &Action) {
        let config = self.env.config();
        let bytes = action.byte_len(config.block_size) as u64;

        self.env.stats().record_completion(action.op, bytes);

        let mut st = self.env.action();
        if action.op == Operation::Writer && config.tracks_writes() {
            st.bitmap.mark_written(action.lba, action.length);
        }
        if config.flags.lba_sync {
            st.registry.remove(action);
        }
        drop(st);

        match action.op {
            Operation::Writer => self.summary.writes += 1,
            Operation::Reader => self.summary.reads += 1,
            Operation::None | Operation::Retry => {}
        }
    }

    fn failure_level(&self) -> Level {
        let flags = &self.env.config().flags;
        if flags.fail_fast || flags.kill_all {
            Level::Error
        } else {
            Level::Warn
        }
    }

    /// Abandon an action after a fatal failure
    fn give_up(&mut self, device: &mut dyn Device, action: &Action, err: &ExerciserError) {
        let config = self.env.config();
        let flags = &config.flags;
        log::log!(self.failure_level(), "Thread {}: {}, giving up {}", self.id, err, action);
        self.summary.failed = true;

        let mut st = self.env.action();
        st.test.failed = true;
        if flags.fail_fast {
            self.env.halt();
            self.ctx.mark_failed();
        }
        if flags.kill_all {
            self.ctx.mark_failed();
            self.ctx.kill_all();
        }
        if config.writes_enabled() && flags.error_mark {
            if let Err(e) = self.stamp_error_marker(device) {
                log::warn!("Thread {}: could not write error marker: {}", self.id, e);
            }
        }
        st.rollback(action, flags.lba_sync);
    }

    fn stamp_error_marker(&self, device: &mut dyn Device) -> Result<(), ExerciserError> {
        let block = self.env.config().block_size as usize;
        let mut buf = AlignedBuffer::try_new(block, DEFAULT_ALIGNMENT)?;
        let n = ERROR_MARKER.len().min(block);
        buf[..n].copy_from_slice(&ERROR_MARKER[..n]);

        let marker = Action::new(Operation::Writer, 0, 1);
        seek_to(device, &marker, block as u64)?;
        let result = device.write(&buf);
        check_transfer(&marker, result, block)
    }

    /// End-of-run failure: the run fails but cleanup carries on
    fn fail_run(&mut self, err: ExerciserError) {
        log::error!("Thread {}: {}", self.id, err);
        self.summary.failed = true;
        self.summary.last_failure = Some(err.kind());
        self.env.action().test.failed = true;
        self.ctx.mark_failed();
    }
}

fn seek_to(device: &mut dyn Device, action: &Action, block_size: u64) -> Result<(), ExerciserError> {
    let requested = action.byte_offset(block_size);
    match device.seek(requested) {
        Ok(actual) if actual == requested => Ok(()),
        Ok(actual) => Err(ExerciserError::SeekFailure {
            lba: action.lba,
            requested,
            actual: Some(actual),
            os_error: None,
        }),
        Err(e) => Err(ExerciserError::SeekFailure {
            lba: action.lba,
            requested,
            actual: None,
            os_error: e.raw_os_error(),
        }),
    }
}

fn check_transfer(action: &Action, result: io::Result<usize>, expected: usize) -> Result<(), ExerciserError> {
    let (transferred, os_error) = match result {
        Ok(n) if n == expected => return Ok(()),
        Ok(n) => (n, None),
        Err(e) => (0, e.raw_os_error()),
    };
    Err(ExerciserError::TransferFailure {
        op: action.op,
        lba: action.lba,
        transferred,
        expected,
        os_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AccessMode, ModeFlags, TestConfig};
    use crate::device::mock::{FaultPlan, MockOp, MockOpener};

    const BLOCK: usize = 512;

    fn run_one(config: TestConfig, opener: &MockOpener) -> (Arc<TestEnvironment>, Arc<RunContext>, WorkerSummary) {
        let env = Arc::new(TestEnvironment::new(config));
        let ctx = Arc::new(RunContext::default());
        let summary = Worker::new(0, Arc::clone(&env), Arc::clone(&ctx), Arc::new(opener.clone()))
            .with_seed(7)
            .run()
            .unwrap();
        (env, ctx, summary)
    }

    fn writer(stop_lba: u64, length: u64, seeks: u64) -> TestConfig {
        TestConfig {
            stop_lba,
            transfer_low: length,
            transfer_high: length,
            read_percent: 0,
            write_percent: 100,
            seek_limit: Some(seeks),
            ..Default::default()
        }
    }

    #[test]
    fn test_writes_lba_pattern() {
        let opener = MockOpener::new(64 * BLOCK);
        let (env, _, summary) = run_one(writer(63, 8, 8), &opener);

        assert_eq!(summary.writes, 8);
        assert!(!summary.failed);
        assert!(!env.failed());
        let contents = opener.contents();
        assert_eq!(&contents[9 * BLOCK..9 * BLOCK + 8], &9u64.to_le_bytes());
        assert_eq!(env.stats().heartbeat.wbytes, 64 * BLOCK as u64);
        // End of run syncs then closes
        let ops = opener.operations();
        assert_eq!(ops[ops.len() - 2].op, MockOp::Sync);
        assert_eq!(ops[ops.len() - 1].op, MockOp::Close);
    }

    #[test]
    fn test_seek_mismatch_retries_then_restores_counters() {
        let opener = MockOpener::new(64 * BLOCK);
        opener.set_faults(FaultPlan {
            seek_mismatches: u32::MAX,
            ..Default::default()
        });
        let config = TestConfig {
            retries: 3,
            flags: ModeFlags {
                fail_fast: true,
                lba_sync: true,
                ..Default::default()
            },
            ..writer(63, 8, 8)
        };
        let (env, ctx, summary) = run_one(config, &opener);

        assert_eq!(opener.count(MockOp::Seek), 3);
        assert_eq!(opener.count(MockOp::Write), 0);
        assert_eq!(summary.last_failure, Some(FailureKind::Seek));
        assert!(summary.failed);
        assert!(ctx.failed());
        let st = env.action();
        assert!(st.test.failed);
        assert_eq!(st.writes, 0);
        assert!(st.registry.is_empty());
    }

    #[test]
    fn test_transient_short_write_is_retried() {
        let opener = MockOpener::new(64 * BLOCK);
        opener.set_faults(FaultPlan {
            short_writes: 1,
            ..Default::default()
        });
        let config = TestConfig {
            retries: 2,
            ..writer(63, 8, 2)
        };
        let (env, _, summary) = run_one(config, &opener);

        assert_eq!(opener.count(MockOp::Write), 3);
        assert_eq!(summary.writes, 2);
        assert!(!summary.failed);
        assert_eq!(summary.last_failure, Some(FailureKind::Transfer));
        assert!(!env.failed());
    }

    #[test]
    fn test_single_attempt_gives_up_and_marks_error() {
        let opener = MockOpener::new(64 * BLOCK);
        opener.set_faults(FaultPlan {
            failed_writes: 1,
            ..Default::default()
        });
        let config = TestConfig {
            start_lba: 16,
            retries: 0,
            flags: ModeFlags {
                fail_fast: true,
                error_mark: true,
                ..Default::default()
            },
            ..writer(63, 8, 8)
        };
        let (env, _, summary) = run_one(config, &opener);
        let start = 16 * BLOCK;

        assert!(summary.failed);
        assert_eq!(summary.writes, 0);
        let contents = opener.contents();
        assert_eq!(&contents[..ERROR_MARKER.len()], ERROR_MARKER);
        assert!(contents[start..start + BLOCK].iter().all(|&b| b == 0));
        assert_eq!(env.action().writes, 0);
    }

    #[test]
    fn test_miscompare_writes_dump() {
        let dir = tempfile::tempdir().unwrap();
        let opener = MockOpener::new(64 * BLOCK);
        let config = TestConfig {
            start_lba: 4,
            stop_lba: 11,
            transfer_low: 4,
            transfer_high: 4,
            read_percent: 100,
            write_percent: 0,
            seek_limit: Some(2),
            dump_dir: dir.path().to_path_buf(),
            invocation: "diskpulse --compare".into(),
            flags: ModeFlags {
                compare: true,
                reread: true,
                fail_fast: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let (env, ctx, summary) = run_one(config, &opener);

        assert!(summary.failed);
        assert_eq!(summary.last_failure, Some(FailureKind::Miscompare));
        assert_eq!(summary.reads, 0);
        assert!(env.failed());
        // Never retried: one read plus the reread
        assert_eq!(opener.count(MockOp::Read), 2);

        let text = std::fs::read_to_string(dump::dump_path(dir.path(), ctx.pid())).unwrap();
        assert!(text.contains("Execution string: diskpulse --compare"));
        assert!(text.contains("Data miscompare at lba 4 (0x4)"));
        assert!(text.contains("Miscompare starts at byte offset 0 (0x0)"));
        assert!(text.contains("EXPECTED data"));
        assert!(text.contains("REREAD ACTUAL data"));
    }

    #[test]
    fn test_compare_length_limits_verification() {
        let opener = MockOpener::new(64 * BLOCK);
        // Correct first block, garbage in the second
        let mut block = vec![0u8; BLOCK];
        pattern::fill_lba(&mut block, 4, BLOCK);
        opener.poke(4 * BLOCK, &block);
        opener.poke(5 * BLOCK, &[0xee; BLOCK]);

        let config = TestConfig {
            start_lba: 4,
            stop_lba: 5,
            transfer_low: 2,
            transfer_high: 2,
            seek_limit: Some(1),
            compare_length: BLOCK as u64,
            flags: ModeFlags {
                compare: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let (_, _, summary) = run_one(config, &opener);
        assert!(!summary.failed);
        assert_eq!(summary.reads, 1);
    }

    #[test]
    fn test_interleaved_compare_passes() {
        let opener = MockOpener::new(64 * BLOCK);
        let config = TestConfig {
            stop_lba: 63,
            transfer_low: 4,
            transfer_high: 4,
            read_percent: 50,
            write_percent: 50,
            seek_limit: Some(16),
            flags: ModeFlags {
                interleaved: true,
                compare: true,
                lba_sync: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let (env, _, summary) = run_one(config, &opener);

        assert_eq!(summary.writes, 8);
        assert_eq!(summary.reads, 8);
        assert!(!summary.failed);
        let st = env.action();
        assert_eq!(st.bitmap.written_blocks(), 8);
        assert!(st.registry.is_empty());
    }

    #[test]
    fn test_sync_failure_gives_up() {
        let opener = MockOpener::new(64 * BLOCK);
        opener.set_faults(FaultPlan {
            fail_sync: true,
            ..Default::default()
        });
        let config = TestConfig {
            sync_interval: 1,
            flags: ModeFlags {
                fail_fast: true,
                ..Default::default()
            },
            ..writer(63, 8, 8)
        };
        let (env, ctx, summary) = run_one(config, &opener);

        assert!(summary.failed);
        assert_eq!(summary.writes, 0);
        assert_eq!(summary.last_failure, Some(FailureKind::Sync));
        assert!(env.failed());
        assert!(ctx.failed());
        // In-loop sync plus the end-of-run sync
        assert_eq!(opener.count(MockOp::Sync), 2);
    }

    #[test]
    fn test_close_failure_fails_run() {
        let opener = MockOpener::new(64 * BLOCK);
        opener.set_faults(FaultPlan {
            fail_close: true,
            ..Default::default()
        });
        let (env, ctx, summary) = run_one(writer(63, 8, 1), &opener);
        assert_eq!(summary.writes, 1);
        assert!(summary.failed);
        assert_eq!(summary.last_failure, Some(FailureKind::Close));
        assert!(env.failed());
        assert!(ctx.failed());
    }

    #[test]
    fn test_raw_target_skips_final_sync() {
        let opener = MockOpener::new(64 * BLOCK);
        let config = TestConfig {
            flags: ModeFlags {
                raw: true,
                ..Default::default()
            },
            ..writer(63, 8, 1)
        };
        run_one(config, &opener);
        assert_eq!(opener.count(MockOp::Sync), 0);
    }

    #[test]
    fn test_open_failure_is_returned() {
        let opener = MockOpener::new(64 * BLOCK);
        opener.set_faults(FaultPlan {
            fail_open: true,
            ..Default::default()
        });
        let env = Arc::new(TestEnvironment::new(writer(63, 8, 1)));
        let err = Worker::new(0, env, Arc::new(RunContext::default()), Arc::new(opener))
            .run()
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Open);
    }

    #[test]
    fn test_stop_request_ends_loop() {
        let opener = MockOpener::new(64 * BLOCK);
        let env = Arc::new(TestEnvironment::new(TestConfig {
            mode: AccessMode::Random,
            ..writer(63, 8, 1_000_000)
        }));
        let ctx = Arc::new(RunContext::default());
        ctx.request_stop();
        let summary = Worker::new(3, env, ctx, Arc::new(opener.clone()))
            .run()
            .unwrap();
        assert_eq!(summary.id, 3);
        assert_eq!(summary.writes, 0);
        assert_eq!(opener.count(MockOp::Write), 0);
    }

    #[test]
    fn test_cyclic_pass_end_halts_environment() {
        let opener = MockOpener::new(64 * BLOCK);
        let config = TestConfig {
            seek_limit: None,
            flags: ModeFlags {
                cyclic: true,
                ..Default::default()
            },
            ..writer(63, 8, 0)
        };
        let (env, _, summary) = run_one(config, &opener);
        assert_eq!(summary.writes, 8);
        assert!(!env.should_continue());
    }
}
