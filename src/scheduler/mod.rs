//! Action scheduler
//!
//! [`pick_next_action`] decides what a worker does next: the operation, the
//! transfer length and the LBA. It runs with the ACTION lock held and owns
//! every side effect of a pick: running counts, cursor movement, first-time
//! flags, `last_action` and registry insertion.
//!
//! # Example
//!
//! ```
//! use diskpulse::config::TestConfig;
//! use diskpulse::environment::ActionState;
//! use diskpulse::scheduler::{pick_next_action, Operation};
//! use rand::SeedableRng;
//! use rand_xoshiro::Xoshiro256PlusPlus;
//!
//! let config = TestConfig {
//!     start_lba: 0,
//!     stop_lba: 63,
//!     transfer_low: 8,
//!     transfer_high: 8,
//!     write_percent: 100,
//!     read_percent: 0,
//!     ..Default::default()
//! };
//! let mut state = ActionState::new(&config);
//! let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
//!
//! let first = pick_next_action(&config, &mut state, config.address_mask(), &mut rng);
//! assert_eq!(first.op, Operation::Writer);
//! assert_eq!(first.lba, 0);
//! let second = pick_next_action(&config, &mut state, config.address_mask(), &mut rng);
//! assert_eq!(second.lba, 8);
//! ```

pub mod action;
pub mod bitmap;
pub mod registry;

pub use action::{Action, Operation};
pub use bitmap::WriteBitmap;
pub use registry::{LbaLockRegistry, RegistryError};

use crate::config::{TestConfig, WrapPolicy};
use crate::environment::ActionState;
use rand::RngCore;

/// Pick and commit the next action
///
/// Must be called with the ACTION lock held; `state` is the guarded data.
/// A `Retry` result leaves the state untouched apart from cursor wraps and
/// gating flips; `None` means the worker has nothing left to do.
pub fn pick_next_action<R: RngCore + ?Sized>(
    config: &TestConfig,
    state: &mut ActionState,
    address_mask: u64,
    rng: &mut R,
) -> Action {
    let op = choose_operation(config, state);
    let length = choose_length(config, state, op, rng);
    let (op, lba, direction) = choose_lba(config, state, op, length, address_mask, rng);

    let mut target = Action::new(op, lba, length);
    let flags = &config.flags;

    if flags.lba_sync && state.registry.in_use(&target) {
        target.op = Operation::Retry;
    }

    // Let the other direction catch up in separate-pass runs
    if !flags.interleaved && !config.is_random() && config.reads_enabled() && config.writes_enabled() {
        let count = match target.op {
            Operation::Writer => state.writes,
            _ => state.reads,
        };
        if count >= config.seeks() / 2 {
            target.op = Operation::None;
        }
    }

    if seeks_exhausted(config, state) {
        target.op = Operation::None;
    }

    apply_write_gating(config, state, &mut target);
    commit(config, state, target, direction);
    target
}

#[inline]
fn seeks_exhausted(config: &TestConfig, state: &ActionState) -> bool {
    config
        .seek_limit
        .is_some_and(|limit| state.writes + state.reads >= limit)
}

fn choose_operation(config: &TestConfig, state: &ActionState) -> Operation {
    let flags = &config.flags;
    let mut op = state.last_action.op;

    if config.is_linear_passes() {
        op = state.test.op;
    } else if config.is_random() && !flags.interleaved {
        // Steer the running write ratio toward the configured percentage
        let ratio = (state.writes * 100) / (state.reads + 1 + state.writes);
        op = if ratio >= config.write_percent as u64 {
            Operation::Reader
        } else {
            Operation::Writer
        };
    } else if flags.interleaved && !state.test.writer_first {
        if config.reads_enabled() && config.writes_enabled() {
            op = if state.last_action.op == Operation::Writer {
                Operation::Reader
            } else {
                Operation::Writer
            };
        }
    } else if op == Operation::None {
        op = config.initial_operation();
    }
    op
}

fn choose_length<R: RngCore + ?Sized>(
    config: &TestConfig,
    state: &ActionState,
    op: Operation,
    rng: &mut R,
) -> u64 {
    if !config.flags.random_transfer {
        return config.transfer_low;
    }

    // Interleaved readers verify exactly what the previous writer produced
    if config.flags.interleaved
        && config.reads_enabled()
        && config.writes_enabled()
        && state.last_action.length != 0
        && op == Operation::Reader
    {
        return state.last_action.length;
    }

    let low = config.transfer_low.max(1);
    loop {
        let mut length = rng.next_u32() as u64 & 0xFFF;
        length += length % low;
        if seeks_exhausted(config, state) || (low..=config.transfer_high).contains(&length) {
            return length;
        }
    }
}

/// Returns the (possibly downgraded) operation, the LBA and the cursor step
/// direction applied on commit.
fn choose_lba<R: RngCore + ?Sized>(
    config: &TestConfig,
    state: &mut ActionState,
    mut op: Operation,
    length: u64,
    address_mask: u64,
    rng: &mut R,
) -> (Operation, u64, i64) {
    let base = config.start_lba + config.offset;

    if config.is_cache_test() {
        return (op, base, 0);
    }

    if config.is_sweep() {
        let lba = if state.last_action.lba == base {
            config.stop_lba.saturating_sub(length.saturating_sub(1))
        } else {
            base
        };
        return (op, lba, 0);
    }

    if config.is_linear() {
        let start = base as i64;
        let stop = config.stop_lba as i64;
        let len = length as i64;
        let mut direction: i64 = if state.test.ascending { 1 } else { -1 };

        let first = match op {
            Operation::Writer => state.test.writer_first,
            Operation::Reader => state.test.reader_first,
            _ => false,
        };
        let cursor = match op {
            Operation::Writer => &mut state.cursors.write,
            _ => &mut state.cursors.read,
        };

        let in_range = if state.test.ascending {
            *cursor + (len - 1) <= stop
        } else {
            *cursor >= start
        };

        if first {
            *cursor = start;
        } else if !in_range {
            match config.wrap {
                WrapPolicy::Start => {
                    *cursor = start;
                    if config.flags.cyclic && op == Operation::Writer {
                        op = Operation::None;
                    }
                }
                WrapPolicy::Reverse => {
                    state.test.ascending = !state.test.ascending;
                    direction = if state.test.ascending { 1 } else { -1 };
                    *cursor += direction * len;
                    if config.flags.cyclic && direction > 0 {
                        op = Operation::None;
                    }
                }
            }
        }
        return (op, (*cursor).max(0) as u64, direction);
    }

    // Random
    if config.flags.interleaved
        && config.reads_enabled()
        && config.writes_enabled()
        && op == Operation::Reader
    {
        return (op, state.last_action.lba, 0);
    }
    (op, random_lba(config, length, address_mask, rng), 0)
}

/// Uniform LBA snapped to the nearest boundary aligned to `start + offset`
///
/// The window is then pulled back inside `[start, stop]`.
fn random_lba<R: RngCore + ?Sized>(
    config: &TestConfig,
    length: u64,
    address_mask: u64,
    rng: &mut R,
) -> u64 {
    let drawn = loop {
        let lba = (rng.next_u64() & address_mask).saturating_add(config.start_lba);
        if lba <= config.stop_lba {
            break lba;
        }
    };

    let start = config.start_lba as i64;
    let base = start + config.offset as i64;
    let len = length.max(1) as i64;
    let last = (config.stop_lba as i64 - (len - 1)).max(start);

    let lba = drawn as i64;
    let lower = base + (lba - base).div_euclid(len) * len;
    let mut snapped = if lba - lower <= lower + len - lba {
        lower
    } else {
        lower + len
    };
    while snapped > last && snapped - len >= base {
        snapped -= len;
    }
    snapped.max(base).clamp(start, last) as u64
}

/// Write-once and compare gating against the bitmap
fn apply_write_gating(config: &TestConfig, state: &mut ActionState, target: &mut Action) {
    let flags = &config.flags;
    let written = !config.tracks_writes() || state.bitmap.is_fully_written(target.lba, target.length);

    match target.op {
        Operation::None | Operation::Retry => {}
        _ if !config.writes_enabled() => {}
        Operation::Writer if flags.write_once && !written => {}
        Operation::Writer if !flags.write_once => {}
        Operation::Reader if written => {}
        _ if config.is_linear() || (flags.interleaved && config.is_random()) => {
            if !written {
                if config.is_linear_passes()
                    && flags.random_transfer
                    && target.op == Operation::Reader
                {
                    // Random-size write passes leave gaps; reads start over
                    let base = config.start_lba + config.offset;
                    state.cursors.read = base as i64;
                    target.lba = base;
                } else {
                    target.op = Operation::Retry;
                }
            }
        }
        Operation::Reader if flags.compare && !written => {
            // Produce the block before it can be verified
            target.op = Operation::Writer;
            state.test.op = Operation::Writer;
            if flags.lba_sync && state.registry.in_use(target) {
                target.op = Operation::Retry;
            }
        }
        _ => {
            target.op = Operation::Reader;
            state.test.op = Operation::Reader;
        }
    }
}

fn commit(config: &TestConfig, state: &mut ActionState, target: Action, direction: i64) {
    let step = direction * target.length as i64;
    match target.op {
        Operation::Writer => {
            state.writes += 1;
            if config.is_linear() && config.wrap == WrapPolicy::Reverse {
                state.cursors.read = state.cursors.write;
            }
            state.cursors.write += step;
            state.test.writer_first = false;
        }
        Operation::Reader => {
            state.reads += 1;
            state.cursors.read += step;
            state.test.reader_first = false;
        }
        Operation::None | Operation::Retry => return,
    }
    state.last_action = target;
    if config.flags.lba_sync {
        state.registry.add(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AccessMode, ModeFlags};
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn rng() -> Xoshiro256PlusPlus {
        Xoshiro256PlusPlus::seed_from_u64(0x1234)
    }

    fn pick(config: &TestConfig, state: &mut ActionState, rng: &mut Xoshiro256PlusPlus) -> Action {
        pick_next_action(config, state, config.address_mask(), rng)
    }

    fn linear_writer(stop_lba: u64, length: u64) -> TestConfig {
        TestConfig {
            start_lba: 0,
            stop_lba,
            transfer_low: length,
            transfer_high: length,
            read_percent: 0,
            write_percent: 100,
            seek_limit: Some(10_000),
            ..Default::default()
        }
    }

    #[test]
    fn test_random_mix_converges_to_write_percent() {
        let config = TestConfig {
            mode: AccessMode::Random,
            start_lba: 0,
            stop_lba: 1_000_000,
            transfer_low: 8,
            transfer_high: 8,
            read_percent: 30,
            write_percent: 70,
            ..Default::default()
        };
        let mut state = ActionState::new(&config);
        let mut rng = rng();
        let mut writes = 0u32;
        for _ in 0..10_000 {
            let action = pick(&config, &mut state, &mut rng);
            assert!(action.op.is_transfer());
            if action.op == Operation::Writer {
                writes += 1;
            }
        }
        let ratio = writes as f64 / 10_000.0;
        assert!((ratio - 0.70).abs() <= 0.02, "write ratio {}", ratio);
    }

    #[test]
    fn test_random_lba_stays_aligned_and_in_range() {
        let config = TestConfig {
            mode: AccessMode::Random,
            start_lba: 1000,
            stop_lba: 1999,
            transfer_low: 8,
            transfer_high: 8,
            read_percent: 0,
            write_percent: 100,
            ..Default::default()
        };
        let mut state = ActionState::new(&config);
        let mut rng = rng();
        for _ in 0..2_000 {
            let action = pick(&config, &mut state, &mut rng);
            assert!(action.lba >= 1000, "{}", action);
            assert!(action.last_lba() <= 1999, "{}", action);
            assert_eq!(action.lba % 8, 0, "{}", action);
        }
    }

    #[test]
    fn test_random_lba_aligns_to_unaligned_start() {
        let config = TestConfig {
            mode: AccessMode::Random,
            start_lba: 1001,
            stop_lba: 1100,
            transfer_low: 8,
            transfer_high: 8,
            read_percent: 50,
            write_percent: 50,
            flags: ModeFlags {
                write_once: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut state = ActionState::new(&config);
        let mut rng = rng();
        for _ in 0..2_000 {
            let action = pick(&config, &mut state, &mut rng);
            if !action.op.is_transfer() {
                continue;
            }
            assert!(action.lba >= 1001, "{}", action);
            assert!(action.last_lba() <= 1100, "{}", action);
            assert_eq!((action.lba - 1001) % 8, 0, "{}", action);
        }

        // Every window the scheduler hands out is tracked by the bitmap
        let mut bitmap = WriteBitmap::new(1001, 1100, 0, 8);
        bitmap.mark_written(1001, 8);
        assert!(bitmap.is_fully_written(1001, 8));
        assert!(!bitmap.is_fully_written(1000, 8));
    }

    #[test]
    fn test_linear_round_trip_wraps_to_start_once() {
        let mut config = linear_writer(99, 8);
        config.flags.cyclic = true;
        let mut state = ActionState::new(&config);
        let mut rng = rng();

        // 12 full windows fit in [0, 99]
        let mut lbas = Vec::new();
        loop {
            let action = pick(&config, &mut state, &mut rng);
            if action.op == Operation::None {
                break;
            }
            lbas.push(action.lba);
            assert!(lbas.len() <= 13);
        }
        assert_eq!(lbas, (0..12).map(|i| i * 8).collect::<Vec<_>>());

        // The wrap was one-shot: the cursor is back at the start
        let next = pick(&config, &mut state, &mut rng);
        assert_eq!(next, Action::new(Operation::Writer, 0, 8));
    }

    #[test]
    fn test_linear_wrap_to_start_without_cycles_continues() {
        let config = linear_writer(31, 8);
        let mut state = ActionState::new(&config);
        let mut rng = rng();
        let lbas: Vec<u64> = (0..6).map(|_| pick(&config, &mut state, &mut rng).lba).collect();
        assert_eq!(lbas, vec![0, 8, 16, 24, 0, 8]);
    }

    #[test]
    fn test_linear_wrap_and_reverse() {
        let mut config = linear_writer(31, 8);
        config.wrap = WrapPolicy::Reverse;
        config.flags.cyclic = true;
        let mut state = ActionState::new(&config);
        let mut rng = rng();

        let mut lbas = Vec::new();
        loop {
            let action = pick(&config, &mut state, &mut rng);
            if action.op == Operation::None {
                break;
            }
            lbas.push(action.lba);
            assert!(lbas.len() <= 10);
        }
        // Up, flip at the top re-touching the last window, down to the start
        assert_eq!(lbas, vec![0, 8, 16, 24, 24, 16, 8, 0]);
        assert!(state.test.ascending);
    }

    #[test]
    fn test_sweep_ping_pongs() {
        let config = TestConfig {
            mode: AccessMode::Sweep,
            start_lba: 0,
            stop_lba: 99,
            transfer_low: 4,
            transfer_high: 4,
            read_percent: 0,
            write_percent: 100,
            ..Default::default()
        };
        let mut state = ActionState::new(&config);
        let mut rng = rng();
        let lbas: Vec<u64> = (0..4).map(|_| pick(&config, &mut state, &mut rng).lba).collect();
        assert_eq!(lbas, vec![96, 0, 96, 0]);
    }

    #[test]
    fn test_cache_test_pins_lba() {
        let config = TestConfig {
            start_lba: 40,
            stop_lba: 40,
            offset: 2,
            transfer_low: 1,
            transfer_high: 1,
            read_percent: 100,
            seek_limit: Some(100),
            ..Default::default()
        };
        let mut state = ActionState::new(&config);
        let mut rng = rng();
        for _ in 0..5 {
            assert_eq!(pick(&config, &mut state, &mut rng).lba, 42);
        }
    }

    #[test]
    fn test_fairness_cap_ends_write_pass() {
        let config = TestConfig {
            start_lba: 0,
            stop_lba: 31,
            transfer_low: 8,
            transfer_high: 8,
            read_percent: 50,
            write_percent: 50,
            ..Default::default()
        };
        assert_eq!(config.seeks(), 8);
        let mut state = ActionState::new(&config);
        let mut rng = rng();
        for i in 0..4 {
            let action = pick(&config, &mut state, &mut rng);
            assert_eq!(action, Action::new(Operation::Writer, i * 8, 8));
        }
        assert_eq!(pick(&config, &mut state, &mut rng).op, Operation::None);

        // The read pass gets its own half of the budget
        state.test.op = Operation::Reader;
        let action = pick(&config, &mut state, &mut rng);
        assert_eq!(action, Action::new(Operation::Reader, 0, 8));
    }

    #[test]
    fn test_seek_limit_exhaustion() {
        let mut config = linear_writer(1023, 8);
        config.seek_limit = Some(3);
        let mut state = ActionState::new(&config);
        let mut rng = rng();
        for _ in 0..3 {
            assert_eq!(pick(&config, &mut state, &mut rng).op, Operation::Writer);
        }
        assert_eq!(pick(&config, &mut state, &mut rng).op, Operation::None);
        assert_eq!(state.writes, 3);
    }

    #[test]
    fn test_lba_sync_blocks_overlap() {
        let mut config = linear_writer(63, 8);
        config.flags.lba_sync = true;
        config.threads = 2;
        let mut state = ActionState::new(&config);
        state.registry.add(Action::new(Operation::Writer, 4, 8));

        let action = pick(&config, &mut state, &mut rng());
        assert_eq!(action.op, Operation::Retry);
        assert_eq!(state.writes, 0);
        assert_eq!(state.registry.len(), 1);
    }

    #[test]
    fn test_committed_action_is_registered() {
        let mut config = linear_writer(63, 8);
        config.flags.lba_sync = true;
        config.threads = 2;
        let mut state = ActionState::new(&config);
        let action = pick(&config, &mut state, &mut rng());
        assert_eq!(state.registry.entries(), &[action]);
        assert_eq!(state.last_action, action);
    }

    #[test]
    fn test_interleaved_reader_waits_for_write() {
        let config = TestConfig {
            start_lba: 1000,
            stop_lba: 1999,
            transfer_low: 8,
            transfer_high: 8,
            read_percent: 50,
            write_percent: 50,
            flags: ModeFlags {
                interleaved: true,
                write_once: true,
                compare: true,
                ..Default::default()
            },
            seek_limit: Some(1000),
            ..Default::default()
        };
        let mut state = ActionState::new(&config);
        let mut rng = rng();

        let write = pick(&config, &mut state, &mut rng);
        assert_eq!(write, Action::new(Operation::Writer, 1000, 8));

        // Not completed yet: the reader must not start
        assert_eq!(pick(&config, &mut state, &mut rng).op, Operation::Retry);

        state.bitmap.mark_written(write.lba, write.length);
        assert_eq!(
            pick(&config, &mut state, &mut rng),
            Action::new(Operation::Reader, 1000, 8)
        );
    }

    #[test]
    fn test_random_compare_reader_flips_to_writer() {
        let config = TestConfig {
            mode: AccessMode::Random,
            start_lba: 0,
            stop_lba: 1023,
            transfer_low: 8,
            transfer_high: 8,
            read_percent: 50,
            write_percent: 50,
            flags: ModeFlags {
                compare: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut state = ActionState::new(&config);
        // Ratio 100% writes so far forces a reader pick
        state.writes = 10;
        let action = pick(&config, &mut state, &mut rng());
        assert_eq!(action.op, Operation::Writer);
        assert_eq!(state.test.op, Operation::Writer);
        assert_eq!(state.writes, 11);
    }

    #[test]
    fn test_random_write_once_flips_written_block_to_reader() {
        let config = TestConfig {
            mode: AccessMode::Random,
            start_lba: 0,
            stop_lba: 63,
            transfer_low: 8,
            transfer_high: 8,
            read_percent: 10,
            write_percent: 90,
            flags: ModeFlags {
                write_once: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut state = ActionState::new(&config);
        state.bitmap.mark_written(0, 64);
        let action = pick(&config, &mut state, &mut rng());
        assert_eq!(action.op, Operation::Reader);
        assert_eq!(state.reads, 1);
    }

    #[test]
    fn test_linear_random_size_reader_restarts_on_gap() {
        let config = TestConfig {
            start_lba: 0,
            stop_lba: 4095,
            transfer_low: 8,
            transfer_high: 64,
            read_percent: 50,
            write_percent: 50,
            flags: ModeFlags {
                compare: true,
                random_transfer: true,
                ..Default::default()
            },
            seek_limit: Some(100),
            ..Default::default()
        };
        let mut state = ActionState::new(&config);
        state.test.op = Operation::Reader;
        state.test.reader_first = false;
        state.cursors.read = 512;
        state.bitmap.mark_written(0, 64);

        let action = pick(&config, &mut state, &mut rng());
        assert_eq!(action.op, Operation::Reader);
        assert_eq!(action.lba, 0);
        assert_eq!(state.cursors.read, action.length as i64);
    }

    #[test]
    fn test_random_lengths_within_bounds() {
        let config = TestConfig {
            mode: AccessMode::Random,
            start_lba: 0,
            stop_lba: 1 << 20,
            transfer_low: 4,
            transfer_high: 100,
            read_percent: 0,
            write_percent: 100,
            flags: ModeFlags {
                random_transfer: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut state = ActionState::new(&config);
        let mut rng = rng();
        for _ in 0..500 {
            let action = pick(&config, &mut state, &mut rng);
            assert!((4..=100).contains(&action.length), "{}", action);
        }
    }

    #[test]
    fn test_read_only_run_ignores_gating() {
        let config = TestConfig {
            start_lba: 0,
            stop_lba: 63,
            transfer_low: 8,
            transfer_high: 8,
            read_percent: 100,
            write_percent: 0,
            flags: ModeFlags {
                compare: true,
                ..Default::default()
            },
            seek_limit: Some(10),
            ..Default::default()
        };
        let mut state = ActionState::new(&config);
        let action = pick(&config, &mut state, &mut rng());
        assert_eq!(action, Action::new(Operation::Reader, 0, 8));
    }
}
