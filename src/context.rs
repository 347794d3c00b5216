//! Process-wide run context
//!
//! The flags every worker of every target consults, passed explicitly as an
//! `Arc<RunContext>`:
//!
//! - **stop requested**: set from outside (Ctrl-C, run-time limit)
//! - **run**: cleared when a kill-all failure takes the whole process down
//! - **failed**: set by any target that fails, decides the exit status
//!
//! It also owns the miscompare lock, so dump reports from different threads
//! never interleave.

use crate::util::time::Timestamp;
use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Debug)]
pub struct RunContext {
    stop_requested: AtomicBool,
    run: AtomicBool,
    failed: AtomicBool,
    kill_all_on_error: bool,
    start: Timestamp,
    dump_lock: Mutex<()>,
    pid: u32,
}

impl RunContext {
    pub fn new(kill_all_on_error: bool) -> Self {
        Self {
            stop_requested: AtomicBool::new(false),
            run: AtomicBool::new(true),
            failed: AtomicBool::new(false),
            kill_all_on_error,
            start: Timestamp::now(),
            dump_lock: Mutex::new(()),
            pid: std::process::id(),
        }
    }

    /// Ask every worker to finish its current operation and leave
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
    }

    #[inline]
    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Neither a stop request nor a kill-all failure has happened
    #[inline]
    pub fn should_run(&self) -> bool {
        self.run.load(Ordering::Acquire) && !self.stop_requested()
    }

    /// Record a failure; kill-all runs also clear the run flag
    pub fn mark_failed(&self) {
        self.failed.store(true, Ordering::Release);
        if self.kill_all_on_error {
            self.kill_all();
        }
    }

    pub fn failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// Clear the global run flag
    pub fn kill_all(&self) {
        self.run.store(false, Ordering::Release);
    }

    pub fn kill_all_on_error(&self) -> bool {
        self.kill_all_on_error
    }

    /// Time since the context was created
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    /// Miscompare lock
    pub fn dump_lock(&self) -> MutexGuard<'_, ()> {
        self.dump_lock.lock()
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new(false)
    }
}
