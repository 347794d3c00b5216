//! Device capability
//!
//! Workers talk to the target through two narrow traits so the core never
//! depends on platform handles:
//!
//! - [`DeviceOpener`] opens one handle per worker
//! - [`Device`] is that handle: positioned seek, read, write, sync, close
//!
//! Every call returns `std::io::Result`, which carries the platform error
//! code on failure. Short transfers are not errors at this layer; the worker
//! compares the returned byte count with what it asked for.
//!
//! Implementations:
//!
//! - [`file::FileOpener`]: regular files and block devices, with O_DIRECT and
//!   O_SYNC through `libc` open flags
//! - [`mock::MockOpener`]: in-memory storage with fault injection for tests

pub mod file;
pub mod mock;

use crate::config::TestConfig;
use std::io;
use std::path::Path;

/// How a worker opens the target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenFlags {
    pub read: bool,
    pub write: bool,
    pub direct: bool,
    pub sync: bool,
}

impl OpenFlags {
    pub fn from_config(config: &TestConfig) -> Self {
        Self {
            read: config.reads_enabled() || config.flags.compare,
            write: config.writes_enabled(),
            direct: config.flags.direct,
            sync: config.flags.sync_io,
        }
    }
}

/// An open handle on the target, owned by one worker
pub trait Device: Send {
    /// Position the handle at `byte_offset`, returning where it landed
    fn seek(&mut self, byte_offset: u64) -> io::Result<u64>;

    /// Read into `buf` at the current position, returning the bytes read
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write `buf` at the current position, returning the bytes written
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Flush written data to stable storage
    fn sync(&mut self) -> io::Result<()>;

    /// Release the handle, reporting any error the platform raises
    fn close(self: Box<Self>) -> io::Result<()>;
}

/// Opens handles on the target
pub trait DeviceOpener: Send + Sync {
    fn open(&self, path: &Path, flags: OpenFlags) -> io::Result<Box<dyn Device>>;
}
