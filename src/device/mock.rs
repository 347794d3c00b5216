//! Mock device for testing
//!
//! An in-memory target shared by every handle opened from the same
//! [`MockOpener`], so one worker's writes are visible to another's reads.
//! Faults are injected through a [`FaultPlan`] that counts down as faults
//! fire, and every call is recorded for later inspection.
//!
//! # Example
//!
//! ```
//! use diskpulse::device::mock::{FaultPlan, MockOp, MockOpener};
//! use diskpulse::device::{Device, DeviceOpener, OpenFlags};
//! use std::path::Path;
//!
//! let opener = MockOpener::new(4096);
//! opener.set_faults(FaultPlan { seek_mismatches: 1, ..Default::default() });
//!
//! let mut dev = opener.open(Path::new("mock"), OpenFlags::default()).unwrap();
//! assert_ne!(dev.seek(512).unwrap(), 512);
//! assert_eq!(dev.seek(512).unwrap(), 512);
//! assert_eq!(opener.count(MockOp::Seek), 2);
//! ```

use super::{Device, DeviceOpener, OpenFlags};
use parking_lot::Mutex;
use std::io;
use std::path::Path;
use std::sync::Arc;

/// Faults still to be injected
///
/// Counters are decremented each time the fault fires; `u32::MAX` never
/// runs out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultPlan {
    /// Seeks that land one byte past the request
    pub seek_mismatches: u32,
    /// Reads that return half the requested bytes
    pub short_reads: u32,
    /// Writes that store and report half the requested bytes
    pub short_writes: u32,
    /// Reads whose first byte is flipped
    pub corrupt_reads: u32,
    /// Writes that fail with EIO
    pub failed_writes: u32,
    pub fail_sync: bool,
    pub fail_close: bool,
    pub fail_open: bool,
}

/// Kind of a recorded call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockOp {
    Open,
    Seek,
    Read,
    Write,
    Sync,
    Close,
}

/// One recorded call with its position and size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpRecord {
    pub op: MockOp,
    pub offset: u64,
    pub len: usize,
}

#[derive(Debug)]
struct Shared {
    storage: Mutex<Vec<u8>>,
    faults: Mutex<FaultPlan>,
    ops: Mutex<Vec<OpRecord>>,
}

fn take(counter: &mut u32) -> bool {
    match *counter {
        0 => false,
        u32::MAX => true,
        _ => {
            *counter -= 1;
            true
        }
    }
}

fn eio() -> io::Error {
    io::Error::from_raw_os_error(libc::EIO)
}

/// Opens [`MockDevice`] handles over shared in-memory storage
#[derive(Debug, Clone)]
pub struct MockOpener {
    shared: Arc<Shared>,
}

impl MockOpener {
    /// Zero-filled storage of `size` bytes
    pub fn new(size: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                storage: Mutex::new(vec![0; size]),
                faults: Mutex::new(FaultPlan::default()),
                ops: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn set_faults(&self, plan: FaultPlan) {
        *self.shared.faults.lock() = plan;
    }

    pub fn faults(&self) -> FaultPlan {
        *self.shared.faults.lock()
    }

    /// Copy of the stored bytes
    pub fn contents(&self) -> Vec<u8> {
        self.shared.storage.lock().clone()
    }

    /// Overwrite stored bytes at `offset`
    pub fn poke(&self, offset: usize, data: &[u8]) {
        let mut storage = self.shared.storage.lock();
        storage[offset..offset + data.len()].copy_from_slice(data);
    }

    /// All recorded calls, in order
    pub fn operations(&self) -> Vec<OpRecord> {
        self.shared.ops.lock().clone()
    }

    /// Number of recorded calls of one kind
    pub fn count(&self, op: MockOp) -> usize {
        self.shared.ops.lock().iter().filter(|r| r.op == op).count()
    }

    pub fn clear_operations(&self) {
        self.shared.ops.lock().clear();
    }
}

impl DeviceOpener for MockOpener {
    fn open(&self, _path: &Path, _flags: OpenFlags) -> io::Result<Box<dyn Device>> {
        self.shared.ops.lock().push(OpRecord {
            op: MockOp::Open,
            offset: 0,
            len: 0,
        });
        if self.shared.faults.lock().fail_open {
            return Err(io::Error::from_raw_os_error(libc::ENOENT));
        }
        Ok(Box::new(MockDevice {
            shared: Arc::clone(&self.shared),
            position: 0,
        }))
    }
}

/// Handle on a [`MockOpener`]'s storage
#[derive(Debug)]
pub struct MockDevice {
    shared: Arc<Shared>,
    position: u64,
}

impl MockDevice {
    fn record(&self, op: MockOp, len: usize) {
        self.shared.ops.lock().push(OpRecord {
            op,
            offset: self.position,
            len,
        });
    }
}

impl Device for MockDevice {
    fn seek(&mut self, byte_offset: u64) -> io::Result<u64> {
        self.position = byte_offset;
        self.record(MockOp::Seek, 0);
        if take(&mut self.shared.faults.lock().seek_mismatches) {
            self.position = byte_offset + 1;
        }
        Ok(self.position)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.record(MockOp::Read, buf.len());
        let (short, corrupt) = {
            let mut faults = self.shared.faults.lock();
            (take(&mut faults.short_reads), take(&mut faults.corrupt_reads))
        };

        let storage = self.shared.storage.lock();
        let start = (self.position as usize).min(storage.len());
        let mut n = buf.len().min(storage.len() - start);
        if short {
            n /= 2;
        }
        buf[..n].copy_from_slice(&storage[start..start + n]);
        if corrupt && n > 0 {
            buf[0] ^= 0xff;
        }
        self.position += n as u64;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.record(MockOp::Write, buf.len());
        let (failed, short) = {
            let mut faults = self.shared.faults.lock();
            (take(&mut faults.failed_writes), take(&mut faults.short_writes))
        };
        if failed {
            return Err(eio());
        }

        let mut storage = self.shared.storage.lock();
        let start = (self.position as usize).min(storage.len());
        let mut n = buf.len().min(storage.len() - start);
        if short {
            n /= 2;
        }
        storage[start..start + n].copy_from_slice(&buf[..n]);
        self.position += n as u64;
        Ok(n)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.record(MockOp::Sync, 0);
        if self.shared.faults.lock().fail_sync {
            return Err(eio());
        }
        Ok(())
    }

    fn close(self: Box<Self>) -> io::Result<()> {
        self.record(MockOp::Close, 0);
        if self.shared.faults.lock().fail_close {
            return Err(eio());
        }
        Ok(())
    }
}
