//! File and block device handles
//!
//! Opens the target with `OpenOptions`, adding `O_DIRECT` / `O_SYNC` through
//! `custom_flags` when requested. Transfers loop until the full buffer moved
//! or the kernel reports EOF, so a short count always means the device
//! really stopped early.

use super::{Device, DeviceOpener, OpenFlags};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::IntoRawFd;
use std::path::Path;

/// Opens [`FileDevice`] handles
#[derive(Debug, Clone, Copy, Default)]
pub struct FileOpener;

impl DeviceOpener for FileOpener {
    fn open(&self, path: &Path, flags: OpenFlags) -> io::Result<Box<dyn Device>> {
        Ok(Box::new(FileDevice::open(path, flags)?))
    }
}

/// A handle on a regular file or block device
#[derive(Debug)]
pub struct FileDevice {
    file: File,
}

impl FileDevice {
    pub fn open(path: &Path, flags: OpenFlags) -> io::Result<Self> {
        let mut options = OpenOptions::new();
        options.read(flags.read || !flags.write).write(flags.write);

        let mut custom_flags = 0;
        if flags.direct {
            custom_flags |= libc::O_DIRECT;
        }
        if flags.sync {
            custom_flags |= libc::O_SYNC;
        }
        if custom_flags != 0 {
            options.custom_flags(custom_flags);
        }

        Ok(Self {
            file: options.open(path)?,
        })
    }
}

impl Device for FileDevice {
    fn seek(&mut self, byte_offset: u64) -> io::Result<u64> {
        self.file.seek(SeekFrom::Start(byte_offset))
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut total = 0;
        while total < buf.len() {
            match self.file.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if total > 0 => {
                    log::debug!("read stopped after {} bytes: {}", total, e);
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut total = 0;
        while total < buf.len() {
            match self.file.write(&buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if total > 0 => {
                    log::debug!("write stopped after {} bytes: {}", total, e);
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.file.sync_all()
    }

    fn close(self: Box<Self>) -> io::Result<()> {
        let fd = self.file.into_raw_fd();
        // SAFETY: we own fd; into_raw_fd gave up File's claim on it
        if unsafe { libc::close(fd) } < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}
