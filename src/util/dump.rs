//! Miscompare dump file
//!
//! When a compare fails the worker appends a report to `dump_<pid>.dat` in
//! the configured dump directory: a header naming the invocation, the target
//! and the failing LBA/byte offset, then one hex-dump section per buffer
//! (EXPECTED, ACTUAL and optionally REREAD ACTUAL). Rows are 16 bytes:
//!
//! ```text
//! 00000010: 00 01 02 03 04 05 06 07 08 09 0a 0b 0c 0d 0e 0f |................|
//! ```

use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Bytes per hex-dump row
pub const ROW_LEN: usize = 16;

/// Which buffer a dump section shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpSection {
    Expected,
    Actual,
    Reread,
}

impl DumpSection {
    pub fn label(self) -> &'static str {
        match self {
            DumpSection::Expected => "EXPECTED",
            DumpSection::Actual => "ACTUAL",
            DumpSection::Reread => "REREAD ACTUAL",
        }
    }
}

/// Where a miscompare happened
#[derive(Debug, Clone)]
pub struct MiscompareReport<'a> {
    pub invocation: &'a str,
    pub target: &'a Path,
    pub thread: usize,
    pub lba: u64,
    pub byte_offset: usize,
}

/// Path of the dump file for this process
pub fn dump_path(dir: &Path, pid: u32) -> PathBuf {
    dir.join(format!("dump_{}.dat", pid))
}

/// Render `data` as hex rows, numbering offsets from `base`
pub fn hex_rows(data: &[u8], base: usize) -> String {
    let mut out = String::with_capacity(data.len() * 4 + 32);
    for (row, chunk) in data.chunks(ROW_LEN).enumerate() {
        let _ = write!(out, "{:08x}:", base + row * ROW_LEN);
        for byte in chunk {
            let _ = write!(out, " {:02x}", byte);
        }
        for _ in chunk.len()..ROW_LEN {
            out.push_str("   ");
        }
        out.push_str(" |");
        out.extend(chunk.iter().map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            }
        }));
        out.push_str("|\n");
    }
    out
}

/// The row of `data` that holds `offset`, for log output
pub fn row_at(data: &[u8], offset: usize) -> String {
    let start = (offset / ROW_LEN) * ROW_LEN;
    let end = (start + ROW_LEN).min(data.len());
    if start >= end {
        return String::new();
    }
    hex_rows(&data[start..end], start)
}

fn header(report: &MiscompareReport<'_>) -> String {
    format!(
        "\n\n\n{}\nExecution string: {}\nTarget: {}\n\
         Thread {}: Data miscompare at lba {} (0x{:x})\n\
         Thread {}: Miscompare starts at byte offset {} (0x{:x})\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        report.invocation,
        report.target.display(),
        report.thread,
        report.lba,
        report.lba,
        report.thread,
        report.byte_offset,
        report.byte_offset,
    )
}

/// Append a header and the given sections to the dump file
///
/// Callers serialize on the process-wide miscompare lock so reports from
/// different threads never interleave.
pub fn write_dump(path: &Path, report: &MiscompareReport<'_>, sections: &[(DumpSection, &[u8])]) -> io::Result<()> {
    let mut text = header(report);
    for (section, data) in sections {
        let _ = writeln!(
            text,
            "{} data for {}, lba {}, byte offset {}:",
            section.label(),
            report.target.display(),
            report.lba,
            report.byte_offset
        );
        text.push_str(&hex_rows(data, 0));
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(text.as_bytes())?;
    file.flush()
}
