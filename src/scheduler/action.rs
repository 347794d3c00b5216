//! Action descriptor handed from the scheduler to a worker

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a worker should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Operation {
    /// Nothing left to do, the worker leaves its loop
    #[default]
    None,
    /// Read the range (and verify it in compare mode)
    Reader,
    /// Write the range
    Writer,
    /// The range is busy or not yet writable, poll again
    Retry,
}

impl Operation {
    /// True for the two operations that move data
    #[inline]
    pub fn is_transfer(self) -> bool {
        matches!(self, Operation::Reader | Operation::Writer)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::None => write!(f, "none"),
            Operation::Reader => write!(f, "read"),
            Operation::Writer => write!(f, "write"),
            Operation::Retry => write!(f, "retry"),
        }
    }
}

/// One scheduled operation over `[lba, lba + length)`
///
/// `length` counts device blocks, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Action {
    pub op: Operation,
    pub lba: u64,
    pub length: u64,
}

impl Action {
    pub fn new(op: Operation, lba: u64, length: u64) -> Self {
        Self { op, lba, length }
    }

    /// Last LBA covered by this action (inclusive)
    #[inline]
    pub fn last_lba(&self) -> u64 {
        self.lba + self.length.saturating_sub(1)
    }

    /// Whether the two ranges share a start LBA or intersect
    #[inline]
    pub fn overlaps(&self, other: &Action) -> bool {
        if self.lba == other.lba {
            return true;
        }
        self.lba <= other.last_lba() && other.lba <= self.last_lba()
    }

    /// Byte position of the first block
    #[inline]
    pub fn byte_offset(&self, block_size: u64) -> u64 {
        self.lba * block_size
    }

    /// Transfer size in bytes
    #[inline]
    pub fn byte_len(&self, block_size: u64) -> usize {
        (self.length * block_size) as usize
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} lba {} len {}", self.op, self.lba, self.length)
    }
}
