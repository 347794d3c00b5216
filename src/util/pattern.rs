//! Data patterns for written and verified transfers
//!
//! Writers and the compare path must produce byte-identical buffers for the
//! same action, so all pattern generation lives here:
//!
//! - **LBA pattern**: each block is filled with its own LBA as repeated
//!   little-endian `u64` values, so data landing at the wrong address is
//!   caught.
//! - **Golden buffer**: one seeded buffer, shared by every worker of a target.
//! - **Block marker**: optionally overwrites the first 16 bytes of each block
//!   with the LBA and the run signature.

use crate::config::{DataPattern, TestConfig};

/// Bytes stamped at the head of each block by [`mark_buffer`]
pub const MARKER_LEN: usize = 16;

/// Deterministic golden buffer
///
/// Uses a simple LCG so the same seed always produces the same bytes.
pub fn golden_buffer(seed: u64, len: usize) -> Vec<u8> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1103515245).wrapping_add(12345);
            (state >> 16) as u8
        })
        .collect()
}

/// Fill each `block_size` chunk of `buf` with its LBA, starting at `lba`
pub fn fill_lba(buf: &mut [u8], lba: u64, block_size: usize) {
    for (i, block) in buf.chunks_mut(block_size.max(1)).enumerate() {
        let word = (lba + i as u64).to_le_bytes();
        for chunk in block.chunks_mut(8) {
            chunk.copy_from_slice(&word[..chunk.len()]);
        }
    }
}

/// Stamp LBA and signature into the first bytes of every block
pub fn mark_buffer(buf: &mut [u8], lba: u64, block_size: usize, signature: u64) {
    for (i, block) in buf.chunks_mut(block_size.max(1)).enumerate() {
        let mut marker = [0u8; MARKER_LEN];
        marker[..8].copy_from_slice(&(lba + i as u64).to_le_bytes());
        marker[8..].copy_from_slice(&signature.to_le_bytes());
        let n = block.len().min(MARKER_LEN);
        block[..n].copy_from_slice(&marker[..n]);
    }
}

/// Produce the expected contents of a transfer at `lba`
///
/// Used by writers before the write and by readers to regenerate the
/// comparison buffer.
pub fn fill_expected(buf: &mut [u8], lba: u64, config: &TestConfig, golden: &[u8], signature: u64) {
    let block_size = config.block_size as usize;
    match config.pattern {
        DataPattern::Lba => fill_lba(buf, lba, block_size),
        DataPattern::Golden => {
            let n = buf.len().min(golden.len());
            buf[..n].copy_from_slice(&golden[..n]);
            buf[n..].fill(0);
        }
    }
    if config.flags.block_marker {
        mark_buffer(buf, lba, block_size, signature);
    }
}

/// Offset of the first byte that differs between the two buffers
pub fn first_difference(expected: &[u8], actual: &[u8]) -> Option<usize> {
    let common = expected.len().min(actual.len());
    expected[..common]
        .iter()
        .zip(&actual[..common])
        .position(|(e, a)| e != a)
        .or_else(|| (expected.len() != actual.len()).then_some(common))
}
