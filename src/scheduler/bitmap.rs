//! Write-tracking bitmap
//!
//! One bit per `transfer_low`-sized block of the addressable range. Writers set
//! the bits of every block they complete; the scheduler reads them to decide
//! whether a range may be read back (compare) or written again (write-once).
//! Bits live in `u64` words; indices past the end read as unset and are
//! ignored when marking.

/// Block-granular written map over `[start_lba, stop_lba]`
#[derive(Debug, Clone)]
pub struct WriteBitmap {
    words: Vec<u64>,
    bits: u64,
    start_lba: u64,
    offset: u64,
    block_len: u64,
}

impl WriteBitmap {
    /// Build an empty map for the given range and tracking granularity
    ///
    /// `block_len` is the scheduler's minimum transfer length in blocks.
    pub fn new(start_lba: u64, stop_lba: u64, offset: u64, block_len: u64) -> Self {
        let block_len = block_len.max(1);
        let bits = stop_lba.saturating_sub(start_lba) / block_len + 1;
        Self {
            words: vec![0; bits.div_ceil(64) as usize],
            bits,
            start_lba,
            offset,
            block_len,
        }
    }

    /// Number of tracked blocks
    pub fn len(&self) -> u64 {
        self.bits
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Bit index for the stride starting `stride` blocks into a window at `lba`
    #[inline]
    fn index(&self, lba: u64, stride: u64) -> Option<u64> {
        let relative = (lba + stride).checked_sub(self.offset + self.start_lba)?;
        let index = relative / self.block_len;
        (index < self.bits).then_some(index)
    }

    #[inline]
    fn test(&self, index: u64) -> bool {
        self.words[(index / 64) as usize] & (1u64 << (index % 64)) != 0
    }

    /// Set the bits for every tracked block inside `[lba, lba + length)`
    ///
    /// With random transfer sizes only the strides that start on a multiple
    /// of the tracking granularity are recorded.
    pub fn mark_written(&mut self, lba: u64, length: u64) {
        let mut stride = 0;
        while stride < length {
            if let Some(index) = self.index(lba, stride) {
                self.words[(index / 64) as usize] |= 1u64 << (index % 64);
            }
            stride += self.block_len;
        }
    }

    /// Whether every tracked block inside `[lba, lba + length)` was written
    pub fn is_fully_written(&self, lba: u64, length: u64) -> bool {
        let mut stride = 0;
        while stride < length {
            match self.index(lba, stride) {
                Some(index) if self.test(index) => {}
                _ => return false,
            }
            stride += self.block_len;
        }
        true
    }

    /// Count of set bits
    pub fn written_blocks(&self) -> u64 {
        self.words.iter().map(|w| w.count_ones() as u64).sum()
    }

    /// Forget every write
    pub fn clear(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_mark_then_query() {
        let mut map = WriteBitmap::new(1000, 1999, 0, 8);
        assert_eq!(map.len(), 125);
        assert!(!map.is_fully_written(1000, 8));

        map.mark_written(1000, 16);
        assert!(map.is_fully_written(1000, 8));
        assert!(map.is_fully_written(1008, 8));
        assert!(map.is_fully_written(1000, 16));
        assert!(!map.is_fully_written(1000, 24));
        assert_eq!(map.written_blocks(), 2);
    }

    #[test]
    fn test_offset_shifts_index() {
        let mut map = WriteBitmap::new(0, 127, 4, 8);
        map.mark_written(4, 8);
        assert!(map.is_fully_written(4, 8));
        assert!(!map.is_fully_written(12, 8));
    }

    #[test]
    fn test_out_of_range_reads_unset() {
        let mut map = WriteBitmap::new(100, 199, 0, 10);
        map.mark_written(90, 10);
        map.mark_written(500, 10);
        assert_eq!(map.written_blocks(), 0);
        assert!(!map.is_fully_written(90, 10));
        assert!(!map.is_fully_written(500, 10));
    }

    #[test]
    fn test_clear() {
        let mut map = WriteBitmap::new(0, 63, 0, 1);
        map.mark_written(0, 64);
        assert_eq!(map.written_blocks(), 64);
        map.clear();
        assert_eq!(map.written_blocks(), 0);
    }

    proptest! {
        #[test]
        fn prop_marked_ranges_read_written(
            block in 1u64..16,
            first in 0u64..64,
            count in 1u64..32,
            gap in 1u64..16,
        ) {
            let stop = 4096 * block;
            let mut map = WriteBitmap::new(0, stop, 0, block);
            let lba = first * block;
            let length = count * block;
            map.mark_written(lba, length);

            prop_assert!(map.is_fully_written(lba, length));
            // Extend the window past the marked range by at least one block
            prop_assert!(!map.is_fully_written(lba, length + gap * block));
            if first > 0 {
                prop_assert!(!map.is_fully_written(lba - block, length));
            }
        }
    }
}
