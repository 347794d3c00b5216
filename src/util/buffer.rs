//! Aligned I/O buffers
//!
//! O_DIRECT transfers need buffers aligned to the device block size. Each
//! worker owns two: one for data it writes or reads, one for the expected
//! contents during verification.

use crate::error::ExerciserError;
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ops::{Deref, DerefMut};

/// Alignment used for every transfer buffer
pub const DEFAULT_ALIGNMENT: usize = 4096;

/// Heap buffer with a fixed alignment
pub struct AlignedBuffer {
    ptr: *mut u8,
    size: usize,
    layout: Layout,
}

impl AlignedBuffer {
    /// Allocate a zeroed buffer of `size` bytes aligned to `alignment`
    ///
    /// Fails with [`ExerciserError::AllocationFailure`] for a zero size, a
    /// non power of two alignment, or when the allocator returns null.
    pub fn try_new(size: usize, alignment: usize) -> Result<Self, ExerciserError> {
        let failure = || ExerciserError::AllocationFailure { bytes: size };
        if size == 0 {
            return Err(failure());
        }
        let layout = Layout::from_size_align(size, alignment).map_err(|_| failure())?;

        // SAFETY: layout has a non-zero size
        let ptr = unsafe { alloc_zeroed(layout) };
        if ptr.is_null() {
            return Err(failure());
        }
        Ok(Self { ptr, size, layout })
    }

    #[inline(always)]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline(always)]
    pub fn alignment(&self) -> usize {
        self.layout.align()
    }
}

impl Deref for AlignedBuffer {
    type Target = [u8];

    #[inline(always)]
    fn deref(&self) -> &[u8] {
        // SAFETY: ptr is valid for `size` initialized bytes for our lifetime
        unsafe { std::slice::from_raw_parts(self.ptr, self.size) }
    }
}

impl DerefMut for AlignedBuffer {
    #[inline(always)]
    fn deref_mut(&mut self) -> &mut [u8] {
        // SAFETY: as above, and we hold the only reference
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.size) }
    }
}

impl Drop for AlignedBuffer {
    fn drop(&mut self) {
        unsafe {
            dealloc(self.ptr, self.layout);
        }
    }
}

// AlignedBuffer is Send because it owns its memory
unsafe impl Send for AlignedBuffer {}

impl std::fmt::Debug for AlignedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignedBuffer")
            .field("size", &self.size)
            .field("alignment", &self.alignment())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aligned_buffer_creation() {
        let buf = AlignedBuffer::try_new(8192, DEFAULT_ALIGNMENT).unwrap();
        assert_eq!(buf.size(), 8192);
        assert_eq!(buf.as_ptr() as usize % DEFAULT_ALIGNMENT, 0);
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_invalid_requests_fail() {
        assert!(matches!(
            AlignedBuffer::try_new(0, 512),
            Err(ExerciserError::AllocationFailure { bytes: 0 })
        ));
        assert!(AlignedBuffer::try_new(512, 3).is_err());
    }

    #[test]
    fn test_slice_access() {
        let mut buf = AlignedBuffer::try_new(16, 512).unwrap();
        buf[..4].copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(&buf[..4], &[1, 2, 3, 4]);
        assert_eq!(buf.len(), 16);
    }
}
