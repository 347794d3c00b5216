//! Failure taxonomy for worker threads
//!
//! Every way a worker can fail an operation or its whole run is one variant
//! of [`ExerciserError`]. The worker decides what to do with each kind:
//! seek and transfer failures are retried, miscompares never are, and open
//! or allocation failures end the thread before any I/O.

use crate::scheduler::Operation;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the exerciser core
#[derive(Debug, Error)]
pub enum ExerciserError {
    /// I/O buffers could not be allocated
    #[error("memory allocation failure for {bytes} byte I/O buffer")]
    AllocationFailure { bytes: usize },

    /// The target could not be opened
    #[error("could not open {}: {source}", path.display())]
    OpenFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Positioned seek landed somewhere other than requested
    #[error("seek failure at lba {lba}: requested byte {requested}, actual {actual:?}")]
    SeekFailure {
        lba: u64,
        requested: u64,
        actual: Option<u64>,
        os_error: Option<i32>,
    },

    /// Read or write moved fewer bytes than requested
    #[error("{op} transfer failure at lba {lba}: {transferred} of {expected} bytes")]
    TransferFailure {
        op: Operation,
        lba: u64,
        transferred: usize,
        expected: usize,
        os_error: Option<i32>,
    },

    /// Flushing the device failed
    #[error("sync failure: {source}")]
    SyncFailure {
        #[source]
        source: io::Error,
    },

    /// Closing the device failed
    #[error("close failure: {source}")]
    CloseFailure {
        #[source]
        source: io::Error,
    },

    /// Read data did not match the expected pattern
    #[error("data miscompare at lba {lba}, byte offset {byte_offset}")]
    DataMiscompare { lba: u64, byte_offset: usize },
}

/// Coarse failure class, used in worker summaries and exit reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum FailureKind {
    Allocation,
    Open,
    Seek,
    Transfer,
    Sync,
    Close,
    Miscompare,
}

impl ExerciserError {
    /// Classify this error
    pub fn kind(&self) -> FailureKind {
        match self {
            ExerciserError::AllocationFailure { .. } => FailureKind::Allocation,
            ExerciserError::OpenFailure { .. } => FailureKind::Open,
            ExerciserError::SeekFailure { .. } => FailureKind::Seek,
            ExerciserError::TransferFailure { .. } => FailureKind::Transfer,
            ExerciserError::SyncFailure { .. } => FailureKind::Sync,
            ExerciserError::CloseFailure { .. } => FailureKind::Close,
            ExerciserError::DataMiscompare { .. } => FailureKind::Miscompare,
        }
    }

    /// Whether the worker may retry the same action after this error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExerciserError::SeekFailure { .. } | ExerciserError::TransferFailure { .. }
        )
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailureKind::Allocation => "allocation failure",
            FailureKind::Open => "open failure",
            FailureKind::Seek => "seek failure",
            FailureKind::Transfer => "transfer failure",
            FailureKind::Sync => "sync failure",
            FailureKind::Close => "close failure",
            FailureKind::Miscompare => "data miscompare",
        };
        f.write_str(name)
    }
}
