//! Storage error types.

use seglog_wal::WalError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from the partition storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("segment error: {0}")]
    Wal(#[from] WalError),

    #[error("invalid payload size: {size} bytes (expected {expected})")]
    InvalidPayloadSize { size: usize, expected: usize },

    #[error("cannot split an empty segment")]
    CannotSplitEmptySegment,

    #[error("resource is closed")]
    Closed,

    #[error("assertion failed: {0}")]
    AssertionFailure(String),

    #[error("corrupted lock signal file: {}", .0.display())]
    CorruptedLock(PathBuf),

    #[error("partition directory not found: {}", .0.display())]
    PartitionNotFound(PathBuf),

    #[error("offset {0} does not fit the snapshot format")]
    OffsetOverflow(u64),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("data corruption: {0}")]
    Corruption(String),
}

impl StorageError {
    /// Returns whether this error indicates on-disk corruption.
    pub fn is_corruption(&self) -> bool {
        match self {
            StorageError::Wal(e) => e.is_corruption(),
            StorageError::Corruption(_) | StorageError::CorruptedLock(_) => true,
            _ => false,
        }
    }
}
