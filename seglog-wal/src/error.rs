//! Segment log error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during segment log and index operations.
#[derive(Debug, Error)]
pub enum WalError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid record size: {size} bytes (must be 1..={max})")]
    InvalidRecordSize { size: usize, max: usize },

    #[error("maximum record size {0} cannot hold a control payload")]
    InvalidMaxRecordSize(usize),

    #[error("index keys must be strictly increasing: key {key} after {last}")]
    NonMonotonicKey { key: u32, last: u32 },

    #[error("index entry {index} out of range (length {length})")]
    IndexOutOfRange { index: u64, length: u64 },

    #[error("cannot search an empty index")]
    EmptyIndex,

    #[error("record corrupted at position {position}: checksum mismatch (expected {expected:#x}, got {actual:#x})")]
    ChecksumMismatch {
        position: u64,
        expected: u32,
        actual: u32,
    },

    #[error("invalid record header at position {position}: {reason}")]
    CorruptedHeader { position: u64, reason: String },

    #[error("unknown control record type {value} at position {position}")]
    UnknownControlType { position: u64, value: u32 },

    #[error("log state has not been built")]
    StateNotBuilt,

    #[error("segment full: {byte_length} bytes written, record of {record_size} bytes does not fit")]
    SegmentFull { byte_length: u64, record_size: usize },

    #[error("{} is open read-only", .0.display())]
    ReadOnly(PathBuf),

    #[error("resource is closed")]
    Closed,
}

impl WalError {
    /// Returns whether this error indicates on-disk corruption.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            WalError::ChecksumMismatch { .. }
                | WalError::CorruptedHeader { .. }
                | WalError::UnknownControlType { .. }
        )
    }

    /// Returns whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WalError::Io(_))
    }
}
