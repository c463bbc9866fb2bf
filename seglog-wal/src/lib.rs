//! # seglog-wal
//!
//! Segment-level storage primitives for seglog.
//!
//! This crate provides:
//! - CRC32 (IEEE) checksums over record frames
//! - An append-only framed record log with data and control records
//! - A fixed-entry offset index with nearest-neighbour search
//! - A forward reader over a single segment log file

pub mod checksum;
pub mod error;
pub mod index;
mod io;
pub mod reader;
pub mod record;
pub mod segment;

pub use error::WalError;
pub use index::{IndexEntries, IndexEntry, KeyComparator, OffsetIndex};
pub use reader::{SegmentReader, SegmentRecord};
pub use record::{ControlType, RecordHeader};
pub use segment::{Appended, LogState, SegmentLog};

/// Default maximum record payload size (1 MiB).
pub const DEFAULT_MAX_RECORD_SIZE: usize = 1024 * 1024;
