//! # seglog-storage
//!
//! Partition storage for seglog.
//!
//! This crate provides:
//! - Segment rotation and crash recovery for a single partition writer
//! - A circular, checksummed snapshot of producer state
//! - An advisory cross-process lock on the partition
//! - Sequential readers that follow a partition across segment boundaries
//! - Read-only partition verification

pub mod error;
pub mod layout;
pub mod lock;
pub mod reader;
pub mod ring;
pub mod verify;
pub mod writer;

pub use error::StorageError;
pub use lock::FileMutex;
pub use reader::{PartitionIter, PartitionReader, PartitionRecord};
pub use ring::{RingEntry, RingSnapshot};
pub use verify::{verify_partition, SegmentReport, VerifyReport};
pub use writer::{
    CommitOptions, PartitionConfig, PartitionWriter, ProducerState, WriterState, WriterStats,
};
