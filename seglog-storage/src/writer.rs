//! Partition writer.
//!
//! Owns the active segment (log + index) of one partition directory, the
//! producer snapshot ring and the partition lock. All durability flows
//! through [`PartitionWriter::commit`]: the log and index are synced before
//! the producer state is pushed to the snapshot, and the snapshot push is the
//! only step that moves the recovery point forward.
//!
//! On open, the last snapshot entry is trusted. Anything written to the
//! active segment after it is either discarded or, for an end-of-segment
//! marker written during an interrupted rotation, completed.

use crate::error::StorageError;
use crate::layout;
use crate::lock::FileMutex;
use crate::ring::RingSnapshot;
use bytes::{Buf, BufMut};
use seglog_wal::{ControlType, LogState, OffsetIndex, SegmentLog, DEFAULT_MAX_RECORD_SIZE};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Encoded size of a [`ProducerState`].
pub const SNAPSHOT_PAYLOAD_SIZE: usize = 12;

/// Number of producer states kept in the snapshot ring.
pub const SNAPSHOT_CAPACITY: usize = 4;

/// Committed position of the active segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProducerState {
    /// Base offset of the active segment.
    pub base_offset: u32,
    /// Committed byte length of the active segment log.
    pub byte_length: u32,
    /// Next relative offset in the active segment.
    pub next_relative_offset: u32,
}

impl ProducerState {
    /// Encodes as three little-endian u32 values.
    pub fn encode(&self) -> [u8; SNAPSHOT_PAYLOAD_SIZE] {
        let mut out = [0u8; SNAPSHOT_PAYLOAD_SIZE];
        let mut buf = &mut out[..];
        buf.put_u32_le(self.base_offset);
        buf.put_u32_le(self.byte_length);
        buf.put_u32_le(self.next_relative_offset);
        out
    }

    /// Decodes a snapshot payload.
    pub fn decode(payload: &[u8]) -> Result<Self, StorageError> {
        if payload.len() != SNAPSHOT_PAYLOAD_SIZE {
            return Err(StorageError::InvalidPayloadSize {
                size: payload.len(),
                expected: SNAPSHOT_PAYLOAD_SIZE,
            });
        }
        let mut buf = payload;
        Ok(Self {
            base_offset: buf.get_u32_le(),
            byte_length: buf.get_u32_le(),
            next_relative_offset: buf.get_u32_le(),
        })
    }

    /// Returns the segment log state part.
    pub fn log_state(&self) -> LogState {
        LogState {
            byte_length: self.byte_length,
            next_relative_offset: self.next_relative_offset,
        }
    }
}

/// Partition writer configuration.
#[derive(Debug, Clone)]
pub struct PartitionConfig {
    /// Partition directory.
    pub dir: PathBuf,
    /// Maximum record payload size.
    pub max_record_size: usize,
    /// Create the directory if it does not exist.
    pub create: bool,
}

impl PartitionConfig {
    /// Creates a configuration with default limits.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            max_record_size: DEFAULT_MAX_RECORD_SIZE,
            create: true,
        }
    }

    /// Sets the maximum record payload size.
    pub fn with_max_record_size(mut self, size: usize) -> Self {
        self.max_record_size = size;
        self
    }

    /// Sets whether a missing directory is created.
    pub fn with_create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }
}

/// Options for [`PartitionWriter::commit_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CommitOptions {
    /// Commit even if nothing was appended.
    pub force: bool,
    /// Skip the commit control record.
    pub no_append: bool,
}

/// Writer lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriterState {
    Uninitialized,
    Active,
    Rotating,
    Closed,
}

/// Counters since the writer was opened.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WriterStats {
    pub appends: u64,
    pub bytes_appended: u64,
    pub commits: u64,
    pub splits: u64,
}

struct ActiveSegment {
    log: SegmentLog,
    index: OffsetIndex,
}

/// Single writer for one partition directory.
pub struct PartitionWriter {
    config: PartitionConfig,
    lock: FileMutex,
    snapshot: RingSnapshot,
    base_offset: u64,
    active: Option<ActiveSegment>,
    state: WriterState,
    dirty: bool,
    stats: WriterStats,
}

impl PartitionWriter {
    /// Opens the partition for writing and recovers the active segment.
    ///
    /// Returns `Ok(None)` if another live process holds the partition lock.
    pub fn open(config: PartitionConfig) -> Result<Option<Self>, StorageError> {
        let dir = config.dir.clone();
        if config.create {
            std::fs::create_dir_all(&dir)?;
        } else if !dir.is_dir() {
            return Err(StorageError::PartitionNotFound(dir));
        }

        let segments = layout::list_segments(&dir)?;
        let snapshot_path = layout::snapshot_path(&dir);

        let lock = match FileMutex::acquire(&snapshot_path)? {
            Some(lock) => lock,
            None => {
                tracing::info!("Partition {} is busy", dir.display());
                return Ok(None);
            }
        };

        let snapshot = RingSnapshot::open(
            &snapshot_path,
            SNAPSHOT_PAYLOAD_SIZE,
            SNAPSHOT_CAPACITY,
            true,
        )?;

        let trusted = match snapshot.last() {
            Some(entry) => Some(ProducerState::decode(&entry.payload)?),
            None => None,
        };

        let bootstrap = trusted.is_none();
        let producer = match trusted {
            Some(state) => state,
            None => {
                if segments.len() > 1 || segments.first().is_some_and(|&base| base != 0) {
                    return Err(StorageError::AssertionFailure(format!(
                        "partition {} has segments {:?} but no committed state",
                        dir.display(),
                        segments
                    )));
                }
                ProducerState::default()
            }
        };

        let base_offset = producer.base_offset as u64;
        let log = SegmentLog::open(
            layout::log_path(&dir, base_offset),
            config.max_record_size,
            Some(producer.log_state()),
        )?;
        let mut index = OffsetIndex::open(layout::index_path(&dir, base_offset), true)?;

        let file_len = std::fs::metadata(log.path())?.len();
        if file_len < producer.byte_length as u64 {
            return Err(StorageError::Corruption(format!(
                "log {} is {} bytes, committed length is {}",
                log.path().display(),
                file_len,
                producer.byte_length
            )));
        }

        let committed_entries = producer.next_relative_offset as u64;
        if index.len() > committed_entries {
            tracing::warn!(
                "Dropping {} uncommitted entries from index {}",
                index.len() - committed_entries,
                index.path().display()
            );
            index.truncate(committed_entries)?;
        } else if index.len() < committed_entries {
            return Err(StorageError::Corruption(format!(
                "index {} has {} entries, committed records are {}",
                index.path().display(),
                index.len(),
                committed_entries
            )));
        }

        let mut writer = Self {
            config,
            lock,
            snapshot,
            base_offset,
            active: Some(ActiveSegment { log, index }),
            state: WriterState::Uninitialized,
            dirty: false,
            stats: WriterStats::default(),
        };

        if bootstrap {
            tracing::info!("Initializing partition {}", dir.display());
            writer.commit_inner(CommitOptions {
                force: true,
                no_append: true,
            })?;
        }

        let active = writer.active_mut()?;
        let pending = active.log.uncommitted_control_record()?;
        if pending == Some(ControlType::EndOfSegment) && producer.byte_length > 0 {
            tracing::warn!(
                "Completing interrupted rotation of segment {} in {}",
                base_offset,
                dir.display()
            );
            writer.state = WriterState::Active;
            writer.split()?;
        } else {
            let removed = active.log.truncate_tail()?;
            if removed > 0 {
                tracing::warn!(
                    "Discarded {} uncommitted bytes from {}",
                    removed,
                    active.log.path().display()
                );
            }
        }

        writer.state = WriterState::Active;
        tracing::info!(
            "Opened partition {} at offset {}",
            dir.display(),
            writer.next_offset()
        );
        Ok(Some(writer))
    }

    /// Returns the partition directory.
    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    /// Returns the base offset of the active segment.
    pub fn base_offset(&self) -> u64 {
        self.base_offset
    }

    /// Returns the absolute offset the next record will receive.
    pub fn next_offset(&self) -> u64 {
        let next = self
            .active
            .as_ref()
            .and_then(|active| active.log.state().ok())
            .map_or(0, |state| state.next_relative_offset);
        self.base_offset + next as u64
    }

    /// Returns whether there are appends not yet committed.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn stats(&self) -> &WriterStats {
        &self.stats
    }

    /// Returns the in-memory producer state of the active segment.
    pub fn producer_state(&self) -> Result<ProducerState, StorageError> {
        let active = self.active.as_ref().ok_or(StorageError::Closed)?;
        let log_state = active.log.state()?;
        Ok(ProducerState {
            base_offset: self.snapshot_base()?,
            byte_length: log_state.byte_length,
            next_relative_offset: log_state.next_relative_offset,
        })
    }

    /// Returns the most recently committed producer state.
    pub fn committed_state(&self) -> Result<Option<ProducerState>, StorageError> {
        self.snapshot
            .last()
            .map(|entry| ProducerState::decode(&entry.payload))
            .transpose()
    }

    /// Appends a record and returns its absolute offset.
    pub fn append(&mut self, payload: &[u8]) -> Result<u64, StorageError> {
        self.ensure_active()?;
        let active = self.active_mut()?;
        let appended = active.log.append(payload)?;
        active.index.add(appended.offset, appended.position)?;

        self.dirty = true;
        self.stats.appends += 1;
        self.stats.bytes_appended += payload.len() as u64;
        Ok(self.base_offset + appended.offset as u64)
    }

    /// Commits pending appends.
    pub fn commit(&mut self) -> Result<(), StorageError> {
        self.commit_with(CommitOptions::default())
    }

    /// Commits with explicit options. Without `force` this is a no-op when
    /// nothing was appended since the last commit.
    pub fn commit_with(&mut self, options: CommitOptions) -> Result<(), StorageError> {
        self.ensure_active()?;
        self.commit_inner(options)
    }

    fn commit_inner(&mut self, options: CommitOptions) -> Result<(), StorageError> {
        if !self.dirty && !options.force {
            return Ok(());
        }

        let base_offset = self.snapshot_base()?;
        let active = self.active_mut()?;
        if !options.no_append {
            let appended = active.log.append_control_record(ControlType::Commit)?;
            active.index.add(appended.offset, appended.position)?;
        }

        let log_state = active.log.state()?;
        active.log.sync()?;
        active.index.sync()?;

        let producer = ProducerState {
            base_offset,
            byte_length: log_state.byte_length,
            next_relative_offset: log_state.next_relative_offset,
        };
        self.snapshot.push(&producer.encode())?;

        self.dirty = false;
        self.stats.commits += 1;
        tracing::debug!(
            "Committed segment {} at byte {} (next offset {})",
            base_offset,
            producer.byte_length,
            producer.next_relative_offset
        );
        Ok(())
    }

    /// Seals the active segment and starts a new one.
    ///
    /// Returns the base offset of the new segment.
    pub fn split(&mut self) -> Result<u64, StorageError> {
        self.ensure_active()?;
        if self.active_mut()?.log.byte_length()? == 0 {
            return Err(StorageError::CannotSplitEmptySegment);
        }

        self.commit()?;
        self.state = WriterState::Rotating;
        let new_base = self.rotate()?;
        self.state = WriterState::Active;
        Ok(new_base)
    }

    fn rotate(&mut self) -> Result<u64, StorageError> {
        let active = self.active.as_mut().ok_or(StorageError::Closed)?;

        let eos = active
            .log
            .append_control_record(ControlType::EndOfSegment)?;
        active.index.add(eos.offset, eos.position)?;
        active.log.sync()?;
        active.index.sync()?;

        let old_base = self.base_offset;
        let new_base = old_base + eos.offset as u64 + 1;
        let dir = &self.config.dir;

        let mut log = SegmentLog::open(
            layout::log_path(dir, new_base),
            self.config.max_record_size,
            Some(LogState::default()),
        )?;
        let mut index = OffsetIndex::open(layout::index_path(dir, new_base), true)?;

        // Files left by an interrupted rotation are reused from empty.
        let stale = log.truncate_tail()?;
        if stale > 0 || !index.is_empty() {
            tracing::warn!(
                "Discarding leftover data in segment {} ({} bytes, {} index entries)",
                new_base,
                stale,
                index.len()
            );
            index.truncate(0)?;
        }

        let old = std::mem::replace(active, ActiveSegment { log, index });
        old.log.close()?;
        old.index.close()?;
        self.base_offset = new_base;

        self.commit_inner(CommitOptions {
            force: true,
            no_append: true,
        })?;

        self.stats.splits += 1;
        tracing::info!(
            "Rotated partition {} from segment {} to {}",
            self.config.dir.display(),
            old_base,
            new_base
        );
        Ok(new_base)
    }

    /// Commits pending appends, closes the segment files and releases the
    /// partition lock. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<(), StorageError> {
        if self.state == WriterState::Closed {
            return Ok(());
        }
        self.ensure_active()?;
        self.commit()?;

        if let Some(active) = self.active.take() {
            active.log.close()?;
            active.index.close()?;
        }
        self.lock.release()?;
        self.state = WriterState::Closed;

        tracing::info!("Closed partition {}", self.config.dir.display());
        Ok(())
    }

    fn ensure_active(&self) -> Result<(), StorageError> {
        match self.state {
            WriterState::Active => Ok(()),
            WriterState::Closed => Err(StorageError::Closed),
            other => Err(StorageError::InvalidState(format!(
                "writer is {:?}, expected Active",
                other
            ))),
        }
    }

    fn active_mut(&mut self) -> Result<&mut ActiveSegment, StorageError> {
        self.active.as_mut().ok_or(StorageError::Closed)
    }

    fn snapshot_base(&self) -> Result<u32, StorageError> {
        u32::try_from(self.base_offset).map_err(|_| StorageError::OffsetOverflow(self.base_offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open(dir: &Path) -> PartitionWriter {
        PartitionWriter::open(PartitionConfig::new(dir).with_max_record_size(256))
            .unwrap()
            .unwrap()
    }

    fn snapshot_states(dir: &Path) -> Vec<ProducerState> {
        RingSnapshot::read_entries(
            layout::snapshot_path(dir),
            SNAPSHOT_PAYLOAD_SIZE,
            SNAPSHOT_CAPACITY,
        )
        .unwrap()
        .iter()
        .map(|entry| ProducerState::decode(&entry.payload).unwrap())
        .collect()
    }

    #[test]
    fn test_producer_state_encoding() {
        let state = ProducerState {
            base_offset: 1,
            byte_length: 0x0203,
            next_relative_offset: 7,
        };
        let bytes = state.encode();
        assert_eq!(bytes, [1, 0, 0, 0, 3, 2, 0, 0, 7, 0, 0, 0]);
        assert_eq!(ProducerState::decode(&bytes).unwrap(), state);
        assert!(matches!(
            ProducerState::decode(&bytes[..8]),
            Err(StorageError::InvalidPayloadSize {
                size: 8,
                expected: 12
            })
        ));
    }

    #[test]
    fn test_open_empty_partition_bootstraps() {
        let dir = TempDir::new().unwrap();
        let part = dir.path().join("p0");
        let writer = open(&part);

        assert_eq!(writer.state(), WriterState::Active);
        assert_eq!(writer.base_offset(), 0);
        assert_eq!(writer.next_offset(), 0);
        assert!(!writer.is_dirty());
        assert_eq!(layout::list_segments(&part).unwrap(), vec![0]);
        assert!(layout::index_path(&part, 0).exists());
        assert_eq!(snapshot_states(&part), vec![ProducerState::default()]);
    }

    #[test]
    fn test_open_missing_dir_without_create() {
        let dir = TempDir::new().unwrap();
        let result =
            PartitionWriter::open(PartitionConfig::new(dir.path().join("nope")).with_create(false));
        assert!(matches!(result, Err(StorageError::PartitionNotFound(_))));
    }

    #[test]
    fn test_append_and_commit() {
        let dir = TempDir::new().unwrap();
        let mut writer = open(dir.path());

        assert_eq!(writer.append(b"a").unwrap(), 0);
        assert_eq!(writer.append(b"b").unwrap(), 1);
        assert_eq!(writer.append(b"c").unwrap(), 2);
        assert!(writer.is_dirty());

        writer.commit().unwrap();
        assert!(!writer.is_dirty());
        // Commit record took offset 3.
        assert_eq!(writer.next_offset(), 4);
        assert_eq!(
            writer.committed_state().unwrap(),
            Some(ProducerState {
                base_offset: 0,
                byte_length: 3 * 13 + 16,
                next_relative_offset: 4,
            })
        );

        // Nothing pending: no new snapshot entry.
        writer.commit().unwrap();
        assert_eq!(snapshot_states(dir.path()).len(), 2);

        assert_eq!(writer.stats().appends, 3);
        assert_eq!(writer.stats().bytes_appended, 3);
    }

    #[test]
    fn test_append_rejects_invalid_size() {
        let dir = TempDir::new().unwrap();
        let mut writer = open(dir.path());

        let err = writer.append(&[0u8; 257]).unwrap_err();
        assert!(matches!(
            err,
            StorageError::Wal(seglog_wal::WalError::InvalidRecordSize { size: 257, .. })
        ));
        assert!(!writer.is_dirty());
        assert_eq!(writer.next_offset(), 0);
    }

    #[test]
    fn test_reopen_resumes_offsets() {
        let dir = TempDir::new().unwrap();
        {
            let mut writer = open(dir.path());
            for payload in [b"x", b"y", b"z"] {
                writer.append(payload).unwrap();
            }
            writer.close().unwrap();
        }

        let mut writer = open(dir.path());
        assert_eq!(writer.next_offset(), 4);
        assert_eq!(writer.append(b"w").unwrap(), 4);
    }

    #[test]
    fn test_second_writer_is_busy() {
        let dir = TempDir::new().unwrap();
        let mut first = open(dir.path());

        let second = PartitionWriter::open(PartitionConfig::new(dir.path())).unwrap();
        assert!(second.is_none());

        first.close().unwrap();
        assert!(PartitionWriter::open(PartitionConfig::new(dir.path()))
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_split_empty_segment() {
        let dir = TempDir::new().unwrap();
        let mut writer = open(dir.path());
        assert!(matches!(
            writer.split(),
            Err(StorageError::CannotSplitEmptySegment)
        ));
    }

    #[test]
    fn test_split_rotates_segment() {
        let dir = TempDir::new().unwrap();
        let mut writer = open(dir.path());

        writer.append(b"one").unwrap();
        writer.append(b"two").unwrap();
        writer.append(b"three").unwrap();

        // Data 0-2, commit 3, end-of-segment 4.
        assert_eq!(writer.split().unwrap(), 5);
        assert_eq!(writer.base_offset(), 5);
        assert_eq!(writer.next_offset(), 5);
        assert_eq!(writer.state(), WriterState::Active);
        assert_eq!(writer.stats().splits, 1);
        assert_eq!(layout::list_segments(dir.path()).unwrap(), vec![0, 5]);
        assert_eq!(
            writer.committed_state().unwrap(),
            Some(ProducerState {
                base_offset: 5,
                byte_length: 0,
                next_relative_offset: 0,
            })
        );

        assert_eq!(writer.append(b"four").unwrap(), 5);
    }

    #[test]
    fn test_uncommitted_appends_are_discarded() {
        let dir = TempDir::new().unwrap();
        let committed_len = {
            let mut writer = open(dir.path());
            writer.append(b"kept").unwrap();
            writer.commit().unwrap();
            let committed = writer.committed_state().unwrap().unwrap();
            writer.append(b"lost").unwrap();
            // Dropped without commit.
            committed.byte_length as u64
        };

        let mut writer = open(dir.path());
        assert_eq!(writer.next_offset(), 2);
        assert_eq!(
            std::fs::metadata(layout::log_path(dir.path(), 0))
                .unwrap()
                .len(),
            committed_len
        );
        assert_eq!(
            std::fs::metadata(layout::index_path(dir.path(), 0))
                .unwrap()
                .len(),
            2 * seglog_wal::index::ENTRY_SIZE as u64
        );
        assert_eq!(writer.append(b"again").unwrap(), 2);
    }

    #[test]
    fn test_interrupted_rotation_is_completed() {
        let dir = TempDir::new().unwrap();
        {
            let mut writer = open(dir.path());
            for payload in [b"a", b"b", b"c"] {
                writer.append(payload).unwrap();
            }
            writer.commit().unwrap();

            let active = writer.active.as_mut().unwrap();
            active
                .log
                .append_control_record(ControlType::EndOfSegment)
                .unwrap();
            active.log.sync().unwrap();
            // Crash before the new segment is committed.
        }

        let writer = open(dir.path());
        assert_eq!(writer.base_offset(), 5);
        assert_eq!(writer.next_offset(), 5);
        assert_eq!(layout::list_segments(dir.path()).unwrap(), vec![0, 5]);
        assert_eq!(
            snapshot_states(dir.path()).last().copied(),
            Some(ProducerState {
                base_offset: 5,
                byte_length: 0,
                next_relative_offset: 0,
            })
        );
        assert_eq!(
            std::fs::metadata(layout::log_path(dir.path(), 5))
                .unwrap()
                .len(),
            0
        );
    }

    #[test]
    fn test_interrupted_rotation_after_new_segment_created() {
        let dir = TempDir::new().unwrap();
        {
            let mut writer = open(dir.path());
            for payload in [b"a", b"b", b"c"] {
                writer.append(payload).unwrap();
            }
            writer.commit().unwrap();

            // Seal the segment and create its successor, then crash before
            // the new segment is committed.
            let active = writer.active.as_mut().unwrap();
            let eos = active
                .log
                .append_control_record(ControlType::EndOfSegment)
                .unwrap();
            active.index.add(eos.offset, eos.position).unwrap();
            active.log.sync().unwrap();
            active.index.sync().unwrap();
            SegmentLog::open(
                layout::log_path(dir.path(), 5),
                256,
                Some(LogState::default()),
            )
            .unwrap();
            OffsetIndex::open(layout::index_path(dir.path(), 5), true).unwrap();
        }

        let mut writer = open(dir.path());
        assert_eq!(writer.base_offset(), 5);
        assert_eq!(writer.next_offset(), 5);
        assert_eq!(layout::list_segments(dir.path()).unwrap(), vec![0, 5]);
        assert_eq!(
            OffsetIndex::open_read_only(layout::index_path(dir.path(), 0))
                .unwrap()
                .len(),
            5
        );

        writer.append(b"d").unwrap();
        writer.close().unwrap();

        let mut reader = crate::reader::PartitionReader::open(dir.path(), 0, 256).unwrap();
        let offsets: Vec<u64> = reader
            .iter(false)
            .map(|r| r.unwrap().offset)
            .collect();
        assert_eq!(offsets, vec![0, 1, 2, 5]);

        let report = crate::verify::verify_partition(dir.path(), 256).unwrap();
        assert!(report.is_healthy(), "{:?}", report.problems);
    }

    #[test]
    fn test_lone_segment_without_snapshot_fails() {
        let dir = TempDir::new().unwrap();
        std::fs::write(layout::log_path(dir.path(), 5), b"").unwrap();
        std::fs::write(layout::index_path(dir.path(), 5), b"").unwrap();

        let result = PartitionWriter::open(PartitionConfig::new(dir.path()));
        assert!(matches!(result, Err(StorageError::AssertionFailure(_))));
        assert_eq!(layout::list_segments(dir.path()).unwrap(), vec![5]);
    }

    #[test]
    fn test_segments_without_snapshot_fail() {
        let dir = TempDir::new().unwrap();
        std::fs::write(layout::log_path(dir.path(), 0), b"").unwrap();
        std::fs::write(layout::log_path(dir.path(), 5), b"").unwrap();

        let result = PartitionWriter::open(PartitionConfig::new(dir.path()));
        assert!(matches!(result, Err(StorageError::AssertionFailure(_))));
        // The lock is released on failure.
        assert!(!dir.path().join("snapshot.lock-signal").exists());
    }

    #[test]
    fn test_closed_writer() {
        let dir = TempDir::new().unwrap();
        let mut writer = open(dir.path());
        writer.append(b"data").unwrap();
        writer.close().unwrap();

        assert_eq!(writer.state(), WriterState::Closed);
        assert!(matches!(writer.append(b"x"), Err(StorageError::Closed)));
        assert!(matches!(writer.commit(), Err(StorageError::Closed)));
        assert!(matches!(writer.split(), Err(StorageError::Closed)));
        writer.close().unwrap();
    }
}
