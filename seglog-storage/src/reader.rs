//! Partition reader.
//!
//! Reads a partition forward from a start offset, following end-of-segment
//! markers into the next segment. Readers run alongside the writer and see
//! whatever prefix of the log is on disk; an incomplete tail reads as "no
//! data yet".

use crate::error::StorageError;
use crate::layout;
use bytes::Bytes;
use seglog_wal::{ControlType, OffsetIndex, SegmentReader};
use std::path::{Path, PathBuf};

/// A record read from a partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionRecord {
    /// Absolute offset.
    pub offset: u64,
    /// Control type for control records.
    pub control: Option<ControlType>,
    pub payload: Bytes,
}

impl PartitionRecord {
    pub fn is_control(&self) -> bool {
        self.control.is_some()
    }

    /// Payload size in bytes.
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

/// Forward reader over one partition directory.
pub struct PartitionReader {
    dir: PathBuf,
    max_record_size: usize,
    base_offset: u64,
    start_offset: u64,
    next_offset: u64,
    reader: Option<SegmentReader>,
    closed: bool,
}

impl PartitionReader {
    /// Opens a reader at `start_offset`.
    ///
    /// If the segment holding `start_offset` has no files yet, opening is
    /// deferred to the first [`next`](Self::next) call.
    pub fn open(
        dir: impl AsRef<Path>,
        start_offset: u64,
        max_record_size: usize,
    ) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        let segments = match layout::list_segments(&dir) {
            Ok(segments) => segments,
            Err(StorageError::PartitionNotFound(_)) => Vec::new(),
            Err(e) => return Err(e),
        };
        let base_offset = layout::segment_for_offset(&segments, start_offset).unwrap_or(0);

        let mut reader = Self {
            dir,
            max_record_size,
            base_offset,
            start_offset,
            next_offset: start_offset.max(base_offset),
            reader: None,
            closed: false,
        };

        let log_path = layout::log_path(&reader.dir, base_offset);
        let index_path = layout::index_path(&reader.dir, base_offset);
        if log_path.exists() && index_path.exists() {
            let position = reader.seek_position(&index_path, start_offset)?;
            tracing::debug!(
                "Reading {} from offset {} (segment {}, byte {})",
                reader.dir.display(),
                start_offset,
                base_offset,
                position
            );
            reader.reader = Some(SegmentReader::open(
                &log_path,
                position,
                max_record_size,
            )?);
        }

        Ok(reader)
    }

    fn seek_position(&self, index_path: &Path, start_offset: u64) -> Result<u64, StorageError> {
        let mut index = OffsetIndex::open_read_only(index_path)?;
        if index.is_empty() {
            return Ok(0);
        }

        let relative = start_offset
            .saturating_sub(self.base_offset)
            .min(u32::MAX as u64) as u32;
        let mut entry = index.find(relative)?;
        // Never start past the requested record.
        if entry.key > relative && entry.index > 0 {
            let (key, value) = index.get(entry.index - 1)?;
            entry.key = key;
            entry.value = value;
        }
        if entry.key > relative {
            return Ok(0);
        }
        Ok(entry.value as u64)
    }

    /// Returns the base offset of the segment being read.
    pub fn base_offset(&self) -> u64 {
        self.base_offset
    }

    /// Returns the offset after the last record returned.
    pub fn next_offset(&self) -> u64 {
        self.next_offset
    }

    /// Returns the byte position within the current segment, if one is open.
    pub fn position(&self) -> Option<u64> {
        self.reader.as_ref().map(SegmentReader::position)
    }

    /// Reads the next record.
    ///
    /// Returns `Ok(None)` when no more data is available yet. End-of-segment
    /// markers are returned to the caller; the following call continues in
    /// the next segment.
    pub fn next(&mut self) -> Result<Option<PartitionRecord>, StorageError> {
        if self.closed {
            return Err(StorageError::Closed);
        }

        loop {
            if self.reader.is_none() {
                let path = layout::log_path(&self.dir, self.base_offset);
                if !path.exists() {
                    return Ok(None);
                }
                self.reader = Some(SegmentReader::open(&path, 0, self.max_record_size)?);
            }
            let reader = match self.reader.as_mut() {
                Some(reader) => reader,
                None => return Ok(None),
            };

            let record = match reader.next()? {
                Some(record) => record,
                None => return Ok(None),
            };

            let offset = self.base_offset + record.relative_offset as u64;
            if record.control == Some(ControlType::EndOfSegment) {
                reader.close();
                self.reader = None;
                self.base_offset = offset + 1;
                tracing::debug!(
                    "Reader on {} moved to segment {}",
                    self.dir.display(),
                    self.base_offset
                );
            }

            if offset < self.start_offset {
                continue;
            }

            self.next_offset = offset + 1;
            return Ok(Some(PartitionRecord {
                offset,
                control: record.control,
                payload: record.payload,
            }));
        }
    }

    /// Iterates over the records currently available.
    ///
    /// Control records are skipped unless `include_control` is set. The
    /// iterator ends when no more data is available; calling `iter` again
    /// later picks up where it stopped.
    pub fn iter(&mut self, include_control: bool) -> PartitionIter<'_> {
        PartitionIter {
            reader: self,
            include_control,
            failed: false,
        }
    }

    /// Closes the reader. Further reads fail with [`StorageError::Closed`].
    pub fn close(&mut self) {
        if let Some(mut reader) = self.reader.take() {
            reader.close();
        }
        self.closed = true;
    }
}

/// Iterator returned by [`PartitionReader::iter`].
pub struct PartitionIter<'a> {
    reader: &'a mut PartitionReader,
    include_control: bool,
    failed: bool,
}

impl Iterator for PartitionIter<'_> {
    type Item = Result<PartitionRecord, StorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            match self.reader.next() {
                Ok(Some(record)) if record.is_control() && !self.include_control => continue,
                Ok(Some(record)) => return Some(Ok(record)),
                Ok(None) => return None,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
