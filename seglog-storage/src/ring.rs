//! Circular snapshot file.
//!
//! A fixed number of fixed-size slots, overwritten round-robin. Each slot:
//!
//! ```text
//! +----------+----------+------------------+
//! | checksum | index    | payload          |
//! | 4 bytes  | 4 bytes  | payload_size     |
//! +----------+----------+------------------+
//! ```
//!
//! `index` increases by one per push. On load only the longest run of
//! consecutive indices starting at the oldest valid slot is kept; a slot
//! that fails its checksum ends the run even if later slots are intact.

use crate::error::StorageError;
use seglog_wal::checksum;
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Slot header size (checksum + index).
pub const RING_HEADER_SIZE: usize = 8;

/// A valid slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingEntry {
    /// Byte position of the slot in the file.
    pub offset: u64,
    /// Monotonic push index.
    pub index: u32,
    pub payload: Vec<u8>,
}

/// Fixed-capacity circular file of checksummed entries.
pub struct RingSnapshot {
    file: File,
    path: PathBuf,
    payload_size: usize,
    max_length: usize,
    entries: VecDeque<RingEntry>,
    scratch: Vec<u8>,
}

impl RingSnapshot {
    /// Opens a ring file, preallocating it to `entry_size * max_length` bytes.
    pub fn open(
        path: impl AsRef<Path>,
        payload_size: usize,
        max_length: usize,
        create: bool,
    ) -> Result<Self, StorageError> {
        if max_length == 0 {
            return Err(StorageError::InvalidState(
                "ring capacity must be at least one entry".to_string(),
            ));
        }

        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(create)
            .open(&path)?;

        let entry_size = RING_HEADER_SIZE + payload_size;
        let total = (entry_size * max_length) as u64;
        file.set_len(total)?;

        let mut bytes = vec![0u8; total as usize];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut bytes)?;

        let entries = load_window(&bytes, payload_size, max_length);

        Ok(Self {
            file,
            path,
            payload_size,
            max_length,
            entries,
            scratch: vec![0; entry_size],
        })
    }

    /// Reads the valid window of a ring file without modifying it.
    pub fn read_entries(
        path: impl AsRef<Path>,
        payload_size: usize,
        max_length: usize,
    ) -> Result<Vec<RingEntry>, StorageError> {
        let bytes = std::fs::read(path)?;
        Ok(load_window(&bytes, payload_size, max_length).into())
    }

    /// Returns the ring file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of entries in the window.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the window is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the size of one slot.
    pub fn entry_size(&self) -> usize {
        RING_HEADER_SIZE + self.payload_size
    }

    /// Returns the total file size.
    pub fn max_byte_size(&self) -> u64 {
        (self.entry_size() * self.max_length) as u64
    }

    /// Returns the most recently pushed entry.
    pub fn last(&self) -> Option<&RingEntry> {
        self.entries.back()
    }

    /// Iterates over the window, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &RingEntry> + '_ {
        self.entries.iter()
    }

    /// Writes `payload` into the next slot and fsyncs it.
    pub fn push(&mut self, payload: &[u8]) -> Result<(), StorageError> {
        if payload.len() != self.payload_size {
            return Err(StorageError::InvalidPayloadSize {
                size: payload.len(),
                expected: self.payload_size,
            });
        }

        let entry_size = self.entry_size() as u64;
        let (offset, index) = match self.last() {
            Some(last) => (
                (last.offset + entry_size) % self.max_byte_size(),
                last.index.wrapping_add(1),
            ),
            None => (0, 0),
        };

        self.scratch[4..8].copy_from_slice(&index.to_le_bytes());
        self.scratch[RING_HEADER_SIZE..].copy_from_slice(payload);
        let crc = checksum::frame_checksum(&self.scratch);
        self.scratch[0..4].copy_from_slice(&crc.to_le_bytes());

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&self.scratch)?;
        self.file.sync_data()?;

        tracing::debug!("Pushed ring entry {} at byte {}", index, offset);

        self.entries.push_back(RingEntry {
            offset,
            index,
            payload: payload.to_vec(),
        });
        if self.entries.len() > self.max_length {
            self.entries.pop_front();
        }
        Ok(())
    }
}

/// Collects valid slots from raw file bytes and keeps the contiguous run.
fn load_window(bytes: &[u8], payload_size: usize, max_length: usize) -> VecDeque<RingEntry> {
    let entry_size = RING_HEADER_SIZE + payload_size;
    let mut valid = Vec::new();

    for (slot, chunk) in bytes.chunks_exact(entry_size).take(max_length).enumerate() {
        let stored = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        if stored != checksum::frame_checksum(chunk) {
            continue;
        }
        let index = u32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]);
        valid.push(RingEntry {
            offset: (slot * entry_size) as u64,
            index,
            payload: chunk[RING_HEADER_SIZE..].to_vec(),
        });
    }

    valid.sort_by_key(|entry| entry.index);

    let mut keep = valid.len().min(1);
    while keep < valid.len() && valid[keep].index == valid[keep - 1].index.wrapping_add(1) {
        keep += 1;
    }
    if keep < valid.len() {
        tracing::warn!(
            "Discarding {} ring entries after index {}",
            valid.len() - keep,
            valid[keep - 1].index
        );
        valid.truncate(keep);
    }

    valid.into()
}
