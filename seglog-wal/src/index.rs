//! Offset index.
//!
//! Maps a segment's relative offsets to the byte position of the record in
//! the segment log. Entries are fixed-size and appended in strictly
//! increasing key order:
//!
//! ```text
//! +----------+----------+
//! | key      | value    |
//! | 4 bytes  | 4 bytes  |
//! +----------+----------+
//! ```

use crate::error::WalError;
use crate::io::{read_at, write_at};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Size of one index entry in bytes.
pub const ENTRY_SIZE: usize = 8;

/// Compares two keys, returning a negative, zero or positive distance.
///
/// The magnitude matters: [`OffsetIndex::find`] uses it to pick the nearest
/// neighbour when no exact match exists.
pub type KeyComparator = fn(u32, u32) -> i64;

/// Numeric difference of two keys.
pub fn numeric_comparator(x: u32, y: u32) -> i64 {
    x as i64 - y as i64
}

/// A single index entry with its position in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub index: u64,
    pub key: u32,
    pub value: u32,
}

/// Append-only file of `(key, value)` pairs.
pub struct OffsetIndex {
    file: File,
    path: PathBuf,
    length: u64,
    last_key: Option<u32>,
    cmp: KeyComparator,
    writable: bool,
    scratch: [u8; ENTRY_SIZE],
}

impl OffsetIndex {
    /// Opens an index file, creating it first when `create` is set.
    pub fn open(path: impl AsRef<Path>, create: bool) -> Result<Self, WalError> {
        Self::open_with_comparator(path, create, numeric_comparator)
    }

    /// Opens an index file with a custom key comparator.
    pub fn open_with_comparator(
        path: impl AsRef<Path>,
        create: bool,
        cmp: KeyComparator,
    ) -> Result<Self, WalError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(create)
            .open(&path)?;
        Self::from_file(file, path, cmp, true)
    }

    /// Opens an existing index for lookups only.
    ///
    /// Works on read-only files and mounts. [`add`](Self::add) and
    /// [`truncate`](Self::truncate) return [`WalError::ReadOnly`].
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self, WalError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).open(&path)?;
        Self::from_file(file, path, numeric_comparator, false)
    }

    fn from_file(
        file: File,
        path: PathBuf,
        cmp: KeyComparator,
        writable: bool,
    ) -> Result<Self, WalError> {
        // A torn trailing entry is ignored and overwritten by the next add.
        let length = file.metadata()?.len() / ENTRY_SIZE as u64;

        Ok(Self {
            file,
            path,
            length,
            last_key: None,
            cmp,
            writable,
            scratch: [0; ENTRY_SIZE],
        })
    }

    fn ensure_writable(&self) -> Result<(), WalError> {
        if self.writable {
            Ok(())
        } else {
            Err(WalError::ReadOnly(self.path.clone()))
        }
    }

    /// Returns the index file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of entries.
    pub fn len(&self) -> u64 {
        self.length
    }

    /// Returns whether the index has no entries.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Reads entry `index` as `(key, value)`.
    pub fn get(&mut self, index: u64) -> Result<(u32, u32), WalError> {
        if index >= self.length {
            return Err(WalError::IndexOutOfRange {
                index,
                length: self.length,
            });
        }

        let position = index * ENTRY_SIZE as u64;
        let n = read_at(&mut self.file, &mut self.scratch, position)?;
        if n < ENTRY_SIZE {
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
        }

        let key = u32::from_le_bytes([
            self.scratch[0],
            self.scratch[1],
            self.scratch[2],
            self.scratch[3],
        ]);
        let value = u32::from_le_bytes([
            self.scratch[4],
            self.scratch[5],
            self.scratch[6],
            self.scratch[7],
        ]);
        Ok((key, value))
    }

    /// Finds the entry for `key`, or its nearest neighbour.
    ///
    /// Returns immediately on an exact match. Otherwise the search narrows to
    /// two adjacent candidates and returns the one whose comparator distance
    /// to `key` is smaller; on a tie the upper candidate wins.
    pub fn find(&mut self, key: u32) -> Result<IndexEntry, WalError> {
        if self.length == 0 {
            return Err(WalError::EmptyIndex);
        }

        let mut s = 0u64;
        let mut e = self.length - 1;

        loop {
            let i = s + (e - s) / 2;
            let (k, v) = self.get(i)?;
            let r = (self.cmp)(key, k);

            if r == 0 {
                return Ok(IndexEntry {
                    index: i,
                    key: k,
                    value: v,
                });
            } else if r < 0 {
                e = i;
            } else {
                s = i;
            }

            if e - s <= 1 {
                break;
            }
        }

        let (k0, v0) = self.get(s)?;
        let (k1, v1) = self.get(e)?;

        let d0 = (self.cmp)(k0, key).abs();
        let d1 = (self.cmp)(key, k1).abs();

        if d0 < d1 {
            Ok(IndexEntry {
                index: s,
                key: k0,
                value: v0,
            })
        } else {
            Ok(IndexEntry {
                index: e,
                key: k1,
                value: v1,
            })
        }
    }

    /// Appends an entry. `key` must be greater than every key already stored.
    pub fn add(&mut self, key: u32, value: u32) -> Result<(), WalError> {
        self.ensure_writable()?;
        if self.last_key.is_none() && self.length > 0 {
            self.last_key = Some(self.get(self.length - 1)?.0);
        }

        if let Some(last) = self.last_key {
            if (self.cmp)(key, last) <= 0 {
                return Err(WalError::NonMonotonicKey { key, last });
            }
        }

        self.scratch[0..4].copy_from_slice(&key.to_le_bytes());
        self.scratch[4..8].copy_from_slice(&value.to_le_bytes());

        let position = self.length * ENTRY_SIZE as u64;
        write_at(&mut self.file, &self.scratch, position)?;

        self.last_key = Some(key);
        self.length += 1;
        Ok(())
    }

    /// Drops every entry at or beyond `length`. Growing is a no-op.
    pub fn truncate(&mut self, length: u64) -> Result<(), WalError> {
        self.ensure_writable()?;
        if length >= self.length {
            return Ok(());
        }
        self.file.set_len(length * ENTRY_SIZE as u64)?;
        self.length = length;
        self.last_key = None;
        Ok(())
    }

    /// Iterates over all entries from the start of the file.
    pub fn entries(&mut self) -> IndexEntries<'_> {
        IndexEntries {
            index: self,
            next: 0,
        }
    }

    /// Syncs the index to disk.
    pub fn sync(&mut self) -> Result<(), WalError> {
        self.file.sync_data()?;
        Ok(())
    }

    /// Closes the index file.
    pub fn close(self) -> Result<(), WalError> {
        drop(self.file);
        Ok(())
    }
}

/// Lazy iterator over the entries of an [`OffsetIndex`].
pub struct IndexEntries<'a> {
    index: &'a mut OffsetIndex,
    next: u64,
}

impl Iterator for IndexEntries<'_> {
    type Item = Result<IndexEntry, WalError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.index.len() {
            return None;
        }
        let i = self.next;
        self.next += 1;
        Some(self.index.get(i).map(|(key, value)| IndexEntry {
            index: i,
            key,
            value,
        }))
    }
}
