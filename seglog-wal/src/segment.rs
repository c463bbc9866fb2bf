//! Segment log.
//!
//! An append-only file of framed records (see [`crate::record`]). The log
//! keeps its producer state (`byte_length`, `next_relative_offset`) in memory;
//! the state is either handed in from a trusted checkpoint or rebuilt by a
//! full forward scan.

use crate::error::WalError;
use crate::io::{read_at, write_at};
use crate::record::{
    self, ControlType, RecordHeader, CONTROL_PAYLOAD_SIZE, CONTROL_RECORD_SIZE, HEADER_SIZE,
};
use bytes::BytesMut;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Producer state of a segment log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogState {
    /// Bytes of fully written records.
    pub byte_length: u32,
    /// Relative offset the next record will receive.
    pub next_relative_offset: u32,
}

/// Location of an appended record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Appended {
    /// Relative offset assigned to the record.
    pub offset: u32,
    /// Byte position of the record header.
    pub position: u32,
}

/// A single segment log file.
pub struct SegmentLog {
    file: File,
    path: PathBuf,
    max_record_size: usize,
    state: Option<LogState>,
    scratch: BytesMut,
}

impl SegmentLog {
    /// Opens a segment log, creating the file if it does not exist.
    ///
    /// With `state == None` the log must be rebuilt with
    /// [`rebuild_state`](Self::rebuild_state) before use.
    pub fn open(
        path: impl AsRef<Path>,
        max_record_size: usize,
        state: Option<LogState>,
    ) -> Result<Self, WalError> {
        if max_record_size < CONTROL_PAYLOAD_SIZE {
            return Err(WalError::InvalidMaxRecordSize(max_record_size));
        }

        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        Ok(Self {
            file,
            path,
            max_record_size,
            state,
            scratch: BytesMut::with_capacity(HEADER_SIZE + max_record_size),
        })
    }

    /// Returns the segment file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the maximum payload size accepted by [`append`](Self::append).
    pub fn max_record_size(&self) -> usize {
        self.max_record_size
    }

    /// Returns a copy of the current state.
    pub fn state(&self) -> Result<LogState, WalError> {
        self.state.ok_or(WalError::StateNotBuilt)
    }

    /// Returns the number of bytes of fully written records.
    pub fn byte_length(&self) -> Result<u32, WalError> {
        Ok(self.state()?.byte_length)
    }

    /// Rebuilds the state by scanning every record from the start of the file.
    ///
    /// The scan stops quietly at EOF, on a short read, or at a zero-size header
    /// (an uninitialised tail). A checksum mismatch on a well-sized record is
    /// returned as an error; the state is still left at the last valid record.
    pub fn rebuild_state(&mut self) -> Result<LogState, WalError> {
        let mut state = LogState::default();
        let result = self.scan(&mut state);
        self.state = Some(state);

        if let Err(ref e) = result {
            tracing::warn!(
                "Rebuild of {} stopped at byte {}: {}",
                self.path.display(),
                state.byte_length,
                e
            );
        }
        result.map(|()| state)
    }

    fn scan(&mut self, state: &mut LogState) -> Result<(), WalError> {
        self.scratch.resize(HEADER_SIZE + self.max_record_size, 0);
        let mut position = 0u64;

        loop {
            let n = read_at(&mut self.file, &mut self.scratch[..HEADER_SIZE], position)?;
            if n < HEADER_SIZE {
                break;
            }

            let header = RecordHeader::decode(&self.scratch[..HEADER_SIZE]);
            if header.size == 0 {
                break;
            }
            header.validate_size(self.max_record_size, position)?;

            let payload_len = header.payload_len();
            let frame_len = HEADER_SIZE + payload_len;
            let n = read_at(
                &mut self.file,
                &mut self.scratch[HEADER_SIZE..frame_len],
                position + HEADER_SIZE as u64,
            )?;
            if n < payload_len {
                break;
            }

            header.verify(&self.scratch[..frame_len], position)?;
            if header.is_control() {
                record::decode_control(&self.scratch[HEADER_SIZE..frame_len], position)?;
            }

            position += frame_len as u64;
            state.byte_length = position as u32;
            state.next_relative_offset = header.relative_offset.wrapping_add(1);
        }

        Ok(())
    }

    /// Peeks at the current byte length for a complete control record.
    ///
    /// Returns `None` if nothing is there, the frame is not a control record,
    /// or its checksum does not match. A previous process may have written the
    /// record without committing it.
    pub fn uncommitted_control_record(&mut self) -> Result<Option<ControlType>, WalError> {
        let position = self.byte_length()? as u64;
        let mut frame = [0u8; CONTROL_RECORD_SIZE];

        let n = read_at(&mut self.file, &mut frame, position)?;
        if n < CONTROL_RECORD_SIZE {
            return Ok(None);
        }

        let header = RecordHeader::decode(&frame);
        if !header.is_control() || header.verify(&frame, position).is_err() {
            return Ok(None);
        }

        Ok(record::decode_control(&frame[HEADER_SIZE..], position).ok())
    }

    /// Appends a data record.
    ///
    /// The write is not atomic; a crash can leave a torn frame past the
    /// committed byte length, which checksum validation later rejects.
    pub fn append(&mut self, payload: &[u8]) -> Result<Appended, WalError> {
        if payload.is_empty() || payload.len() > self.max_record_size {
            return Err(WalError::InvalidRecordSize {
                size: payload.len(),
                max: self.max_record_size,
            });
        }

        let state = self.reserve(HEADER_SIZE + payload.len())?;
        record::encode_record(&mut self.scratch, state.next_relative_offset, payload);
        self.write_scratch(state)
    }

    /// Appends a control record.
    pub fn append_control_record(&mut self, control: ControlType) -> Result<Appended, WalError> {
        let state = self.reserve(CONTROL_RECORD_SIZE)?;
        record::encode_control(&mut self.scratch, state.next_relative_offset, control);
        self.write_scratch(state)
    }

    fn reserve(&self, record_size: usize) -> Result<LogState, WalError> {
        let state = self.state()?;
        let end = state.byte_length as u64 + record_size as u64;
        if end > u32::MAX as u64 || state.next_relative_offset == u32::MAX {
            return Err(WalError::SegmentFull {
                byte_length: state.byte_length as u64,
                record_size,
            });
        }
        Ok(state)
    }

    fn write_scratch(&mut self, state: LogState) -> Result<Appended, WalError> {
        let position = state.byte_length;
        write_at(&mut self.file, &self.scratch, position as u64)?;

        let appended = Appended {
            offset: state.next_relative_offset,
            position,
        };
        self.state = Some(LogState {
            byte_length: position + self.scratch.len() as u32,
            next_relative_offset: state.next_relative_offset + 1,
        });
        Ok(appended)
    }

    /// Discards any bytes past the current byte length.
    ///
    /// Returns the number of bytes removed.
    pub fn truncate_tail(&mut self) -> Result<u64, WalError> {
        let byte_length = self.byte_length()? as u64;
        let file_len = self.file.metadata()?.len();
        if file_len <= byte_length {
            return Ok(0);
        }
        self.file.set_len(byte_length)?;
        Ok(file_len - byte_length)
    }

    /// Syncs the segment to disk.
    pub fn sync(&mut self) -> Result<(), WalError> {
        self.file.sync_data()?;
        Ok(())
    }

    /// Closes the segment file.
    pub fn close(self) -> Result<(), WalError> {
        drop(self.file);
        Ok(())
    }
}
