//! Forward reader over a single segment log file.

use crate::error::WalError;
use crate::io::read_at;
use crate::record::{self, ControlType, RecordHeader, HEADER_SIZE};
use bytes::Bytes;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// A record read from a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentRecord {
    /// Offset relative to the segment's base offset.
    pub relative_offset: u32,
    /// Control type for control records, `None` for data records.
    pub control: Option<ControlType>,
    /// Record payload (the raw 4-byte control payload for control records).
    pub payload: Bytes,
}

impl SegmentRecord {
    /// Returns whether this is a control record.
    pub fn is_control(&self) -> bool {
        self.control.is_some()
    }
}

/// Stateless forward cursor over one segment log.
pub struct SegmentReader {
    file: Option<File>,
    path: PathBuf,
    position: u64,
    max_record_size: usize,
    scratch: Vec<u8>,
}

impl SegmentReader {
    /// Opens a reader positioned at byte `position`.
    pub fn open(
        path: impl AsRef<Path>,
        position: u64,
        max_record_size: usize,
    ) -> Result<Self, WalError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).open(&path)?;

        Ok(Self {
            file: Some(file),
            path,
            position,
            max_record_size,
            scratch: vec![0; HEADER_SIZE + max_record_size.max(record::CONTROL_PAYLOAD_SIZE)],
        })
    }

    /// Returns the segment file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the byte position of the next record.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Reads the next record.
    ///
    /// Returns `Ok(None)` when no complete record is available yet. This is
    /// not an error: the writer may still be appending.
    pub fn next(&mut self) -> Result<Option<SegmentRecord>, WalError> {
        let file = self.file.as_mut().ok_or(WalError::Closed)?;
        let position = self.position;

        let n = read_at(file, &mut self.scratch[..HEADER_SIZE], position)?;
        if n < HEADER_SIZE {
            return Ok(None);
        }

        let header = RecordHeader::decode(&self.scratch[..HEADER_SIZE]);
        if header.size == 0 {
            return Ok(None);
        }
        header.validate_size(self.max_record_size, position)?;

        let frame_len = HEADER_SIZE + header.payload_len();
        let n = read_at(
            file,
            &mut self.scratch[HEADER_SIZE..frame_len],
            position + HEADER_SIZE as u64,
        )?;
        if n < header.payload_len() {
            return Ok(None);
        }

        header.verify(&self.scratch[..frame_len], position)?;

        let payload = &self.scratch[HEADER_SIZE..frame_len];
        let control = if header.is_control() {
            Some(record::decode_control(payload, position)?)
        } else {
            None
        };

        self.position += frame_len as u64;

        Ok(Some(SegmentRecord {
            relative_offset: header.relative_offset,
            control,
            payload: Bytes::copy_from_slice(payload),
        }))
    }

    /// Closes the reader. Further reads fail with [`WalError::Closed`].
    pub fn close(&mut self) {
        self.file = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{LogState, SegmentLog};
    use tempfile::TempDir;

    fn write_log(dir: &TempDir, payloads: &[&[u8]]) -> (PathBuf, Vec<u32>) {
        let path = dir.path().join("00000000000000000000.log");
        let mut log = SegmentLog::open(&path, 64, Some(LogState::default())).unwrap();
        let positions = payloads
            .iter()
            .map(|p| log.append(p).unwrap().position)
            .collect();
        log.sync().unwrap();
        (path, positions)
    }

    #[test]
    fn test_read_all_records() {
        let dir = TempDir::new().unwrap();
        let (path, _) = write_log(&dir, &[b"a", b"bb", b"ccc"]);

        let mut reader = SegmentReader::open(&path, 0, 64).unwrap();
        for (i, expected) in [&b"a"[..], b"bb", b"ccc"].iter().enumerate() {
            let record = reader.next().unwrap().unwrap();
            assert_eq!(record.relative_offset, i as u32);
            assert_eq!(&record.payload[..], *expected);
            assert!(!record.is_control());
        }
        assert!(reader.next().unwrap().is_none());
        // Still at end on a second attempt.
        assert!(reader.next().unwrap().is_none());
    }

    #[test]
    fn test_read_from_appended_position() {
        let dir = TempDir::new().unwrap();
        let (path, positions) = write_log(&dir, &[b"zero", b"one", b"two"]);

        let mut reader = SegmentReader::open(&path, positions[2] as u64, 64).unwrap();
        let record = reader.next().unwrap().unwrap();
        assert_eq!(record.relative_offset, 2);
        assert_eq!(&record.payload[..], b"two");
    }

    #[test]
    fn test_read_control_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("00000000000000000000.log");
        {
            let mut log = SegmentLog::open(&path, 64, Some(LogState::default())).unwrap();
            log.append(b"data").unwrap();
            log.append_control_record(ControlType::Commit).unwrap();
            log.append_control_record(ControlType::EndOfSegment).unwrap();
        }

        let mut reader = SegmentReader::open(&path, 0, 64).unwrap();
        assert_eq!(reader.next().unwrap().unwrap().control, None);
        assert_eq!(
            reader.next().unwrap().unwrap().control,
            Some(ControlType::Commit)
        );
        let eos = reader.next().unwrap().unwrap();
        assert_eq!(eos.control, Some(ControlType::EndOfSegment));
        assert_eq!(eos.relative_offset, 2);
        assert_eq!(reader.position(), 16 + 16 + 16);
    }

    #[test]
    fn test_corrupt_payload_is_fatal() {
        let dir = TempDir::new().unwrap();
        let (path, positions) = write_log(&dir, &[b"fine", b"broken"]);

        let mut bytes = std::fs::read(&path).unwrap();
        bytes[positions[1] as usize + HEADER_SIZE] ^= 0x01;
        std::fs::write(&path, &bytes).unwrap();

        let mut reader = SegmentReader::open(&path, 0, 64).unwrap();
        assert!(reader.next().unwrap().is_some());
        let err = reader.next().unwrap_err();
        assert!(matches!(err, WalError::ChecksumMismatch { .. }));
        // The cursor did not advance past the bad record.
        assert_eq!(reader.position(), positions[1] as u64);
    }

    #[test]
    fn test_unknown_control_type_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.log");

        let mut frame = Vec::new();
        frame.extend_from_slice(&0u32.to_le_bytes());
        frame.extend_from_slice(&0u32.to_le_bytes());
        frame.extend_from_slice(&record::CONTROL_MARKER.to_le_bytes());
        frame.extend_from_slice(&7u32.to_le_bytes());
        let crc = crate::checksum::frame_checksum(&frame);
        frame[0..4].copy_from_slice(&crc.to_le_bytes());
        std::fs::write(&path, &frame).unwrap();

        let mut reader = SegmentReader::open(&path, 0, 64).unwrap();
        assert!(matches!(
            reader.next(),
            Err(WalError::UnknownControlType { value: 7, .. })
        ));
    }

    #[test]
    fn test_partial_record_is_end_of_data() {
        let dir = TempDir::new().unwrap();
        let (path, _) = write_log(&dir, &[b"complete"]);

        let mut bytes = std::fs::read(&path).unwrap();
        bytes.extend_from_slice(&[1, 2, 3, 4, 5]);
        std::fs::write(&path, &bytes).unwrap();

        let mut reader = SegmentReader::open(&path, 0, 64).unwrap();
        assert!(reader.next().unwrap().is_some());
        assert!(reader.next().unwrap().is_none());
    }

    #[test]
    fn test_closed_reader() {
        let dir = TempDir::new().unwrap();
        let (path, _) = write_log(&dir, &[b"x"]);

        let mut reader = SegmentReader::open(&path, 0, 64).unwrap();
        reader.close();
        assert!(matches!(reader.next(), Err(WalError::Closed)));
    }
}
