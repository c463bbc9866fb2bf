//! Record framing.
//!
//! Each record in a segment log has the following on-disk format
//! (all integers little-endian):
//!
//! ```text
//! +----------+-----------------+----------+----------------+
//! | checksum | relative_offset | size     | payload        |
//! | 4 bytes  | 4 bytes         | 4 bytes  | size bytes     |
//! +----------+-----------------+----------+----------------+
//! ```
//!
//! A control record stores [`CONTROL_MARKER`] in `size` and carries a fixed
//! 4-byte payload holding the [`ControlType`]. The checksum covers
//! `relative_offset` through the end of the payload.

use crate::checksum;
use crate::error::WalError;
use bytes::{Buf, BufMut, BytesMut};

/// Record header size in bytes.
pub const HEADER_SIZE: usize = 12;

/// Reserved `size` value marking a control record.
pub const CONTROL_MARKER: u32 = 0xFFFF_FFFF;

/// Payload size of a control record.
pub const CONTROL_PAYLOAD_SIZE: usize = 4;

/// Total on-disk size of a control record.
pub const CONTROL_RECORD_SIZE: usize = HEADER_SIZE + CONTROL_PAYLOAD_SIZE;

/// Type of a control record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ControlType {
    /// Seals the segment; the next segment starts right after this offset.
    EndOfSegment = 1,
    /// Producer state was checkpointed up to this record.
    Commit = 2,
}

impl TryFrom<u32> for ControlType {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ControlType::EndOfSegment),
            2 => Ok(ControlType::Commit),
            other => Err(other),
        }
    }
}

/// A parsed record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub checksum: u32,
    pub relative_offset: u32,
    pub size: u32,
}

impl RecordHeader {
    /// Decodes a header from the first [`HEADER_SIZE`] bytes of `buf`.
    pub fn decode(mut buf: &[u8]) -> Self {
        let checksum = buf.get_u32_le();
        let relative_offset = buf.get_u32_le();
        let size = buf.get_u32_le();
        Self {
            checksum,
            relative_offset,
            size,
        }
    }

    /// Returns whether this header belongs to a control record.
    pub fn is_control(&self) -> bool {
        self.size == CONTROL_MARKER
    }

    /// Returns the number of payload bytes following the header.
    pub fn payload_len(&self) -> usize {
        if self.is_control() {
            CONTROL_PAYLOAD_SIZE
        } else {
            self.size as usize
        }
    }

    /// Validates the payload length against the log's maximum record size.
    pub fn validate_size(&self, max_record_size: usize, position: u64) -> Result<(), WalError> {
        if !self.is_control() && self.size as usize > max_record_size {
            return Err(WalError::CorruptedHeader {
                position,
                reason: format!(
                    "record size {} exceeds maximum {}",
                    self.size, max_record_size
                ),
            });
        }
        Ok(())
    }

    /// Verifies `frame` (header followed by payload) against the stored checksum.
    pub fn verify(&self, frame: &[u8], position: u64) -> Result<(), WalError> {
        let actual = checksum::frame_checksum(frame);
        if actual != self.checksum {
            return Err(WalError::ChecksumMismatch {
                position,
                expected: self.checksum,
                actual,
            });
        }
        Ok(())
    }
}

/// Encodes a data record into `buf`, replacing its contents.
pub fn encode_record(buf: &mut BytesMut, relative_offset: u32, payload: &[u8]) {
    encode_frame(buf, relative_offset, payload.len() as u32, payload);
}

/// Encodes a control record into `buf`, replacing its contents.
pub fn encode_control(buf: &mut BytesMut, relative_offset: u32, control: ControlType) {
    let payload = (control as u32).to_le_bytes();
    encode_frame(buf, relative_offset, CONTROL_MARKER, &payload);
}

fn encode_frame(buf: &mut BytesMut, relative_offset: u32, size: u32, payload: &[u8]) {
    buf.clear();
    buf.put_u32_le(0);
    buf.put_u32_le(relative_offset);
    buf.put_u32_le(size);
    buf.put_slice(payload);

    let crc = checksum::frame_checksum(&buf[..]);
    buf[0..4].copy_from_slice(&crc.to_le_bytes());
}

/// Decodes the control type from a control record payload.
pub fn decode_control(payload: &[u8], position: u64) -> Result<ControlType, WalError> {
    let mut payload = payload;
    let value = payload.get_u32_le();
    ControlType::try_from(value).map_err(|value| WalError::UnknownControlType { position, value })
}
