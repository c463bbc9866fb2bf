//! CRC32 checksums for on-disk frames.
//!
//! All seglog structures use the IEEE polynomial (reflected `0xEDB88320`).
//! A frame's checksum covers everything after its own 4-byte checksum field.

use crc32fast::Hasher;

/// Computes the CRC32 of `bytes[offset..offset + length]`.
///
/// Panics if the range is out of bounds, like slice indexing.
pub fn digest(bytes: &[u8], offset: usize, length: usize) -> u32 {
    hash(&bytes[offset..offset + length])
}

/// Computes the CRC32 of a whole slice.
pub fn hash(bytes: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

/// Computes the checksum of a frame whose first four bytes hold the checksum.
pub fn frame_checksum(frame: &[u8]) -> u32 {
    hash(&frame[4..])
}
