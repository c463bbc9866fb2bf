//! Positioned read/write helpers over `std::fs::File`.

use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};

/// Reads up to `buf.len()` bytes starting at `position`.
///
/// Returns the number of bytes read; fewer than requested means EOF was hit.
pub(crate) fn read_at(file: &mut File, buf: &mut [u8], position: u64) -> std::io::Result<usize> {
    file.seek(SeekFrom::Start(position))?;
    let mut read = 0;
    while read < buf.len() {
        match file.read(&mut buf[read..]) {
            Ok(0) => break,
            Ok(n) => read += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(read)
}

/// Writes all of `buf` starting at `position`.
pub(crate) fn write_at(file: &mut File, buf: &[u8], position: u64) -> std::io::Result<()> {
    file.seek(SeekFrom::Start(position))?;
    file.write_all(buf)
}
