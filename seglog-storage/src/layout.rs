//! Partition directory layout.
//!
//! ```text
//! <dir>/00000000000000000000.log     segment log, named by base offset
//! <dir>/00000000000000000000.index   offset index for the same segment
//! <dir>/snapshot                     producer state ring
//! <dir>/snapshot.lock                lock link
//! <dir>/snapshot.lock-signal         lock holder marker path
//! ```

use crate::error::StorageError;
use std::path::{Path, PathBuf};

/// Segment log file extension.
pub const LOG_EXTENSION: &str = "log";

/// Offset index file extension.
pub const INDEX_EXTENSION: &str = "index";

/// Producer snapshot file name.
pub const SNAPSHOT_FILE: &str = "snapshot";

/// Width of the zero-padded base offset in segment file names.
const PREFIX_WIDTH: usize = 20;

/// Segment file prefix: the base offset zero-padded to 20 digits.
pub fn segment_prefix(base_offset: u64) -> String {
    format!("{:020}", base_offset)
}

/// Path of the log file for the segment starting at `base_offset`.
pub fn log_path(dir: &Path, base_offset: u64) -> PathBuf {
    dir.join(format!("{}.{}", segment_prefix(base_offset), LOG_EXTENSION))
}

/// Path of the index file for the segment starting at `base_offset`.
pub fn index_path(dir: &Path, base_offset: u64) -> PathBuf {
    dir.join(format!("{}.{}", segment_prefix(base_offset), INDEX_EXTENSION))
}

/// Path of the producer snapshot file.
pub fn snapshot_path(dir: &Path) -> PathBuf {
    dir.join(SNAPSHOT_FILE)
}

/// Parses a base offset from a segment log file name.
pub fn parse_log_filename(name: &str) -> Option<u64> {
    let prefix = name.strip_suffix(".log")?;
    if prefix.len() != PREFIX_WIDTH || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    prefix.parse().ok()
}

/// Lists the base offsets of all segments in `dir`, sorted ascending.
pub fn list_segments(dir: &Path) -> Result<Vec<u64>, StorageError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StorageError::PartitionNotFound(dir.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    let mut segments = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        if let Some(base_offset) = parse_log_filename(&name.to_string_lossy()) {
            segments.push(base_offset);
        }
    }

    segments.sort_unstable();
    Ok(segments)
}

/// Picks the segment to start reading `offset` from: the greatest base
/// offset not above `offset`, or the first segment if all start above it.
pub fn segment_for_offset(segments: &[u64], offset: u64) -> Option<u64> {
    let i = segments.partition_point(|&base| base <= offset);
    segments.get(i.saturating_sub(1)).copied()
}
