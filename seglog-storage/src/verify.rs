//! Read-only partition verification.
//!
//! Scans every segment of a partition and checks that:
//! - every record frame passes its checksum
//! - each sealed segment is followed by the segment its end-of-segment
//!   marker points at
//! - every index has an entry for each scanned record
//! - the snapshot points at an existing segment within its file length
//!
//! Nothing is repaired; recovery is the writer's job.

use crate::error::StorageError;
use crate::layout;
use crate::ring::RingSnapshot;
use crate::writer::{ProducerState, SNAPSHOT_CAPACITY, SNAPSHOT_PAYLOAD_SIZE};
use seglog_wal::{ControlType, OffsetIndex, SegmentReader};
use serde::Serialize;
use std::path::Path;

/// Scan result for one segment.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SegmentReport {
    pub base_offset: u64,
    /// Data records.
    pub records: u64,
    /// Control records, including commits and the end-of-segment marker.
    pub control_records: u64,
    pub commits: u64,
    /// Whether an end-of-segment marker was found.
    pub sealed: bool,
    /// Base offset of the following segment, for sealed segments.
    pub next_base: Option<u64>,
    /// Bytes covered by valid records.
    pub scanned_bytes: u64,
    pub file_bytes: u64,
    pub index_entries: u64,
    /// First error hit while scanning.
    pub error: Option<String>,
}

impl SegmentReport {
    fn total_records(&self) -> u64 {
        self.records + self.control_records
    }
}

/// Verification result for a partition.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VerifyReport {
    pub segments: Vec<SegmentReport>,
    /// Snapshot window, oldest first.
    pub snapshot: Vec<ProducerState>,
    pub problems: Vec<String>,
}

impl VerifyReport {
    pub fn is_healthy(&self) -> bool {
        self.problems.is_empty()
    }

    /// Data records across all segments.
    pub fn total_records(&self) -> u64 {
        self.segments.iter().map(|s| s.records).sum()
    }
}

/// Verifies a partition directory.
pub fn verify_partition(
    dir: impl AsRef<Path>,
    max_record_size: usize,
) -> Result<VerifyReport, StorageError> {
    let dir = dir.as_ref();
    let segments = layout::list_segments(dir)?;
    let mut report = VerifyReport::default();

    for (i, &base) in segments.iter().enumerate() {
        let segment = scan_segment(dir, base, max_record_size)?;

        if let Some(error) = &segment.error {
            report
                .problems
                .push(format!("segment {}: {}", base, error));
        }
        if segment.index_entries < segment.total_records() {
            report.problems.push(format!(
                "segment {}: index has {} entries for {} records",
                base,
                segment.index_entries,
                segment.total_records()
            ));
        }

        let following = segments.get(i + 1).copied();
        match (segment.next_base, following) {
            (Some(expected), Some(actual)) if expected != actual => {
                report.problems.push(format!(
                    "segment {} ends at offset {} but the next segment starts at {}",
                    base, expected, actual
                ));
            }
            (Some(expected), None) => {
                report.problems.push(format!(
                    "segment {} is sealed but segment {} does not exist (rotation not completed)",
                    base, expected
                ));
            }
            (None, Some(actual)) => {
                report.problems.push(format!(
                    "segment {} is not sealed but is followed by segment {}",
                    base, actual
                ));
            }
            _ => {}
        }

        report.segments.push(segment);
    }

    let snapshot_path = layout::snapshot_path(dir);
    if snapshot_path.exists() {
        let entries =
            RingSnapshot::read_entries(&snapshot_path, SNAPSHOT_PAYLOAD_SIZE, SNAPSHOT_CAPACITY)?;
        for entry in &entries {
            report.snapshot.push(ProducerState::decode(&entry.payload)?);
        }
    }

    match report.snapshot.last() {
        Some(state) => {
            let base = state.base_offset as u64;
            match report.segments.iter().find(|s| s.base_offset == base) {
                Some(segment) if (state.byte_length as u64) > segment.scanned_bytes => {
                    report.problems.push(format!(
                        "snapshot commits {} bytes of segment {} but only {} are valid",
                        state.byte_length, base, segment.scanned_bytes
                    ));
                }
                Some(_) => {}
                None => report.problems.push(format!(
                    "snapshot points at missing segment {}",
                    base
                )),
            }
        }
        None if !segments.is_empty() => {
            report
                .problems
                .push("partition has segments but no committed snapshot".to_string());
        }
        None => {}
    }

    tracing::debug!(
        "Verified {}: {} segments, {} problems",
        dir.display(),
        report.segments.len(),
        report.problems.len()
    );
    Ok(report)
}

fn scan_segment(
    dir: &Path,
    base_offset: u64,
    max_record_size: usize,
) -> Result<SegmentReport, StorageError> {
    let log_path = layout::log_path(dir, base_offset);
    let mut report = SegmentReport {
        base_offset,
        file_bytes: std::fs::metadata(&log_path)?.len(),
        ..Default::default()
    };

    let index_path = layout::index_path(dir, base_offset);
    if index_path.exists() {
        report.index_entries = OffsetIndex::open_read_only(&index_path)?.len();
    }

    let mut reader = SegmentReader::open(&log_path, 0, max_record_size)?;
    loop {
        match reader.next() {
            Ok(Some(record)) => match record.control {
                None => report.records += 1,
                Some(control) => {
                    report.control_records += 1;
                    match control {
                        ControlType::Commit => report.commits += 1,
                        ControlType::EndOfSegment => {
                            report.sealed = true;
                            report.next_base =
                                Some(base_offset + record.relative_offset as u64 + 1);
                            break;
                        }
                    }
                }
            },
            Ok(None) => break,
            Err(e) => {
                report.error = Some(e.to_string());
                break;
            }
        }
    }
    report.scanned_bytes = reader.position();

    Ok(report)
}
