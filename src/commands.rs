//! Command execution.

use crate::config::Config;
use crate::Commands;
use colored::Colorize;
use seglog_storage::layout;
use seglog_storage::writer::{SNAPSHOT_CAPACITY, SNAPSHOT_PAYLOAD_SIZE};
use seglog_storage::{
    verify_partition, PartitionReader, PartitionRecord, PartitionWriter, ProducerState,
    RingSnapshot, VerifyReport,
};
use seglog_wal::ControlType;
use serde_json::{json, Value};
use std::io::BufRead;
use std::path::Path;

type CommandResult = Result<String, Box<dyn std::error::Error>>;

/// Executes a command and returns the formatted output.
pub async fn execute(config: &Config, cmd: Commands) -> CommandResult {
    match cmd {
        Commands::Append {
            partition,
            records,
            stdin,
        } => {
            let mut payloads = records;
            if stdin {
                for line in std::io::stdin().lock().lines() {
                    let line = line?;
                    if !line.is_empty() {
                        payloads.push(line);
                    }
                }
            }
            if payloads.is_empty() {
                return Err("no records to append".into());
            }
            append(config, &partition, &payloads)
        }

        Commands::Split { partition } => {
            let mut writer = open_writer(config, &partition)?;
            let old_base = writer.base_offset();
            let new_base = writer.split()?;
            writer.close()?;
            Ok(format!(
                "{} segment {} at offset {}, active segment is now {}",
                "Sealed".green(),
                old_base,
                new_base - 1,
                new_base.to_string().cyan()
            ))
        }

        Commands::Read {
            partition,
            from,
            control,
            follow,
            limit,
            json,
        } => {
            let dir = config.storage.partition_dir(&partition);
            let mut reader = PartitionReader::open(&dir, from, config.storage.max_record_size)?;
            let mut printed = 0usize;

            let shutdown = tokio::signal::ctrl_c();
            tokio::pin!(shutdown);

            'poll: loop {
                while let Some(record) = reader.next()? {
                    if record.is_control() && !control {
                        continue;
                    }
                    println!("{}", format_record(&record, json));
                    printed += 1;
                    if limit.is_some_and(|n| printed >= n) {
                        break 'poll;
                    }
                }
                if !follow {
                    break;
                }
                tokio::select! {
                    _ = &mut shutdown => break 'poll,
                    _ = tokio::time::sleep(config.reader.poll_interval()) => {}
                }
            }

            reader.close();
            tracing::debug!("Read {} records, next offset {}", printed, reader.next_offset());
            Ok(String::new())
        }

        Commands::Verify { partition, json } => {
            let dir = config.storage.partition_dir(&partition);
            let report = verify_partition(&dir, config.storage.max_record_size)?;
            if json {
                return Ok(format_json(&serde_json::to_value(&report)?));
            }
            let output = format_report(&dir, &report);
            if report.is_healthy() {
                Ok(output)
            } else {
                println!("{}", output);
                Err(format!("{} problem(s) found", report.problems.len()).into())
            }
        }

        Commands::Snapshot { partition, json } => {
            let dir = config.storage.partition_dir(&partition);
            let entries = RingSnapshot::read_entries(
                layout::snapshot_path(&dir),
                SNAPSHOT_PAYLOAD_SIZE,
                SNAPSHOT_CAPACITY,
            )?;

            let mut rows = Vec::with_capacity(entries.len());
            for entry in &entries {
                rows.push((entry.index, ProducerState::decode(&entry.payload)?));
            }

            if json {
                let value: Vec<Value> = rows
                    .iter()
                    .map(|(index, state)| {
                        json!({
                            "index": index,
                            "base_offset": state.base_offset,
                            "byte_length": state.byte_length,
                            "next_relative_offset": state.next_relative_offset,
                        })
                    })
                    .collect();
                return Ok(format_json(&Value::Array(value)));
            }

            if rows.is_empty() {
                return Ok("(no committed state)".dimmed().to_string());
            }
            let mut output = format!(
                "{:>8}  {:>12}  {:>12}  {:>12}",
                "INDEX", "BASE", "BYTES", "NEXT"
            )
            .bold()
            .to_string();
            for (index, state) in &rows {
                output.push_str(&format!(
                    "\n{:>8}  {:>12}  {:>12}  {:>12}",
                    index, state.base_offset, state.byte_length, state.next_relative_offset
                ));
            }
            Ok(output)
        }

        Commands::Config => Ok(config.to_yaml()?),
    }
}

fn open_writer(
    config: &Config,
    partition: &Path,
) -> Result<PartitionWriter, Box<dyn std::error::Error>> {
    let partition_config = config.storage.partition_config(partition);
    let dir = partition_config.dir.clone();
    match PartitionWriter::open(partition_config)? {
        Some(writer) => Ok(writer),
        None => Err(format!("partition {} is busy", dir.display()).into()),
    }
}

fn append(config: &Config, partition: &Path, payloads: &[String]) -> CommandResult {
    let mut writer = open_writer(config, partition)?;

    let mut first = None;
    let mut last = 0;
    for payload in payloads {
        let offset = writer.append(payload.as_bytes())?;
        first.get_or_insert(offset);
        last = offset;
    }
    writer.close()?;

    let stats = writer.stats();
    Ok(format!(
        "{} {} record(s) ({}) at offsets {}..={}",
        "Appended".green(),
        stats.appends,
        format_bytes(stats.bytes_appended),
        first.unwrap_or(last),
        last
    ))
}

fn control_name(control: ControlType) -> &'static str {
    match control {
        ControlType::EndOfSegment => "end_of_segment",
        ControlType::Commit => "commit",
    }
}

fn format_record(record: &PartitionRecord, json: bool) -> String {
    let payload = String::from_utf8_lossy(&record.payload);
    match (record.control, json) {
        (Some(control), true) => json!({
            "offset": record.offset,
            "control": control_name(control),
        })
        .to_string(),
        (None, true) => json!({
            "offset": record.offset,
            "size": record.size(),
            "payload": payload,
        })
        .to_string(),
        (Some(control), false) => format!(
            "{} {}",
            record.offset.to_string().cyan(),
            format!("<{}>", control_name(control)).yellow()
        ),
        (None, false) => format!("{} {}", record.offset.to_string().cyan(), payload),
    }
}

fn format_report(dir: &Path, report: &VerifyReport) -> String {
    let mut lines = vec![format!("Partition {}", dir.display()).bold().to_string()];

    for segment in &report.segments {
        let status = match (&segment.error, segment.next_base) {
            (Some(_), _) => "CORRUPT".red().to_string(),
            (None, Some(next)) => format!("sealed -> {}", next).dimmed().to_string(),
            (None, None) => "active".green().to_string(),
        };
        lines.push(format!(
            "  {}  {} records, {} commits, {} / {}, {} index entries  {}",
            layout::segment_prefix(segment.base_offset).cyan(),
            segment.records,
            segment.commits,
            format_bytes(segment.scanned_bytes),
            format_bytes(segment.file_bytes),
            segment.index_entries,
            status
        ));
    }

    if let Some(state) = report.snapshot.last() {
        lines.push(format!(
            "  snapshot: segment {} at byte {}, next relative offset {}",
            state.base_offset, state.byte_length, state.next_relative_offset
        ));
    }

    if report.is_healthy() {
        lines.push(format!(
            "{} ({} records)",
            "OK".green().bold(),
            report.total_records()
        ));
    } else {
        for problem in &report.problems {
            lines.push(format!("  {} {}", "!".red().bold(), problem));
        }
    }
    lines.join("\n")
}

/// Formats bytes as human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes >= 1024 * 1024 * 1024 {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    } else if bytes >= 1024 * 1024 {
        format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}

/// Formats JSON for display.
fn format_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
