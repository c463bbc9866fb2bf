//! seglog - partitioned segment log storage
//!
//! Operator CLI for partitions stored under one data directory.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use config::Config;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "seglog")]
#[command(about = "Append, read and verify partitioned segment logs")]
#[command(version)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, env = "SEGLOG_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory (overrides the configuration)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Append records to a partition and commit them
    Append {
        /// Partition directory, relative to the data directory
        partition: PathBuf,

        /// Records to append
        records: Vec<String>,

        /// Read records from stdin, one per line
        #[arg(long)]
        stdin: bool,
    },

    /// Seal the active segment and start a new one
    Split {
        /// Partition directory, relative to the data directory
        partition: PathBuf,
    },

    /// Read records from a partition
    Read {
        /// Partition directory, relative to the data directory
        partition: PathBuf,

        /// Absolute offset to start at
        #[arg(short, long, default_value_t = 0)]
        from: u64,

        /// Include commit and end-of-segment records
        #[arg(long)]
        control: bool,

        /// Keep polling for new records until Ctrl-C
        #[arg(short = 'F', long)]
        follow: bool,

        /// Stop after this many records
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Print one JSON object per record
        #[arg(long)]
        json: bool,
    },

    /// Check every segment and the snapshot of a partition
    Verify {
        /// Partition directory, relative to the data directory
        partition: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the producer snapshot window
    Snapshot {
        /// Partition directory, relative to the data directory
        partition: PathBuf,

        /// Print the entries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            std::process::exit(1);
        }
    };
    if let Some(path) = &cli.config {
        tracing::debug!("Loaded config from {}", path.display());
    }
    if let Some(dir) = cli.data_dir {
        config.storage.data_dir = dir;
    }

    match commands::execute(&config, cli.command).await {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            std::process::exit(1);
        }
    }
}
