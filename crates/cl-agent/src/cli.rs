//! Command-line flags. Values given here override the config file.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "cl-agent", version, about = "CAN bus demo traffic and frame recorder")]
pub struct Cli {
    /// CAN interface name (e.g. can0).
    #[arg(short, long)]
    pub device: Option<String>,

    /// Nominal bitrate in bits per second.
    #[arg(short, long)]
    pub bitrate: Option<u32>,

    /// Receive timeout in milliseconds.
    #[arg(short, long = "timeout-ms")]
    pub timeout_ms: Option<u64>,

    /// TOML config file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub mode: Option<Mode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Mode {
    /// Send periodic test frames and report bus status.
    Demo,
    /// Record every received frame into rotating ASC log files.
    Record {
        /// Output directory for log files.
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
}

impl Cli {
    /// Selected mode; `demo` when no subcommand is given.
    pub fn mode(&self) -> Mode {
        self.mode.clone().unwrap_or(Mode::Demo)
    }
}
