//! Agent configuration, loadable from TOML and overridable from the CLI.

use std::path::Path;
use std::time::Duration;

use cl_asc_log::LogSettings;
use cl_canbus::CanConfig;
use serde::Deserialize;

use crate::cli::{Cli, Mode};

/// Top-level configuration for the agent.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// CAN interface name (e.g., "can0").
    #[serde(default = "default_device")]
    pub device: String,
    /// Controller settings applied by `configure`.
    #[serde(default)]
    pub can: CanConfig,
    /// Receive timeout in milliseconds.
    #[serde(default = "default_receive_timeout")]
    pub receive_timeout_ms: u64,
    /// Demo loop period in milliseconds.
    #[serde(default = "default_tick")]
    pub tick_ms: u64,
    /// Demo traffic is sent every this many ticks.
    #[serde(default = "default_send_every")]
    pub send_every_ticks: u64,
    /// Status report every this many ticks.
    #[serde(default = "default_status_every")]
    pub status_every_ticks: u64,
    /// Recorder output.
    #[serde(default)]
    pub log: LogConfig,
}

/// `[log]` table: writer settings plus the channel stamped on each record.
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(flatten)]
    pub settings: LogSettings,
    #[serde(default = "default_channel")]
    pub channel: u8,
}

/// Floor applied to `receive_timeout_ms`.
pub const MIN_RECEIVE_TIMEOUT_MS: u64 = 1;

fn default_device() -> String {
    "can0".to_string()
}

fn default_receive_timeout() -> u64 {
    100
}

fn default_tick() -> u64 {
    100
}

fn default_send_every() -> u64 {
    10
}

fn default_status_every() -> u64 {
    50
}

fn default_channel() -> u8 {
    1
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            settings: LogSettings::default(),
            channel: default_channel(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            can: CanConfig::default(),
            receive_timeout_ms: default_receive_timeout(),
            tick_ms: default_tick(),
            send_every_ticks: default_send_every(),
            status_every_ticks: default_status_every(),
            log: LogConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Load config from a TOML file path.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Apply command-line overrides on top of file values.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(device) = &cli.device {
            self.device.clone_from(device);
        }
        if let Some(bitrate) = cli.bitrate {
            self.can.bitrate = bitrate;
        }
        if let Some(timeout_ms) = cli.timeout_ms {
            self.receive_timeout_ms = timeout_ms;
        }
        if let Some(Mode::Record {
            out_dir: Some(dir),
        }) = &cli.mode
        {
            self.log.settings.directory.clone_from(dir);
        }
    }

    /// Receive timeout, never below 1 ms; `receive_frame` treats zero as an
    /// unbounded wait.
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms.max(MIN_RECEIVE_TIMEOUT_MS))
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}
