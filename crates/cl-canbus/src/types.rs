//! Core CAN bus types: frames, bus state, statistics, and configuration.

use std::fmt;
use std::sync::OnceLock;
use std::time::Instant;

use serde::{Deserialize, Serialize};

// ── Limits ──────────────────────────────────────────────────────

/// Maximum payload length of a classic CAN frame.
pub const CAN_MAX_DLEN: usize = 8;

/// Highest 11-bit standard identifier.
pub const CAN_STANDARD_ID_MAX: u32 = 0x7FF;

/// Highest 29-bit extended identifier.
pub const CAN_EXTENDED_ID_MAX: u32 = 0x1FFF_FFFF;

/// Longest accepted device name, in bytes.
pub const DEVICE_NAME_MAX: usize = 63;

// ── CAN Frame ───────────────────────────────────────────────────

/// A logical CAN 2.0 frame (standard or extended identifier).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CanFrame {
    /// Arbitration ID (11-bit standard or 29-bit extended).
    pub id: u32,
    pub extended: bool,
    /// Remote transmission request; carries no payload.
    pub remote: bool,
    pub error: bool,
    /// Data length code (0–8).
    pub dlc: u8,
    pub data: [u8; CAN_MAX_DLEN],
    /// Capture time in microseconds on the process monotonic clock.
    pub timestamp_us: u64,
}

impl CanFrame {
    /// Build a data frame. `dlc` follows the slice length; slices longer than
    /// 8 bytes produce a frame that fails validation.
    pub fn new_data(id: u32, extended: bool, data: &[u8]) -> Self {
        let mut frame = Self {
            id,
            extended,
            dlc: u8::try_from(data.len()).unwrap_or(u8::MAX),
            timestamp_us: timestamp_us(),
            ..Self::default()
        };
        let n = data.len().min(CAN_MAX_DLEN);
        frame.data[..n].copy_from_slice(&data[..n]);
        frame
    }

    /// Build a remote request frame (dlc 0).
    pub fn new_remote(id: u32, extended: bool) -> Self {
        Self {
            id,
            extended,
            remote: true,
            timestamp_us: timestamp_us(),
            ..Self::default()
        }
    }

    /// The payload bytes actually carried by this frame.
    ///
    /// Remote and error frames carry none.
    pub fn payload(&self) -> &[u8] {
        if self.remote || self.error {
            return &[];
        }
        &self.data[..usize::from(self.dlc).min(CAN_MAX_DLEN)]
    }
}

impl fmt::Display for CanFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CAN Frame: ID=0x{:03X}{}, DLC={}, {}, {}",
            self.id,
            if self.extended { "X" } else { "" },
            self.dlc,
            if self.remote { "REMOTE" } else { "DATA" },
            if self.error { "ERROR" } else { "NORMAL" },
        )?;
        let payload = self.payload();
        if !payload.is_empty() {
            f.write_str("\nData:")?;
            for byte in payload {
                write!(f, " {byte:02X}")?;
            }
        }
        write!(f, "\nTimestamp: {} us", self.timestamp_us)
    }
}

/// Microseconds elapsed on a monotonic clock anchored at first use.
pub fn timestamp_us() -> u64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let elapsed = EPOCH.get_or_init(Instant::now).elapsed();
    u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX)
}

// ── Bus state ───────────────────────────────────────────────────

/// Controller state as tracked by the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusState {
    ErrorActive,
    ErrorPassive,
    BusOff,
    /// Administratively down.
    Stopped,
}

impl fmt::Display for BusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ErrorActive => "ERROR_ACTIVE",
            Self::ErrorPassive => "ERROR_PASSIVE",
            Self::BusOff => "BUS_OFF",
            Self::Stopped => "STOPPED",
        })
    }
}

// ── Statistics ──────────────────────────────────────────────────

/// Traffic and error counters accumulated by a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Statistics {
    pub tx_frames: u64,
    pub rx_frames: u64,
    pub error_frames: u64,
    pub bus_errors: u64,
    pub arbitration_lost: u64,
    pub overrun_errors: u64,
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CAN Bus Statistics:")?;
        writeln!(f, "  TX Frames: {}", self.tx_frames)?;
        writeln!(f, "  RX Frames: {}", self.rx_frames)?;
        writeln!(f, "  Error Frames: {}", self.error_frames)?;
        writeln!(f, "  Bus Errors: {}", self.bus_errors)?;
        writeln!(f, "  Arbitration Lost: {}", self.arbitration_lost)?;
        write!(f, "  Overrun Errors: {}", self.overrun_errors)
    }
}

/// Transmit/receive error counts.
///
/// Derived from `Statistics` (`bus_errors` / `error_frames`), not read from
/// controller registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ErrorCounters {
    pub tx_errors: u64,
    pub rx_errors: u64,
}

// ── Configuration ───────────────────────────────────────────────

/// Bus configuration, loadable from TOML or built in code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanConfig {
    /// Bitrate in bits per second.
    #[serde(default = "default_bitrate")]
    pub bitrate: u32,
    /// Sample point percentage (0–100).
    #[serde(default = "default_sample_point")]
    pub sample_point: u8,
    #[serde(default)]
    pub loopback: bool,
    #[serde(default)]
    pub listen_only: bool,
    #[serde(default = "default_auto_retransmit")]
    pub auto_retransmit: bool,
    #[serde(default = "default_max_retransmissions")]
    pub max_retransmissions: u32,
}

fn default_bitrate() -> u32 {
    500_000
}

fn default_sample_point() -> u8 {
    75
}

fn default_auto_retransmit() -> bool {
    true
}

fn default_max_retransmissions() -> u32 {
    3
}

impl Default for CanConfig {
    fn default() -> Self {
        Self {
            bitrate: default_bitrate(),
            sample_point: default_sample_point(),
            loopback: false,
            listen_only: false,
            auto_retransmit: default_auto_retransmit(),
            max_retransmissions: default_max_retransmissions(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_handle_defaults() {
        let config = CanConfig::default();
        assert_eq!(config.bitrate, 500_000);
        assert_eq!(config.sample_point, 75);
        assert!(!config.loopback);
        assert!(!config.listen_only);
        assert!(config.auto_retransmit);
        assert_eq!(config.max_retransmissions, 3);
    }

    #[test]
    fn config_missing_fields_use_defaults() {
        let config: CanConfig = serde_json::from_str(r#"{"bitrate": 250000}"#).unwrap();
        assert_eq!(config.bitrate, 250_000);
        assert_eq!(config.sample_point, 75);
        assert!(config.auto_retransmit);
    }

    #[test]
    fn new_data_copies_payload() {
        let frame = CanFrame::new_data(0x123, false, &[1, 2, 3]);
        assert_eq!(frame.dlc, 3);
        assert_eq!(frame.payload(), &[1, 2, 3]);
        assert!(!frame.remote);
    }

    #[test]
    fn new_data_oversized_keeps_length() {
        let frame = CanFrame::new_data(0x123, false, &[0; 12]);
        assert_eq!(frame.dlc, 12);
        assert_eq!(frame.payload().len(), 8);
    }

    #[test]
    fn remote_frame_has_no_payload() {
        let frame = CanFrame::new_remote(0x456, false);
        assert!(frame.remote);
        assert_eq!(frame.dlc, 0);
        assert!(frame.payload().is_empty());
    }

    #[test]
    fn timestamps_are_monotonic() {
        let a = timestamp_us();
        let b = timestamp_us();
        assert!(b >= a);
    }

    #[test]
    fn frame_display_field_order() {
        let frame = CanFrame {
            id: 0x18FF1234,
            extended: true,
            dlc: 2,
            data: [0xAB, 0x01, 0, 0, 0, 0, 0, 0],
            timestamp_us: 42,
            ..CanFrame::default()
        };
        assert_eq!(
            frame.to_string(),
            "CAN Frame: ID=0x18FF1234X, DLC=2, DATA, NORMAL\nData: AB 01\nTimestamp: 42 us"
        );
    }

    #[test]
    fn remote_frame_display_skips_data() {
        let frame = CanFrame {
            id: 0x45,
            remote: true,
            ..CanFrame::default()
        };
        assert_eq!(
            frame.to_string(),
            "CAN Frame: ID=0x045, DLC=0, REMOTE, NORMAL\nTimestamp: 0 us"
        );
    }

    #[test]
    fn statistics_display_field_order() {
        let stats = Statistics {
            tx_frames: 1,
            rx_frames: 2,
            error_frames: 3,
            bus_errors: 4,
            arbitration_lost: 5,
            overrun_errors: 6,
        };
        let text = stats.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "CAN Bus Statistics:");
        assert_eq!(lines[1], "  TX Frames: 1");
        assert_eq!(lines[2], "  RX Frames: 2");
        assert_eq!(lines[3], "  Error Frames: 3");
        assert_eq!(lines[4], "  Bus Errors: 4");
        assert_eq!(lines[5], "  Arbitration Lost: 5");
        assert_eq!(lines[6], "  Overrun Errors: 6");
    }

    #[test]
    fn bus_state_display() {
        assert_eq!(BusState::ErrorActive.to_string(), "ERROR_ACTIVE");
        assert_eq!(BusState::BusOff.to_string(), "BUS_OFF");
        assert_eq!(BusState::Stopped.to_string(), "STOPPED");
    }
}
