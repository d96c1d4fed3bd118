//! CAN bus error types.
//!
//! `CanError` is what every handle operation returns. Each variant maps onto
//! one `ErrorKind`, which carries the stable numeric code and the canonical
//! description used by `error_string`.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::BusState;

/// Errors that can occur during CAN bus operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CanError {
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    #[error("device {device} not found: {reason}")]
    DeviceNotFound { device: String, reason: String },

    #[error("permission denied on {device}: {reason}")]
    PermissionDenied { device: String, reason: String },

    #[error("device busy: {0}")]
    DeviceBusy(String),

    #[error("no frame received within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Reserved; no current operation produces it.
    #[error("buffer full")]
    BufferFull,

    #[error("CAN bus handle is not initialized")]
    NotInitialized,

    #[error("operation not allowed in bus state {state}")]
    InvalidState { state: BusState },

    #[error("bus error: {0}")]
    Bus(BusErrorKind),
}

impl CanError {
    /// The taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidParam(_) => ErrorKind::InvalidParam,
            Self::DeviceNotFound { .. } => ErrorKind::DeviceNotFound,
            Self::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Self::DeviceBusy(_) => ErrorKind::DeviceBusy,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::BufferFull => ErrorKind::BufferFull,
            Self::NotInitialized => ErrorKind::NotInitialized,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::Bus(kind) => kind.error_kind(),
        }
    }

    /// Numeric code of this error's kind (always negative).
    pub fn code(&self) -> i32 {
        self.kind().code()
    }
}

/// Convenience alias for CAN bus results.
pub type CanResult<T> = Result<T, CanError>;

// ── Error kinds ─────────────────────────────────────────────────

/// Fixed set of error kinds with stable numeric codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidParam,
    DeviceNotFound,
    PermissionDenied,
    DeviceBusy,
    Timeout,
    BufferFull,
    NotInitialized,
    InvalidState,
    Bit,
    Stuff,
    Form,
    Ack,
    Crc,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 13] = [
        Self::InvalidParam,
        Self::DeviceNotFound,
        Self::PermissionDenied,
        Self::DeviceBusy,
        Self::Timeout,
        Self::BufferFull,
        Self::NotInitialized,
        Self::InvalidState,
        Self::Bit,
        Self::Stuff,
        Self::Form,
        Self::Ack,
        Self::Crc,
    ];

    pub fn code(self) -> i32 {
        match self {
            Self::InvalidParam => -1,
            Self::DeviceNotFound => -2,
            Self::PermissionDenied => -3,
            Self::DeviceBusy => -4,
            Self::Timeout => -5,
            Self::BufferFull => -6,
            Self::NotInitialized => -7,
            Self::InvalidState => -8,
            Self::Bit => -9,
            Self::Stuff => -10,
            Self::Form => -11,
            Self::Ack => -12,
            Self::Crc => -13,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    /// Canonical human-readable description.
    pub fn description(self) -> &'static str {
        match self {
            Self::InvalidParam => "Invalid parameter",
            Self::DeviceNotFound => "Device not found",
            Self::PermissionDenied => "Permission denied",
            Self::DeviceBusy => "Device busy",
            Self::Timeout => "Timeout",
            Self::BufferFull => "Buffer full",
            Self::NotInitialized => "Not initialized",
            Self::InvalidState => "Invalid state",
            Self::Bit => "Bit error",
            Self::Stuff => "Stuff error",
            Self::Form => "Form error",
            Self::Ack => "ACK error",
            Self::Crc => "CRC error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Describe a numeric result code.
///
/// Non-negative codes are successes and read "No error"; negative codes not
/// in the taxonomy read "Unknown error".
pub fn error_string(code: i32) -> &'static str {
    if code >= 0 {
        return "No error";
    }
    ErrorKind::from_code(code).map_or("Unknown error", ErrorKind::description)
}

// ── Bus-level frame errors ──────────────────────────────────────

/// Protocol violations reported by the controller in error frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusErrorKind {
    Bit,
    Stuff,
    Form,
    Ack,
    Crc,
}

impl BusErrorKind {
    pub fn error_kind(self) -> ErrorKind {
        match self {
            Self::Bit => ErrorKind::Bit,
            Self::Stuff => ErrorKind::Stuff,
            Self::Form => ErrorKind::Form,
            Self::Ack => ErrorKind::Ack,
            Self::Crc => ErrorKind::Crc,
        }
    }
}

impl fmt::Display for BusErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.error_kind().description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_negative_codes_are_no_error() {
        assert_eq!(error_string(0), "No error");
        assert_eq!(error_string(1), "No error");
        assert_eq!(error_string(i32::MAX), "No error");
    }

    #[test]
    fn known_codes_use_kind_description() {
        assert_eq!(error_string(-1), "Invalid parameter");
        assert_eq!(error_string(-5), "Timeout");
        assert_eq!(error_string(-7), "Not initialized");
        assert_eq!(error_string(-8), "Invalid state");
        assert_eq!(error_string(-13), "CRC error");
    }

    #[test]
    fn out_of_range_codes_are_unknown() {
        assert_eq!(error_string(-14), "Unknown error");
        assert_eq!(error_string(i32::MIN), "Unknown error");
    }

    #[test]
    fn codes_are_unique_and_round_trip() {
        for kind in ErrorKind::ALL {
            assert!(kind.code() < 0);
            assert_eq!(ErrorKind::from_code(kind.code()), Some(kind));
        }
    }

    #[test]
    fn error_maps_to_kind() {
        assert_eq!(CanError::NotInitialized.kind(), ErrorKind::NotInitialized);
        assert_eq!(CanError::Timeout { timeout_ms: 50 }.code(), -5);
        assert_eq!(
            CanError::InvalidState {
                state: BusState::Stopped
            }
            .kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(CanError::Bus(BusErrorKind::Ack).kind(), ErrorKind::Ack);
    }

    #[test]
    fn display_includes_context() {
        let err = CanError::DeviceNotFound {
            device: "can9".into(),
            reason: "no such device".into(),
        };
        assert_eq!(err.to_string(), "device can9 not found: no such device");
        assert_eq!(
            CanError::Timeout { timeout_ms: 50 }.to_string(),
            "no frame received within 50ms"
        );
    }
}
