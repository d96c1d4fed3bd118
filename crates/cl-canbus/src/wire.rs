//! Wire representation of classic CAN frames.
//!
//! `WireFrame` mirrors the Linux `struct can_frame`: a 32-bit ID word whose
//! top three bits are the EFF/RTR/ERR flags, a length byte, and 8 data bytes.
//! Transports move `WireFrame`s; the handle converts to and from `CanFrame`.

use crate::error::BusErrorKind;
use crate::types::{CAN_MAX_DLEN, CanFrame};

// ── ID word layout ──────────────────────────────────────────────

/// Extended (29-bit) frame format marker.
pub const CAN_EFF_FLAG: u32 = 0x8000_0000;
/// Remote transmission request marker.
pub const CAN_RTR_FLAG: u32 = 0x4000_0000;
/// Error frame marker.
pub const CAN_ERR_FLAG: u32 = 0x2000_0000;

pub const CAN_SFF_MASK: u32 = 0x0000_07FF;
pub const CAN_EFF_MASK: u32 = 0x1FFF_FFFF;

// ── Error frame layout (linux/can/error.h) ──────────────────────

/// Error class bits carried in the ID word of an error frame.
pub mod err_class {
    pub const TX_TIMEOUT: u32 = 0x0001;
    pub const LOST_ARBITRATION: u32 = 0x0002;
    pub const CONTROLLER: u32 = 0x0004;
    pub const PROTOCOL: u32 = 0x0008;
    pub const TRANSCEIVER: u32 = 0x0010;
    pub const NO_ACK: u32 = 0x0020;
    pub const BUS_OFF: u32 = 0x0040;
    pub const BUS_ERROR: u32 = 0x0080;
    pub const RESTARTED: u32 = 0x0100;
}

// data[1]: controller problems
const CTRL_RX_OVERFLOW: u8 = 0x01;
const CTRL_TX_OVERFLOW: u8 = 0x02;

// data[2]: protocol violation type
const PROT_BIT: u8 = 0x01;
const PROT_FORM: u8 = 0x02;
const PROT_STUFF: u8 = 0x04;
const PROT_BIT0: u8 = 0x08;
const PROT_BIT1: u8 = 0x10;

// data[3]: protocol violation location
const PROT_LOC_CRC_SEQ: u8 = 0x08;
const PROT_LOC_CRC_DEL: u8 = 0x18;
const PROT_LOC_ACK: u8 = 0x19;
const PROT_LOC_ACK_DEL: u8 = 0x1B;

// ── Wire frame ──────────────────────────────────────────────────

/// A classic CAN frame as it crosses the transport boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WireFrame {
    /// ID word: identifier bits plus EFF/RTR/ERR flags.
    pub can_id: u32,
    /// Data length code as written on the wire.
    pub len: u8,
    pub data: [u8; CAN_MAX_DLEN],
}

impl WireFrame {
    /// Build from raw parts; at most 8 bytes of `data` are kept.
    pub fn from_parts(can_id: u32, len: u8, data: &[u8]) -> Self {
        let mut frame = Self {
            can_id,
            len,
            ..Self::default()
        };
        let n = data.len().min(CAN_MAX_DLEN);
        frame.data[..n].copy_from_slice(&data[..n]);
        frame
    }

    pub fn is_extended(&self) -> bool {
        self.can_id & CAN_EFF_FLAG != 0
    }

    pub fn is_remote(&self) -> bool {
        self.can_id & CAN_RTR_FLAG != 0
    }

    pub fn is_error(&self) -> bool {
        self.can_id & CAN_ERR_FLAG != 0
    }

    /// Identifier with flag bits masked off, at the width the EFF flag selects.
    pub fn raw_id(&self) -> u32 {
        if self.is_extended() {
            self.can_id & CAN_EFF_MASK
        } else {
            self.can_id & CAN_SFF_MASK
        }
    }

    /// Payload bytes bounded by the length byte.
    pub fn payload(&self) -> &[u8] {
        &self.data[..usize::from(self.len).min(CAN_MAX_DLEN)]
    }

    /// Error class bits of an error frame (0 for other frames).
    pub fn error_class(&self) -> u32 {
        if self.is_error() {
            self.can_id & CAN_EFF_MASK
        } else {
            0
        }
    }

    pub fn lost_arbitration(&self) -> bool {
        self.error_class() & err_class::LOST_ARBITRATION != 0
    }

    /// Controller reported an RX or TX buffer overflow.
    pub fn overrun(&self) -> bool {
        self.error_class() & err_class::CONTROLLER != 0
            && self.data[1] & (CTRL_RX_OVERFLOW | CTRL_TX_OVERFLOW) != 0
    }

    /// Decode the protocol violation reported by an error frame, if any.
    pub fn bus_error(&self) -> Option<BusErrorKind> {
        let class = self.error_class();
        if class & err_class::PROTOCOL != 0 {
            let kind = self.data[2];
            let location = self.data[3];
            match location {
                PROT_LOC_CRC_SEQ | PROT_LOC_CRC_DEL => return Some(BusErrorKind::Crc),
                PROT_LOC_ACK | PROT_LOC_ACK_DEL => return Some(BusErrorKind::Ack),
                _ => {}
            }
            if kind & (PROT_BIT | PROT_BIT0 | PROT_BIT1) != 0 {
                return Some(BusErrorKind::Bit);
            }
            if kind & PROT_STUFF != 0 {
                return Some(BusErrorKind::Stuff);
            }
            if kind & PROT_FORM != 0 {
                return Some(BusErrorKind::Form);
            }
        }
        if class & err_class::NO_ACK != 0 {
            return Some(BusErrorKind::Ack);
        }
        None
    }
}

// ── Codec ───────────────────────────────────────────────────────

/// Encode a validated logical frame into its wire form.
///
/// Standard identifiers are masked to 11 bits. Remote frames keep their dlc
/// but never carry payload bytes.
pub fn encode(frame: &CanFrame) -> WireFrame {
    let mut can_id = if frame.extended {
        frame.id | CAN_EFF_FLAG
    } else {
        frame.id & CAN_SFF_MASK
    };
    if frame.remote {
        can_id |= CAN_RTR_FLAG;
    }

    let mut wire = WireFrame {
        can_id,
        len: frame.dlc,
        ..WireFrame::default()
    };
    if !frame.remote {
        let n = usize::from(frame.dlc).min(CAN_MAX_DLEN);
        wire.data[..n].copy_from_slice(&frame.data[..n]);
    }
    wire
}

/// Decode a wire frame into a logical frame stamped with `timestamp_us`.
///
/// The length byte is clamped to 8. Payload is copied only for frames that
/// are neither remote nor error frames.
pub fn decode(wire: &WireFrame, timestamp_us: u64) -> CanFrame {
    let mut frame = CanFrame {
        id: wire.raw_id(),
        extended: wire.is_extended(),
        remote: wire.is_remote(),
        error: wire.is_error(),
        dlc: wire.len.min(CAN_MAX_DLEN as u8),
        timestamp_us,
        ..CanFrame::default()
    };
    if !frame.remote && !frame.error {
        let n = usize::from(frame.dlc);
        frame.data[..n].copy_from_slice(&wire.data[..n]);
    }
    frame
}
