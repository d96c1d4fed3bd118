//! Frame validation rules.
//!
//! Pure functions with no shared state; safe to call from any thread
//! without touching a handle.

use crate::error::{CanError, CanResult};
use crate::types::{CAN_EXTENDED_ID_MAX, CAN_MAX_DLEN, CAN_STANDARD_ID_MAX, CanFrame};

/// Check an identifier against the 11-bit or 29-bit range.
pub fn is_valid_id(id: u32, extended: bool) -> bool {
    if extended {
        id <= CAN_EXTENDED_ID_MAX
    } else {
        id <= CAN_STANDARD_ID_MAX
    }
}

/// Check that a frame is well formed before it touches a transport.
pub fn validate_frame(frame: &CanFrame) -> CanResult<()> {
    if !is_valid_id(frame.id, frame.extended) {
        return Err(CanError::InvalidParam(format!(
            "id 0x{:X} out of range for {} frame",
            frame.id,
            if frame.extended { "extended" } else { "standard" }
        )));
    }

    if usize::from(frame.dlc) > CAN_MAX_DLEN {
        return Err(CanError::InvalidParam(format!(
            "dlc {} exceeds {CAN_MAX_DLEN}",
            frame.dlc
        )));
    }

    if frame.remote && frame.dlc != 0 {
        return Err(CanError::InvalidParam(format!(
            "remote frame with dlc {}",
            frame.dlc
        )));
    }

    Ok(())
}
