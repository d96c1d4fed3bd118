//! Record mode: append every received frame to rotating ASC logs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use cl_asc_log::{AscLogWriter, Direction};
use cl_canbus::{CanBus, CanError, FrameTransport};

/// Receive frames and log them as `Rx` until `running` is cleared.
///
/// Timeouts are skipped. Any other receive error, or a log write failure,
/// ends the loop with that error. Returns the number of frames written.
pub fn run<T: FrameTransport>(
    bus: &CanBus<T>,
    writer: &mut AscLogWriter,
    channel: u8,
    timeout: Duration,
    running: &AtomicBool,
) -> anyhow::Result<u64> {
    let mut recorded = 0u64;

    while running.load(Ordering::Relaxed) {
        let frame = match bus.receive_frame(timeout) {
            Ok(frame) => frame,
            Err(CanError::Timeout { .. }) => continue,
            Err(e) => {
                tracing::error!(device = %bus.device_name(), error = %e, "receive failed, recording stopped");
                writer.flush()?;
                return Err(e.into());
            }
        };

        writer.log_can_frame(&frame, Direction::Rx, channel)?;
        recorded += 1;
        tracing::debug!(id = frame.id, dlc = frame.dlc, recorded, "frame recorded");
    }

    writer.flush()?;
    tracing::info!(
        recorded,
        path = %writer.current_path().display(),
        "recording stopped"
    );
    Ok(recorded)
}
