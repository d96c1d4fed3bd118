//! Demo mode: periodic test traffic plus status reports.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use cl_canbus::{CanBus, CanError, CanResult, FrameTransport};

use crate::config::AgentConfig;

/// Standard-ID frame carrying the traffic counter.
pub const COUNTER_ID: u32 = 0x123;
/// Extended-ID frame sent every 10th counter value.
pub const EXTENDED_ID: u32 = 0x18FF_1234;
/// Remote request sent every 20th counter value.
pub const REMOTE_ID: u32 = 0x456;

/// Loop timing for [`run`].
#[derive(Debug, Clone, Copy)]
pub struct DemoSettings {
    pub tick: Duration,
    pub receive_timeout: Duration,
    pub send_every_ticks: u64,
    pub status_every_ticks: u64,
}

impl From<&AgentConfig> for DemoSettings {
    fn from(config: &AgentConfig) -> Self {
        Self {
            tick: config.tick(),
            receive_timeout: config.receive_timeout(),
            send_every_ticks: config.send_every_ticks.max(1),
            status_every_ticks: config.status_every_ticks.max(1),
        }
    }
}

/// Totals reported when the loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DemoSummary {
    pub ticks: u64,
    /// Rounds attempted, successful or not.
    pub traffic_rounds: u32,
    /// Next counter value; advances only when the counter frame was sent.
    pub counter: u32,
    pub frames_received: u64,
}

/// Counter payload: big-endian counter followed by `AA BB CC DD`.
pub fn counter_payload(counter: u32) -> [u8; 8] {
    let mut data = [0xAA, 0xBB, 0xCC, 0xDD, 0xAA, 0xBB, 0xCC, 0xDD];
    data[..4].copy_from_slice(&counter.to_be_bytes());
    data
}

/// Send one round of demo traffic for `counter`.
///
/// The counter frame is mandatory; the extended and remote frames only log
/// on failure.
pub fn send_traffic<T: FrameTransport>(bus: &CanBus<T>, counter: u32) -> CanResult<()> {
    bus.send_data(COUNTER_ID, false, &counter_payload(counter))?;
    tracing::info!(id = COUNTER_ID, counter, "sent standard frame");

    if counter % 10 == 0 {
        match bus.send_data(EXTENDED_ID, true, &[0x11, 0x22, 0x33, 0x44]) {
            Ok(()) => tracing::info!(id = EXTENDED_ID, "sent extended frame"),
            Err(e) => tracing::warn!(id = EXTENDED_ID, error = %e, "extended frame failed"),
        }
    }

    if counter % 20 == 0 {
        match bus.send_remote(REMOTE_ID, false) {
            Ok(()) => tracing::info!(id = REMOTE_ID, "sent remote frame"),
            Err(e) => tracing::warn!(id = REMOTE_ID, error = %e, "remote frame failed"),
        }
    }
    Ok(())
}

/// Log bus state, statistics and error counters.
pub fn report_status<T: FrameTransport>(bus: &CanBus<T>) {
    let state = bus.state();
    match (bus.statistics(), bus.error_counters()) {
        (Ok(stats), Ok(counters)) => tracing::info!(
            device = %bus.device_name(),
            %state,
            tx_frames = stats.tx_frames,
            rx_frames = stats.rx_frames,
            error_frames = stats.error_frames,
            bus_errors = stats.bus_errors,
            arbitration_lost = stats.arbitration_lost,
            overrun_errors = stats.overrun_errors,
            tx_errors = counters.tx_errors,
            rx_errors = counters.rx_errors,
            "CAN bus status"
        ),
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(device = %bus.device_name(), %state, error = %e, "status unavailable");
        }
    }
}

/// Run the demo loop until `running` is cleared.
///
/// Blocking; call it from a blocking thread.
pub fn run<T: FrameTransport>(
    bus: &CanBus<T>,
    settings: &DemoSettings,
    running: &AtomicBool,
) -> DemoSummary {
    let mut summary = DemoSummary::default();

    while running.load(Ordering::Relaxed) {
        if summary.ticks % settings.send_every_ticks == 0 {
            match send_traffic(bus, summary.counter) {
                Ok(()) => summary.counter = summary.counter.wrapping_add(1),
                Err(e) => {
                    tracing::warn!(counter = summary.counter, error = %e, "demo traffic failed");
                }
            }
            summary.traffic_rounds += 1;
        }

        match bus.receive_frame(settings.receive_timeout) {
            Ok(frame) => {
                summary.frames_received += 1;
                tracing::info!(
                    id = frame.id,
                    extended = frame.extended,
                    remote = frame.remote,
                    error = frame.error,
                    dlc = frame.dlc,
                    data = ?frame.payload(),
                    "frame received"
                );
            }
            Err(CanError::Timeout { .. }) => {}
            Err(e) => tracing::warn!(error = %e, "receive failed"),
        }

        if summary.ticks % settings.status_every_ticks == 0 {
            report_status(bus);
        }

        summary.ticks += 1;
        std::thread::sleep(settings.tick);
    }

    tracing::info!(
        ticks = summary.ticks,
        rounds = summary.traffic_rounds,
        counter = summary.counter,
        received = summary.frames_received,
        "demo loop stopped"
    );
    summary
}
