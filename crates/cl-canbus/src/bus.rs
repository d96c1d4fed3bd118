//! The CAN bus handle.
//!
//! `CanBus` owns one transport and guards every mutable field (transport,
//! configuration, bus state, statistics) behind a single mutex. Each
//! operation holds the lock for its full duration, so a blocking receive
//! serializes every other call on the same handle until it returns.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::{CanError, CanResult, ErrorKind};
use crate::transport::{FrameTransport, LinkState};
use crate::types::{
    BusState, CanConfig, CanFrame, DEVICE_NAME_MAX, ErrorCounters, Statistics, timestamp_us,
};
use crate::validate::validate_frame;
use crate::wire;

struct Inner<T> {
    /// `Some` while initialized; taking it releases the transport.
    transport: Option<T>,
    config: CanConfig,
    state: BusState,
    stats: Statistics,
    last_error: Option<ErrorKind>,
}

impl<T: FrameTransport> Inner<T> {
    fn transport(&mut self) -> CanResult<&mut T> {
        self.transport.as_mut().ok_or(CanError::NotInitialized)
    }

    fn ensure_initialized(&self) -> CanResult<()> {
        if self.transport.is_some() {
            Ok(())
        } else {
            Err(CanError::NotInitialized)
        }
    }
}

/// Thread-safe handle to one CAN network interface.
pub struct CanBus<T: FrameTransport> {
    device_name: String,
    inner: Mutex<Inner<T>>,
}

impl<T: FrameTransport> CanBus<T> {
    /// Initialize a handle on `device_name`, opening the transport with `open`.
    ///
    /// The handle starts in `ErrorActive` with the default configuration
    /// (500 kbit/s, 75 % sample point, auto-retransmit, 3 retries).
    pub fn init_with<F>(device_name: &str, open: F) -> CanResult<Self>
    where
        F: FnOnce(&str) -> CanResult<T>,
    {
        if device_name.is_empty() {
            return Err(CanError::InvalidParam("device name is empty".into()));
        }
        if device_name.len() > DEVICE_NAME_MAX {
            return Err(CanError::InvalidParam(format!(
                "device name longer than {DEVICE_NAME_MAX} bytes"
            )));
        }

        let transport = open(device_name).inspect_err(|e| {
            tracing::warn!(device = %device_name, error = %e, "CAN transport open failed");
        })?;

        tracing::info!(device = %device_name, "CAN bus initialized");
        Ok(Self {
            device_name: device_name.to_string(),
            inner: Mutex::new(Inner {
                transport: Some(transport),
                config: CanConfig::default(),
                state: BusState::ErrorActive,
                stats: Statistics::default(),
                last_error: None,
            }),
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().transport.is_some()
    }

    /// Release the transport and mark the handle uninitialized.
    ///
    /// A second call fails `NotInitialized`; deinit is not idempotent.
    pub fn deinit(&self) -> CanResult<()> {
        self.with_inner(|inner| {
            let transport = inner.transport.take().ok_or(CanError::NotInitialized)?;
            drop(transport);
            inner.state = BusState::Stopped;
            tracing::info!(device = %self.device_name, "CAN bus deinitialized");
            Ok(())
        })
    }

    /// Store `config` and hand it to the transport's bitrate and mode hooks.
    pub fn configure(&self, config: &CanConfig) -> CanResult<()> {
        self.with_inner(|inner| {
            inner.ensure_initialized()?;
            inner.config = *config;

            let transport = inner.transport()?;
            transport.apply_bitrate(config.bitrate)?;
            transport.apply_mode(config)?;

            tracing::info!(
                device = %self.device_name,
                bitrate = config.bitrate,
                sample_point = config.sample_point,
                loopback = config.loopback,
                listen_only = config.listen_only,
                "CAN bus configured"
            );
            Ok(())
        })
    }

    /// Bring the interface up and re-assert `ErrorActive`.
    pub fn start(&self) -> CanResult<()> {
        self.set_link(LinkState::Up, BusState::ErrorActive)
    }

    /// Bring the interface down and enter `Stopped`.
    pub fn stop(&self) -> CanResult<()> {
        self.set_link(LinkState::Down, BusState::Stopped)
    }

    fn set_link(&self, link: LinkState, state: BusState) -> CanResult<()> {
        self.with_inner(|inner| {
            inner.transport()?.set_interface_state(link)?;
            inner.state = state;
            tracing::info!(device = %self.device_name, ?link, %state, "CAN bus state changed");
            Ok(())
        })
    }

    /// Clear statistics and re-assert `ErrorActive` without touching the
    /// transport.
    pub fn reset(&self) -> CanResult<()> {
        self.with_inner(|inner| {
            inner.ensure_initialized()?;
            inner.stats = Statistics::default();
            inner.state = BusState::ErrorActive;
            tracing::debug!(device = %self.device_name, "CAN bus reset");
            Ok(())
        })
    }

    /// Current bus state; `Stopped` once the handle is uninitialized.
    pub fn state(&self) -> BusState {
        let inner = self.lock();
        if inner.transport.is_some() {
            inner.state
        } else {
            BusState::Stopped
        }
    }

    pub fn config(&self) -> CanResult<CanConfig> {
        self.with_inner(|inner| {
            inner.ensure_initialized()?;
            Ok(inner.config)
        })
    }

    // ── Frame I/O ───────────────────────────────────────────────

    /// Validate, encode and write one frame.
    ///
    /// Requires `ErrorActive`. A transport write failure counts as a bus
    /// error and is reported as `DeviceBusy`.
    pub fn send_frame(&self, frame: &CanFrame) -> CanResult<()> {
        self.with_inner(|inner| {
            inner.ensure_initialized()?;
            if inner.state != BusState::ErrorActive {
                return Err(CanError::InvalidState { state: inner.state });
            }
            validate_frame(frame)?;

            let wire_frame = wire::encode(frame);
            if let Err(e) = inner.transport()?.write(&wire_frame) {
                inner.stats.bus_errors += 1;
                tracing::warn!(device = %self.device_name, id = frame.id, error = %e, "CAN write failed");
                return Err(CanError::DeviceBusy(e.to_string()));
            }

            inner.stats.tx_frames += 1;
            tracing::debug!(
                device = %self.device_name,
                id = frame.id,
                extended = frame.extended,
                remote = frame.remote,
                dlc = frame.dlc,
                "CAN frame sent"
            );
            Ok(())
        })
    }

    /// Send a data frame whose dlc is the length of `data`.
    pub fn send_data(&self, id: u32, extended: bool, data: &[u8]) -> CanResult<()> {
        self.send_frame(&CanFrame::new_data(id, extended, data))
    }

    /// Send a remote request frame.
    pub fn send_remote(&self, id: u32, extended: bool) -> CanResult<()> {
        self.send_frame(&CanFrame::new_remote(id, extended))
    }

    /// Receive one frame.
    ///
    /// With a non-zero `timeout`, waits at most that long for the transport
    /// to become readable and fails `Timeout` otherwise. A zero timeout
    /// blocks until a frame arrives. The handle stays locked while waiting.
    pub fn receive_frame(&self, timeout: Duration) -> CanResult<CanFrame> {
        self.with_inner(|inner| {
            inner.ensure_initialized()?;
            if inner.state == BusState::Stopped {
                return Err(CanError::InvalidState { state: inner.state });
            }

            let transport = inner.transport()?;
            if !timeout.is_zero() {
                let ready = transport
                    .poll_readable(timeout)
                    .map_err(|e| CanError::DeviceBusy(e.to_string()))?;
                if !ready {
                    return Err(CanError::Timeout {
                        timeout_ms: timeout.as_millis() as u64,
                    });
                }
            }

            let wire_frame = transport.read().map_err(|e| {
                tracing::warn!(device = %self.device_name, error = %e, "CAN read failed");
                CanError::DeviceBusy(e.to_string())
            })?;
            let frame = wire::decode(&wire_frame, timestamp_us());

            if frame.error {
                inner.stats.error_frames += 1;
                if wire_frame.lost_arbitration() {
                    inner.stats.arbitration_lost += 1;
                }
                if wire_frame.overrun() {
                    inner.stats.overrun_errors += 1;
                }
                let bus_error = wire_frame.bus_error();
                if let Some(kind) = bus_error {
                    inner.last_error = Some(kind.error_kind());
                }
                tracing::debug!(
                    device = %self.device_name,
                    class = frame.id,
                    bus_error = ?bus_error,
                    "CAN error frame received"
                );
            } else {
                inner.stats.rx_frames += 1;
                tracing::debug!(
                    device = %self.device_name,
                    id = frame.id,
                    extended = frame.extended,
                    remote = frame.remote,
                    dlc = frame.dlc,
                    "CAN frame received"
                );
            }
            Ok(frame)
        })
    }

    // ── Statistics ──────────────────────────────────────────────

    pub fn statistics(&self) -> CanResult<Statistics> {
        self.with_inner(|inner| {
            inner.ensure_initialized()?;
            Ok(inner.stats)
        })
    }

    pub fn clear_statistics(&self) -> CanResult<()> {
        self.with_inner(|inner| {
            inner.ensure_initialized()?;
            inner.stats = Statistics::default();
            Ok(())
        })
    }

    /// Transmit errors are `bus_errors`, receive errors are `error_frames`.
    pub fn error_counters(&self) -> CanResult<ErrorCounters> {
        self.with_inner(|inner| {
            inner.ensure_initialized()?;
            Ok(ErrorCounters {
                tx_errors: inner.stats.bus_errors,
                rx_errors: inner.stats.error_frames,
            })
        })
    }

    /// Kind of the most recent failure on this handle, including bus errors
    /// decoded from received error frames.
    pub fn last_error(&self) -> CanResult<Option<ErrorKind>> {
        let inner = self.lock();
        inner.ensure_initialized()?;
        Ok(inner.last_error)
    }

    // ── Locking ─────────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` under the handle lock, recording the kind of any failure.
    fn with_inner<R>(&self, f: impl FnOnce(&mut Inner<T>) -> CanResult<R>) -> CanResult<R> {
        let mut inner = self.lock();
        let result = f(&mut inner);
        if let Err(e) = &result {
            inner.last_error = Some(e.kind());
        }
        result
    }
}

#[cfg(target_os = "linux")]
impl CanBus<crate::socketcan_transport::SocketCanTransport> {
    /// Initialize a handle on a SocketCAN interface such as `can0`.
    pub fn init(device_name: &str) -> CanResult<Self> {
        Self::init_with(device_name, crate::socketcan_transport::SocketCanTransport::open)
    }
}

impl<T: FrameTransport> Drop for CanBus<T> {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        if inner.transport.take().is_some() {
            tracing::debug!(device = %self.device_name, "CAN transport released on drop");
        }
    }
}
