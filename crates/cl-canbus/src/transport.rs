//! Frame transport abstraction.
//!
//! `FrameTransport` is the seam between the handle and the network layer.
//! Two impls:
//! - `SocketCanTransport`: Linux-only, wraps `socketcan::CanSocket`
//! - `VirtualTransport`: all platforms, in-process bus (in `virtual_bus.rs`)
//!
//! Opening and binding happen in each transport's constructor; closing is
//! `Drop`. The handle owns exactly one transport for its lifetime.

use std::io;
use std::time::Duration;

use crate::error::CanResult;
use crate::types::CanConfig;
use crate::wire::WireFrame;

/// Administrative link state of a network interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Up,
    Down,
}

/// A bound, frame-oriented network endpoint.
pub trait FrameTransport: Send {
    /// Bring the bound interface up or down.
    ///
    /// Fails `DeviceNotFound` if the interface vanished and
    /// `PermissionDenied` if the change is refused.
    fn set_interface_state(&mut self, state: LinkState) -> CanResult<()>;

    /// Write one frame.
    fn write(&mut self, frame: &WireFrame) -> io::Result<()>;

    /// Read one frame, blocking until one arrives.
    fn read(&mut self) -> io::Result<WireFrame>;

    /// Wait up to `timeout` for a frame to become readable.
    fn poll_readable(&mut self, timeout: Duration) -> io::Result<bool>;

    /// Apply a nominal bitrate to the controller.
    ///
    /// The default only accepts the value; the handle has already stored it.
    fn apply_bitrate(&mut self, _bitrate: u32) -> CanResult<()> {
        Ok(())
    }

    /// Apply loopback / listen-only modes to the controller.
    fn apply_mode(&mut self, _config: &CanConfig) -> CanResult<()> {
        Ok(())
    }
}
