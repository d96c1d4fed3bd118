//! In-process virtual CAN bus.
//!
//! Named interfaces carry frames between endpoints inside one process. A
//! frame written by one endpoint is delivered to every other endpoint bound
//! to the same interface. All tests use this instead of real CAN hardware
//! so the suite runs in CI on any platform.

use std::collections::HashMap;
use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::{CanError, CanResult};
use crate::transport::{FrameTransport, LinkState};
use crate::wire::WireFrame;

#[derive(Default)]
struct Interface {
    link_up: bool,
    /// Binding and link changes are refused.
    restricted: bool,
    endpoints: Vec<(u64, Sender<WireFrame>)>,
}

#[derive(Default)]
struct Shared {
    interfaces: HashMap<String, Interface>,
    next_endpoint: u64,
}

/// A set of named virtual interfaces. Cloning shares the same bus.
#[derive(Clone, Default)]
pub struct VirtualBus {
    shared: Arc<Mutex<Shared>>,
}

impl VirtualBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bus with the given interfaces, all link-up.
    pub fn with_interfaces(names: &[&str]) -> Self {
        let bus = Self::new();
        for name in names {
            bus.add_interface(name);
        }
        bus
    }

    /// Add an interface (link up). Existing interfaces are left untouched.
    pub fn add_interface(&self, name: &str) {
        self.lock()
            .interfaces
            .entry(name.to_string())
            .or_insert_with(|| Interface {
                link_up: true,
                ..Interface::default()
            });
    }

    /// Refuse binding and link changes on `name`.
    pub fn restrict(&self, name: &str) {
        if let Some(iface) = self.lock().interfaces.get_mut(name) {
            iface.restricted = true;
        }
    }

    /// Change the link state from outside any endpoint, as `ip link` would.
    pub fn set_link(&self, name: &str, up: bool) {
        if let Some(iface) = self.lock().interfaces.get_mut(name) {
            iface.link_up = up;
        }
    }

    pub fn is_link_up(&self, name: &str) -> Option<bool> {
        self.lock().interfaces.get(name).map(|iface| iface.link_up)
    }

    /// Number of endpoints currently bound to `name`.
    pub fn endpoint_count(&self, name: &str) -> usize {
        self.lock()
            .interfaces
            .get(name)
            .map_or(0, |iface| iface.endpoints.len())
    }

    /// Bind a new endpoint to `name`.
    pub fn open(&self, name: &str) -> CanResult<VirtualTransport> {
        let mut shared = self.lock();
        let endpoint = shared.next_endpoint;

        let iface = shared
            .interfaces
            .get_mut(name)
            .ok_or_else(|| CanError::DeviceNotFound {
                device: name.to_string(),
                reason: "no such virtual interface".into(),
            })?;
        if iface.restricted {
            return Err(CanError::PermissionDenied {
                device: name.to_string(),
                reason: "bind refused".into(),
            });
        }

        let (tx, rx) = mpsc::channel();
        iface.endpoints.push((endpoint, tx));
        shared.next_endpoint += 1;

        Ok(VirtualTransport {
            bus: self.clone(),
            interface: name.to_string(),
            endpoint,
            rx,
            pending: None,
        })
    }

    /// Deliver a frame to every endpoint on `name` as if another node sent it.
    /// Returns the number of endpoints reached.
    pub fn inject(&self, name: &str, frame: WireFrame) -> usize {
        let mut shared = self.lock();
        match shared.interfaces.get_mut(name) {
            Some(iface) => deliver(iface, None, frame),
            None => 0,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn deliver(iface: &mut Interface, from: Option<u64>, frame: WireFrame) -> usize {
    // Endpoints whose receiver is gone are pruned on the way.
    iface
        .endpoints
        .retain(|(id, tx)| Some(*id) == from || tx.send(frame).is_ok());
    iface
        .endpoints
        .iter()
        .filter(|(id, _)| Some(*id) != from)
        .count()
}

/// One endpoint bound to a virtual interface.
pub struct VirtualTransport {
    bus: VirtualBus,
    interface: String,
    endpoint: u64,
    rx: Receiver<WireFrame>,
    /// Frame pulled in by `poll_readable`, handed out by the next `read`.
    pending: Option<WireFrame>,
}

impl VirtualTransport {
    pub fn interface(&self) -> &str {
        &self.interface
    }
}

impl FrameTransport for VirtualTransport {
    fn set_interface_state(&mut self, state: LinkState) -> CanResult<()> {
        let mut shared = self.bus.lock();
        let iface = shared
            .interfaces
            .get_mut(&self.interface)
            .ok_or_else(|| CanError::DeviceNotFound {
                device: self.interface.clone(),
                reason: "virtual interface removed".into(),
            })?;
        if iface.restricted {
            return Err(CanError::PermissionDenied {
                device: self.interface.clone(),
                reason: "link change refused".into(),
            });
        }
        iface.link_up = state == LinkState::Up;
        Ok(())
    }

    fn write(&mut self, frame: &WireFrame) -> io::Result<()> {
        let mut shared = self.bus.lock();
        let iface = shared
            .interfaces
            .get_mut(&self.interface)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "interface removed"))?;
        if !iface.link_up {
            return Err(io::Error::new(io::ErrorKind::NetworkDown, "link is down"));
        }
        deliver(iface, Some(self.endpoint), *frame);
        Ok(())
    }

    fn read(&mut self) -> io::Result<WireFrame> {
        if let Some(frame) = self.pending.take() {
            return Ok(frame);
        }
        self.rx
            .recv()
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "endpoint detached"))
    }

    fn poll_readable(&mut self, timeout: Duration) -> io::Result<bool> {
        if self.pending.is_some() {
            return Ok(true);
        }
        match self.rx.recv_timeout(timeout) {
            Ok(frame) => {
                self.pending = Some(frame);
                Ok(true)
            }
            Err(RecvTimeoutError::Timeout) => Ok(false),
            Err(RecvTimeoutError::Disconnected) => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "endpoint detached",
            )),
        }
    }
}

impl Drop for VirtualTransport {
    fn drop(&mut self) {
        if let Some(iface) = self.bus.lock().interfaces.get_mut(&self.interface) {
            iface.endpoints.retain(|(id, _)| *id != self.endpoint);
        }
    }
}
