//! SocketCAN transport for Linux hosts.

use std::io;
use std::os::fd::AsRawFd;
use std::time::Duration;

use socketcan::{
    CanAddr, CanFrame as SocketFrame, CanInterface, CanSocket, EmbeddedFrame, ExtendedId,
    Frame as _, Id, Socket, SocketOptions, StandardId,
};

use crate::error::{CanError, CanResult};
use crate::transport::{FrameTransport, LinkState};
use crate::wire::WireFrame;

/// Raw CAN socket bound to one named interface.
pub struct SocketCanTransport {
    interface: String,
    socket: CanSocket,
}

impl SocketCanTransport {
    /// Resolve `interface` and bind a raw CAN socket to it.
    pub fn open(interface: &str) -> CanResult<Self> {
        let addr = CanAddr::from_iface(interface).map_err(|e| CanError::DeviceNotFound {
            device: interface.to_string(),
            reason: e.to_string(),
        })?;

        let socket = CanSocket::open_addr(&addr).map_err(|e| CanError::PermissionDenied {
            device: interface.to_string(),
            reason: e.to_string(),
        })?;

        // Error frames are how bus faults reach the receive path.
        if let Err(e) = socket.set_error_filter_accept_all() {
            tracing::warn!(device = %interface, error = %e, "error frames not enabled");
        }

        tracing::debug!(device = %interface, "SocketCAN socket bound");
        Ok(Self {
            interface: interface.to_string(),
            socket,
        })
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }
}

impl FrameTransport for SocketCanTransport {
    fn set_interface_state(&mut self, state: LinkState) -> CanResult<()> {
        let iface = CanInterface::open(&self.interface).map_err(|e| CanError::DeviceNotFound {
            device: self.interface.clone(),
            reason: format!("{e:?}"),
        })?;

        let result = match state {
            LinkState::Up => iface.bring_up(),
            LinkState::Down => iface.bring_down(),
        };
        result.map_err(|e| CanError::PermissionDenied {
            device: self.interface.clone(),
            reason: format!("{e:?}"),
        })
    }

    fn write(&mut self, frame: &WireFrame) -> io::Result<()> {
        let frame = to_socket_frame(frame)?;
        self.socket.write_frame(&frame)
    }

    fn read(&mut self) -> io::Result<WireFrame> {
        let frame = self.socket.read_frame()?;
        Ok(WireFrame::from_parts(
            frame.id_word(),
            u8::try_from(EmbeddedFrame::dlc(&frame)).unwrap_or(u8::MAX),
            EmbeddedFrame::data(&frame),
        ))
    }

    fn poll_readable(&mut self, timeout: Duration) -> io::Result<bool> {
        let mut fds = libc::pollfd {
            fd: self.socket.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let timeout_ms = libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX);

        loop {
            // SAFETY: `fds` is a valid pollfd for the duration of the call.
            let res = unsafe { libc::poll(&mut fds, 1, timeout_ms) };
            if res >= 0 {
                return Ok(res > 0);
            }

            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
    }
}

fn to_socket_frame(wire: &WireFrame) -> io::Result<SocketFrame> {
    let id: Option<Id> = if wire.is_extended() {
        ExtendedId::new(wire.raw_id()).map(Id::Extended)
    } else {
        StandardId::new(wire.raw_id() as u16).map(Id::Standard)
    };
    let id = id.ok_or_else(|| invalid_input("identifier out of range"))?;

    let frame = if wire.is_remote() {
        <SocketFrame as EmbeddedFrame>::new_remote(id, usize::from(wire.len))
    } else {
        <SocketFrame as EmbeddedFrame>::new(id, wire.payload())
    };
    frame.ok_or_else(|| invalid_input("frame rejected by SocketCAN"))
}

fn invalid_input(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, msg.to_string())
}
