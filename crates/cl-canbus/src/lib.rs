//! Thread-safe CAN bus handle.
//!
//! A `CanBus` owns one frame transport, enforces the bus lifecycle
//! (init → configure → start ⇄ stop → deinit), validates and encodes frames
//! per the standard/extended/remote rules, and accumulates statistics.
//! Transports: SocketCAN on Linux, and an in-process `VirtualBus` everywhere.

pub mod bus;
pub mod error;
pub mod timing;
pub mod transport;
pub mod types;
pub mod validate;
pub mod virtual_bus;
pub mod wire;

// SocketCAN transport only available on Linux
#[cfg(target_os = "linux")]
pub mod socketcan_transport;

// Re-export key types for convenience
pub use bus::CanBus;
pub use error::{BusErrorKind, CanError, CanResult, ErrorKind, error_string};
pub use timing::calculate_bitrate;
pub use transport::{FrameTransport, LinkState};
pub use types::{BusState, CanConfig, CanFrame, ErrorCounters, Statistics};
pub use validate::{is_valid_id, validate_frame};
pub use virtual_bus::{VirtualBus, VirtualTransport};
pub use wire::WireFrame;

#[cfg(target_os = "linux")]
pub use socketcan_transport::SocketCanTransport;
