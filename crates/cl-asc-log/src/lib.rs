//! Rotating ASC-style log writer for CAN traffic.
//!
//! Each received or transmitted frame becomes one delimited text record.
//! Files are rotated by size: `<prefix>_000.asc`, `<prefix>_001.asc`, ...

pub mod error;
pub mod writer;

pub use error::{LogError, LogResult};
pub use writer::{AscLogWriter, Direction, LogSettings};
