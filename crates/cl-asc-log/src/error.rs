//! Log writer error types.

use thiserror::Error;

/// Errors that can occur while writing CAN logs.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("invalid log settings: {0}")]
    Settings(String),
}

/// Convenience alias for log writer results.
pub type LogResult<T> = Result<T, LogError>;
