//! Error type shared by the waiters and the benchmark harness.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WaitError {
    /// A request or configuration value is out of range.
    /// Raised before any wait is attempted.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The clock (or the CPU-time clock) cannot be read.
    #[error("clock unavailable: {0}")]
    ClockUnavailable(String),

    /// A configuration file cannot be read or parsed.
    #[error("bad configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, WaitError>;

impl WaitError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        WaitError::InvalidArgument(msg.into())
    }
}
