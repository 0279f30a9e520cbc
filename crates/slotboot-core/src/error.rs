//! Error types for slotboot-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Caller passed a bad argument (oversized page write, bad slot index)
    InvalidArgument,
    /// Byte exchange failed at the transport layer
    SpiTransferFailed,
    /// Busy-poll retry budget exhausted while waiting for the chip to idle
    Timeout,
    /// Chip contents did not match what a write or erase should have left behind
    CommandFailed,
    /// Loader interface table version is unknown to the caller
    VersionMismatch,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::SpiTransferFailed => write!(f, "SPI transfer failed"),
            Self::Timeout => write!(f, "flash busy-poll timed out"),
            Self::CommandFailed => write!(f, "flash command failed"),
            Self::VersionMismatch => write!(f, "loader interface version mismatch"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
