//! Error types
//!
//! Only port initialization and the `embedded-io` adapters report errors.
//! Everything on the data path returns a sentinel (0, `false`, `None`)
//! instead.

use core::fmt;

/// Reasons a port could not be initialised
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitError {
    /// Port identifier is not below `UART_COUNT`
    InvalidPort,
    /// A live instance already owns this port
    AlreadyInitialised,
    /// A buffer of zero bytes was requested
    InvalidSize,
    /// Buffer allocation failed
    OutOfMemory,
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitError::InvalidPort => f.write_str("port identifier out of range"),
            InitError::AlreadyInitialised => f.write_str("port already initialised"),
            InitError::InvalidSize => f.write_str("zero-sized buffer requested"),
            InitError::OutOfMemory => f.write_str("buffer allocation failed"),
        }
    }
}

/// Error from the `embedded-io` and blocking trait adapters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SerialError {
    /// The requested direction is not enabled on this port
    Disabled,
    /// The port was closed before the operation completed
    Closed,
}

impl fmt::Display for SerialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerialError::Disabled => f.write_str("direction not enabled"),
            SerialError::Closed => f.write_str("port closed"),
        }
    }
}

impl embedded_io::Error for SerialError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            SerialError::Disabled => embedded_io::ErrorKind::Unsupported,
            SerialError::Closed => embedded_io::ErrorKind::NotConnected,
        }
    }
}
