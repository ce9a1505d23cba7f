//! Board configuration
//!
//! Describes which ports a host board brings up, one `[[port]]` table per
//! port. Every key except `port` falls back to the `UartConfig` default;
//! a missing `port` means port 0.
//!
//! ```toml
//! [[port]]
//! port = 0
//! baudrate = 921600
//! options = "TX_WAIT"
//!
//! [[port]]
//! port = 2
//! mode = "rx_only"
//! rx_size = 1024
//! format = { data_bits = "seven", parity = "even", stop_bits = "one" }
//! ```

use std::path::Path;

use rivulet_hal::{UartConfig, UART_COUNT};
use serde::Deserialize;

/// Configuration loading errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// File could not be read
    Io(std::io::ErrorKind),
    /// TOML syntax or type error
    Parse(String),
    /// Port identifier out of range
    InvalidPort(u8),
    /// Same port listed twice
    DuplicatePort(u8),
    /// More tables than the board has ports
    TooManyPorts,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Io(kind) => write!(f, "cannot read board file: {kind}"),
            Self::Parse(msg) => write!(f, "invalid board file: {msg}"),
            Self::InvalidPort(port) => write!(f, "port {port} does not exist"),
            Self::DuplicatePort(port) => write!(f, "port {port} configured twice"),
            Self::TooManyPorts => write!(f, "more than {UART_COUNT} ports configured"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e.kind())
    }
}

#[derive(Deserialize)]
struct BoardFile {
    #[serde(default, rename = "port")]
    ports: Vec<UartConfig>,
}

/// Parse a board description
pub fn parse_ports(source: &str) -> Result<heapless::Vec<UartConfig, UART_COUNT>, ConfigError> {
    let board: BoardFile =
        toml::from_str(source).map_err(|e| ConfigError::Parse(e.message().to_string()))?;

    let mut ports = heapless::Vec::new();
    for config in board.ports {
        if config.port as usize >= UART_COUNT {
            return Err(ConfigError::InvalidPort(config.port));
        }
        if ports.iter().any(|p: &UartConfig| p.port == config.port) {
            return Err(ConfigError::DuplicatePort(config.port));
        }
        ports.push(config).map_err(|_| ConfigError::TooManyPorts)?;
    }
    Ok(ports)
}

/// Read and parse a board description file
pub fn load_ports(
    path: impl AsRef<Path>,
) -> Result<heapless::Vec<UartConfig, UART_COUNT>, ConfigError> {
    let source = std::fs::read_to_string(path)?;
    parse_ports(&source)
}
