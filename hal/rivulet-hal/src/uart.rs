//! UART configuration and serial abstractions
//!
//! Everything a caller hands to port initialization lives here, together
//! with the blocking serial traits that port handles implement.

use bitflags::bitflags;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of UART ports the core can track
pub const UART_COUNT: usize = 3;

/// Hardware receive FIFO depth in bytes
pub const UART_RX_FIFO_SIZE: usize = 128;

/// Hardware transmit FIFO depth in bytes
pub const UART_TX_FIFO_SIZE: usize = 128;

/// RX FIFO level above which the FIFO-full interrupt fires
pub const RX_FIFO_FULL_THRESHOLD: usize = 120;

/// Characters between the FIFO-full interrupt and a hardware overrun
pub const RX_FIFO_HEADROOM: usize = UART_RX_FIFO_SIZE - RX_FIFO_FULL_THRESHOLD;

/// Default receive headroom for buffered ports
///
/// Buffered data is usually consumed from a task callback, which needs more
/// slack than the FIFO interrupt itself.
pub const DEFAULT_RX_HEADROOM: usize = 32 - RX_FIFO_HEADROOM;

/// UART transmitter
///
/// Blocking trait for sending data over a UART interface.
pub trait UartTx {
    /// Error type for transmit operations
    type Error;

    /// Write data to the UART
    ///
    /// Blocks until all data has been written or an error occurs.
    fn write_blocking(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Flush any buffered data
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// UART receiver
///
/// Blocking trait for receiving data from a UART interface.
pub trait UartRx {
    /// Error type for receive operations
    type Error;

    /// Read data from the UART
    ///
    /// Blocks until the buffer is filled or an error occurs.
    fn read_blocking(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Read a single byte from the UART
    fn read_byte(&mut self) -> Result<u8, Self::Error> {
        let mut buf = [0u8; 1];
        self.read_blocking(&mut buf)?;
        Ok(buf[0])
    }
}

/// Full-duplex port: both blocking directions with one error type
pub trait UartDuplex: UartTx + UartRx<Error = <Self as UartTx>::Error> {}

impl<T> UartDuplex for T where T: UartTx + UartRx<Error = <T as UartTx>::Error> {}

/// Direction mode of a port
///
/// Also used to select which buffers a flush applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum UartMode {
    /// Receive and transmit
    #[default]
    Full,
    /// Receive only
    RxOnly,
    /// Transmit only
    TxOnly,
}

impl UartMode {
    /// Check if this mode includes the receive direction
    pub fn rx_enabled(self) -> bool {
        self != UartMode::TxOnly
    }

    /// Check if this mode includes the transmit direction
    pub fn tx_enabled(self) -> bool {
        self != UartMode::RxOnly
    }
}

bitflags! {
    /// Port behaviour options
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct UartOptions: u8 {
        /// `write` waits for buffer space instead of dropping what doesn't fit
        const TX_WAIT = 1 << 0;
    }
}

impl Default for UartOptions {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for UartOptions {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "UartOptions({=u8:#x})", self.bits())
    }
}

bitflags! {
    /// Line status reported by the platform
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct UartStatus: u8 {
        /// Received data was lost because the RX FIFO overflowed
        const RX_OVERRUN = 1 << 0;
        /// A break condition is being driven on TX
        const BREAK = 1 << 1;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for UartStatus {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "UartStatus({=u8:#x})", self.bits())
    }
}

/// Number of data bits per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DataBits {
    Five,
    Six,
    Seven,
    #[default]
    Eight,
}

/// Parity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum StopBits {
    #[default]
    One,
    OneAndHalf,
    Two,
}

/// Character frame format
///
/// Passed through to the platform untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct UartFormat {
    /// Number of data bits (typically 8)
    pub data_bits: DataBits,
    /// Parity mode
    pub parity: Parity,
    /// Number of stop bits
    pub stop_bits: StopBits,
}

impl UartFormat {
    /// The ubiquitous 8N1 format
    pub const EIGHT_N_ONE: Self = Self {
        data_bits: DataBits::Eight,
        parity: Parity::None,
        stop_bits: StopBits::One,
    };
}

/// Port configuration record
///
/// `rx_size` and `tx_size` are the requested software buffer sizes; the
/// core adds the hardware FIFO depth on top when allocating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct UartConfig {
    /// Port identifier, must be below [`UART_COUNT`]
    pub port: u8,
    /// Direction mode
    pub mode: UartMode,
    /// Baud rate in bits per second
    pub baudrate: u32,
    /// Character frame format
    pub format: UartFormat,
    /// Requested receive buffer size in bytes
    pub rx_size: usize,
    /// Requested transmit buffer size in bytes
    pub tx_size: usize,
    /// Behaviour options
    pub options: UartOptions,
}

impl Default for UartConfig {
    fn default() -> Self {
        Self {
            port: 0,
            mode: UartMode::Full,
            baudrate: 115200,
            format: UartFormat::EIGHT_N_ONE,
            rx_size: 256,
            tx_size: 256,
            options: UartOptions::empty(),
        }
    }
}

impl UartConfig {
    /// Create a full-duplex configuration for a port with default settings
    pub fn new(port: u8) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    /// Set the baud rate
    pub fn with_baudrate(mut self, baudrate: u32) -> Self {
        self.baudrate = baudrate;
        self
    }

    /// Set the direction mode
    pub fn with_mode(mut self, mode: UartMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the requested buffer sizes
    pub fn with_buffers(mut self, rx_size: usize, tx_size: usize) -> Self {
        self.rx_size = rx_size;
        self.tx_size = tx_size;
        self
    }

    /// Set the behaviour options
    pub fn with_options(mut self, options: UartOptions) -> Self {
        self.options = options;
        self
    }

    /// Receive buffer capacity including the hardware FIFO allowance
    pub fn rx_capacity(&self) -> usize {
        self.rx_size.saturating_add(UART_RX_FIFO_SIZE)
    }

    /// Transmit buffer capacity including the hardware FIFO allowance
    pub fn tx_capacity(&self) -> usize {
        self.tx_size.saturating_add(UART_TX_FIFO_SIZE)
    }
}

/// Events reported to a port's notify callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NotifyCode {
    /// Port has been initialised and is live
    AfterOpen,
    /// Port is about to be torn down; buffers are still valid
    BeforeClose,
    /// A read is about to drain the RX buffer
    BeforeRead,
    /// A batch of bytes has been queued for transmission
    AfterWrite,
    /// Caller is about to wait for the TX buffer to empty
    WaitTx,
}
