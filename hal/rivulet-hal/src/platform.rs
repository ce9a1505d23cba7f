//! Platform calls made by the UART core
//!
//! Register programming (baud divisors, FIFO thresholds, pin muxing) is the
//! platform's business. The core only asks for the effect.

use crate::uart::{UartFormat, UartStatus};

/// Board-specific UART operations
///
/// Implementations are shared between main and interrupt context, so every
/// method takes `&self`. Port identifiers passed in are always below
/// [`UART_COUNT`](crate::UART_COUNT).
pub trait UartPlatform {
    /// Program the baud rate generator
    ///
    /// Returns the rate actually achieved, which may differ from the request.
    fn set_baudrate(&self, port: u8, baudrate: u32) -> u32;

    /// Apply the character frame format
    fn set_format(&self, port: u8, format: UartFormat);

    /// Enable the interrupt source for a port
    fn attach(&self, port: u8);

    /// Disable the interrupt source for a port
    fn detach(&self, port: u8);

    /// Give other contexts a chance to run
    ///
    /// Called from every cooperative wait loop in the core. Must not block
    /// indefinitely.
    fn yield_now(&self);

    /// Route TX to its alternate pin
    fn swap(&self, port: u8, tx_pin: Option<u8>) {
        let _ = (port, tx_pin);
    }

    /// Drive a break condition on TX
    fn set_break(&self, port: u8, state: bool) {
        let _ = (port, state);
    }

    /// Read and clear the line status
    fn status(&self, port: u8) -> UartStatus {
        let _ = port;
        UartStatus::empty()
    }
}

impl<T: UartPlatform + ?Sized> UartPlatform for &T {
    fn set_baudrate(&self, port: u8, baudrate: u32) -> u32 {
        (**self).set_baudrate(port, baudrate)
    }

    fn set_format(&self, port: u8, format: UartFormat) {
        (**self).set_format(port, format)
    }

    fn attach(&self, port: u8) {
        (**self).attach(port)
    }

    fn detach(&self, port: u8) {
        (**self).detach(port)
    }

    fn yield_now(&self) {
        (**self).yield_now()
    }

    fn swap(&self, port: u8, tx_pin: Option<u8>) {
        (**self).swap(port, tx_pin)
    }

    fn set_break(&self, port: u8, state: bool) {
        (**self).set_break(port, state)
    }

    fn status(&self, port: u8) -> UartStatus {
        (**self).status(port)
    }
}
