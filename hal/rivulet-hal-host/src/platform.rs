//! Simulated UART lines
//!
//! Each port has a line: hardware-depth RX and TX FIFOs, a record of
//! everything shifted out on TX, and the settings the core applied. Test
//! code acts as the far end through [`HostPlatform::inject_rx`] and
//! [`HostPlatform::take_tx`].

use core::cell::RefCell;

use critical_section::Mutex;
use heapless::Deque;
use rivulet_hal::{
    UartFormat, UartPlatform, UartStatus, UART_COUNT, UART_RX_FIFO_SIZE, UART_TX_FIFO_SIZE,
};

/// State of one simulated line
#[derive(Debug)]
pub(crate) struct Line {
    pub(crate) rx_fifo: Deque<u8, UART_RX_FIFO_SIZE>,
    pub(crate) tx_fifo: Deque<u8, UART_TX_FIFO_SIZE>,
    /// Bytes that have left the transmitter
    pub(crate) wire: Vec<u8>,
    baudrate: u32,
    format: UartFormat,
    attached: bool,
    break_state: bool,
    swapped: bool,
    overruns: u32,
    /// Sticky until the status is read
    overrun_flag: bool,
}

impl Line {
    const fn new() -> Self {
        Self {
            rx_fifo: Deque::new(),
            tx_fifo: Deque::new(),
            wire: Vec::new(),
            baudrate: 0,
            format: UartFormat::EIGHT_N_ONE,
            attached: false,
            break_state: false,
            swapped: false,
            overruns: 0,
            overrun_flag: false,
        }
    }
}

const IDLE_LINE: Line = Line::new();

/// Host implementation of the UART platform
pub struct HostPlatform {
    pub(crate) lines: Mutex<RefCell<[Line; UART_COUNT]>>,
}

impl Default for HostPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl HostPlatform {
    /// Create a platform with every line idle
    pub const fn new() -> Self {
        Self {
            lines: Mutex::new(RefCell::new([IDLE_LINE; UART_COUNT])),
        }
    }

    fn with_line<R>(&self, port: u8, f: impl FnOnce(&mut Line) -> R) -> Option<R> {
        let index = port as usize;
        if index >= UART_COUNT {
            return None;
        }
        critical_section::with(|cs| Some(f(&mut self.lines.borrow_ref_mut(cs)[index])))
    }

    /// Deliver bytes from the far end into the RX FIFO
    ///
    /// Bytes that do not fit are lost and counted as overruns, as a real
    /// FIFO would. Returns how many were accepted.
    pub fn inject_rx(&self, port: u8, data: &[u8]) -> usize {
        self.with_line(port, |line| {
            let mut accepted = 0;
            for &byte in data {
                if line.rx_fifo.push_back(byte).is_ok() {
                    accepted += 1;
                } else {
                    line.overruns = line.overruns.saturating_add(1);
                    line.overrun_flag = true;
                }
            }
            accepted
        })
        .unwrap_or(0)
    }

    /// Collect everything transmitted since the last call
    pub fn take_tx(&self, port: u8) -> Vec<u8> {
        self.with_line(port, |line| core::mem::take(&mut line.wire))
            .unwrap_or_default()
    }

    /// Bytes waiting in the RX FIFO
    pub fn rx_fifo_level(&self, port: u8) -> usize {
        self.with_line(port, |line| line.rx_fifo.len()).unwrap_or(0)
    }

    /// Total bytes lost to RX FIFO overflow
    pub fn overruns(&self, port: u8) -> u32 {
        self.with_line(port, |line| line.overruns).unwrap_or(0)
    }

    /// Whether the port's interrupt source is attached
    pub fn is_attached(&self, port: u8) -> bool {
        self.with_line(port, |line| line.attached).unwrap_or(false)
    }

    /// Baud rate last programmed
    pub fn baudrate(&self, port: u8) -> u32 {
        self.with_line(port, |line| line.baudrate).unwrap_or(0)
    }

    /// Frame format last programmed
    pub fn format(&self, port: u8) -> Option<UartFormat> {
        self.with_line(port, |line| line.format)
    }

    /// Whether TX is being held in break
    pub fn break_state(&self, port: u8) -> bool {
        self.with_line(port, |line| line.break_state).unwrap_or(false)
    }

    /// Whether TX has been moved to its alternate pin
    pub fn is_swapped(&self, port: u8) -> bool {
        self.with_line(port, |line| line.swapped).unwrap_or(false)
    }
}

impl UartPlatform for HostPlatform {
    fn set_baudrate(&self, port: u8, baudrate: u32) -> u32 {
        // No divisor on the host: every rate is exact
        self.with_line(port, |line| {
            line.baudrate = baudrate;
            baudrate
        })
        .unwrap_or(0)
    }

    fn set_format(&self, port: u8, format: UartFormat) {
        self.with_line(port, |line| line.format = format);
    }

    fn attach(&self, port: u8) {
        self.with_line(port, |line| line.attached = true);
    }

    fn detach(&self, port: u8) {
        self.with_line(port, |line| line.attached = false);
    }

    fn yield_now(&self) {
        std::thread::yield_now();
    }

    fn swap(&self, port: u8, _tx_pin: Option<u8>) {
        self.with_line(port, |line| line.swapped = !line.swapped);
    }

    fn set_break(&self, port: u8, state: bool) {
        self.with_line(port, |line| line.break_state = state);
    }

    fn status(&self, port: u8) -> UartStatus {
        self.with_line(port, |line| {
            let mut status = UartStatus::empty();
            if core::mem::take(&mut line.overrun_flag) {
                status |= UartStatus::RX_OVERRUN;
            }
            if line.break_state {
                status |= UartStatus::BREAK;
            }
            status
        })
        .unwrap_or(UartStatus::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inject_counts_overruns() {
        let platform = HostPlatform::new();
        let data = [0xA5u8; UART_RX_FIFO_SIZE + 3];
        assert_eq!(platform.inject_rx(0, &data), UART_RX_FIFO_SIZE);
        assert_eq!(platform.rx_fifo_level(0), UART_RX_FIFO_SIZE);
        assert_eq!(platform.overruns(0), 3);

        assert_eq!(platform.status(0), UartStatus::RX_OVERRUN);
        // Flag clears on read, the counter does not
        assert_eq!(platform.status(0), UartStatus::empty());
        assert_eq!(platform.overruns(0), 3);
    }

    #[test]
    fn test_out_of_range_port_is_ignored() {
        let platform = HostPlatform::new();
        let port = UART_COUNT as u8;
        assert_eq!(platform.inject_rx(port, b"abc"), 0);
        assert!(platform.take_tx(port).is_empty());
        assert_eq!(platform.set_baudrate(port, 9600), 0);
        assert_eq!(platform.format(port), None);
        platform.attach(port);
        assert!(!platform.is_attached(port));
    }

    #[test]
    fn test_settings_are_recorded() {
        let platform = HostPlatform::new();
        assert_eq!(platform.set_baudrate(1, 460_800), 460_800);
        assert_eq!(platform.baudrate(1), 460_800);

        platform.attach(1);
        assert!(platform.is_attached(1));
        platform.detach(1);
        assert!(!platform.is_attached(1));

        platform.set_break(2, true);
        assert_eq!(platform.status(2), UartStatus::BREAK);
        platform.swap(2, None);
        assert!(platform.is_swapped(2));
    }
}
