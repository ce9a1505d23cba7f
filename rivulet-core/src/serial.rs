//! Port handle
//!
//! [`Serial`] pairs a port instance with the service that owns it. Every
//! data-path method returns a sentinel instead of an error: 0 bytes, no-op,
//! `false`. That covers a disabled direction, empty input, and a port that
//! has been torn down underneath the handle.

use embassy_futures::yield_now;
use portable_atomic_util::Arc;
use rivulet_hal::{NotifyCode, UartFormat, UartMode, UartOptions, UartPlatform, UartStatus};

use crate::buffer::RingBuffer;
use crate::error::SerialError;
use crate::notify::DataCallback;
use crate::port::Port;
use crate::uart::Uart;

/// Handle to a live UART port
pub struct Serial<'a, P> {
    uart: &'a Uart<P>,
    port: Arc<Port>,
}

impl<P> Clone for Serial<'_, P> {
    fn clone(&self) -> Self {
        Self {
            uart: self.uart,
            port: self.port.clone(),
        }
    }
}

impl<'a, P: UartPlatform> Serial<'a, P> {
    pub(crate) fn new(uart: &'a Uart<P>, port: Arc<Port>) -> Self {
        Self { uart, port }
    }

    /// Port identifier
    pub fn id(&self) -> u8 {
        self.port.id()
    }

    /// Underlying port instance
    pub fn port(&self) -> &Port {
        &self.port
    }

    /// Service this port belongs to
    pub fn uart(&self) -> &'a Uart<P> {
        self.uart
    }

    fn rx(&self) -> Option<&RingBuffer> {
        if self.port.is_active() {
            self.port.rx_buffer()
        } else {
            None
        }
    }

    fn tx(&self) -> Option<&RingBuffer> {
        if self.port.is_active() {
            self.port.tx_buffer()
        } else {
            None
        }
    }

    /// Check if reads are possible
    pub fn rx_enabled(&self) -> bool {
        self.rx().is_some()
    }

    /// Check if writes are possible
    pub fn tx_enabled(&self) -> bool {
        self.tx().is_some()
    }

    pub(crate) fn check_rx(&self) -> Result<(), SerialError> {
        if !self.port.is_active() {
            Err(SerialError::Closed)
        } else if self.port.rx_buffer().is_none() {
            Err(SerialError::Disabled)
        } else {
            Ok(())
        }
    }

    pub(crate) fn check_tx(&self) -> Result<(), SerialError> {
        if !self.port.is_active() {
            Err(SerialError::Closed)
        } else if self.port.tx_buffer().is_none() {
            Err(SerialError::Disabled)
        } else {
            Ok(())
        }
    }

    /// Read whatever is buffered, up to `buf.len()` bytes
    ///
    /// Never waits for data. Fires `BeforeRead` first, which gives a
    /// polling driver the chance to top up the RX buffer.
    pub fn read(&self, buf: &mut [u8]) -> usize {
        let Some(rx) = self.rx() else {
            return 0;
        };
        if buf.is_empty() {
            return 0;
        }

        self.uart.notify(&self.port, NotifyCode::BeforeRead);
        rx.read_into(buf)
    }

    /// Bytes waiting in the RX buffer
    pub fn rx_available(&self) -> usize {
        match self.rx() {
            Some(rx) => self.uart.critical(|| rx.available()),
            None => 0,
        }
    }

    /// Queue one batch and report it with `AfterWrite`
    pub(crate) fn push(&self, data: &[u8]) -> usize {
        let Some(tx) = self.tx() else {
            return 0;
        };
        let written = tx.write_from(data);
        self.uart.notify(&self.port, NotifyCode::AfterWrite);
        written
    }

    fn waits_on_full(&self) -> bool {
        self.port.options().contains(UartOptions::TX_WAIT)
    }

    /// Queue bytes for transmission
    ///
    /// Without [`UartOptions::TX_WAIT`] whatever does not fit is dropped and
    /// the count queued is returned. With it, the call yields through the
    /// platform until everything is queued. There is no timeout; the loop
    /// only ends early if the port is torn down.
    pub fn write(&self, data: &[u8]) -> usize {
        if !self.tx_enabled() || data.is_empty() {
            return 0;
        }

        let mut written = 0;
        loop {
            written += self.push(&data[written..]);
            if written == data.len() || !self.waits_on_full() {
                break;
            }
            if !self.park() {
                break;
            }
        }
        written
    }

    /// Yield once through the platform as an in-flight blocking operation
    ///
    /// Returns `false` without yielding once the port is no longer live.
    /// Notify callbacks always run outside the guard.
    fn park(&self) -> bool {
        let _in_flight = self.port.begin_blocking();
        if !self.port.is_active() {
            return false;
        }
        self.uart.platform().yield_now();
        true
    }

    /// Async twin of [`write`](Self::write)
    ///
    /// Suspends with `yield_now` instead of the platform yield, so it can
    /// share an executor with the task draining the port.
    pub async fn write_async(&self, data: &[u8]) -> usize {
        if !self.tx_enabled() || data.is_empty() {
            return 0;
        }

        let mut written = 0;
        loop {
            written += self.push(&data[written..]);
            if written == data.len() || !self.waits_on_full() || !self.port.is_active() {
                break;
            }
            yield_now().await;
        }
        written
    }

    /// Free space in the TX buffer
    pub fn tx_free(&self) -> usize {
        match self.tx() {
            Some(tx) => self.uart.critical(|| tx.free_space()),
            None => 0,
        }
    }

    /// Discard buffered data
    ///
    /// `mode` selects RX, TX or both; directions the port lacks are ignored.
    pub fn flush(&self, mode: UartMode) {
        if self.port.is_active() {
            self.uart.critical(|| self.port.clear_buffers(mode));
        }
    }

    /// Wait until the TX buffer has drained
    ///
    /// Fires `WaitTx`, then yields through the platform. No timeout.
    pub fn wait_tx_empty(&self) {
        let Some(tx) = self.tx() else {
            return;
        };

        self.uart.notify(&self.port, NotifyCode::WaitTx);
        while !tx.is_empty() && self.park() {}
    }

    /// Async twin of [`wait_tx_empty`](Self::wait_tx_empty)
    pub async fn wait_tx_empty_async(&self) {
        let Some(tx) = self.tx() else {
            return;
        };

        self.uart.notify(&self.port, NotifyCode::WaitTx);
        while !tx.is_empty() && self.port.is_active() {
            yield_now().await;
        }
    }

    /// Register the data callback and its context word
    ///
    /// `None` clears it. Interrupt context never observes a mixed pair.
    pub fn set_data_callback(&self, callback: Option<DataCallback>, context: usize) {
        self.port.set_data_callback(callback, context);
    }

    /// Change the baud rate
    ///
    /// Returns the rate the platform actually achieved, which is also what
    /// [`baudrate`](Self::baudrate) reports afterwards. 0 if the port is
    /// not live.
    pub fn set_baudrate(&self, baudrate: u32) -> u32 {
        if !self.port.is_active() {
            return 0;
        }
        let actual = self.uart.platform().set_baudrate(self.id(), baudrate);
        self.port.store_baudrate(actual);
        actual
    }

    /// Current baud rate, 0 if the port is not live
    pub fn baudrate(&self) -> u32 {
        if self.port.is_active() {
            self.port.baudrate()
        } else {
            0
        }
    }

    /// Change the character frame format
    pub fn set_format(&self, format: UartFormat) {
        if self.port.is_active() {
            self.uart.platform().set_format(self.id(), format);
        }
    }

    /// Assign the TX pin
    pub fn set_tx_pin(&self, pin: u8) -> bool {
        self.set_pins(Some(pin), None)
    }

    /// Assign TX and/or RX pins; `None` leaves a pin unchanged
    pub fn set_pins(&self, tx_pin: Option<u8>, rx_pin: Option<u8>) -> bool {
        if !self.port.is_active() {
            return false;
        }
        if let Some(pin) = tx_pin {
            self.port.store_tx_pin(pin);
        }
        if let Some(pin) = rx_pin {
            self.port.store_rx_pin(pin);
        }
        true
    }

    /// Move TX to its alternate pin
    pub fn swap(&self, tx_pin: Option<u8>) {
        if !self.port.is_active() {
            return;
        }
        self.uart.platform().swap(self.id(), tx_pin);
        if let Some(pin) = tx_pin {
            self.port.store_tx_pin(pin);
        }
    }

    /// Assigned TX pin
    pub fn tx_pin(&self) -> Option<u8> {
        self.port.tx_pin()
    }

    /// Assigned RX pin
    pub fn rx_pin(&self) -> Option<u8> {
        self.port.rx_pin()
    }

    /// Drive or release a break condition
    pub fn set_break(&self, state: bool) {
        if self.port.is_active() {
            self.uart.platform().set_break(self.id(), state);
        }
    }

    /// Read and clear the platform line status
    pub fn status(&self) -> UartStatus {
        if self.port.is_active() {
            self.uart.platform().status(self.id())
        } else {
            UartStatus::empty()
        }
    }

    /// Set the RX headroom margin
    pub fn set_rx_headroom(&self, headroom: usize) {
        if self.port.is_active() {
            self.port.store_rx_headroom(headroom);
        }
    }

    /// RX headroom margin
    pub fn rx_headroom(&self) -> usize {
        self.port.rx_headroom()
    }

    /// Tear the port down
    ///
    /// Fires `BeforeClose`, waits for blocking loops on other contexts to
    /// notice, stops the interrupt, clears debug routing if it pointed here
    /// and unregisters. Buffers go when the last handle does. No-op if the
    /// port was already closed.
    pub fn uninit(self) {
        self.uart.uninit(&self.port);
    }
}

impl<P> core::fmt::Debug for Serial<'_, P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("Serial").field(&*self.port).finish()
    }
}
