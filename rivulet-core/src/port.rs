//! Port instance state
//!
//! A [`Port`] owns the buffers and settings of one live UART. Main context
//! reaches it through a [`Serial`](crate::Serial) handle; interrupt-context
//! drivers get it from [`Uart::port`](crate::Uart::port) and use the
//! `isr_*` methods.

use portable_atomic::{AtomicU32, AtomicU8, AtomicUsize, Ordering};
use rivulet_hal::{UartConfig, UartMode, UartOptions, DEFAULT_RX_HEADROOM};

use crate::buffer::RingBuffer;
use crate::error::InitError;
use crate::notify::{DataCallback, DataCallbackSlot};

/// Pin value meaning "not assigned, use the platform default"
const PIN_UNSET: u8 = u8::MAX;

/// Lifecycle of a port instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PortState {
    /// Not yet constructed
    Uninitialized = 0,
    /// Buffers allocated, hardware being configured
    Initializing = 1,
    /// Live: reads and writes are accepted
    Active = 2,
    /// Teardown in progress; blocking loops abort
    Closing = 3,
    /// Torn down, terminal
    Destroyed = 4,
}

impl PortState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => PortState::Initializing,
            2 => PortState::Active,
            3 => PortState::Closing,
            4 => PortState::Destroyed,
            _ => PortState::Uninitialized,
        }
    }
}

/// A live UART port
pub struct Port {
    id: u8,
    mode: UartMode,
    options: UartOptions,
    state: AtomicU8,
    baudrate: AtomicU32,
    tx_pin: AtomicU8,
    rx_pin: AtomicU8,
    rx_headroom: AtomicUsize,
    rx_buffer: Option<RingBuffer>,
    tx_buffer: Option<RingBuffer>,
    data_callback: DataCallbackSlot,
    /// Blocking main-context operations currently looping on this port
    in_flight: AtomicUsize,
}

impl Port {
    /// Allocate a port instance from a configuration record
    ///
    /// Buffers are only allocated for enabled directions. If the TX buffer
    /// cannot be allocated the RX buffer is dropped with the error, so
    /// nothing leaks. The new port is in [`PortState::Initializing`].
    pub fn new(config: &UartConfig) -> Result<Self, InitError> {
        if config.port as usize >= rivulet_hal::UART_COUNT {
            return Err(InitError::InvalidPort);
        }

        let rx_buffer = if config.mode.rx_enabled() {
            Some(RingBuffer::new(config.rx_capacity())?)
        } else {
            None
        };

        let tx_buffer = if config.mode.tx_enabled() {
            Some(RingBuffer::new(config.tx_capacity())?)
        } else {
            None
        };

        Ok(Self {
            id: config.port,
            mode: config.mode,
            options: config.options,
            state: AtomicU8::new(PortState::Initializing as u8),
            baudrate: AtomicU32::new(0),
            tx_pin: AtomicU8::new(PIN_UNSET),
            rx_pin: AtomicU8::new(PIN_UNSET),
            rx_headroom: AtomicUsize::new(DEFAULT_RX_HEADROOM),
            rx_buffer,
            tx_buffer,
            data_callback: DataCallbackSlot::new(),
            in_flight: AtomicUsize::new(0),
        })
    }

    /// Port identifier
    pub fn id(&self) -> u8 {
        self.id
    }

    /// Direction mode
    pub fn mode(&self) -> UartMode {
        self.mode
    }

    /// Behaviour options
    pub fn options(&self) -> UartOptions {
        self.options
    }

    /// Current lifecycle state
    pub fn state(&self) -> PortState {
        PortState::from_raw(self.state.load(Ordering::Acquire))
    }

    /// Check if the port accepts data operations
    pub fn is_active(&self) -> bool {
        self.state() == PortState::Active
    }

    pub(crate) fn set_state(&self, state: PortState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Move from `from` to `to`, failing if the port is in any other state
    pub(crate) fn transition(&self, from: PortState, to: PortState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Receive buffer, present when RX is enabled
    pub fn rx_buffer(&self) -> Option<&RingBuffer> {
        self.rx_buffer.as_ref()
    }

    /// Transmit buffer, present when TX is enabled
    pub fn tx_buffer(&self) -> Option<&RingBuffer> {
        self.tx_buffer.as_ref()
    }

    /// Baud rate last reported by the platform
    pub fn baudrate(&self) -> u32 {
        self.baudrate.load(Ordering::Relaxed)
    }

    pub(crate) fn store_baudrate(&self, baudrate: u32) {
        self.baudrate.store(baudrate, Ordering::Relaxed);
    }

    /// Assigned TX pin, `None` when left to the platform default
    pub fn tx_pin(&self) -> Option<u8> {
        pin_from_raw(self.tx_pin.load(Ordering::Relaxed))
    }

    /// Assigned RX pin, `None` when left to the platform default
    pub fn rx_pin(&self) -> Option<u8> {
        pin_from_raw(self.rx_pin.load(Ordering::Relaxed))
    }

    pub(crate) fn store_tx_pin(&self, pin: u8) {
        self.tx_pin.store(pin, Ordering::Relaxed);
    }

    pub(crate) fn store_rx_pin(&self, pin: u8) {
        self.rx_pin.store(pin, Ordering::Relaxed);
    }

    /// Free RX space below which the driver should service the port early
    pub fn rx_headroom(&self) -> usize {
        self.rx_headroom.load(Ordering::Relaxed)
    }

    pub(crate) fn store_rx_headroom(&self, headroom: usize) {
        self.rx_headroom.store(headroom, Ordering::Relaxed);
    }

    pub(crate) fn set_data_callback(&self, callback: Option<DataCallback>, context: usize) {
        self.data_callback.set(callback, context);
    }

    /// Empty the selected buffers
    ///
    /// Caller holds the interrupt mask critical section.
    pub(crate) fn clear_buffers(&self, mode: UartMode) {
        if mode.rx_enabled() {
            if let Some(rx) = &self.rx_buffer {
                rx.clear();
            }
        }
        if mode.tx_enabled() {
            if let Some(tx) = &self.tx_buffer {
                tx.clear();
            }
        }
    }

    /// Register a blocking operation for the guard's lifetime
    pub(crate) fn begin_blocking(&self) -> InFlight<'_> {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        InFlight { port: self }
    }

    /// Number of blocking operations currently looping
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    // --- Interrupt-context API ---

    /// Store a byte taken from the hardware RX FIFO
    ///
    /// Returns `false` if RX is disabled or the buffer is full; the byte is
    /// then the driver's to keep or drop.
    pub fn isr_receive(&self, byte: u8) -> bool {
        match &self.rx_buffer {
            Some(rx) => rx.write(byte),
            None => false,
        }
    }

    /// Take the next byte destined for the hardware TX FIFO
    pub fn isr_transmit(&self) -> Option<u8> {
        self.tx_buffer.as_ref().and_then(RingBuffer::read)
    }

    /// Check if RX free space has dropped to the headroom margin
    pub fn rx_headroom_reached(&self) -> bool {
        match &self.rx_buffer {
            Some(rx) => rx.free_space() <= self.rx_headroom(),
            None => false,
        }
    }

    /// Invoke the registered data callback, if any
    ///
    /// Returns `true` if a callback ran.
    pub fn invoke_data_callback(&self) -> bool {
        match self.data_callback.get() {
            Some((callback, context)) => {
                callback(self, context);
                true
            }
            None => false,
        }
    }
}

impl core::fmt::Debug for Port {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Port")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("state", &self.state())
            .field("baudrate", &self.baudrate())
            .field("rx_buffer", &self.rx_buffer)
            .field("tx_buffer", &self.tx_buffer)
            .finish()
    }
}

fn pin_from_raw(raw: u8) -> Option<u8> {
    if raw == PIN_UNSET {
        None
    } else {
        Some(raw)
    }
}

/// In-flight marker for a blocking operation
pub(crate) struct InFlight<'a> {
    port: &'a Port,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.port.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivulet_hal::{UART_COUNT, UART_RX_FIFO_SIZE, UART_TX_FIFO_SIZE};

    #[test]
    fn test_full_duplex_allocates_both() {
        let port = Port::new(&UartConfig::new(0).with_buffers(32, 16)).unwrap();
        assert_eq!(port.state(), PortState::Initializing);
        assert_eq!(
            port.rx_buffer().unwrap().capacity(),
            32 + UART_RX_FIFO_SIZE
        );
        assert_eq!(
            port.tx_buffer().unwrap().capacity(),
            16 + UART_TX_FIFO_SIZE
        );
    }

    #[test]
    fn test_mode_limits_buffers() {
        let rx_only = Port::new(&UartConfig::new(0).with_mode(UartMode::RxOnly)).unwrap();
        assert!(rx_only.rx_buffer().is_some());
        assert!(rx_only.tx_buffer().is_none());
        assert_eq!(rx_only.isr_transmit(), None);

        let tx_only = Port::new(&UartConfig::new(0).with_mode(UartMode::TxOnly)).unwrap();
        assert!(tx_only.rx_buffer().is_none());
        assert!(tx_only.tx_buffer().is_some());
        assert!(!tx_only.isr_receive(0x55));
    }

    #[test]
    fn test_out_of_range_port() {
        let result = Port::new(&UartConfig::new(UART_COUNT as u8));
        assert_eq!(result.unwrap_err(), InitError::InvalidPort);
    }

    #[test]
    fn test_oversized_buffer_fails_cleanly() {
        let config = UartConfig::new(0).with_buffers(16, usize::MAX);
        assert_eq!(Port::new(&config).unwrap_err(), InitError::OutOfMemory);
    }

    #[test]
    fn test_state_transitions() {
        let port = Port::new(&UartConfig::new(1)).unwrap();
        assert!(!port.transition(PortState::Active, PortState::Closing));
        assert!(port.transition(PortState::Initializing, PortState::Active));
        assert!(port.is_active());
        assert!(port.transition(PortState::Active, PortState::Closing));
        assert!(!port.is_active());
    }

    #[test]
    fn test_pins_start_unset() {
        let port = Port::new(&UartConfig::new(0)).unwrap();
        assert_eq!(port.tx_pin(), None);
        assert_eq!(port.rx_pin(), None);
        port.store_tx_pin(1);
        assert_eq!(port.tx_pin(), Some(1));
        assert_eq!(port.rx_headroom(), DEFAULT_RX_HEADROOM);
    }

    #[test]
    fn test_isr_paths_move_bytes() {
        let port = Port::new(&UartConfig::new(0)).unwrap();
        assert!(port.isr_receive(b'x'));
        assert_eq!(port.rx_buffer().unwrap().read(), Some(b'x'));

        port.tx_buffer().unwrap().write(b'y');
        assert_eq!(port.isr_transmit(), Some(b'y'));
        assert_eq!(port.isr_transmit(), None);
    }

    #[test]
    fn test_headroom_reached() {
        let port = Port::new(&UartConfig::new(0).with_buffers(0, 0)).unwrap();
        port.store_rx_headroom(4);
        let rx = port.rx_buffer().unwrap();
        for _ in 0..rx.capacity() - 5 {
            rx.write(0);
        }
        assert!(!port.rx_headroom_reached());
        rx.write(0);
        assert!(port.rx_headroom_reached());
    }

    #[test]
    fn test_data_callback_receives_context() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static SEEN: AtomicUsize = AtomicUsize::new(0);

        fn record(_port: &Port, context: usize) {
            SEEN.store(context, Ordering::SeqCst);
        }

        let port = Port::new(&UartConfig::new(2)).unwrap();
        assert!(!port.invoke_data_callback());

        port.set_data_callback(Some(record), 0xBEEF);
        assert!(port.invoke_data_callback());
        assert_eq!(SEEN.load(Ordering::SeqCst), 0xBEEF);

        port.set_data_callback(None, 0);
        assert!(!port.invoke_data_callback());
    }

    #[test]
    fn test_in_flight_guard() {
        let port = Port::new(&UartConfig::new(0)).unwrap();
        {
            let _a = port.begin_blocking();
            let _b = port.begin_blocking();
            assert_eq!(port.in_flight(), 2);
        }
        assert_eq!(port.in_flight(), 0);
    }
}
