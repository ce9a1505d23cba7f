//! UART service object
//!
//! [`Uart`] owns the process-wide state: the port registry, the interrupt
//! mask, the notify table and debug routing. Construct it once (usually as
//! a `static`) and share it by reference. Tests create fresh instances.

use heapless::Vec;
use portable_atomic::{AtomicU8, Ordering};
use portable_atomic_util::Arc;
use rivulet_hal::{NotifyCode, UartConfig, UartMode, UartPlatform, UART_COUNT};

use crate::error::InitError;
use crate::mask::{InterruptMask, IsrMask};
use crate::notify::{NotifyCallback, NotifyTable};
use crate::port::{Port, PortState};
use crate::registry::PortRegistry;
use crate::serial::Serial;

/// Debug routing value meaning "no debug port"
const NO_DEBUG: u8 = u8::MAX;

/// Buffered UART service
pub struct Uart<P> {
    platform: P,
    registry: PortRegistry,
    mask: InterruptMask,
    notify: NotifyTable,
    debug_port: AtomicU8,
}

impl<P: UartPlatform> Uart<P> {
    /// Create the service around a platform implementation
    pub const fn new(platform: P) -> Self {
        Self {
            platform,
            registry: PortRegistry::new(),
            mask: InterruptMask::new(),
            notify: NotifyTable::new(),
            debug_port: AtomicU8::new(NO_DEBUG),
        }
    }

    /// Platform this service drives
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Interrupt mask shared with interrupt-context handlers
    pub fn mask(&self) -> &InterruptMask {
        &self.mask
    }

    /// Port registry
    pub fn registry(&self) -> &PortRegistry {
        &self.registry
    }

    /// Initialise a port
    ///
    /// Fails without side effects if the identifier is out of range, the
    /// port is already live, or a buffer cannot be allocated. On success the
    /// port is registered, configured, flushed, its interrupt is started and
    /// `AfterOpen` has been delivered before this returns.
    pub fn init(&self, config: &UartConfig) -> Result<Serial<'_, P>, InitError> {
        if config.port as usize >= UART_COUNT {
            warn!("uart{}: init refused, no such port", config.port);
            return Err(InitError::InvalidPort);
        }
        if self.registry.is_registered(config.port) {
            warn!("uart{}: init refused, already initialised", config.port);
            return Err(InitError::AlreadyInitialised);
        }

        let port = Port::new(config).map_err(|e| {
            warn!("uart{}: buffer allocation failed", config.port);
            e
        })?;
        let port = Arc::new(port);

        // Atomic check-and-insert; loses cleanly against a concurrent init
        self.registry.register(port.clone())?;

        // Buffers are in place, now set up the hardware
        self.detach(config.port);
        let actual = self.platform.set_baudrate(config.port, config.baudrate);
        port.store_baudrate(actual);
        self.platform.set_format(config.port, config.format);
        self.mask.critical(|| port.clear_buffers(UartMode::Full));
        port.set_state(PortState::Active);
        self.start_isr(&port);

        info!(
            "uart{}: open at {} baud ({} rx / {} tx)",
            config.port,
            actual,
            port.rx_buffer().map_or(0, |b| b.capacity()),
            port.tx_buffer().map_or(0, |b| b.capacity())
        );

        self.notify.notify(&port, NotifyCode::AfterOpen);

        Ok(Serial::new(self, port))
    }

    /// Handle for a live port, or `None` if absent or out of range
    pub fn get(&self, port: u8) -> Option<Serial<'_, P>> {
        self.registry
            .get(port)
            .filter(|p| p.is_active())
            .map(|p| Serial::new(self, p))
    }

    /// Raw instance for interrupt-context drivers
    ///
    /// Returns the registered instance whatever its state; drivers should
    /// also consult [`mask`](Self::mask).
    pub fn port(&self, port: u8) -> Option<Arc<Port>> {
        self.registry.get(port)
    }

    /// Tear down a port by identifier
    ///
    /// No-op if the port is not live.
    pub fn uninit_port(&self, port: u8) {
        if let Some(port) = self.registry.get(port) {
            self.uninit(&port);
        }
    }

    /// Teardown shared by [`uninit_port`](Self::uninit_port) and
    /// [`Serial::uninit`]
    pub(crate) fn uninit(&self, port: &Arc<Port>) {
        if !port.transition(PortState::Active, PortState::Closing) {
            return;
        }

        self.notify.notify(port, NotifyCode::BeforeClose);

        // Blocking loops see Closing on their next pass and bail out
        while port.in_flight() > 0 {
            self.platform.yield_now();
        }

        self.stop_isr(port);

        if self.debug_port() == Some(port.id()) {
            self.set_debug(None);
        }

        self.registry.unregister(port.id());
        port.set_state(PortState::Destroyed);

        info!("uart{}: closed", port.id());
    }

    /// Register or clear the notify callback for a port
    ///
    /// May be called before the port is initialised. Returns `false` for an
    /// out-of-range port.
    pub fn set_notify(&self, port: u8, callback: Option<NotifyCallback>) -> bool {
        self.notify.set(port, callback)
    }

    pub(crate) fn notify(&self, port: &Port, code: NotifyCode) {
        self.notify.notify(port, code);
    }

    /// Disable every port interrupt, returning the previous state
    pub fn disable_interrupts(&self) -> IsrMask {
        self.mask.disable_all()
    }

    /// Restore interrupts captured by [`disable_interrupts`](Self::disable_interrupts)
    pub fn restore_interrupts(&self, mask: IsrMask) {
        self.mask.restore(mask);
    }

    /// Run `f` inside the interrupt mask critical section
    pub fn critical<R>(&self, f: impl FnOnce() -> R) -> R {
        self.mask.critical(f)
    }

    /// Start interrupt servicing for a port
    ///
    /// Serialised with [`critical`](Self::critical) on every context.
    pub fn start_isr(&self, port: &Port) {
        critical_section::with(|_| {
            if !self.mask.is_enabled(port.id()) {
                self.mask.mark_enabled(port.id());
                self.platform.attach(port.id());
                debug!("uart{}: interrupt attached", port.id());
            }
        })
    }

    /// Stop interrupt servicing for a port
    pub fn stop_isr(&self, port: &Port) {
        self.detach(port.id());
    }

    /// Detach a port's interrupt source without destroying the instance
    pub fn detach(&self, port: u8) {
        if port as usize >= UART_COUNT {
            return;
        }
        critical_section::with(|_| {
            self.mask.mark_disabled(port);
            self.platform.detach(port);
        })
    }

    /// Detach every port's interrupt source
    pub fn detach_all(&self) {
        for port in 0..UART_COUNT as u8 {
            self.detach(port);
        }
    }

    /// Route debug output to a port, or disable it with `None`
    pub fn set_debug(&self, port: Option<u8>) {
        let raw = match port {
            Some(port) if (port as usize) < UART_COUNT => port,
            _ => NO_DEBUG,
        };
        self.debug_port.store(raw, Ordering::Relaxed);
        debug!("debug output routed to {}", raw);
    }

    /// Port currently receiving debug output
    pub fn debug_port(&self) -> Option<u8> {
        match self.debug_port.load(Ordering::Relaxed) {
            NO_DEBUG => None,
            port => Some(port),
        }
    }

    /// Identifiers of every registered port
    pub fn active_ports(&self) -> Vec<u8, UART_COUNT> {
        self.registry.ids()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rivulet_hal::{UartFormat, UartStatus};
    use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering as StdOrdering};
    use std::sync::Mutex as StdMutex;

    /// Platform double that records calls
    #[derive(Default)]
    pub(crate) struct TestPlatform {
        pub attached: AtomicU32,
        pub yields: AtomicUsize,
        pub last_format: StdMutex<Option<UartFormat>>,
    }

    impl TestPlatform {
        /// Usable in a `static`
        pub(crate) const fn new() -> Self {
            Self {
                attached: AtomicU32::new(0),
                yields: AtomicUsize::new(0),
                last_format: StdMutex::new(None),
            }
        }
    }

    impl UartPlatform for TestPlatform {
        fn set_baudrate(&self, _port: u8, baudrate: u32) -> u32 {
            // Pretend the divisor rounds down to a multiple of 100
            baudrate - baudrate % 100
        }

        fn set_format(&self, _port: u8, format: UartFormat) {
            *self.last_format.lock().unwrap() = Some(format);
        }

        fn attach(&self, port: u8) {
            self.attached.fetch_or(1 << port, StdOrdering::SeqCst);
        }

        fn detach(&self, port: u8) {
            self.attached.fetch_and(!(1 << port), StdOrdering::SeqCst);
        }

        fn yield_now(&self) {
            self.yields.fetch_add(1, StdOrdering::SeqCst);
            std::thread::yield_now();
        }

        fn status(&self, _port: u8) -> UartStatus {
            UartStatus::BREAK
        }
    }

    fn uart() -> Uart<TestPlatform> {
        Uart::new(TestPlatform::default())
    }

    #[test]
    fn test_init_registers_and_starts() {
        let uart = uart();
        let serial = uart.init(&UartConfig::new(1).with_baudrate(115_250)).unwrap();

        assert_eq!(serial.id(), 1);
        assert_eq!(serial.port().state(), PortState::Active);
        assert!(uart.registry().is_registered(1));
        assert!(uart.mask().is_enabled(1));
        assert_eq!(uart.platform().attached.load(StdOrdering::SeqCst), 0b010);
        // Actual rate from the platform is what gets stored
        assert_eq!(serial.baudrate(), 115_200);
        assert_eq!(
            *uart.platform().last_format.lock().unwrap(),
            Some(UartFormat::EIGHT_N_ONE)
        );
    }

    #[test]
    fn test_init_out_of_range() {
        let uart = uart();
        let result = uart.init(&UartConfig::new(UART_COUNT as u8));
        assert_eq!(result.err(), Some(InitError::InvalidPort));
        assert!(uart.active_ports().is_empty());
    }

    #[test]
    fn test_double_init_fails_and_keeps_first() {
        let uart = uart();
        let first = uart.init(&UartConfig::new(0).with_baudrate(9600)).unwrap();
        first.port().tx_buffer().unwrap().write(b'a');

        let second = uart.init(&UartConfig::new(0).with_baudrate(57600));
        assert_eq!(second.err(), Some(InitError::AlreadyInitialised));

        assert!(first.port().is_active());
        assert_eq!(first.baudrate(), 9600);
        assert_eq!(first.port().tx_buffer().unwrap().available(), 1);
        assert!(uart.mask().is_enabled(0));
    }

    #[test]
    fn test_allocation_failure_leaves_no_instance() {
        let uart = uart();
        let config = UartConfig::new(2).with_buffers(64, usize::MAX);
        assert_eq!(uart.init(&config).err(), Some(InitError::OutOfMemory));
        assert!(!uart.registry().is_registered(2));
        assert!(!uart.mask().is_enabled(2));

        // The port is still free for a sane configuration
        assert!(uart.init(&UartConfig::new(2)).is_ok());
    }

    #[test]
    fn test_uninit_then_reinit() {
        let uart = uart();
        let serial = uart.init(&UartConfig::new(0)).unwrap();
        serial.port().isr_receive(b'z');
        serial.uninit();

        assert!(uart.get(0).is_none());
        assert!(!uart.mask().is_enabled(0));
        assert_eq!(uart.platform().attached.load(StdOrdering::SeqCst), 0);

        let serial = uart.init(&UartConfig::new(0)).unwrap();
        assert_eq!(serial.rx_available(), 0);
        assert_eq!(serial.port().rx_buffer().unwrap().available(), 0);
    }

    #[test]
    fn test_uninit_port_is_noop_when_absent() {
        let uart = uart();
        uart.uninit_port(0);
        uart.uninit_port(u8::MAX);
        assert!(uart.active_ports().is_empty());
    }

    #[test]
    fn test_stale_handle_is_inert() {
        let uart = uart();
        let serial = uart.init(&UartConfig::new(1)).unwrap();
        let stale = serial.clone();
        uart.uninit_port(1);

        assert_eq!(stale.port().state(), PortState::Destroyed);
        assert_eq!(stale.write(b"data"), 0);
        let mut buf = [0u8; 4];
        assert_eq!(stale.read(&mut buf), 0);
        assert_eq!(stale.tx_free(), 0);
        stale.uninit();
        serial.uninit();
    }

    #[test]
    fn test_uninit_clears_debug_routing() {
        let uart = uart();
        let serial = uart.init(&UartConfig::new(2)).unwrap();
        uart.set_debug(Some(2));
        assert_eq!(uart.debug_port(), Some(2));
        serial.uninit();
        assert_eq!(uart.debug_port(), None);
    }

    #[test]
    fn test_debug_routing_survives_other_port() {
        let uart = uart();
        let serial = uart.init(&UartConfig::new(0)).unwrap();
        uart.set_debug(Some(1));
        serial.uninit();
        assert_eq!(uart.debug_port(), Some(1));

        uart.set_debug(Some(UART_COUNT as u8));
        assert_eq!(uart.debug_port(), None);
    }

    #[test]
    fn test_detach_all() {
        let uart = uart();
        let _a = uart.init(&UartConfig::new(0)).unwrap();
        let _b = uart.init(&UartConfig::new(2)).unwrap();
        assert_eq!(uart.active_ports().as_slice(), &[0, 2]);

        uart.detach_all();
        assert_eq!(uart.mask().current(), IsrMask::NONE);
        assert_eq!(uart.platform().attached.load(StdOrdering::SeqCst), 0);
        // Instances survive a detach
        assert!(uart.get(0).is_some());
    }

    #[test]
    fn test_critical_section_masks_and_restores() {
        let uart = uart();
        let _serial = uart.init(&UartConfig::new(1)).unwrap();
        let inside = uart.critical(|| uart.mask().is_enabled(1));
        assert!(!inside);
        assert!(uart.mask().is_enabled(1));

        let saved = uart.disable_interrupts();
        assert!(saved.contains(1));
        assert!(!uart.mask().is_enabled(1));
        uart.restore_interrupts(saved);
        assert!(uart.mask().is_enabled(1));
    }

    #[test]
    fn test_enable_bit_survives_overlapping_critical_sections() {
        let uart = uart();
        let busy = uart.init(&UartConfig::new(0)).unwrap();
        let stop = AtomicBool::new(false);
        let mut lost = 0;

        std::thread::scope(|s| {
            s.spawn(|| {
                while !stop.load(StdOrdering::Acquire) {
                    busy.rx_available();
                }
            });

            for _ in 0..20_000 {
                let serial = uart.init(&UartConfig::new(1)).unwrap();
                // No other critical section can be zeroing the bits in here
                if !critical_section::with(|_| uart.mask().is_enabled(1)) {
                    lost += 1;
                }
                serial.uninit();
                if critical_section::with(|_| uart.mask().is_enabled(1)) {
                    lost += 1;
                }
            }
            stop.store(true, StdOrdering::Release);
        });

        assert_eq!(lost, 0);
        assert!(uart.mask().is_enabled(0));
    }

    mod ordering {
        use super::*;

        static EVENTS: StdMutex<std::vec::Vec<(NotifyCode, bool, bool, usize)>> =
            StdMutex::new(std::vec::Vec::new());

        fn record(port: &Port, code: NotifyCode) {
            // (event, registered?, rx buffer still present?, rx capacity)
            EVENTS.lock().unwrap().push((
                code,
                port.is_active() || port.state() == PortState::Closing,
                port.rx_buffer().is_some(),
                port.rx_buffer().map_or(0, |b| b.capacity()),
            ));
        }

        #[test]
        fn test_open_and_close_fire_once() {
            let uart = uart();
            assert!(uart.set_notify(0, Some(record)));

            let serial = uart.init(&UartConfig::new(0)).unwrap();
            {
                let events = EVENTS.lock().unwrap();
                assert_eq!(events.len(), 1);
                assert_eq!(events[0].0, NotifyCode::AfterOpen);
                assert!(events[0].1);
            }

            serial.uninit();
            let events = EVENTS.lock().unwrap();
            assert_eq!(events.len(), 2);
            assert_eq!(events[1].0, NotifyCode::BeforeClose);
            assert!(events[1].1);
            assert!(events[1].2);
            assert!(events[1].3 > 0);
        }
    }
}
