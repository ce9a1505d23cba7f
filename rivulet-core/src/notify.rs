//! Notification dispatch
//!
//! Two kinds of callback exist. The notify callback is registered per port
//! identifier, may outlive any instance, and reports lifecycle and transfer
//! milestones. The data callback lives on the port instance and is invoked
//! by interrupt-context drivers when bytes move.

use core::cell::Cell;

use critical_section::Mutex;
use rivulet_hal::{NotifyCode, UART_COUNT};

use crate::port::Port;

/// Lifecycle notification `(port, event)`
pub type NotifyCallback = fn(&Port, NotifyCode);

/// Data callback `(port, context)`
///
/// `context` is an opaque word supplied at registration.
pub type DataCallback = fn(&Port, usize);

/// Per-port notify callback table
pub struct NotifyTable {
    callbacks: Mutex<Cell<[Option<NotifyCallback>; UART_COUNT]>>,
}

impl Default for NotifyTable {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyTable {
    /// Create an empty table
    pub const fn new() -> Self {
        Self {
            callbacks: Mutex::new(Cell::new([None; UART_COUNT])),
        }
    }

    /// Register or clear the callback for a port
    ///
    /// Returns `false` for an out-of-range port.
    pub fn set(&self, port: u8, callback: Option<NotifyCallback>) -> bool {
        let index = port as usize;
        if index >= UART_COUNT {
            return false;
        }

        critical_section::with(|cs| {
            let cell = self.callbacks.borrow(cs);
            let mut table = cell.get();
            table[index] = callback;
            cell.set(table);
        });
        true
    }

    /// Callback currently registered for a port
    pub fn get(&self, port: u8) -> Option<NotifyCallback> {
        let index = port as usize;
        if index >= UART_COUNT {
            return None;
        }
        critical_section::with(|cs| self.callbacks.borrow(cs).get()[index])
    }

    /// Invoke the port's callback, if any, in the calling context
    pub fn notify(&self, port: &Port, code: NotifyCode) {
        // Copied out first so the callback runs outside the critical section
        if let Some(callback) = self.get(port.id()) {
            callback(port, code);
        }
    }
}

/// Data callback and its context, replaced as a pair
pub(crate) struct DataCallbackSlot {
    slot: Mutex<Cell<Option<(DataCallback, usize)>>>,
}

impl DataCallbackSlot {
    pub(crate) const fn new() -> Self {
        Self {
            slot: Mutex::new(Cell::new(None)),
        }
    }

    /// Replace callback and context
    ///
    /// Both change inside one critical section, so an interrupt can never
    /// pair the new context with the old callback.
    pub(crate) fn set(&self, callback: Option<DataCallback>, context: usize) {
        critical_section::with(|cs| {
            self.slot.borrow(cs).set(callback.map(|cb| (cb, context)));
        });
    }

    pub(crate) fn get(&self) -> Option<(DataCallback, usize)> {
        critical_section::with(|cs| self.slot.borrow(cs).get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivulet_hal::UartConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static OPENS: AtomicUsize = AtomicUsize::new(0);

    fn count_opens(_port: &Port, code: NotifyCode) {
        if code == NotifyCode::AfterOpen {
            OPENS.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn ignore(_port: &Port, _code: NotifyCode) {}

    #[test]
    fn test_set_out_of_range() {
        let table = NotifyTable::new();
        assert!(!table.set(UART_COUNT as u8, Some(ignore)));
        assert!(table.get(UART_COUNT as u8).is_none());
    }

    #[test]
    fn test_notify_without_callback_is_silent() {
        let table = NotifyTable::new();
        let port = Port::new(&UartConfig::new(0)).unwrap();
        table.notify(&port, NotifyCode::AfterOpen);
    }

    #[test]
    fn test_notify_dispatches_by_port() {
        let table = NotifyTable::new();
        assert!(table.set(1, Some(count_opens)));

        let port0 = Port::new(&UartConfig::new(0)).unwrap();
        let port1 = Port::new(&UartConfig::new(1)).unwrap();

        let before = OPENS.load(Ordering::SeqCst);
        table.notify(&port0, NotifyCode::AfterOpen);
        table.notify(&port1, NotifyCode::AfterOpen);
        table.notify(&port1, NotifyCode::BeforeRead);
        assert_eq!(OPENS.load(Ordering::SeqCst) - before, 1);

        assert!(table.set(1, None));
        table.notify(&port1, NotifyCode::AfterOpen);
        assert_eq!(OPENS.load(Ordering::SeqCst) - before, 1);
    }
}
