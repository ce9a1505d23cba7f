//! Port registry
//!
//! Maps each port identifier to at most one live instance. Interrupt
//! handlers find ports here, so every lookup range-checks the identifier
//! before indexing.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::Vec;
use portable_atomic_util::Arc;
use rivulet_hal::UART_COUNT;

use crate::error::InitError;
use crate::port::Port;

const EMPTY: Option<Arc<Port>> = None;

/// Table of live port instances
pub struct PortRegistry {
    slots: Mutex<CriticalSectionRawMutex, RefCell<[Option<Arc<Port>>; UART_COUNT]>>,
}

impl Default for PortRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PortRegistry {
    /// Create an empty registry
    pub const fn new() -> Self {
        Self {
            slots: Mutex::new(RefCell::new([EMPTY; UART_COUNT])),
        }
    }

    /// Live instance for a port, if any
    pub fn get(&self, port: u8) -> Option<Arc<Port>> {
        let index = port as usize;
        if index >= UART_COUNT {
            return None;
        }
        self.slots.lock(|slots| slots.borrow()[index].clone())
    }

    /// Check whether a port has a registered instance
    pub fn is_registered(&self, port: u8) -> bool {
        let index = port as usize;
        index < UART_COUNT && self.slots.lock(|slots| slots.borrow()[index].is_some())
    }

    /// Insert an instance under its own port identifier
    ///
    /// Never replaces an existing instance.
    pub fn register(&self, port: Arc<Port>) -> Result<(), InitError> {
        let index = port.id() as usize;
        if index >= UART_COUNT {
            return Err(InitError::InvalidPort);
        }

        self.slots.lock(|slots| {
            let mut slots = slots.borrow_mut();
            if slots[index].is_some() {
                return Err(InitError::AlreadyInitialised);
            }
            slots[index] = Some(port);
            Ok(())
        })
    }

    /// Remove and return the instance for a port
    pub fn unregister(&self, port: u8) -> Option<Arc<Port>> {
        let index = port as usize;
        if index >= UART_COUNT {
            return None;
        }
        self.slots.lock(|slots| slots.borrow_mut()[index].take())
    }

    /// Identifiers of every registered port, ascending
    pub fn ids(&self) -> Vec<u8, UART_COUNT> {
        self.slots.lock(|slots| {
            slots
                .borrow()
                .iter()
                .enumerate()
                .filter(|(_, slot)| slot.is_some())
                .map(|(index, _)| index as u8)
                .collect()
        })
    }
}
