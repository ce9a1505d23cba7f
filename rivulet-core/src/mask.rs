//! Interrupt mask coordinator
//!
//! All ports share one interrupt vector, so a single bit-set records which
//! ports have their interrupt source running. Interrupt-context servicing
//! skips any port whose bit is clear.
//!
//! Clearing every bit and restoring the saved set afterwards is the HAL's
//! critical section. On hosts without real interrupts the bits alone cannot
//! stop a handler that is already running, so [`InterruptMask::critical`]
//! additionally holds a `critical_section` for the duration, and interrupt
//! handlers are expected to do the same.

use portable_atomic::{AtomicU8, Ordering};
use rivulet_hal::UART_COUNT;

// One bit per port
const _: () = assert!(UART_COUNT <= 8);

/// Snapshot of the per-port interrupt enable bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IsrMask(u8);

impl IsrMask {
    /// Mask with no ports enabled
    pub const NONE: Self = Self(0);

    /// Check whether a port is enabled in this snapshot
    pub fn contains(self, port: u8) -> bool {
        (port as usize) < UART_COUNT && self.0 & (1 << port) != 0
    }

    /// Raw bit representation
    pub fn bits(self) -> u8 {
        self.0
    }
}

/// Process-wide interrupt enable bit-set
#[derive(Debug, Default)]
pub struct InterruptMask {
    bits: AtomicU8,
}

impl InterruptMask {
    /// Create a mask with every port disabled
    pub const fn new() -> Self {
        Self {
            bits: AtomicU8::new(0),
        }
    }

    /// Disable interrupts for every port
    ///
    /// Returns the previous state for [`restore`](Self::restore).
    pub fn disable_all(&self) -> IsrMask {
        IsrMask(self.bits.swap(0, Ordering::AcqRel))
    }

    /// Reinstate a state captured by [`disable_all`](Self::disable_all)
    pub fn restore(&self, mask: IsrMask) {
        self.bits.store(mask.0, Ordering::Release);
    }

    /// Set the enable bit for a port
    ///
    /// Returns `false` for an out-of-range port.
    pub fn mark_enabled(&self, port: u8) -> bool {
        if port as usize >= UART_COUNT {
            return false;
        }
        self.bits.fetch_or(1 << port, Ordering::AcqRel);
        true
    }

    /// Clear the enable bit for a port
    pub fn mark_disabled(&self, port: u8) {
        if (port as usize) < UART_COUNT {
            self.bits.fetch_and(!(1 << port), Ordering::AcqRel);
        }
    }

    /// Check whether a port's interrupt source is enabled
    pub fn is_enabled(&self, port: u8) -> bool {
        self.current().contains(port)
    }

    /// Current enable bits
    pub fn current(&self) -> IsrMask {
        IsrMask(self.bits.load(Ordering::Acquire))
    }

    /// Run `f` with all port interrupts held off
    ///
    /// Nests safely. Keep `f` short: O(1) buffer queries, cursor resets.
    /// Enable bits changed inside `f` are overwritten on exit.
    pub fn critical<R>(&self, f: impl FnOnce() -> R) -> R {
        critical_section::with(|_| {
            let saved = self.disable_all();
            let result = f();
            self.restore(saved);
            result
        })
    }
}
