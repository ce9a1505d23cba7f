//! Buffered, interrupt-driven UART core
//!
//! This crate contains everything between the application and the
//! platform's interrupt handler that does not depend on specific hardware:
//!
//! - Lock-free SPSC ring buffers shared with interrupt context
//! - Port registry enforcing one live instance per port
//! - Interrupt mask coordinator (the HAL's critical section)
//! - Port lifecycle, read/write/flush and cooperative waits
//! - Notify and data callback dispatch
//!
//! A single [`Uart`] service object owns the process-wide state. It is
//! usually placed in a `static` and handed out by reference:
//!
//! ```ignore
//! static UART: Uart<Board> = Uart::new(Board::new());
//!
//! let serial = UART.init(&UartConfig::new(0).with_baudrate(115200))?;
//! serial.write(b"hello");
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

// Must come first so the logging macros are visible to every module
mod fmt;

pub mod buffer;
pub mod error;
pub mod io;
pub mod mask;
pub mod notify;
pub mod port;
pub mod registry;
pub mod serial;
pub mod uart;

pub use buffer::RingBuffer;
pub use error::{InitError, SerialError};
pub use mask::{InterruptMask, IsrMask};
pub use notify::{DataCallback, NotifyCallback};
pub use port::{Port, PortState};
pub use registry::PortRegistry;
pub use serial::Serial;
pub use uart::Uart;

// Port handles are shared with interrupt context through reference counting
pub use portable_atomic_util::Arc;

pub use rivulet_hal as hal;
