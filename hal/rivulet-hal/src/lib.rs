//! Rivulet Hardware Abstraction Layer
//!
//! This crate defines the vocabulary shared by the buffered UART core and
//! the chip-specific platform layers. The core never touches registers; it
//! calls through [`UartPlatform`] for everything that is board-specific.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application / network stack            │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  rivulet-core (ports, buffers, ISR mask)│
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  rivulet-hal (this crate - traits)      │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ rivulet-hal-  │       │  chip HALs    │
//! │     host      │       │   (future)    │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Contents
//!
//! - [`uart::UartConfig`] - Configuration record consumed by port init
//! - [`uart::UartMode`], [`uart::UartOptions`], [`uart::UartFormat`] - Port setup
//! - [`uart::NotifyCode`] - Lifecycle events reported to notify callbacks
//! - [`platform::UartPlatform`] - Opaque platform calls made by the core
//! - [`uart::UartTx`], [`uart::UartRx`], [`uart::UartDuplex`] - Blocking serial traits

#![no_std]
#![deny(unsafe_code)]

pub mod platform;
pub mod uart;

// Re-export key types at crate root for convenience
pub use platform::UartPlatform;
pub use uart::{
    DataBits, NotifyCode, Parity, StopBits, UartConfig, UartFormat, UartMode, UartOptions,
    UartDuplex, UartRx, UartStatus, UartTx, DEFAULT_RX_HEADROOM, UART_COUNT, UART_RX_FIFO_SIZE,
    UART_TX_FIFO_SIZE,
};
