//! Host platform for the buffered UART core
//!
//! Runs the core on a development machine. Each port gets a simulated
//! line with hardware-sized RX/TX FIFOs; [`isr::service`] plays the shared
//! UART interrupt, moving bytes between those FIFOs and the port buffers.
//!
//! - [`HostPlatform`] implements `rivulet_hal::UartPlatform`
//! - [`isr`] interrupt service routine and a polling loop for threads
//! - [`config`] board description loaded from TOML

pub mod config;
pub mod isr;
pub mod platform;

pub use config::{load_ports, parse_ports, ConfigError};
pub use isr::{service, ServiceReport};
pub use platform::HostPlatform;

/// UART service running on the host platform
pub type HostUart = rivulet_core::Uart<HostPlatform>;
