//! Simulated UART interrupt service
//!
//! All ports share one interrupt vector. A service pass walks every port
//! whose mask bit is set, moves received bytes from the RX FIFO into the
//! port's RX buffer, refills the TX FIFO from the TX buffer, and finally
//! runs the data callback of each port that received something.
//!
//! A pass holds the critical section throughout, so it can never overlap a
//! main-context critical section on another thread.

use core::sync::atomic::{AtomicBool, Ordering};

use heapless::Vec;
use rivulet_core::{Arc, Port};
use rivulet_hal::UART_COUNT;

use crate::platform::Line;
use crate::HostUart;

/// Bytes moved by one service pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ServiceReport {
    /// Bytes moved from RX FIFOs into port buffers
    pub received: usize,
    /// Bytes taken from port buffers and put on the wire
    pub transmitted: usize,
}

impl ServiceReport {
    /// Check if the pass did anything
    pub fn is_idle(&self) -> bool {
        self.received == 0 && self.transmitted == 0
    }
}

/// Run one interrupt service pass over every enabled port
pub fn service(uart: &HostUart) -> ServiceReport {
    critical_section::with(|cs| {
        let mut report = ServiceReport::default();
        let mut wake: Vec<Arc<Port>, UART_COUNT> = Vec::new();

        {
            let mut lines = uart.platform().lines.borrow_ref_mut(cs);
            for (id, line) in lines.iter_mut().enumerate() {
                let id = id as u8;
                if !uart.mask().is_enabled(id) {
                    continue;
                }
                let Some(port) = uart.port(id) else {
                    continue;
                };

                let received = service_rx(&port, line);
                report.transmitted += service_tx(&port, line);

                if received > 0 {
                    report.received += received;
                    // Capacity is UART_COUNT, one entry per port at most
                    let _ = wake.push(port);
                }
            }
        }

        // Line borrow released: callbacks may talk to the platform
        for port in &wake {
            port.invoke_data_callback();
        }

        report
    })
}

fn service_rx(port: &Port, line: &mut Line) -> usize {
    if port.rx_buffer().is_none() {
        line.rx_fifo.clear();
        return 0;
    }

    let mut moved = 0;
    while let Some(&byte) = line.rx_fifo.front() {
        if !port.isr_receive(byte) {
            // Buffer full: leave the rest in the FIFO for the next pass
            break;
        }
        line.rx_fifo.pop_front();
        moved += 1;
    }
    moved
}

fn service_tx(port: &Port, line: &mut Line) -> usize {
    while !line.tx_fifo.is_full() {
        match port.isr_transmit() {
            Some(byte) => {
                let _ = line.tx_fifo.push_back(byte);
            }
            None => break,
        }
    }

    // The host shift register is infinitely fast
    let mut sent = 0;
    while let Some(byte) = line.tx_fifo.pop_front() {
        line.wire.push(byte);
        sent += 1;
    }
    sent
}

/// Service interrupts until `stop` is set
///
/// Intended for a dedicated thread standing in for interrupt context.
pub fn run_until(uart: &HostUart, stop: &AtomicBool) {
    while !stop.load(Ordering::Acquire) {
        if service(uart).is_idle() {
            std::thread::yield_now();
        }
    }
}
