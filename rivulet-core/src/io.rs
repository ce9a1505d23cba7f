//! Trait adapters for [`Serial`]
//!
//! `embedded-io` and `embedded-io-async` let protocol crates sit directly
//! on a port; [`UartTx`]/[`UartRx`] cover the blocking HAL traits. Unlike
//! the inherent methods these block until there is something to return,
//! and they report a disabled direction or a closed port as an error.

use embassy_futures::yield_now;
use rivulet_hal::{UartPlatform, UartRx, UartTx};

use crate::error::SerialError;
use crate::serial::Serial;

impl<P: UartPlatform> Serial<'_, P> {
    /// Block until the TX buffer drains, then report whether the port
    /// survived
    fn drain(&self) -> Result<(), SerialError> {
        self.check_tx()?;
        self.wait_tx_empty();
        self.check_tx()
    }
}

impl<P: UartPlatform> embedded_io::ErrorType for Serial<'_, P> {
    type Error = SerialError;
}

impl<P: UartPlatform> embedded_io::Read for Serial<'_, P> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            self.check_rx()?;
            let count = Serial::read(&*self, buf);
            if count > 0 {
                return Ok(count);
            }
            self.uart().platform().yield_now();
        }
    }
}

impl<P: UartPlatform> embedded_io::ReadReady for Serial<'_, P> {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        self.check_rx()?;
        Ok(self.rx_available() > 0)
    }
}

impl<P: UartPlatform> embedded_io::Write for Serial<'_, P> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            self.check_tx()?;
            let count = self.push(buf);
            if count > 0 {
                return Ok(count);
            }
            self.uart().platform().yield_now();
        }
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.drain()
    }
}

impl<P: UartPlatform> embedded_io::WriteReady for Serial<'_, P> {
    fn write_ready(&mut self) -> Result<bool, Self::Error> {
        self.check_tx()?;
        Ok(self.tx_free() > 0)
    }
}

impl<P: UartPlatform> embedded_io_async::Read for Serial<'_, P> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            self.check_rx()?;
            let count = Serial::read(&*self, buf);
            if count > 0 {
                return Ok(count);
            }
            yield_now().await;
        }
    }
}

impl<P: UartPlatform> embedded_io_async::Write for Serial<'_, P> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            self.check_tx()?;
            let count = self.push(buf);
            if count > 0 {
                return Ok(count);
            }
            yield_now().await;
        }
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        self.check_tx()?;
        self.wait_tx_empty_async().await;
        self.check_tx()
    }
}

impl<P: UartPlatform> UartTx for Serial<'_, P> {
    type Error = SerialError;

    fn write_blocking(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        let mut written = 0;
        while written < data.len() {
            self.check_tx()?;
            written += self.push(&data[written..]);
            if written < data.len() {
                self.uart().platform().yield_now();
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.drain()
    }
}

impl<P: UartPlatform> UartRx for Serial<'_, P> {
    type Error = SerialError;

    fn read_blocking(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut filled = 0;
        while filled < buf.len() {
            self.check_rx()?;
            filled += Serial::read(&*self, &mut buf[filled..]);
            if filled < buf.len() {
                self.uart().platform().yield_now();
            }
        }
        Ok(filled)
    }
}
