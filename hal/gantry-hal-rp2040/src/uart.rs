//! Host link over a buffered UART
//!
//! The interrupt-driven ring buffers of [`BufferedUart`] give the
//! non-blocking byte stream the protocol stack polls; the embassy time
//! driver supplies the millisecond clock.

use embassy_rp::uart::{BufferedUart, Error};
use embassy_time::Instant;
use embedded_io::{Read, ReadReady, Write};
use gantry_hal::ByteDevice;

/// [`ByteDevice`] over a buffered RP2040 UART
pub struct UartLink {
    uart: BufferedUart,
    open: bool,
}

impl UartLink {
    pub fn new(uart: BufferedUart) -> Self {
        Self { uart, open: true }
    }
}

impl ByteDevice for UartLink {
    type Error = Error;

    fn open(&mut self, baudrate: u32) -> Result<(), Error> {
        self.uart.set_baudrate(baudrate);
        self.open = true;
        Ok(())
    }

    fn available(&mut self) -> usize {
        if !self.open {
            return 0;
        }
        // Fill level is not exposed; the parser reads a byte at a time
        match self.uart.read_ready() {
            Ok(true) => 1,
            _ => 0,
        }
    }

    fn read_byte(&mut self) -> Result<u8, Error> {
        let mut byte = [0u8; 1];
        self.uart.read(&mut byte)?;
        Ok(byte[0])
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, Error> {
        if !self.open {
            return Ok(0);
        }
        let mut written = 0;
        while written < data.len() {
            match Write::write(&mut self.uart, &data[written..])? {
                0 => break,
                n => written += n,
            }
        }
        Ok(written)
    }

    fn close(&mut self) {
        let _ = self.uart.flush();
        self.open = false;
    }

    fn now_millis(&self) -> u32 {
        Instant::now().as_millis() as u32
    }
}
