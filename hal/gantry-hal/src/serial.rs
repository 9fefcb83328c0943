//! Serial byte device abstraction
//!
//! The protocol stack only needs a non-blocking byte stream and a
//! millisecond clock for its timeouts. Both ends of the link (the embedded
//! controller and the host) implement this trait.

/// Default link speed in bits per second
pub const DEFAULT_BAUDRATE: u32 = 115_200;

/// Raw byte-stream device
///
/// Reads never block: callers check [`ByteDevice::available`] first.
/// Writes may be partial; the return value is the number of bytes the
/// device accepted.
pub trait ByteDevice {
    /// Error type for device operations
    type Error;

    /// Open the device at the given baud rate
    fn open(&mut self, baudrate: u32) -> Result<(), Self::Error>;

    /// Number of received bytes waiting to be read
    fn available(&mut self) -> usize;

    /// Read one buffered byte
    ///
    /// Only valid when [`ByteDevice::available`] is non-zero.
    fn read_byte(&mut self) -> Result<u8, Self::Error>;

    /// Write bytes, returning how many were accepted
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    /// Close the device
    fn close(&mut self);

    /// Monotonic milliseconds since an arbitrary epoch (wraps)
    fn now_millis(&self) -> u32;

    /// Milliseconds elapsed since `since`, tolerant of wrap-around
    fn elapsed_since(&self, since: u32) -> u32 {
        self.now_millis().wrapping_sub(since)
    }
}

impl<T: ByteDevice + ?Sized> ByteDevice for &mut T {
    type Error = T::Error;

    fn open(&mut self, baudrate: u32) -> Result<(), Self::Error> {
        (**self).open(baudrate)
    }

    fn available(&mut self) -> usize {
        (**self).available()
    }

    fn read_byte(&mut self) -> Result<u8, Self::Error> {
        (**self).read_byte()
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        (**self).write(data)
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn now_millis(&self) -> u32 {
        (**self).now_millis()
    }
}
