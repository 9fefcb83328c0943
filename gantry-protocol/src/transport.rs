//! Message transport: frames over a [`ByteDevice`]
//!
//! The transport owns the parser state for one link. It never blocks in
//! [`Transport::check_for_message`]; [`Transport::recv_message`] polls the
//! device until a frame completes or the timeout expires.

use crate::frame::{Frame, FrameError, FrameParser, MAX_FRAME_SIZE};
use gantry_hal::ByteDevice;

/// Errors from the transport layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError<E> {
    /// The underlying device failed
    Device(E),
    /// Frame could not be encoded
    Frame(FrameError),
    /// The device accepted fewer bytes than the encoded frame
    SendFailed,
    /// No complete frame arrived in time
    Timeout,
}

impl<E: core::fmt::Debug> core::fmt::Display for TransportError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TransportError::Device(e) => write!(f, "device error: {:?}", e),
            TransportError::Frame(e) => write!(f, "frame error: {}", e),
            TransportError::SendFailed => write!(f, "short write"),
            TransportError::Timeout => write!(f, "timed out waiting for frame"),
        }
    }
}

impl<E> From<FrameError> for TransportError<E> {
    fn from(e: FrameError) -> Self {
        TransportError::Frame(e)
    }
}

/// Framed message transport over a byte device
pub struct Transport<D: ByteDevice> {
    device: D,
    parser: FrameParser,
    malformed: u32,
}

impl<D: ByteDevice> Transport<D> {
    /// Wrap an opened device
    pub fn new(device: D) -> Self {
        Self {
            device,
            parser: FrameParser::new(),
            malformed: 0,
        }
    }

    /// Access the underlying device
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Mutable access to the underlying device
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Release the device
    pub fn into_inner(self) -> D {
        self.device
    }

    /// Number of frames dropped because the end delimiter was wrong
    pub fn malformed_count(&self) -> u32 {
        self.malformed
    }

    /// True while a frame is partially received
    pub fn in_progress(&self) -> bool {
        self.parser.in_progress()
    }

    /// Discard any partially received frame
    pub fn reset(&mut self) {
        self.parser.reset();
    }

    /// Consume buffered bytes until one frame completes
    ///
    /// Bytes after the end delimiter of a completed frame are left in the
    /// device for the next call.
    pub fn check_for_message(&mut self) -> Result<Option<Frame>, TransportError<D::Error>> {
        while self.device.available() > 0 {
            let byte = self.device.read_byte().map_err(TransportError::Device)?;
            match self.parser.feed(byte) {
                Ok(Some(frame)) => return Ok(Some(frame)),
                Ok(None) => {}
                Err(FrameError::MissingEnd) => {
                    self.malformed = self.malformed.wrapping_add(1);
                }
                Err(e) => return Err(TransportError::Frame(e)),
            }
        }
        Ok(None)
    }

    /// Poll until a frame completes or `timeout_ms` elapses
    ///
    /// On timeout any partial frame is discarded.
    pub fn recv_message(&mut self, timeout_ms: u32) -> Result<Frame, TransportError<D::Error>> {
        let started = self.device.now_millis();
        loop {
            if let Some(frame) = self.check_for_message()? {
                return Ok(frame);
            }
            if self.device.elapsed_since(started) >= timeout_ms {
                self.parser.reset();
                return Err(TransportError::Timeout);
            }
        }
    }

    /// Encode and write one frame in a single device write
    pub fn send_message(&mut self, frame: &Frame) -> Result<(), TransportError<D::Error>> {
        let mut buffer = [0u8; MAX_FRAME_SIZE];
        let len = frame.encode(&mut buffer)?;
        let written = self
            .device
            .write(&buffer[..len])
            .map_err(TransportError::Device)?;
        if written != len {
            return Err(TransportError::SendFailed);
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::mock::ScriptedDevice;
    use super::*;
    use crate::frame::{FRAME_END, FRAME_START};
    use std::vec::Vec;

    fn wire(frames: &[Frame]) -> Vec<u8> {
        frames
            .iter()
            .flat_map(|f| f.encode_to_vec().unwrap().into_iter())
            .collect()
    }

    #[test]
    fn test_check_for_message_stops_after_frame() {
        let bytes = wire(&[Frame::empty(0x02), Frame::empty(0x06)]);
        let mut transport = Transport::new(ScriptedDevice::new(&bytes));

        let first = transport.check_for_message().unwrap().unwrap();
        assert_eq!(first.id, 0x02);
        // Second frame still buffered in the device
        assert_eq!(transport.device_mut().available(), 6);

        let second = transport.check_for_message().unwrap().unwrap();
        assert_eq!(second.id, 0x06);
        assert_eq!(transport.check_for_message().unwrap(), None);
    }

    #[test]
    fn test_partial_frame_kept_between_calls() {
        let bytes = wire(&[Frame::new(0x01, b"abc").unwrap()]);
        let mut transport = Transport::new(ScriptedDevice::new(&bytes[..4]));

        assert_eq!(transport.check_for_message().unwrap(), None);
        assert!(transport.in_progress());

        transport.device_mut().rx.extend(bytes[4..].iter().copied());
        let frame = transport.check_for_message().unwrap().unwrap();
        assert_eq!(&frame.payload[..], b"abc");
    }

    #[test]
    fn test_malformed_frame_counted_and_skipped() {
        let mut bytes = Vec::from([FRAME_START, 0x01, 0, 0, 0, 0x00]);
        bytes.extend(wire(&[Frame::empty(0x05)]));
        let mut transport = Transport::new(ScriptedDevice::new(&bytes));

        let frame = transport.check_for_message().unwrap().unwrap();
        assert_eq!(frame.id, 0x05);
        assert_eq!(transport.malformed_count(), 1);
    }

    #[test]
    fn test_recv_timeout_resets_parser() {
        let mut transport = Transport::new(ScriptedDevice::new(&[FRAME_START, 0x01]));

        assert_eq!(transport.recv_message(10), Err(TransportError::Timeout));
        assert!(!transport.in_progress());

        // A fresh frame parses cleanly afterwards
        transport
            .device_mut()
            .rx
            .extend(wire(&[Frame::empty(0x02)]));
        assert_eq!(transport.recv_message(10).unwrap().id, 0x02);
    }

    #[test]
    fn test_recv_timeout_across_clock_wrap() {
        let device = ScriptedDevice::new(&[]);
        device.clock.set(u32::MAX - 3);
        let mut transport = Transport::new(device);

        assert_eq!(transport.recv_message(8), Err(TransportError::Timeout));
    }

    #[test]
    fn test_send_writes_whole_frame() {
        let mut transport = Transport::new(ScriptedDevice::new(&[]));
        transport.send_message(&Frame::new(0x83, &[1]).unwrap()).unwrap();

        assert_eq!(
            transport.device().tx,
            Vec::from([FRAME_START, 0x83, 1, 1, 0, 0, FRAME_END])
        );
    }

    #[test]
    fn test_short_write_is_send_failed() {
        let mut device = ScriptedDevice::new(&[]);
        device.write_limit = Some(3);
        let mut transport = Transport::new(device);

        assert_eq!(
            transport.send_message(&Frame::empty(0x80)),
            Err(TransportError::SendFailed)
        );
    }
}
