//! In-process serial link for host testing
//!
//! [`pair`] returns two connected endpoints; bytes written on one side become
//! readable on the other. Endpoints are `Send`, so each end can run on its own
//! thread.

use gantry_hal::ByteDevice;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Errors from a loopback endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopbackError {
    /// Endpoint used before `open` or after `close`
    Closed,
    /// Read with nothing buffered
    Empty,
    /// The peer thread panicked while holding the buffer
    Poisoned,
}

type Pipe = Arc<Mutex<VecDeque<u8>>>;

/// One end of a loopback link
pub struct LoopbackEndpoint {
    rx: Pipe,
    tx: Pipe,
    epoch: Instant,
    open: bool,
    write_limit: Option<usize>,
}

/// Create two connected endpoints, both already open
pub fn pair() -> (LoopbackEndpoint, LoopbackEndpoint) {
    let a_to_b: Pipe = Arc::default();
    let b_to_a: Pipe = Arc::default();
    let epoch = Instant::now();
    let a = LoopbackEndpoint {
        rx: b_to_a.clone(),
        tx: a_to_b.clone(),
        epoch,
        open: true,
        write_limit: None,
    };
    let b = LoopbackEndpoint {
        rx: a_to_b,
        tx: b_to_a,
        epoch,
        open: true,
        write_limit: None,
    };
    (a, b)
}

impl LoopbackEndpoint {
    /// Accept at most `limit` bytes per write, to simulate a short write
    pub fn set_write_limit(&mut self, limit: Option<usize>) {
        self.write_limit = limit;
    }

    /// Push raw bytes as if the peer had sent them
    pub fn inject(&self, bytes: &[u8]) -> Result<(), LoopbackError> {
        let mut rx = self.rx.lock().map_err(|_| LoopbackError::Poisoned)?;
        rx.extend(bytes.iter().copied());
        Ok(())
    }
}

impl ByteDevice for LoopbackEndpoint {
    type Error = LoopbackError;

    fn open(&mut self, _baudrate: u32) -> Result<(), LoopbackError> {
        self.open = true;
        Ok(())
    }

    fn available(&mut self) -> usize {
        let n = self.rx.lock().map(|rx| rx.len()).unwrap_or(0);
        if n == 0 {
            // Let the peer thread run while the caller polls
            std::thread::yield_now();
        }
        n
    }

    fn read_byte(&mut self) -> Result<u8, LoopbackError> {
        if !self.open {
            return Err(LoopbackError::Closed);
        }
        let mut rx = self.rx.lock().map_err(|_| LoopbackError::Poisoned)?;
        rx.pop_front().ok_or(LoopbackError::Empty)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, LoopbackError> {
        if !self.open {
            return Err(LoopbackError::Closed);
        }
        let n = self.write_limit.map_or(data.len(), |l| l.min(data.len()));
        let mut tx = self.tx.lock().map_err(|_| LoopbackError::Poisoned)?;
        tx.extend(data[..n].iter().copied());
        Ok(n)
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn now_millis(&self) -> u32 {
        self.epoch.elapsed().as_millis() as u32
    }
}
