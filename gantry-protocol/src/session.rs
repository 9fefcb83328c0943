//! Acknowledged session on top of the transport
//!
//! Every non-ACK frame a peer receives is acknowledged immediately with an
//! empty ACK frame. [`Session::send`] waits for that ACK before it returns.
//! [`Session::post`] returns once the frame is written; its ACK is collected
//! by later [`Session::check_for_message`] calls, so a polling loop never
//! stalls on the peer. There is no retry: a missing ACK surfaces to the
//! caller as a timeout.

use crate::frame::Frame;
use crate::messages::{MSG_ACK, MSG_NACK};
use crate::transport::{Transport, TransportError};
use gantry_hal::ByteDevice;

/// Default time to wait for an ACK
pub const DEFAULT_ACK_TIMEOUT_MS: u32 = 500;

/// Session layer errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionError<E> {
    Transport(TransportError<E>),
    /// Peer answered a send with something other than ACK
    UnexpectedReply(u8),
}

impl<E: core::fmt::Debug> core::fmt::Display for SessionError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SessionError::Transport(e) => write!(f, "{}", e),
            SessionError::UnexpectedReply(id) => {
                write!(f, "expected ACK, got message {:#04x}", id)
            }
        }
    }
}

impl<E> From<TransportError<E>> for SessionError<E> {
    fn from(e: TransportError<E>) -> Self {
        SessionError::Transport(e)
    }
}

impl<E> SessionError<E> {
    /// True if the error is a transport timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, SessionError::Transport(TransportError::Timeout))
    }
}

/// Acknowledged message session
pub struct Session<D: ByteDevice> {
    transport: Transport<D>,
    ack_timeout_ms: u32,
    /// Send time of a posted frame still waiting for its ACK
    pending_ack: Option<u32>,
}

impl<D: ByteDevice> Session<D> {
    /// Create a session with the default ACK timeout
    pub fn new(device: D) -> Self {
        Self::with_ack_timeout(device, DEFAULT_ACK_TIMEOUT_MS)
    }

    /// Create a session with a custom ACK timeout
    pub fn with_ack_timeout(device: D, ack_timeout_ms: u32) -> Self {
        Self {
            transport: Transport::new(device),
            ack_timeout_ms,
            pending_ack: None,
        }
    }

    pub fn ack_timeout_ms(&self) -> u32 {
        self.ack_timeout_ms
    }

    pub fn transport(&self) -> &Transport<D> {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut Transport<D> {
        &mut self.transport
    }

    /// Send a frame and wait for the peer's ACK
    pub fn send(&mut self, frame: &Frame) -> Result<(), SessionError<D::Error>> {
        self.pending_ack = None;
        self.transport.send_message(frame)?;
        let reply = self.transport.recv_message(self.ack_timeout_ms)?;
        if reply.id != MSG_ACK {
            return Err(SessionError::UnexpectedReply(reply.id));
        }
        Ok(())
    }

    /// Send a frame without waiting for the ACK
    ///
    /// A later [`Session::check_for_message`] consumes the ACK and
    /// [`Session::check_ack_timeout`] reports it missing. Posting again
    /// before the ACK arrives restarts the wait for the newer frame.
    pub fn post(&mut self, frame: &Frame) -> Result<(), SessionError<D::Error>> {
        self.transport.send_message(frame)?;
        self.pending_ack = Some(self.transport.device().now_millis());
        Ok(())
    }

    /// True while a posted frame has not been acknowledged
    pub fn awaiting_ack(&self) -> bool {
        self.pending_ack.is_some()
    }

    /// Fail a posted frame whose ACK is overdue
    pub fn check_ack_timeout(&mut self) -> Result<(), SessionError<D::Error>> {
        if let Some(sent) = self.pending_ack {
            if self.transport.device().elapsed_since(sent) >= self.ack_timeout_ms {
                self.pending_ack = None;
                return Err(TransportError::Timeout.into());
            }
        }
        Ok(())
    }

    /// Return the next complete inbound frame, if any, after acknowledging it
    ///
    /// ACK and NACK frames are returned without an acknowledgement of their
    /// own. An ACK settles a posted frame; a NACK while one is posted is
    /// reported as [`SessionError::UnexpectedReply`].
    pub fn check_for_message(&mut self) -> Result<Option<Frame>, SessionError<D::Error>> {
        let Some(frame) = self.transport.check_for_message()? else {
            return Ok(None);
        };
        if self.pending_ack.is_some() {
            match frame.id {
                MSG_ACK => self.pending_ack = None,
                MSG_NACK => {
                    self.pending_ack = None;
                    return Err(SessionError::UnexpectedReply(MSG_NACK));
                }
                _ => {}
            }
        }
        self.acknowledge(&frame)?;
        Ok(Some(frame))
    }

    /// Blocking variant of [`Session::check_for_message`]
    pub fn receive(&mut self, timeout_ms: u32) -> Result<Frame, SessionError<D::Error>> {
        let frame = self.transport.recv_message(timeout_ms)?;
        self.acknowledge(&frame)?;
        Ok(frame)
    }

    fn acknowledge(&mut self, frame: &Frame) -> Result<(), SessionError<D::Error>> {
        if frame.id != MSG_ACK && frame.id != MSG_NACK {
            self.transport.send_message(&Frame::empty(MSG_ACK))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::ScriptedDevice;
    use std::vec::Vec;

    fn bytes(frame: Frame) -> Vec<u8> {
        frame.encode_to_vec().unwrap().iter().copied().collect()
    }

    #[test]
    fn test_send_succeeds_on_ack() {
        let device = ScriptedDevice::new(&bytes(Frame::empty(MSG_ACK)));
        let mut session = Session::new(device);

        session.send(&Frame::empty(0x05)).unwrap();
        assert_eq!(session.transport().device().tx, bytes(Frame::empty(0x05)));
    }

    #[test]
    fn test_send_nack_is_unexpected() {
        let device = ScriptedDevice::new(&bytes(Frame::empty(MSG_NACK)));
        let mut session = Session::new(device);

        assert_eq!(
            session.send(&Frame::empty(0x05)),
            Err(SessionError::UnexpectedReply(MSG_NACK))
        );
    }

    #[test]
    fn test_send_without_ack_times_out() {
        let mut session = Session::with_ack_timeout(ScriptedDevice::new(&[]), 20);
        let err = session.send(&Frame::empty(0x02)).unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn test_inbound_frame_is_acknowledged_first() {
        let device = ScriptedDevice::new(&bytes(Frame::empty(0x02)));
        let mut session = Session::new(device);

        let frame = session.check_for_message().unwrap().unwrap();
        assert_eq!(frame.id, 0x02);
        assert_eq!(session.transport().device().tx, bytes(Frame::empty(MSG_ACK)));
    }

    #[test]
    fn test_inbound_ack_not_acknowledged() {
        let device = ScriptedDevice::new(&bytes(Frame::empty(MSG_ACK)));
        let mut session = Session::new(device);

        assert_eq!(session.check_for_message().unwrap().unwrap().id, MSG_ACK);
        assert!(session.transport().device().tx.is_empty());
    }

    #[test]
    fn test_posted_frame_settled_by_ack() {
        let device = ScriptedDevice::new(&bytes(Frame::empty(MSG_ACK)));
        let mut session = Session::new(device);

        session.post(&Frame::empty(0x83)).unwrap();
        assert!(session.awaiting_ack());
        assert_eq!(session.transport().device().tx, bytes(Frame::empty(0x83)));

        assert_eq!(session.check_for_message().unwrap().unwrap().id, MSG_ACK);
        assert!(!session.awaiting_ack());
        assert_eq!(session.check_ack_timeout(), Ok(()));
    }

    #[test]
    fn test_posted_frame_times_out_later() {
        let mut session = Session::with_ack_timeout(ScriptedDevice::new(&[]), 5);
        session.post(&Frame::empty(0x83)).unwrap();

        // The scripted clock advances on every read
        let mut result = Ok(());
        for _ in 0..10 {
            result = session.check_ack_timeout();
            if result.is_err() {
                break;
            }
        }
        assert!(result.unwrap_err().is_timeout());
        assert!(!session.awaiting_ack());
    }

    #[test]
    fn test_nack_for_posted_frame() {
        let device = ScriptedDevice::new(&bytes(Frame::empty(MSG_NACK)));
        let mut session = Session::new(device);

        session.post(&Frame::empty(0x83)).unwrap();
        assert_eq!(
            session.check_for_message(),
            Err(SessionError::UnexpectedReply(MSG_NACK))
        );
        assert!(!session.awaiting_ack());
    }

    #[test]
    fn test_nothing_buffered() {
        let mut session = Session::new(ScriptedDevice::new(&[]));
        assert_eq!(session.check_for_message().unwrap(), None);
    }
}
