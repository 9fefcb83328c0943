//! Host-side client
//!
//! Wraps a [`Session`] and exposes one method per command. Each call sends
//! the command, waits for the ACK and, where the command has a reply, waits
//! for that reply id. Only one request is in flight at a time.

use crate::frame::{Frame, FrameError, MAX_PAYLOAD_SIZE};
use crate::messages::{
    AxisSnapshot, Command, DecodeError, MoveRequest, Reply, MSG_AXIS_RESULT, MSG_AXIS_STATE,
    MSG_LOG, MSG_POSITION, MSG_STATUS, MSG_TEMPERATURE,
};
use crate::session::{Session, SessionError};
use crate::types::{AxisId, CalibrationKey, ResultCode, StatusCode, TEMPERATURE_CHANNELS};
use gantry_hal::ByteDevice;
use heapless::Vec;

/// Default time to wait for a reply after the ACK
pub const DEFAULT_REPLY_TIMEOUT_MS: u32 = 1000;

/// Client errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClientError<E> {
    Session(SessionError<E>),
    Decode(DecodeError),
    Frame(FrameError),
    /// A reply arrived with a different id than the command expects
    UnexpectedReply(u8),
    /// The `log` reply to a ping did not match the sent bytes
    EchoMismatch,
}

impl<E: core::fmt::Debug> core::fmt::Display for ClientError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ClientError::Session(e) => write!(f, "{}", e),
            ClientError::Decode(e) => write!(f, "{}", e),
            ClientError::Frame(e) => write!(f, "{}", e),
            ClientError::UnexpectedReply(id) => write!(f, "unexpected reply {:#04x}", id),
            ClientError::EchoMismatch => write!(f, "ping echo mismatch"),
        }
    }
}

impl<E> From<SessionError<E>> for ClientError<E> {
    fn from(e: SessionError<E>) -> Self {
        ClientError::Session(e)
    }
}

impl<E> From<DecodeError> for ClientError<E> {
    fn from(e: DecodeError) -> Self {
        ClientError::Decode(e)
    }
}

impl<E> From<FrameError> for ClientError<E> {
    fn from(e: FrameError) -> Self {
        ClientError::Frame(e)
    }
}

/// Gantry host client
pub struct Client<D: ByteDevice> {
    session: Session<D>,
    reply_timeout_ms: u32,
}

impl<D: ByteDevice> Client<D> {
    /// Create a client with default timeouts
    pub fn new(device: D) -> Self {
        Self::from_session(Session::new(device), DEFAULT_REPLY_TIMEOUT_MS)
    }

    /// Create a client around an existing session
    pub fn from_session(session: Session<D>, reply_timeout_ms: u32) -> Self {
        Self {
            session,
            reply_timeout_ms,
        }
    }

    pub fn session_mut(&mut self) -> &mut Session<D> {
        &mut self.session
    }

    /// Send `data` and verify it comes back in a `log` reply
    pub fn ping(&mut self, data: &[u8]) -> Result<(), ClientError<D::Error>> {
        let mut payload: Vec<u8, MAX_PAYLOAD_SIZE> = Vec::new();
        payload
            .extend_from_slice(data)
            .map_err(|_| FrameError::PayloadTooLarge)?;
        match self.request(&Command::Ping(payload), MSG_LOG)? {
            Reply::Log(echo) if echo[..] == *data => Ok(()),
            Reply::Log(_) => Err(ClientError::EchoMismatch),
            other => Err(ClientError::UnexpectedReply(other.id())),
        }
    }

    /// Query the device status
    pub fn status(&mut self) -> Result<StatusCode, ClientError<D::Error>> {
        match self.request(&Command::GetStatus, MSG_STATUS)? {
            Reply::Status(status) => Ok(status),
            other => Err(ClientError::UnexpectedReply(other.id())),
        }
    }

    /// Start homing both axes
    pub fn home(&mut self) -> Result<ResultCode, ClientError<D::Error>> {
        self.result(&Command::Home)
    }

    /// Request a move on one axis
    pub fn move_axis(&mut self, request: MoveRequest) -> Result<ResultCode, ClientError<D::Error>> {
        self.result(&Command::Move(request))
    }

    /// Halt both axes; only the ACK is awaited
    pub fn stop(&mut self) -> Result<(), ClientError<D::Error>> {
        self.session.send(&Command::Stop.to_frame()?)?;
        Ok(())
    }

    /// Read both encoder positions as `(x, y)`
    pub fn position(&mut self) -> Result<(i32, i32), ClientError<D::Error>> {
        match self.request(&Command::GetPosition, MSG_POSITION)? {
            Reply::Position { x, y } => Ok((x, y)),
            other => Err(ClientError::UnexpectedReply(other.id())),
        }
    }

    /// Read a snapshot of one axis
    pub fn axis_state(&mut self, axis: AxisId) -> Result<AxisSnapshot, ClientError<D::Error>> {
        match self.request(&Command::GetAxisState(axis), MSG_AXIS_STATE)? {
            Reply::AxisState(snapshot) => Ok(snapshot),
            other => Err(ClientError::UnexpectedReply(other.id())),
        }
    }

    /// Read all temperature channels
    pub fn temperature(
        &mut self,
    ) -> Result<[f32; TEMPERATURE_CHANNELS], ClientError<D::Error>> {
        match self.request(&Command::GetTemperature, MSG_TEMPERATURE)? {
            Reply::Temperature(values) => Ok(values),
            other => Err(ClientError::UnexpectedReply(other.id())),
        }
    }

    /// Update one calibration value
    pub fn calibrate(
        &mut self,
        key: CalibrationKey,
        value: f32,
    ) -> Result<ResultCode, ClientError<D::Error>> {
        self.result(&Command::Calibrate { key, value })
    }

    fn result(&mut self, command: &Command) -> Result<ResultCode, ClientError<D::Error>> {
        match self.request(command, MSG_AXIS_RESULT)? {
            Reply::AxisResult(code) => Ok(code),
            other => Err(ClientError::UnexpectedReply(other.id())),
        }
    }

    /// Send a command, then wait for a reply with `expected` id
    fn request(&mut self, command: &Command, expected: u8) -> Result<Reply, ClientError<D::Error>> {
        self.session.send(&command.to_frame()?)?;
        let frame: Frame = self.session.receive(self.reply_timeout_ms)?;
        if frame.id != expected {
            return Err(ClientError::UnexpectedReply(frame.id));
        }
        Ok(Reply::from_frame(&frame)?)
    }
}
