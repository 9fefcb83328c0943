//! Application messages for the gantry link
//!
//! Message ids are divided into two categories:
//! - Host → Device: commands
//! - Device → Host: replies (including the session-level ACK/NACK)
//!
//! Every payload has a fixed layout with big-endian multi-byte fields,
//! except `ping` and `log` which carry arbitrary bytes.

use crate::frame::{Frame, FrameError, MAX_PAYLOAD_SIZE};
use crate::types::{
    AxisId, CalibrationKey, Direction, ResultCode, Segment, StatusCode, TEMPERATURE_CHANNELS,
};
use heapless::Vec;

// Message ids: Host → Device
pub const MSG_PING: u8 = 0x01;
pub const MSG_GET_STATUS: u8 = 0x02;
pub const MSG_HOME: u8 = 0x03;
pub const MSG_MOVE: u8 = 0x04;
pub const MSG_STOP: u8 = 0x05;
pub const MSG_GET_POSITION: u8 = 0x06;
pub const MSG_GET_AXIS_STATE: u8 = 0x07;
pub const MSG_GET_TEMPERATURE: u8 = 0x08;
pub const MSG_CALIBRATE: u8 = 0x09;

// Message ids: Device → Host
pub const MSG_ACK: u8 = 0x80;
pub const MSG_NACK: u8 = 0x81;
pub const MSG_LOG: u8 = 0x82;
pub const MSG_STATUS: u8 = 0x83;
pub const MSG_POSITION: u8 = 0x84;
pub const MSG_AXIS_STATE: u8 = 0x85;
pub const MSG_TEMPERATURE: u8 = 0x86;
pub const MSG_AXIS_RESULT: u8 = 0x87;

/// Payload sizes for fixed-layout messages
pub const MOVE_PAYLOAD_LEN: usize = 4 + 4 + 4 + 1 + 1;
pub const AXIS_STATE_PAYLOAD_LEN: usize = 6 + 4 + 4 + 4;
pub const POSITION_PAYLOAD_LEN: usize = 8;
pub const TEMPERATURE_PAYLOAD_LEN: usize = 4 * TEMPERATURE_CHANNELS;
pub const CALIBRATE_PAYLOAD_LEN: usize = 1 + 4;

/// Errors when interpreting a frame as a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Id is not part of the catalogue for this direction
    UnknownId(u8),
    /// Payload length differs from the fixed layout
    InvalidLength { id: u8, expected: usize, actual: usize },
    /// A field holds a value outside its enumeration
    InvalidValue { id: u8 },
}

impl core::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DecodeError::UnknownId(id) => write!(f, "unknown message id {:#04x}", id),
            DecodeError::InvalidLength {
                id,
                expected,
                actual,
            } => write!(
                f,
                "message {:#04x}: expected {} payload bytes, got {}",
                id, expected, actual
            ),
            DecodeError::InvalidValue { id } => {
                write!(f, "message {:#04x}: field value out of range", id)
            }
        }
    }
}

/// A `move` request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MoveRequest {
    /// Acceleration in counts/s²; zero selects the calibrated value
    pub accel: u32,
    /// Hold velocity in counts/s
    pub hold_velocity: u32,
    /// Signed distance in encoder counts
    pub distance: i32,
    /// Target axis
    pub axis: AxisId,
    /// Commanded direction
    pub direction: Direction,
}

/// Snapshot of one axis as reported by `axis_state`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AxisSnapshot {
    pub axis: AxisId,
    pub moving: bool,
    pub home_pressed: bool,
    pub far_pressed: bool,
    pub direction: Direction,
    pub segment: Segment,
    /// Current velocity in counts/s
    pub velocity: u32,
    /// Encoder position in counts
    pub position: i32,
    /// Target position of the active segment
    pub target: i32,
}

/// Commands sent by the host
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Link check; the payload is echoed back in a `log` reply
    Ping(Vec<u8, MAX_PAYLOAD_SIZE>),
    GetStatus,
    /// Start the two-phase homing sequence
    Home,
    Move(MoveRequest),
    /// Halt both axes and clear any fault
    Stop,
    GetPosition,
    GetAxisState(AxisId),
    GetTemperature,
    Calibrate { key: CalibrationKey, value: f32 },
}

/// Replies sent by the device
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Ack,
    Nack,
    Log(Vec<u8, MAX_PAYLOAD_SIZE>),
    Status(StatusCode),
    Position { x: i32, y: i32 },
    AxisState(AxisSnapshot),
    /// Degrees Celsius per channel; `NaN` for a failed or disabled channel
    Temperature([f32; TEMPERATURE_CHANNELS]),
    AxisResult(ResultCode),
}

/// Big-endian payload builder
struct PayloadWriter {
    buf: Vec<u8, MAX_PAYLOAD_SIZE>,
}

impl PayloadWriter {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn put(&mut self, bytes: &[u8]) -> Result<&mut Self, FrameError> {
        self.buf
            .extend_from_slice(bytes)
            .map_err(|_| FrameError::PayloadTooLarge)?;
        Ok(self)
    }

    fn u8(&mut self, v: u8) -> Result<&mut Self, FrameError> {
        self.put(&[v])
    }

    fn u32(&mut self, v: u32) -> Result<&mut Self, FrameError> {
        self.put(&v.to_be_bytes())
    }

    fn i32(&mut self, v: i32) -> Result<&mut Self, FrameError> {
        self.put(&v.to_be_bytes())
    }

    fn f32(&mut self, v: f32) -> Result<&mut Self, FrameError> {
        self.put(&v.to_be_bytes())
    }

    fn finish(&self, id: u8) -> Result<Frame, FrameError> {
        Frame::new(id, &self.buf)
    }
}

fn be4(bytes: &[u8], at: usize) -> [u8; 4] {
    [bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]
}

fn be_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_be_bytes(be4(bytes, at))
}

fn be_i32(bytes: &[u8], at: usize) -> i32 {
    i32::from_be_bytes(be4(bytes, at))
}

fn be_f32(bytes: &[u8], at: usize) -> f32 {
    f32::from_be_bytes(be4(bytes, at))
}

fn flag(byte: u8) -> bool {
    byte != 0
}

/// Check the payload size of a fixed-layout message
fn expect_len(frame: &Frame, expected: usize) -> Result<&[u8], DecodeError> {
    if frame.payload.len() != expected {
        return Err(DecodeError::InvalidLength {
            id: frame.id,
            expected,
            actual: frame.payload.len(),
        });
    }
    Ok(&frame.payload)
}

fn copy_payload(frame: &Frame) -> Vec<u8, MAX_PAYLOAD_SIZE> {
    frame.payload.clone()
}

impl Command {
    /// Message id of this command
    pub fn id(&self) -> u8 {
        match self {
            Command::Ping(_) => MSG_PING,
            Command::GetStatus => MSG_GET_STATUS,
            Command::Home => MSG_HOME,
            Command::Move(_) => MSG_MOVE,
            Command::Stop => MSG_STOP,
            Command::GetPosition => MSG_GET_POSITION,
            Command::GetAxisState(_) => MSG_GET_AXIS_STATE,
            Command::GetTemperature => MSG_GET_TEMPERATURE,
            Command::Calibrate { .. } => MSG_CALIBRATE,
        }
    }

    /// Encode this command into a frame
    pub fn to_frame(&self) -> Result<Frame, FrameError> {
        let id = self.id();
        match self {
            Command::Ping(data) => Frame::new(id, data),
            Command::GetStatus
            | Command::Home
            | Command::Stop
            | Command::GetPosition
            | Command::GetTemperature => Ok(Frame::empty(id)),
            Command::Move(req) => PayloadWriter::new()
                .u32(req.accel)?
                .u32(req.hold_velocity)?
                .i32(req.distance)?
                .u8(req.axis.to_byte())?
                .u8(req.direction.to_byte())?
                .finish(id),
            Command::GetAxisState(axis) => Frame::new(id, &[axis.to_byte()]),
            Command::Calibrate { key, value } => PayloadWriter::new()
                .u8(key.to_byte())?
                .f32(*value)?
                .finish(id),
        }
    }

    /// Parse a command from a frame
    pub fn from_frame(frame: &Frame) -> Result<Self, DecodeError> {
        let invalid = DecodeError::InvalidValue { id: frame.id };
        match frame.id {
            MSG_PING => Ok(Command::Ping(copy_payload(frame))),
            MSG_GET_STATUS => expect_len(frame, 0).map(|_| Command::GetStatus),
            MSG_HOME => expect_len(frame, 0).map(|_| Command::Home),
            MSG_MOVE => {
                let p = expect_len(frame, MOVE_PAYLOAD_LEN)?;
                Ok(Command::Move(MoveRequest {
                    accel: be_u32(p, 0),
                    hold_velocity: be_u32(p, 4),
                    distance: be_i32(p, 8),
                    axis: AxisId::from_byte(p[12]).ok_or(invalid)?,
                    direction: Direction::from_byte(p[13]).ok_or(invalid)?,
                }))
            }
            MSG_STOP => expect_len(frame, 0).map(|_| Command::Stop),
            MSG_GET_POSITION => expect_len(frame, 0).map(|_| Command::GetPosition),
            MSG_GET_AXIS_STATE => {
                let p = expect_len(frame, 1)?;
                AxisId::from_byte(p[0])
                    .map(Command::GetAxisState)
                    .ok_or(invalid)
            }
            MSG_GET_TEMPERATURE => expect_len(frame, 0).map(|_| Command::GetTemperature),
            MSG_CALIBRATE => {
                let p = expect_len(frame, CALIBRATE_PAYLOAD_LEN)?;
                Ok(Command::Calibrate {
                    key: CalibrationKey::from_byte(p[0]).ok_or(invalid)?,
                    value: be_f32(p, 1),
                })
            }
            other => Err(DecodeError::UnknownId(other)),
        }
    }

    /// True if the device answers this command with an `axis_result`
    pub fn expects_result(id: u8) -> bool {
        matches!(id, MSG_HOME | MSG_MOVE | MSG_CALIBRATE)
    }
}

impl Reply {
    /// Message id of this reply
    pub fn id(&self) -> u8 {
        match self {
            Reply::Ack => MSG_ACK,
            Reply::Nack => MSG_NACK,
            Reply::Log(_) => MSG_LOG,
            Reply::Status(_) => MSG_STATUS,
            Reply::Position { .. } => MSG_POSITION,
            Reply::AxisState(_) => MSG_AXIS_STATE,
            Reply::Temperature(_) => MSG_TEMPERATURE,
            Reply::AxisResult(_) => MSG_AXIS_RESULT,
        }
    }

    /// Encode this reply into a frame
    pub fn to_frame(&self) -> Result<Frame, FrameError> {
        let id = self.id();
        match self {
            Reply::Ack | Reply::Nack => Ok(Frame::empty(id)),
            Reply::Log(data) => Frame::new(id, data),
            Reply::Status(status) => Frame::new(id, &[status.to_byte()]),
            Reply::Position { x, y } => PayloadWriter::new().i32(*x)?.i32(*y)?.finish(id),
            Reply::AxisState(s) => PayloadWriter::new()
                .u8(s.axis.to_byte())?
                .u8(s.moving as u8)?
                .u8(s.home_pressed as u8)?
                .u8(s.far_pressed as u8)?
                .u8(s.direction.to_byte())?
                .u8(s.segment.to_byte())?
                .u32(s.velocity)?
                .i32(s.position)?
                .i32(s.target)?
                .finish(id),
            Reply::Temperature(values) => {
                let mut w = PayloadWriter::new();
                for v in values {
                    w.f32(*v)?;
                }
                w.finish(id)
            }
            Reply::AxisResult(code) => Frame::new(id, &[code.to_byte()]),
        }
    }

    /// Parse a reply from a frame
    pub fn from_frame(frame: &Frame) -> Result<Self, DecodeError> {
        let invalid = DecodeError::InvalidValue { id: frame.id };
        match frame.id {
            MSG_ACK => expect_len(frame, 0).map(|_| Reply::Ack),
            MSG_NACK => expect_len(frame, 0).map(|_| Reply::Nack),
            MSG_LOG => Ok(Reply::Log(copy_payload(frame))),
            MSG_STATUS => {
                let p = expect_len(frame, 1)?;
                StatusCode::from_byte(p[0]).map(Reply::Status).ok_or(invalid)
            }
            MSG_POSITION => {
                let p = expect_len(frame, POSITION_PAYLOAD_LEN)?;
                Ok(Reply::Position {
                    x: be_i32(p, 0),
                    y: be_i32(p, 4),
                })
            }
            MSG_AXIS_STATE => {
                let p = expect_len(frame, AXIS_STATE_PAYLOAD_LEN)?;
                Ok(Reply::AxisState(AxisSnapshot {
                    axis: AxisId::from_byte(p[0]).ok_or(invalid)?,
                    moving: flag(p[1]),
                    home_pressed: flag(p[2]),
                    far_pressed: flag(p[3]),
                    direction: Direction::from_byte(p[4]).ok_or(invalid)?,
                    segment: Segment::from_byte(p[5]).ok_or(invalid)?,
                    velocity: be_u32(p, 6),
                    position: be_i32(p, 10),
                    target: be_i32(p, 14),
                }))
            }
            MSG_TEMPERATURE => {
                let p = expect_len(frame, TEMPERATURE_PAYLOAD_LEN)?;
                let mut values = [0.0f32; TEMPERATURE_CHANNELS];
                for (i, v) in values.iter_mut().enumerate() {
                    *v = be_f32(p, 4 * i);
                }
                Ok(Reply::Temperature(values))
            }
            MSG_AXIS_RESULT => {
                let p = expect_len(frame, 1)?;
                ResultCode::from_byte(p[0])
                    .map(Reply::AxisResult)
                    .ok_or(invalid)
            }
            other => Err(DecodeError::UnknownId(other)),
        }
    }
}
