//! Gantry Serial Protocol
//!
//! This crate defines the point-to-point serial protocol between the host
//! and the gantry controller. It is layered:
//!
//! 1. [`frame`]: byte framing with start/end delimiters
//! 2. [`transport`]: frames over a [`gantry_hal::ByteDevice`] with timeouts
//! 3. [`session`]: every received frame is acknowledged, every sent frame
//!    waits for its ACK
//! 4. [`messages`]: typed commands and replies
//!
//! # Frame format
//!
//! ```text
//! ┌───────┬────┬────────┬─────────────┬─────────┬─────┐
//! │ START │ ID │ LENGTH │ PAYLOAD     │ CRC     │ END │
//! │ 0x7B  │ 1B │ 1B     │ 0–255B      │ 2B (0)  │0x7D │
//! └───────┴────┴────────┴─────────────┴─────────┴─────┘
//! ```
//!
//! The CRC field is reserved: it is sent as zero and never checked.
//!
//! With the `std` feature, [`loopback`] provides an in-process link for
//! exercising both ends on a host.

#![no_std]
#![deny(unsafe_code)]

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod client;
pub mod frame;
#[cfg(feature = "std")]
pub mod loopback;
pub mod messages;
pub mod session;
pub mod transport;
pub mod types;

pub use client::{Client, ClientError, DEFAULT_REPLY_TIMEOUT_MS};
pub use frame::{Frame, FrameError, FrameParser, FRAME_END, FRAME_START, MAX_PAYLOAD_SIZE};
pub use messages::{AxisSnapshot, Command, DecodeError, MoveRequest, Reply};
pub use session::{Session, SessionError, DEFAULT_ACK_TIMEOUT_MS};
pub use transport::{Transport, TransportError};
pub use types::{
    AxisId, AxisParam, CalibrationKey, Direction, ResultCode, Segment, StatusCode,
    ThermistorParam, TEMPERATURE_CHANNELS,
};
