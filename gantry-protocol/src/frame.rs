//! Frame encoding and decoding for the gantry serial link.
//!
//! Frame format:
//! - START (1 byte): 0x7B delimiter
//! - ID (1 byte): message identifier
//! - LENGTH (1 byte): payload length (0-255)
//! - PAYLOAD (0-255 bytes): id-specific data, big-endian fields
//! - CRC (2 bytes): reserved, always transmitted as zero and never checked
//! - END (1 byte): 0x7D delimiter

use heapless::Vec;

/// Frame start delimiter
pub const FRAME_START: u8 = 0x7B;

/// Frame end delimiter
pub const FRAME_END: u8 = 0x7D;

/// Maximum payload size in bytes
pub const MAX_PAYLOAD_SIZE: usize = 255;

/// Bytes around the payload (START + ID + LENGTH + CRC + END)
pub const FRAME_OVERHEAD: usize = 1 + 1 + 1 + 2 + 1;

/// Maximum complete frame size
pub const MAX_FRAME_SIZE: usize = FRAME_OVERHEAD + MAX_PAYLOAD_SIZE;

/// Reserved CRC bytes
pub const CRC_PLACEHOLDER: [u8; 2] = [0x00, 0x00];

/// Errors that can occur during frame parsing or encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Payload exceeds maximum allowed size
    PayloadTooLarge,
    /// The byte after the CRC was not the end delimiter
    MissingEnd,
    /// Buffer too small for encoding
    BufferTooSmall,
}

impl core::fmt::Display for FrameError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FrameError::PayloadTooLarge => write!(f, "payload exceeds {} bytes", MAX_PAYLOAD_SIZE),
            FrameError::MissingEnd => write!(f, "end delimiter missing"),
            FrameError::BufferTooSmall => write!(f, "encode buffer too small"),
        }
    }
}

/// A parsed or constructed frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Message identifier
    pub id: u8,
    /// Payload data
    pub payload: Vec<u8, MAX_PAYLOAD_SIZE>,
}

impl Frame {
    /// Create a new frame with the given id and payload
    pub fn new(id: u8, payload: &[u8]) -> Result<Self, FrameError> {
        let mut payload_vec = Vec::new();
        payload_vec
            .extend_from_slice(payload)
            .map_err(|_| FrameError::PayloadTooLarge)?;

        Ok(Self {
            id,
            payload: payload_vec,
        })
    }

    /// Create a frame with no payload
    pub fn empty(id: u8) -> Self {
        Self {
            id,
            payload: Vec::new(),
        }
    }

    /// Payload length as carried in the LENGTH field
    pub fn length(&self) -> u8 {
        self.payload.len() as u8
    }

    /// Size of this frame on the wire
    pub fn encoded_len(&self) -> usize {
        FRAME_OVERHEAD + self.payload.len()
    }

    /// Encode this frame into a byte buffer
    ///
    /// Returns the number of bytes written
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, FrameError> {
        let frame_len = self.encoded_len();
        if buffer.len() < frame_len {
            return Err(FrameError::BufferTooSmall);
        }

        let data_end = 3 + self.payload.len();
        buffer[0] = FRAME_START;
        buffer[1] = self.id;
        buffer[2] = self.length();
        buffer[3..data_end].copy_from_slice(&self.payload);
        buffer[data_end..data_end + 2].copy_from_slice(&CRC_PLACEHOLDER);
        buffer[data_end + 2] = FRAME_END;

        Ok(frame_len)
    }

    /// Encode this frame into a heapless Vec
    pub fn encode_to_vec(&self) -> Result<Vec<u8, MAX_FRAME_SIZE>, FrameError> {
        let mut buffer = [0u8; MAX_FRAME_SIZE];
        let len = self.encode(&mut buffer)?;
        let mut vec = Vec::new();
        vec.extend_from_slice(&buffer[..len])
            .map_err(|_| FrameError::BufferTooSmall)?;
        Ok(vec)
    }
}

/// State machine for parsing incoming frames
#[derive(Debug, Clone)]
pub struct FrameParser {
    state: ParseState,
    id: u8,
    declared_length: u8,
    bytes_read: usize,
    crc: u16,
    in_progress: bool,
    buffer: Vec<u8, MAX_PAYLOAD_SIZE>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseState {
    /// Waiting for START byte
    AwaitStart,
    /// Got START, waiting for ID
    ReadId,
    /// Got ID, waiting for LENGTH
    ReadLength,
    /// Reading payload bytes
    ReadData,
    /// Reading the two reserved CRC bytes
    ReadCrc,
    /// Waiting for END byte
    AwaitEnd,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    /// Create a new frame parser
    pub fn new() -> Self {
        Self {
            state: ParseState::AwaitStart,
            id: 0,
            declared_length: 0,
            bytes_read: 0,
            crc: 0,
            in_progress: false,
            buffer: Vec::new(),
        }
    }

    /// Reset the parser state
    pub fn reset(&mut self) {
        self.state = ParseState::AwaitStart;
        self.id = 0;
        self.declared_length = 0;
        self.bytes_read = 0;
        self.crc = 0;
        self.in_progress = false;
        self.buffer.clear();
    }

    /// Current parse state
    pub fn state(&self) -> ParseState {
        self.state
    }

    /// True between a START byte and the end of that frame
    pub fn in_progress(&self) -> bool {
        self.in_progress
    }

    /// Feed a single byte to the parser
    ///
    /// Returns `Ok(Some(frame))` when a complete frame is parsed,
    /// `Ok(None)` when more bytes are needed, or `Err` when the frame was
    /// malformed and has been discarded.
    pub fn feed(&mut self, byte: u8) -> Result<Option<Frame>, FrameError> {
        match self.state {
            ParseState::AwaitStart => {
                if byte == FRAME_START {
                    self.in_progress = true;
                    self.state = ParseState::ReadId;
                }
                // Silently ignore non-START bytes while waiting
                Ok(None)
            }
            ParseState::ReadId => {
                self.id = byte;
                self.state = ParseState::ReadLength;
                Ok(None)
            }
            ParseState::ReadLength => {
                self.declared_length = byte;
                self.bytes_read = 0;
                self.buffer.clear();
                self.state = if byte == 0 {
                    ParseState::ReadCrc
                } else {
                    ParseState::ReadData
                };
                Ok(None)
            }
            ParseState::ReadData => {
                // Cannot overflow: LENGTH is at most MAX_PAYLOAD_SIZE
                let _ = self.buffer.push(byte);
                self.bytes_read += 1;
                if self.bytes_read == self.declared_length as usize {
                    self.bytes_read = 0;
                    self.state = ParseState::ReadCrc;
                }
                Ok(None)
            }
            ParseState::ReadCrc => {
                self.crc = (self.crc << 8) | byte as u16;
                self.bytes_read += 1;
                if self.bytes_read == CRC_PLACEHOLDER.len() {
                    self.state = ParseState::AwaitEnd;
                }
                Ok(None)
            }
            ParseState::AwaitEnd => {
                if byte != FRAME_END {
                    self.reset();
                    return Err(FrameError::MissingEnd);
                }

                let frame = Frame {
                    id: self.id,
                    payload: core::mem::take(&mut self.buffer),
                };

                self.reset();
                Ok(Some(frame))
            }
        }
    }

    /// Feed multiple bytes to the parser
    ///
    /// Returns the first complete frame found, if any.
    /// Remaining bytes after a complete frame are not consumed.
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> Result<Option<Frame>, FrameError> {
        for &byte in bytes {
            if let Some(frame) = self.feed(byte)? {
                return Ok(Some(frame));
            }
        }
        Ok(None)
    }
}
