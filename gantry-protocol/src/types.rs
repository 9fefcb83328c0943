//! Wire-level enumerations shared by both ends of the link

/// Number of temperature channels reported by `get_temperature`
pub const TEMPERATURE_CHANNELS: usize = 5;

/// Axis identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AxisId {
    /// Horizontal X axis
    X,
    /// Horizontal Y axis
    Y,
}

impl AxisId {
    /// Both axes, in index order
    pub const ALL: [AxisId; 2] = [AxisId::X, AxisId::Y];

    /// Parse an axis from its wire format byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(AxisId::X),
            1 => Some(AxisId::Y),
            _ => None,
        }
    }

    /// Convert to wire format byte
    pub fn to_byte(self) -> u8 {
        self.index() as u8
    }

    /// Registry index of this axis
    pub fn index(self) -> usize {
        match self {
            AxisId::X => 0,
            AxisId::Y => 1,
        }
    }
}

/// Commanded travel direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Away from the home switch (counts increase)
    #[default]
    Positive,
    /// Toward the home switch (counts decrease)
    Negative,
}

impl Direction {
    /// Parse a direction from its wire format byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Direction::Positive),
            1 => Some(Direction::Negative),
            _ => None,
        }
    }

    /// Convert to wire format byte
    pub fn to_byte(self) -> u8 {
        match self {
            Direction::Positive => 0,
            Direction::Negative => 1,
        }
    }

    /// Sign multiplier for encoder counts
    pub fn sign(self) -> i32 {
        match self {
            Direction::Positive => 1,
            Direction::Negative => -1,
        }
    }

    /// Get the opposite direction
    pub fn opposite(self) -> Self {
        match self {
            Direction::Positive => Direction::Negative,
            Direction::Negative => Direction::Positive,
        }
    }
}

/// Velocity segment of an active motion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Segment {
    /// Ramping up from start velocity
    #[default]
    Accelerate,
    /// Constant hold velocity
    Hold,
    /// Ramping down to start velocity
    Decelerate,
}

impl Segment {
    /// Parse a segment from its wire format byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Segment::Accelerate),
            1 => Some(Segment::Hold),
            2 => Some(Segment::Decelerate),
            _ => None,
        }
    }

    /// Convert to wire format byte
    pub fn to_byte(self) -> u8 {
        match self {
            Segment::Accelerate => 0,
            Segment::Hold => 1,
            Segment::Decelerate => 2,
        }
    }
}

/// Device-wide operating mode as reported on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StatusCode {
    Idle,
    Homing,
    Moving,
    Fault,
}

impl StatusCode {
    /// Parse a status from its wire format byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(StatusCode::Idle),
            1 => Some(StatusCode::Homing),
            2 => Some(StatusCode::Moving),
            3 => Some(StatusCode::Fault),
            _ => None,
        }
    }

    /// Convert to wire format byte
    pub fn to_byte(self) -> u8 {
        match self {
            StatusCode::Idle => 0,
            StatusCode::Homing => 1,
            StatusCode::Moving => 2,
            StatusCode::Fault => 3,
        }
    }
}

/// Result code carried by `axis_result`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResultCode {
    /// Command accepted
    Ok,
    /// Axis is already executing a motion
    AlreadyMoving,
    /// Limit switch on the side of travel is pressed
    LimitBlocked,
    /// Requested distance is zero
    ZeroDistance,
    /// Profile cannot be generated (zero acceleration with a velocity change)
    InvalidProfile,
    /// Distance sign disagrees with the commanded direction
    DirectionMismatch,
    /// Payload length or field value invalid
    Invalid,
    /// Device is homing or faulted
    Busy,
}

// Wire format values
const RESULT_OK: u8 = 0;
const RESULT_ALREADY_MOVING: u8 = 1;
const RESULT_LIMIT_BLOCKED: u8 = 2;
const RESULT_ZERO_DISTANCE: u8 = 3;
const RESULT_INVALID_PROFILE: u8 = 4;
const RESULT_DIRECTION_MISMATCH: u8 = 5;
const RESULT_INVALID: u8 = 6;
const RESULT_BUSY: u8 = 7;

impl ResultCode {
    /// Parse a result from its wire format byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            RESULT_OK => Some(ResultCode::Ok),
            RESULT_ALREADY_MOVING => Some(ResultCode::AlreadyMoving),
            RESULT_LIMIT_BLOCKED => Some(ResultCode::LimitBlocked),
            RESULT_ZERO_DISTANCE => Some(ResultCode::ZeroDistance),
            RESULT_INVALID_PROFILE => Some(ResultCode::InvalidProfile),
            RESULT_DIRECTION_MISMATCH => Some(ResultCode::DirectionMismatch),
            RESULT_INVALID => Some(ResultCode::Invalid),
            RESULT_BUSY => Some(ResultCode::Busy),
            _ => None,
        }
    }

    /// Convert to wire format byte
    pub fn to_byte(self) -> u8 {
        match self {
            ResultCode::Ok => RESULT_OK,
            ResultCode::AlreadyMoving => RESULT_ALREADY_MOVING,
            ResultCode::LimitBlocked => RESULT_LIMIT_BLOCKED,
            ResultCode::ZeroDistance => RESULT_ZERO_DISTANCE,
            ResultCode::InvalidProfile => RESULT_INVALID_PROFILE,
            ResultCode::DirectionMismatch => RESULT_DIRECTION_MISMATCH,
            ResultCode::Invalid => RESULT_INVALID,
            ResultCode::Busy => RESULT_BUSY,
        }
    }

    /// Returns true if the command was accepted
    pub fn is_ok(self) -> bool {
        self == ResultCode::Ok
    }
}

/// Per-axis calibration parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AxisParam {
    Acceleration,
    StartVelocity,
    HomeVelocity,
}

/// Per-sensor thermistor parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ThermistorParam {
    /// Steinhart-Hart A coefficient
    A,
    /// Steinhart-Hart B coefficient
    B,
    /// Steinhart-Hart C coefficient
    C,
    /// Channel enabled flag
    Enabled,
}

/// Calibration key
///
/// Wire encoding: axis parameters are `0x10 + 4 * axis + param`,
/// thermistor parameters are `0x20 + 4 * sensor + param`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationKey {
    Axis { axis: AxisId, param: AxisParam },
    Thermistor { sensor: u8, param: ThermistorParam },
}

const KEY_AXIS_BASE: u8 = 0x10;
const KEY_THERMISTOR_BASE: u8 = 0x20;

impl CalibrationKey {
    /// Parse a key from its wire format byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        if (KEY_AXIS_BASE..KEY_AXIS_BASE + 8).contains(&byte) {
            let offset = byte - KEY_AXIS_BASE;
            let axis = AxisId::from_byte(offset / 4)?;
            let param = match offset % 4 {
                0 => AxisParam::Acceleration,
                1 => AxisParam::StartVelocity,
                2 => AxisParam::HomeVelocity,
                _ => return None,
            };
            return Some(CalibrationKey::Axis { axis, param });
        }

        let sensors = TEMPERATURE_CHANNELS as u8;
        if (KEY_THERMISTOR_BASE..KEY_THERMISTOR_BASE + 4 * sensors).contains(&byte) {
            let offset = byte - KEY_THERMISTOR_BASE;
            let param = match offset % 4 {
                0 => ThermistorParam::A,
                1 => ThermistorParam::B,
                2 => ThermistorParam::C,
                _ => ThermistorParam::Enabled,
            };
            return Some(CalibrationKey::Thermistor {
                sensor: offset / 4,
                param,
            });
        }

        None
    }

    /// Convert to wire format byte
    pub fn to_byte(self) -> u8 {
        match self {
            CalibrationKey::Axis { axis, param } => {
                let p = match param {
                    AxisParam::Acceleration => 0,
                    AxisParam::StartVelocity => 1,
                    AxisParam::HomeVelocity => 2,
                };
                KEY_AXIS_BASE + 4 * axis.to_byte() + p
            }
            CalibrationKey::Thermistor { sensor, param } => {
                let p = match param {
                    ThermistorParam::A => 0,
                    ThermistorParam::B => 1,
                    ThermistorParam::C => 2,
                    ThermistorParam::Enabled => 3,
                };
                KEY_THERMISTOR_BASE + 4 * sensor + p
            }
        }
    }

    /// True for keys whose value is a flag rather than a number
    pub fn is_flag(self) -> bool {
        matches!(
            self,
            CalibrationKey::Thermistor {
                param: ThermistorParam::Enabled,
                ..
            }
        )
    }
}
