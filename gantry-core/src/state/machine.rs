//! Status machine definition
//!
//! The device status is a function of the previous status and an event.

use gantry_protocol::StatusCode;

use super::events::Event;

/// Device status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Status {
    /// No motion in progress
    #[default]
    Idle,
    /// Homing sequence running
    Homing(HomingPhase),
    /// At least one host-commanded move running
    Moving,
    /// Motion ended on an unexpected condition; cleared by `stop`
    Fault(FaultKind),
}

/// Phases of the homing sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HomingPhase {
    /// Driving both axes toward their home switches
    Seek,
    /// Backing off until the home switches release
    Retract,
}

/// Types of faults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FaultKind {
    /// A move ended with a limit switch pressed
    UnexpectedLimit,
    /// Home switches were not in the expected state
    Homing,
}

impl Status {
    /// Wire representation
    pub fn to_code(self) -> StatusCode {
        match self {
            Status::Idle => StatusCode::Idle,
            Status::Homing(_) => StatusCode::Homing,
            Status::Moving => StatusCode::Moving,
            Status::Fault(_) => StatusCode::Fault,
        }
    }

    /// Check if a host `move` may start
    pub fn accepts_move(&self) -> bool {
        matches!(self, Status::Idle | Status::Moving)
    }

    /// Check if this is a fault status
    pub fn is_fault(&self) -> bool {
        matches!(self, Status::Fault(_))
    }

    /// Process an event and return the next status
    pub fn transition(self, event: Event) -> Self {
        use Event::*;
        use Status::*;

        match (self, event) {
            (_, StopRequested) => Idle,

            (Idle | Moving, MoveAccepted) => Moving,
            (Idle, HomeRequested) => Homing(HomingPhase::Seek),

            (Moving, Settled(limits)) if limits.any_limit => Fault(FaultKind::UnexpectedLimit),
            (Moving, Settled(_)) => Idle,

            (Homing(HomingPhase::Seek), Settled(limits)) if limits.all_home => {
                Homing(HomingPhase::Retract)
            }
            (Homing(HomingPhase::Seek), Settled(_)) => Fault(FaultKind::Homing),

            (Homing(HomingPhase::Retract), Settled(limits)) if limits.any_home => {
                Fault(FaultKind::Homing)
            }
            (Homing(HomingPhase::Retract), Settled(_)) => Idle,

            // Default: stay in current status
            _ => self,
        }
    }
}
