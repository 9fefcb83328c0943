//! Interrupt-side events
//!
//! Interrupt handlers do not touch axis state directly on the firmware;
//! they push [`AxisEvent`]s into a single-producer queue that the control
//! loop drains into the engine.

use gantry_protocol::AxisId;

pub use super::axis::LimitSwitch;

/// One hardware event for one axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AxisEvent {
    /// Encoder channel edge
    Encoder(AxisId),
    /// Acceleration timer expiry
    AccelTick(AxisId),
    /// Limit switch level change
    Limit {
        axis: AxisId,
        switch: LimitSwitch,
        pressed: bool,
        /// Millisecond timestamp of the edge
        at_ms: u32,
    },
}

impl AxisEvent {
    /// Axis this event belongs to
    pub fn axis(&self) -> AxisId {
        match *self {
            AxisEvent::Encoder(axis) | AxisEvent::AccelTick(axis) => axis,
            AxisEvent::Limit { axis, .. } => axis,
        }
    }
}

/// Queue between interrupt handlers and the control loop
///
/// Holds `N - 1` events.
pub type AxisEventQueue<const N: usize> = heapless::spsc::Queue<AxisEvent, N>;
