//! Motion control
//!
//! - [`profile`] - Trapezoidal segment planning
//! - [`axis`] - Per-axis closed-loop engine
//! - [`event`] - Interrupt-side events feeding the engine

pub mod axis;
pub mod event;
pub mod profile;

pub use axis::{
    accel_tick_period_us, Axis, AxisState, LimitEdge, LimitSwitch, StartError,
    LIMIT_DEBOUNCE_MS, MAX_STEP_RATE,
};
pub use event::{AxisEvent, AxisEventQueue};
pub use profile::{generate_profile, AxisMotionSpec, ProfileError, VelocityProfile};
