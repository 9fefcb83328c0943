//! Device status machine
//!
//! The status is explicit, finite and deterministic. Side effects of a
//! transition (starting the retract, zeroing encoders) belong to the
//! controller.

pub mod events;
pub mod machine;

pub use events::{Event, LimitSummary};
pub use machine::{FaultKind, HomingPhase, Status};
