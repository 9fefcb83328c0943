//! Embassy async tasks
//!
//! Each task runs independently and communicates via channels/signals.

pub mod calibration;
pub mod control;
pub mod sampler;

pub use calibration::calibration_task;
pub use control::{control_task, GantryController};
pub use sampler::sampler_task;
