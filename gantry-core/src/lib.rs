//! Board-agnostic core logic for the gantry test stand
//!
//! This crate contains all application logic that does not depend on
//! specific hardware implementations:
//!
//! - Hardware abstraction traits (axis driver, temperature probe)
//! - Trapezoidal profile planning and the per-axis motion engine
//! - Device status machine (idle, homing, moving, fault)
//! - Controller dispatching host commands
//! - Calibration types and their persisted image

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod config;
pub mod controller;
pub mod motion;
pub mod state;
pub mod traits;

pub use controller::{
    AxisRegistry, Controller, Handled, MotionEnd, PollError, PollOutcome, Transition,
};
