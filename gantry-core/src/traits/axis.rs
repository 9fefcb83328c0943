//! Axis hardware driver trait

use gantry_hal::IrqControl;
use gantry_protocol::Direction;

/// Outputs and inputs of one axis
///
/// Implementations drive the direction pin, the step-rate timer that
/// clocks the motor driver, and the periodic acceleration timer, and
/// report the raw level of both limit switches. Interrupt masking comes
/// from the [`IrqControl`] supertrait.
pub trait AxisDriver: IrqControl {
    /// Set the direction output
    fn set_direction(&mut self, direction: Direction);

    /// Start generating steps at `rate` steps per second
    fn start_step_timer(&mut self, rate: u32);

    /// Change the step rate of a running step timer
    fn set_step_rate(&mut self, rate: u32);

    /// Stop generating steps
    fn stop_step_timer(&mut self);

    /// Start the acceleration tick timer with the given period
    fn start_accel_timer(&mut self, period_us: u32);

    /// Stop the acceleration tick timer
    fn stop_accel_timer(&mut self);

    /// Raw level of the home switch
    fn home_pressed(&self) -> bool;

    /// Raw level of the far switch
    fn far_pressed(&self) -> bool;
}
