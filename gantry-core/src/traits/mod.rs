//! Hardware abstraction traits
//!
//! These traits define the interface between the motion engine and
//! controller and the board they run on.

pub mod axis;
pub mod thermal;

pub use axis::AxisDriver;
pub use thermal::{adc_to_resistance, read_all, steinhart_hart, SensorError, TemperatureProbe};
