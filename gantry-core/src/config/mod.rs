//! Configuration types
//!
//! Runtime calibration and its persisted flash image.

pub mod calibration;
pub mod image;

pub use calibration::{
    AxisCalibration, Calibration, CalibrationError, ThermistorCalibration, DEFAULT_ACCELERATION,
    DEFAULT_HOME_VELOCITY, DEFAULT_START_VELOCITY, DEFAULT_THERMISTOR,
};
pub use image::{CalibrationImage, ImageError, IMAGE_MAGIC, IMAGE_VERSION, MAX_IMAGE_SIZE};
