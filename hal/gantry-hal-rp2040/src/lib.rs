//! RP2040 HAL for the gantry controller
//!
//! Implements the `gantry-hal` and `gantry-core` hardware contracts on the
//! RP2040:
//!
//! - PWM step generation, encoder counting and limit inputs per axis
//! - Buffered UART host link
//! - ADC thermistor bank
//! - Flash storage for the calibration image

#![no_std]

pub mod adc;
pub mod axis;
pub mod flash;
pub mod uart;

pub use adc::{AdcChannel, ThermistorBank};
pub use axis::{AxisInputs, AxisShared, PwmAxis};
pub use flash::{FlashError, FlashStorage};
pub use uart::UartLink;
