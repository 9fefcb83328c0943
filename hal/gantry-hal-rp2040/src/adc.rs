//! Temperature channels on the RP2040 ADC
//!
//! RP2040 has a single ADC with 5 channels:
//! - ADC0: GPIO26
//! - ADC1: GPIO27
//! - ADC2: GPIO28
//! - ADC3: GPIO29
//! - ADC4: Internal temperature sensor
//!
//! Sensor `n` of the wire protocol is ADC channel `n`. Channels 0-3 read
//! NTC thermistors behind a pull-up divider; channel 4 reads the die.

use embassy_rp::adc::{Adc, Blocking, Channel};

use gantry_core::config::ThermistorCalibration;
use gantry_core::traits::{adc_to_resistance, steinhart_hart, SensorError, TemperatureProbe};

/// Full scale of the 12-bit converter
pub const ADC_MAX: u16 = 4096;

/// Divider pull-up on the thermistor inputs
pub const DEFAULT_PULLUP_OHMS: u32 = 4700;

const VREF: f32 = 3.3;

/// ADC channel identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdcChannel {
    /// ADC0 on GPIO26
    Adc0,
    /// ADC1 on GPIO27
    Adc1,
    /// ADC2 on GPIO28
    Adc2,
    /// ADC3 on GPIO29
    Adc3,
    /// Internal temperature sensor
    Temperature,
}

impl AdcChannel {
    /// Channel serving a wire sensor index
    pub fn from_sensor(sensor: u8) -> Option<Self> {
        match sensor {
            0 => Some(AdcChannel::Adc0),
            1 => Some(AdcChannel::Adc1),
            2 => Some(AdcChannel::Adc2),
            3 => Some(AdcChannel::Adc3),
            4 => Some(AdcChannel::Temperature),
            _ => None,
        }
    }

    /// Get the GPIO pin for this ADC channel
    pub fn gpio(&self) -> Option<u8> {
        match self {
            AdcChannel::Adc0 => Some(26),
            AdcChannel::Adc1 => Some(27),
            AdcChannel::Adc2 => Some(28),
            AdcChannel::Adc3 => Some(29),
            AdcChannel::Temperature => None,
        }
    }
}

/// Die temperature from a raw ADC4 reading (RP2040 datasheet formula)
pub fn die_temperature(raw: u16) -> f32 {
    let volts = raw as f32 * VREF / ADC_MAX as f32;
    27.0 - (volts - 0.706) / 0.001_721
}

/// Four thermistor inputs plus the die sensor
pub struct ThermistorBank<'d> {
    adc: Adc<'d, Blocking>,
    thermistors: [Channel<'d>; 4],
    die: Channel<'d>,
    pullup_ohms: u32,
}

impl<'d> ThermistorBank<'d> {
    /// `thermistors` must be ADC0..ADC3 in order
    pub fn new(adc: Adc<'d, Blocking>, thermistors: [Channel<'d>; 4], die: Channel<'d>) -> Self {
        Self {
            adc,
            thermistors,
            die,
            pullup_ohms: DEFAULT_PULLUP_OHMS,
        }
    }

    pub fn with_pullup(mut self, ohms: u32) -> Self {
        self.pullup_ohms = ohms;
        self
    }
}

impl TemperatureProbe for ThermistorBank<'_> {
    fn read(&mut self, sensor: u8, constants: &ThermistorCalibration) -> Result<f32, SensorError> {
        let channel = AdcChannel::from_sensor(sensor).ok_or(SensorError::NotFitted)?;
        let input = match channel {
            AdcChannel::Temperature => &mut self.die,
            other => &mut self.thermistors[other as usize],
        };
        let raw = self
            .adc
            .blocking_read(input)
            .map_err(|_| SensorError::ConversionError)?;

        match channel {
            AdcChannel::Temperature => Ok(die_temperature(raw)),
            _ => steinhart_hart(adc_to_resistance(raw, self.pullup_ohms, ADC_MAX)?, constants),
        }
    }
}
