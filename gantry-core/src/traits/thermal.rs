//! Temperature probe trait

use crate::config::{Calibration, ThermistorCalibration};
use gantry_protocol::TEMPERATURE_CHANNELS;

/// Errors that can occur with temperature sensing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorError {
    /// Channel disabled in calibration
    Disabled,
    /// No sensor wired to this channel
    NotFitted,
    /// Sensor disconnected (open circuit)
    OpenCircuit,
    /// Sensor shorted to ground
    ShortCircuit,
    /// ADC conversion error
    ConversionError,
}

impl core::fmt::Display for SensorError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SensorError::Disabled => write!(f, "channel disabled"),
            SensorError::NotFitted => write!(f, "no sensor fitted"),
            SensorError::OpenCircuit => write!(f, "sensor open circuit"),
            SensorError::ShortCircuit => write!(f, "sensor short circuit"),
            SensorError::ConversionError => write!(f, "ADC conversion failed"),
        }
    }
}

/// Temperature channels
///
/// Takes `&mut self` because ADC reads typically require mutable access.
pub trait TemperatureProbe {
    /// Read one channel in degrees Celsius using its thermistor constants
    fn read(&mut self, sensor: u8, constants: &ThermistorCalibration) -> Result<f32, SensorError>;
}

/// Read every channel, reporting `NaN` for disabled or failed ones
pub fn read_all<P: TemperatureProbe>(
    probe: &mut P,
    calibration: &Calibration,
) -> [f32; TEMPERATURE_CHANNELS] {
    let mut values = [f32::NAN; TEMPERATURE_CHANNELS];
    for (sensor, (value, constants)) in values
        .iter_mut()
        .zip(calibration.thermistors.iter())
        .enumerate()
    {
        if !constants.enabled {
            continue;
        }
        if let Ok(celsius) = probe.read(sensor as u8, constants) {
            *value = celsius;
        }
    }
    values
}

/// Margin at both ends of the ADC range treated as a wiring fault
const ADC_FAULT_MARGIN: u16 = 10;

/// Thermistor resistance from a pull-up divider reading
///
/// Readings near full scale mean the thermistor is open; readings near
/// zero mean it is shorted.
pub fn adc_to_resistance(adc_value: u16, pullup_ohms: u32, adc_max: u16) -> Result<f32, SensorError> {
    if adc_value >= adc_max.saturating_sub(ADC_FAULT_MARGIN) {
        return Err(SensorError::OpenCircuit);
    }
    if adc_value < ADC_FAULT_MARGIN {
        return Err(SensorError::ShortCircuit);
    }
    // R = pullup * adc / (adc_max - adc)
    Ok(pullup_ohms as f32 * adc_value as f32 / (adc_max - adc_value) as f32)
}

/// Steinhart-Hart: `1/T = A + B ln R + C (ln R)³`, returned in °C
pub fn steinhart_hart(resistance: f32, constants: &ThermistorCalibration) -> Result<f32, SensorError> {
    if !(resistance > 0.0) {
        return Err(SensorError::ConversionError);
    }
    let ln_r = libm::logf(resistance);
    let inv_t = constants.a + constants.b * ln_r + constants.c * ln_r * ln_r * ln_r;
    if !(inv_t > 0.0) {
        return Err(SensorError::ConversionError);
    }
    Ok(1.0 / inv_t - 273.15)
}
