//! Runtime calibration
//!
//! Per-axis motion parameters and per-channel thermistor constants. Values
//! are addressed by [`CalibrationKey`] both on the wire and in the
//! calibration store.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use gantry_hal::{CalibrationStore, Scalar, StoreError};
use gantry_protocol::{AxisId, AxisParam, CalibrationKey, ThermistorParam, TEMPERATURE_CHANNELS};

/// Default acceleration in counts/s²
pub const DEFAULT_ACCELERATION: u32 = 10;

/// Default start velocity in counts/s
pub const DEFAULT_START_VELOCITY: u32 = 50;

/// Default homing velocity in counts/s
pub const DEFAULT_HOME_VELOCITY: u32 = 200;

/// Steinhart-Hart defaults for a 100k NTC
pub const DEFAULT_THERMISTOR: ThermistorCalibration = ThermistorCalibration {
    a: 7.22e-4,
    b: 2.17e-4,
    c: 8.9e-8,
    enabled: false,
};

/// Errors when applying a calibration value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationError {
    /// Value is NaN, negative or too large for the parameter
    OutOfRange,
}

impl core::fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CalibrationError::OutOfRange => write!(f, "calibration value out of range"),
        }
    }
}

/// Motion parameters of one axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AxisCalibration {
    pub acceleration: u32,
    pub start_velocity: u32,
    pub home_velocity: u32,
}

impl Default for AxisCalibration {
    fn default() -> Self {
        Self {
            acceleration: DEFAULT_ACCELERATION,
            start_velocity: DEFAULT_START_VELOCITY,
            home_velocity: DEFAULT_HOME_VELOCITY,
        }
    }
}

/// Steinhart-Hart constants and enable flag of one channel
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ThermistorCalibration {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub enabled: bool,
}

impl Default for ThermistorCalibration {
    fn default() -> Self {
        DEFAULT_THERMISTOR
    }
}

/// Complete runtime calibration
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Calibration {
    pub axes: [AxisCalibration; 2],
    pub thermistors: [ThermistorCalibration; TEMPERATURE_CHANNELS],
}

fn to_count_rate(value: f32) -> Result<u32, CalibrationError> {
    if !value.is_finite() || value < 0.0 || value > u32::MAX as f32 {
        return Err(CalibrationError::OutOfRange);
    }
    Ok(value as u32)
}

impl Calibration {
    /// Calibration of one axis
    pub fn axis(&self, axis: AxisId) -> &AxisCalibration {
        &self.axes[axis.index()]
    }

    /// Every key this calibration answers to
    pub fn keys() -> impl Iterator<Item = CalibrationKey> {
        let axis_keys = AxisId::ALL.into_iter().flat_map(|axis| {
            [
                AxisParam::Acceleration,
                AxisParam::StartVelocity,
                AxisParam::HomeVelocity,
            ]
            .into_iter()
            .map(move |param| CalibrationKey::Axis { axis, param })
        });
        let thermistor_keys = (0..TEMPERATURE_CHANNELS as u8).flat_map(|sensor| {
            [
                ThermistorParam::A,
                ThermistorParam::B,
                ThermistorParam::C,
                ThermistorParam::Enabled,
            ]
            .into_iter()
            .map(move |param| CalibrationKey::Thermistor { sensor, param })
        });
        axis_keys.chain(thermistor_keys)
    }

    /// Current value for a key
    pub fn get(&self, key: CalibrationKey) -> Scalar {
        match key {
            CalibrationKey::Axis { axis, param } => {
                let a = self.axis(axis);
                let v = match param {
                    AxisParam::Acceleration => a.acceleration,
                    AxisParam::StartVelocity => a.start_velocity,
                    AxisParam::HomeVelocity => a.home_velocity,
                };
                Scalar::Float(v as f32)
            }
            CalibrationKey::Thermistor { sensor, param } => {
                let t = &self.thermistors[sensor as usize];
                match param {
                    ThermistorParam::A => Scalar::Float(t.a),
                    ThermistorParam::B => Scalar::Float(t.b),
                    ThermistorParam::C => Scalar::Float(t.c),
                    ThermistorParam::Enabled => Scalar::Bool(t.enabled),
                }
            }
        }
    }

    /// Update one value
    pub fn apply(&mut self, key: CalibrationKey, value: Scalar) -> Result<(), CalibrationError> {
        match key {
            CalibrationKey::Axis { axis, param } => {
                let v = to_count_rate(value.as_f32())?;
                let a = &mut self.axes[axis.index()];
                match param {
                    AxisParam::Acceleration => a.acceleration = v,
                    AxisParam::StartVelocity => a.start_velocity = v,
                    AxisParam::HomeVelocity => a.home_velocity = v,
                }
            }
            CalibrationKey::Thermistor { sensor, param } => {
                let t = self
                    .thermistors
                    .get_mut(sensor as usize)
                    .ok_or(CalibrationError::OutOfRange)?;
                match param {
                    ThermistorParam::Enabled => t.enabled = value.as_bool(),
                    coefficient => {
                        let v = value.as_f32();
                        if !v.is_finite() {
                            return Err(CalibrationError::OutOfRange);
                        }
                        match coefficient {
                            ThermistorParam::A => t.a = v,
                            ThermistorParam::B => t.b = v,
                            _ => t.c = v,
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Defaults overlaid with every value present in `store`
    ///
    /// Missing keys keep their default. Values the calibration rejects are
    /// skipped.
    pub fn load<S: CalibrationStore>(store: &mut S) -> Result<Self, StoreError> {
        let mut calibration = Self::default();
        for key in Self::keys() {
            match store.read(key.to_byte()) {
                Ok(value) => {
                    let _ = calibration.apply(key, value);
                }
                Err(StoreError::NotFound) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(calibration)
    }

    /// Write every value to `store`
    pub fn save<S: CalibrationStore>(&self, store: &mut S) -> Result<(), StoreError> {
        for key in Self::keys() {
            store.write(key.to_byte(), self.get(key))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_hal::MemoryStore;

    const KEY_COUNT: usize = 2 * 3 + TEMPERATURE_CHANNELS * 4;

    #[test]
    fn test_defaults() {
        let cal = Calibration::default();
        assert_eq!(cal.axis(AxisId::X).acceleration, DEFAULT_ACCELERATION);
        assert_eq!(cal.axis(AxisId::Y).home_velocity, DEFAULT_HOME_VELOCITY);
        assert!(!cal.thermistors[0].enabled);
    }

    #[test]
    fn test_key_count() {
        assert_eq!(Calibration::keys().count(), KEY_COUNT);
    }

    #[test]
    fn test_apply_axis_value() {
        let mut cal = Calibration::default();
        let key = CalibrationKey::Axis {
            axis: AxisId::Y,
            param: AxisParam::StartVelocity,
        };
        cal.apply(key, Scalar::Float(490.0)).unwrap();
        assert_eq!(cal.axis(AxisId::Y).start_velocity, 490);
        assert_eq!(cal.get(key), Scalar::Float(490.0));
    }

    #[test]
    fn test_apply_rejects_bad_rates() {
        let mut cal = Calibration::default();
        let key = CalibrationKey::Axis {
            axis: AxisId::X,
            param: AxisParam::Acceleration,
        };
        assert_eq!(
            cal.apply(key, Scalar::Float(-1.0)),
            Err(CalibrationError::OutOfRange)
        );
        assert_eq!(
            cal.apply(key, Scalar::Float(f32::NAN)),
            Err(CalibrationError::OutOfRange)
        );
        assert_eq!(cal.axis(AxisId::X).acceleration, DEFAULT_ACCELERATION);
    }

    #[test]
    fn test_enable_flag_from_float() {
        let mut cal = Calibration::default();
        let key = CalibrationKey::Thermistor {
            sensor: 2,
            param: ThermistorParam::Enabled,
        };
        cal.apply(key, Scalar::Float(1.0)).unwrap();
        assert!(cal.thermistors[2].enabled);
        assert_eq!(cal.get(key), Scalar::Bool(true));
    }

    #[test]
    fn test_save_then_load() {
        let mut cal = Calibration::default();
        cal.axes[0].acceleration = 25;
        cal.thermistors[4].b = 3.0e-4;
        cal.thermistors[4].enabled = true;

        let mut store = MemoryStore::<KEY_COUNT>::new();
        cal.save(&mut store).unwrap();
        assert_eq!(store.len(), KEY_COUNT);

        assert_eq!(Calibration::load(&mut store).unwrap(), cal);
    }

    #[test]
    fn test_load_missing_keys_keeps_defaults() {
        let mut store = MemoryStore::<4>::new();
        store.write(0x15, Scalar::Float(75.0)).unwrap(); // Y start velocity

        let cal = Calibration::load(&mut store).unwrap();
        assert_eq!(cal.axis(AxisId::Y).start_velocity, 75);
        assert_eq!(cal.axis(AxisId::X), &AxisCalibration::default());
    }

    #[test]
    fn test_save_into_small_store_fails() {
        let mut store = MemoryStore::<3>::new();
        assert_eq!(
            Calibration::default().save(&mut store),
            Err(StoreError::Full)
        );
    }
}
