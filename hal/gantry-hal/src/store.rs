//! Calibration store abstractions
//!
//! Calibration values are named scalars identified by a one-byte key.
//! Implementations may keep them in RAM, in flash, or in an external
//! parameter database; the controller only needs read, write and a
//! change notification.

/// A stored scalar value
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Scalar {
    /// Floating-point value
    Float(f32),
    /// Boolean flag
    Bool(bool),
}

impl Scalar {
    /// Interpret the value as a float (`true` = 1.0)
    pub fn as_f32(self) -> f32 {
        match self {
            Scalar::Float(v) => v,
            Scalar::Bool(true) => 1.0,
            Scalar::Bool(false) => 0.0,
        }
    }

    /// Interpret the value as a flag (non-zero = `true`)
    pub fn as_bool(self) -> bool {
        match self {
            Scalar::Float(v) => v != 0.0,
            Scalar::Bool(b) => b,
        }
    }
}

/// Errors from calibration store operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError {
    /// Key not present
    NotFound,
    /// No room for another key
    Full,
    /// Underlying storage failed
    Storage,
}

impl core::fmt::Display for StoreError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            StoreError::NotFound => write!(f, "calibration key not found"),
            StoreError::Full => write!(f, "calibration store full"),
            StoreError::Storage => write!(f, "calibration storage failure"),
        }
    }
}

/// Named scalar storage with change notification
pub trait CalibrationStore {
    /// Read a value by key
    fn read(&mut self, key: u8) -> Result<Scalar, StoreError>;

    /// Write a value by key
    fn write(&mut self, key: u8, value: Scalar) -> Result<(), StoreError>;

    /// Returns `true` once after any value changed since the last call
    fn take_changed(&mut self) -> bool;
}

/// Fixed-capacity in-memory calibration store
#[derive(Debug, Clone)]
pub struct MemoryStore<const N: usize> {
    slots: [Option<(u8, Scalar)>; N],
    changed: bool,
}

impl<const N: usize> Default for MemoryStore<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> MemoryStore<N> {
    /// Create an empty store
    pub const fn new() -> Self {
        Self {
            slots: [None; N],
            changed: false,
        }
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Check if the store holds no keys
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<const N: usize> CalibrationStore for MemoryStore<N> {
    fn read(&mut self, key: u8) -> Result<Scalar, StoreError> {
        self.slots
            .iter()
            .flatten()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
            .ok_or(StoreError::NotFound)
    }

    fn write(&mut self, key: u8, value: Scalar) -> Result<(), StoreError> {
        // Existing key first, then a free slot
        if let Some(slot) = self.slots.iter_mut().flatten().find(|(k, _)| *k == key) {
            if slot.1 != value {
                slot.1 = value;
                self.changed = true;
            }
            return Ok(());
        }

        let free = self
            .slots
            .iter_mut()
            .find(|s| s.is_none())
            .ok_or(StoreError::Full)?;
        *free = Some((key, value));
        self.changed = true;
        Ok(())
    }

    fn take_changed(&mut self) -> bool {
        core::mem::replace(&mut self.changed, false)
    }
}
