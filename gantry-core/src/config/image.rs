//! Flash image of the calibration
//!
//! The calibration is stored as postcard binary data behind a magic
//! number, a format version and a CRC32 over the calibration bytes.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::calibration::Calibration;

/// Magic number to identify valid calibration data
pub const IMAGE_MAGIC: u32 = 0x4741_4E54; // "GANT"

/// Current image format version
pub const IMAGE_VERSION: u8 = 1;

/// Upper bound of an encoded image
pub const MAX_IMAGE_SIZE: usize = 256;

/// Errors from image encoding and validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ImageError {
    /// Serialization failed or the buffer is too small
    Encode,
    /// Bytes do not deserialize to an image
    Decode,
    BadMagic,
    UnsupportedVersion(u8),
    CrcMismatch,
}

impl core::fmt::Display for ImageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ImageError::Encode => write!(f, "calibration image encode failed"),
            ImageError::Decode => write!(f, "calibration image decode failed"),
            ImageError::BadMagic => write!(f, "calibration image magic mismatch"),
            ImageError::UnsupportedVersion(v) => {
                write!(f, "unsupported calibration image version {}", v)
            }
            ImageError::CrcMismatch => write!(f, "calibration image CRC mismatch"),
        }
    }
}

/// Calibration with a validation header
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CalibrationImage {
    pub magic: u32,
    pub version: u8,
    pub calibration: Calibration,
    /// CRC32 over the calibration fields
    pub crc: u32,
}

impl CalibrationImage {
    /// Wrap a calibration, computing its CRC
    pub fn new(calibration: Calibration) -> Self {
        Self {
            magic: IMAGE_MAGIC,
            version: IMAGE_VERSION,
            crc: calculate_crc(&calibration),
            calibration,
        }
    }

    /// Check magic, version and CRC
    pub fn validate(&self) -> Result<(), ImageError> {
        if self.magic != IMAGE_MAGIC {
            return Err(ImageError::BadMagic);
        }
        if self.version != IMAGE_VERSION {
            return Err(ImageError::UnsupportedVersion(self.version));
        }
        if self.crc != calculate_crc(&self.calibration) {
            return Err(ImageError::CrcMismatch);
        }
        Ok(())
    }
}

#[cfg(feature = "serde")]
impl CalibrationImage {
    /// Serialize into `buf`, returning the used prefix
    pub fn encode<'a>(&self, buf: &'a mut [u8]) -> Result<&'a mut [u8], ImageError> {
        postcard::to_slice(self, buf).map_err(|_| ImageError::Encode)
    }

    /// Deserialize and validate an image, returning its calibration
    pub fn decode(bytes: &[u8]) -> Result<Calibration, ImageError> {
        let image: CalibrationImage =
            postcard::from_bytes(bytes).map_err(|_| ImageError::Decode)?;
        image.validate()?;
        Ok(image.calibration)
    }
}

/// CRC32 over the little-endian bytes of every calibration field
pub fn calculate_crc(calibration: &Calibration) -> u32 {
    let mut crc: u32 = 0xFFFF_FFFF;

    for axis in &calibration.axes {
        crc = crc32_update(crc, &axis.acceleration.to_le_bytes());
        crc = crc32_update(crc, &axis.start_velocity.to_le_bytes());
        crc = crc32_update(crc, &axis.home_velocity.to_le_bytes());
    }

    for t in &calibration.thermistors {
        crc = crc32_update(crc, &t.a.to_le_bytes());
        crc = crc32_update(crc, &t.b.to_le_bytes());
        crc = crc32_update(crc, &t.c.to_le_bytes());
        crc = crc32_update(crc, &[t.enabled as u8]);
    }

    !crc
}

/// CRC32 update (IEEE 802.3 polynomial, reflected)
fn crc32_update(mut crc: u32, data: &[u8]) -> u32 {
    const POLY: u32 = 0xEDB8_8320;

    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ POLY } else { crc >> 1 };
        }
    }

    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_check_value() {
        // Standard CRC-32 check value for "123456789"
        assert_eq!(!crc32_update(0xFFFF_FFFF, b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_new_image_validates() {
        let image = CalibrationImage::new(Calibration::default());
        assert_eq!(image.validate(), Ok(()));
    }

    #[test]
    fn test_modified_image_fails_crc() {
        let mut image = CalibrationImage::new(Calibration::default());
        image.calibration.axes[1].home_velocity = 999;
        assert_eq!(image.validate(), Err(ImageError::CrcMismatch));
    }

    #[test]
    fn test_header_checks() {
        let mut image = CalibrationImage::new(Calibration::default());
        image.version = 7;
        assert_eq!(image.validate(), Err(ImageError::UnsupportedVersion(7)));

        image.magic = 0;
        assert_eq!(image.validate(), Err(ImageError::BadMagic));
    }
}
