//! Flash storage driver for RP2040
//!
//! Uses sequential-storage for wear-leveled key-value storage
//! in the last 64KB of flash. The calibration image is the only item.

use embassy_rp::dma::Channel;
use embassy_rp::flash::{Async, Flash};
use embassy_rp::peripherals::FLASH;
use embassy_rp::Peri;
use sequential_storage::cache::NoCache;
use sequential_storage::map::{self, SerializationError};

use gantry_core::config::{Calibration, CalibrationImage, ImageError, MAX_IMAGE_SIZE};

/// Flash storage configuration
pub const FLASH_SIZE: usize = 2 * 1024 * 1024; // 2MB on the Pico
pub const CONFIG_PARTITION_SIZE: usize = 64 * 1024;
pub const CONFIG_PARTITION_START: usize = FLASH_SIZE - CONFIG_PARTITION_SIZE;

/// Flash range for the config partition
pub const CONFIG_RANGE: core::ops::Range<u32> =
    (CONFIG_PARTITION_START as u32)..(FLASH_SIZE as u32);

/// Scratch buffer for sequential-storage: key, item header and image
const DATA_BUFFER_SIZE: usize = MAX_IMAGE_SIZE + 32;

/// Storage keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StorageKey {
    /// Calibration image (postcard, with magic/version/CRC)
    Calibration = 0,
}

impl sequential_storage::map::Key for StorageKey {
    fn serialize_into(&self, buffer: &mut [u8]) -> Result<usize, SerializationError> {
        let slot = buffer.first_mut().ok_or(SerializationError::BufferTooSmall)?;
        *slot = *self as u8;
        Ok(1)
    }

    fn deserialize_from(buffer: &[u8]) -> Result<(Self, usize), SerializationError> {
        match buffer.first() {
            Some(0) => Ok((StorageKey::Calibration, 1)),
            Some(_) => Err(SerializationError::InvalidFormat),
            None => Err(SerializationError::BufferTooSmall),
        }
    }
}

/// Errors from flash operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashError {
    /// sequential-storage reported an error
    Storage,
    /// Key not present
    NotFound,
    /// Stored image is invalid
    Image(ImageError),
}

impl From<ImageError> for FlashError {
    fn from(e: ImageError) -> Self {
        FlashError::Image(e)
    }
}

/// RP2040 flash storage
pub struct FlashStorage<'d> {
    flash: Flash<'d, FLASH, Async, FLASH_SIZE>,
}

impl<'d> FlashStorage<'d> {
    /// Create a new flash storage instance
    pub fn new(flash: Peri<'d, FLASH>, dma: Peri<'d, impl Channel>) -> Self {
        Self {
            flash: Flash::new(flash, dma),
        }
    }

    /// Load and validate the stored calibration
    pub async fn load_calibration(&mut self) -> Result<Calibration, FlashError> {
        let mut data_buffer = [0u8; DATA_BUFFER_SIZE];

        let item = map::fetch_item::<StorageKey, &[u8], _>(
            &mut self.flash,
            CONFIG_RANGE,
            &mut NoCache::new(),
            &mut data_buffer,
            &StorageKey::Calibration,
        )
        .await
        .map_err(|_| FlashError::Storage)?
        .ok_or(FlashError::NotFound)?;

        Ok(CalibrationImage::decode(item)?)
    }

    /// Store the calibration as a new image
    pub async fn save_calibration(&mut self, calibration: &Calibration) -> Result<(), FlashError> {
        let mut image_buffer = [0u8; MAX_IMAGE_SIZE];
        let image = CalibrationImage::new(*calibration).encode(&mut image_buffer)?;

        let mut data_buffer = [0u8; DATA_BUFFER_SIZE];
        map::store_item(
            &mut self.flash,
            CONFIG_RANGE,
            &mut NoCache::new(),
            &mut data_buffer,
            &StorageKey::Calibration,
            &&*image,
        )
        .await
        .map_err(|_| FlashError::Storage)
    }
}
