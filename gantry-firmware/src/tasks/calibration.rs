//! Calibration persistence task
//!
//! Owns the flash storage and writes the calibration image whenever the
//! control task signals a change, so flash erases never stall the control
//! loop.

use defmt::*;

use gantry_hal_rp2040::FlashStorage;

use crate::channels::CALIBRATION_SAVE;

#[embassy_executor::task]
pub async fn calibration_task(mut storage: FlashStorage<'static>) {
    info!("Calibration task started");

    loop {
        let calibration = CALIBRATION_SAVE.wait().await;

        match storage.save_calibration(&calibration).await {
            Ok(()) => info!("Calibration saved"),
            Err(e) => error!("Failed to save calibration: {:?}", e),
        }
    }
}
