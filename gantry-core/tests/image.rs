//! Postcard encoding of the calibration flash image

use gantry_core::config::{Calibration, CalibrationImage, ImageError, MAX_IMAGE_SIZE};

fn tuned() -> Calibration {
    let mut cal = Calibration::default();
    cal.axes[0].start_velocity = 490;
    cal.axes[1].acceleration = 40;
    cal.thermistors[2].enabled = true;
    cal.thermistors[2].c = 1.2e-7;
    cal
}

#[test]
fn image_fits_and_decodes() {
    let mut buf = [0u8; MAX_IMAGE_SIZE];
    let used = CalibrationImage::new(tuned()).encode(&mut buf).unwrap().len();
    assert!(used < MAX_IMAGE_SIZE);

    assert_eq!(CalibrationImage::decode(&buf[..used]), Ok(tuned()));
}

#[test]
fn tampered_image_rejected() {
    let mut image = CalibrationImage::new(tuned());
    image.calibration.axes[0].start_velocity = 491;

    let mut buf = [0u8; MAX_IMAGE_SIZE];
    let used = image.encode(&mut buf).unwrap().len();
    assert_eq!(
        CalibrationImage::decode(&buf[..used]),
        Err(ImageError::CrcMismatch)
    );
}

#[test]
fn erased_flash_rejected() {
    let erased = [0xFFu8; 64];
    assert!(CalibrationImage::decode(&erased).is_err());
    assert_eq!(CalibrationImage::decode(&[]), Err(ImageError::Decode));
}

#[test]
fn small_buffer_reports_encode_error() {
    let mut buf = [0u8; 8];
    assert_eq!(
        CalibrationImage::new(tuned()).encode(&mut buf).map(|b| b.len()),
        Err(ImageError::Encode)
    );
}
