//! Inter-task communication
//!
//! The sampler task feeds axis events to the control task through a
//! single-producer queue; the control task hands calibration changes to the
//! flash task through a signal.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use static_cell::StaticCell;

use gantry_core::config::Calibration;
use gantry_core::motion::AxisEventQueue;
use gantry_hal_rp2040::AxisShared;

/// Axis event queue length (one slot stays free)
pub const EVENT_QUEUE_SIZE: usize = 64;

/// Axis events from the sampler task to the control task
pub static AXIS_EVENTS: StaticCell<AxisEventQueue<EVENT_QUEUE_SIZE>> = StaticCell::new();

/// Interrupt masks, accel periods and switch levels of the X axis
pub static X_SHARED: AxisShared = AxisShared::new();

/// Interrupt masks, accel periods and switch levels of the Y axis
pub static Y_SHARED: AxisShared = AxisShared::new();

/// Calibration to persist (latest value wins)
pub static CALIBRATION_SAVE: Signal<CriticalSectionRawMutex, Calibration> = Signal::new();
