//! Control loop
//!
//! Applies queued axis events, then polls the controller for host commands.
//! Every status change and handled command is logged. Polls never wait on
//! the host, so the sampler runs between every iteration.

use defmt::*;
use embassy_futures::yield_now;
use embassy_time::Instant;
use heapless::spsc::Consumer;

use gantry_core::motion::AxisEvent;
use gantry_core::{Controller, MotionEnd, PollOutcome};
use gantry_hal::MemoryStore;
use gantry_hal_rp2040::{PwmAxis, ThermistorBank, UartLink};

use crate::channels::{CALIBRATION_SAVE, EVENT_QUEUE_SIZE};

/// Room for every calibration key
pub const STORE_SLOTS: usize = 32;

pub type GantryController = Controller<
    UartLink,
    PwmAxis<'static>,
    ThermistorBank<'static>,
    MemoryStore<STORE_SLOTS>,
>;

#[embassy_executor::task]
pub async fn control_task(
    mut controller: GantryController,
    mut events: Consumer<'static, AxisEvent, EVENT_QUEUE_SIZE>,
) {
    info!("Control task started");

    loop {
        controller.drain_events(&mut events, log_end);
        controller.recheck_switches(Instant::now().as_millis() as u32, log_end);

        match controller.poll() {
            Ok(outcome) => report(&controller, &outcome),
            Err(e) => {
                if e.error.is_timeout() {
                    // Host went quiet after our last reply
                    warn!("Host did not acknowledge");
                } else {
                    error!("Link error: {}", e.error);
                }
                report(&controller, &e.outcome);
            }
        }

        yield_now().await;
    }
}

fn log_end(end: MotionEnd) {
    match end {
        MotionEnd::Completed(axis) => info!("Axis {} reached target", axis),
        MotionEnd::Limit(axis, switch) => warn!("Axis {} stopped by {} switch", axis, switch),
    }
}

fn report(controller: &GantryController, outcome: &PollOutcome) {
    if *outcome == PollOutcome::default() {
        return;
    }
    if outcome.reloaded {
        info!("Calibration changed");
        CALIBRATION_SAVE.signal(*controller.calibration());
    }
    if let Some(transition) = outcome.settled {
        if transition.to.is_fault() {
            warn!("Settled into fault: {} -> {}", transition.from, transition.to);
        } else {
            info!("Settled: {} -> {}", transition.from, transition.to);
        }
    }
    if let Some(transition) = outcome.commanded {
        info!("Status: {} -> {}", transition.from, transition.to);
    }
    if let Some(handled) = outcome.handled {
        debug!("Handled {}", handled);
    }
    if let Some(e) = outcome.store_error {
        warn!("Calibration store write failed: {}", e);
    }
}
