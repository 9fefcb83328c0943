//! Axis input sampling
//!
//! Polls encoder counters, limit switches and the acceleration clocks of
//! both axes and queues the resulting events for the control task.

use defmt::*;
use embassy_time::{Duration, Instant, Ticker};
use heapless::spsc::Producer;

use gantry_core::motion::AxisEvent;
use gantry_hal_rp2040::AxisInputs;

use crate::channels::EVENT_QUEUE_SIZE;

/// Sampling period; keeps a 50 kHz encoder within the queue
const SAMPLE_PERIOD: Duration = Duration::from_micros(250);

#[embassy_executor::task]
pub async fn sampler_task(
    mut inputs: [AxisInputs<'static>; 2],
    mut events: Producer<'static, AxisEvent, EVENT_QUEUE_SIZE>,
) {
    info!("Sampler task started");

    let mut ticker = Ticker::every(SAMPLE_PERIOD);
    loop {
        let now = Instant::now();
        for axis in inputs.iter_mut() {
            axis.sample(now, &mut events);
        }
        ticker.next().await;
    }
}
