//! Axis hardware on the RP2040
//!
//! Each axis uses two PWM slices: one generates the step clock on its A
//! output, the other counts encoder edges on its B input. The limit
//! switches are active-low GPIO inputs.
//!
//! The engine runs in the control task. [`AxisInputs`] samples the
//! counters, the switches and the acceleration period and turns them into
//! [`AxisEvent`]s for the control task to drain. [`PwmAxis`] is the
//! engine's [`AxisDriver`]. The two halves share an [`AxisShared`].

use embassy_rp::clocks::clk_sys_freq;
use embassy_rp::gpio::{Input, Output};
use embassy_rp::pwm::{Config as PwmConfig, Pwm};
use embassy_time::{Duration, Instant};
use fixed::types::U12F4;
use heapless::spsc::Producer;
use portable_atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use gantry_core::motion::{AxisEvent, LimitSwitch, MAX_STEP_RATE};
use gantry_core::traits::AxisDriver;
use gantry_hal::{IrqControl, IrqSource};
use gantry_protocol::{AxisId, Direction};

/// State shared between the driver and the input sampler of one axis
pub struct AxisShared {
    mask: AtomicU8,
    accel_period_us: AtomicU32,
    home: AtomicBool,
    far: AtomicBool,
}

impl Default for AxisShared {
    fn default() -> Self {
        Self::new()
    }
}

impl AxisShared {
    pub const fn new() -> Self {
        Self {
            mask: AtomicU8::new(0),
            accel_period_us: AtomicU32::new(0),
            home: AtomicBool::new(false),
            far: AtomicBool::new(false),
        }
    }

    fn is_masked(&self, source: IrqSource) -> bool {
        self.mask.load(Ordering::Acquire) & source.bit() != 0
    }
}

/// Divider and TOP giving `rate` Hz from `clk` Hz
///
/// Rates below what a /255 divider can reach are raised to that floor.
pub fn pwm_timing(clk: u32, rate: u32) -> (u8, u16) {
    let rate = rate.clamp(1, MAX_STEP_RATE) as u64;
    let clk = clk as u64;
    let div = clk.div_ceil(rate * 65_536).clamp(1, 255);
    let top = (clk / (div * rate)).saturating_sub(1).min(u16::MAX as u64);
    (div as u8, top as u16)
}

/// Step generator, direction output and switch levels of one axis
pub struct PwmAxis<'d> {
    step: Pwm<'d>,
    dir: Output<'d>,
    shared: &'d AxisShared,
    config: PwmConfig,
}

impl<'d> PwmAxis<'d> {
    pub fn new(step: Pwm<'d>, dir: Output<'d>, shared: &'d AxisShared) -> Self {
        let mut axis = Self {
            step,
            dir,
            shared,
            config: PwmConfig::default(),
        };
        axis.stop_step_timer();
        axis
    }

    fn program(&mut self, rate: u32) {
        let (div, top) = pwm_timing(clk_sys_freq(), rate);
        self.config.divider = U12F4::from_num(div);
        self.config.top = top;
        self.config.compare_a = top / 2;
        self.config.enable = true;
        self.step.set_config(&self.config);
    }
}

impl IrqControl for PwmAxis<'_> {
    fn disable_irq(&mut self, source: IrqSource) {
        self.shared.mask.fetch_or(source.bit(), Ordering::AcqRel);
    }

    fn enable_irq(&mut self, source: IrqSource) {
        self.shared.mask.fetch_and(!source.bit(), Ordering::AcqRel);
    }
}

impl AxisDriver for PwmAxis<'_> {
    fn set_direction(&mut self, direction: Direction) {
        match direction {
            Direction::Positive => self.dir.set_high(),
            Direction::Negative => self.dir.set_low(),
        }
    }

    fn start_step_timer(&mut self, rate: u32) {
        self.program(rate);
    }

    fn set_step_rate(&mut self, rate: u32) {
        self.program(rate);
    }

    fn stop_step_timer(&mut self) {
        self.config.enable = false;
        self.config.compare_a = 0;
        self.step.set_config(&self.config);
    }

    fn start_accel_timer(&mut self, period_us: u32) {
        self.shared
            .accel_period_us
            .store(period_us.max(1), Ordering::Release);
    }

    fn stop_accel_timer(&mut self) {
        self.shared.accel_period_us.store(0, Ordering::Release);
    }

    fn home_pressed(&self) -> bool {
        self.shared.home.load(Ordering::Acquire)
    }

    fn far_pressed(&self) -> bool {
        self.shared.far.load(Ordering::Acquire)
    }
}

/// Encoder counter, switches and acceleration clock of one axis
pub struct AxisInputs<'d> {
    id: AxisId,
    encoder: Pwm<'d>,
    home: Input<'d>,
    far: Input<'d>,
    shared: &'d AxisShared,
    last_count: u16,
    /// Counted edges not yet queued
    pending: u32,
    next_accel: Option<Instant>,
    home_level: bool,
    far_level: bool,
}

impl<'d> AxisInputs<'d> {
    /// Publish the current switch levels and start counting from here
    pub fn new(
        id: AxisId,
        encoder: Pwm<'d>,
        home: Input<'d>,
        far: Input<'d>,
        shared: &'d AxisShared,
    ) -> Self {
        let home_level = home.is_low();
        let far_level = far.is_low();
        shared.home.store(home_level, Ordering::Release);
        shared.far.store(far_level, Ordering::Release);
        Self {
            id,
            last_count: encoder.counter(),
            encoder,
            home,
            far,
            shared,
            pending: 0,
            next_accel: None,
            home_level,
            far_level,
        }
    }

    /// Queue every event since the last sample
    ///
    /// Sources masked by the driver are deferred to a later sample, as are
    /// events that do not fit in the queue.
    pub fn sample<const N: usize>(&mut self, now: Instant, events: &mut Producer<'_, AxisEvent, N>) {
        let count = self.encoder.counter();
        self.pending += count.wrapping_sub(self.last_count) as u32;
        self.last_count = count;
        if !self.shared.is_masked(IrqSource::Encoder) {
            while self.pending > 0 && events.enqueue(AxisEvent::Encoder(self.id)).is_ok() {
                self.pending -= 1;
            }
        }

        self.sample_accel(now, events);

        let home = self.home.is_low();
        self.shared.home.store(home, Ordering::Release);
        if home != self.home_level
            && !self.shared.is_masked(IrqSource::HomeSwitch)
            && events.enqueue(self.edge(LimitSwitch::Home, home, now)).is_ok()
        {
            self.home_level = home;
        }

        let far = self.far.is_low();
        self.shared.far.store(far, Ordering::Release);
        if far != self.far_level
            && !self.shared.is_masked(IrqSource::FarSwitch)
            && events.enqueue(self.edge(LimitSwitch::Far, far, now)).is_ok()
        {
            self.far_level = far;
        }
    }

    fn sample_accel<const N: usize>(&mut self, now: Instant, events: &mut Producer<'_, AxisEvent, N>) {
        let period = self.shared.accel_period_us.load(Ordering::Acquire);
        if period == 0 {
            self.next_accel = None;
            return;
        }
        let period = Duration::from_micros(period as u64);
        let next = self.next_accel.get_or_insert(now + period);
        if self.shared.is_masked(IrqSource::AccelTimer) {
            return;
        }
        while *next <= now && events.enqueue(AxisEvent::AccelTick(self.id)).is_ok() {
            *next += period;
        }
    }

    fn edge(&self, switch: LimitSwitch, pressed: bool, now: Instant) -> AxisEvent {
        AxisEvent::Limit {
            axis: self.id,
            switch,
            pressed,
            at_ms: now.as_millis() as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pwm_timing() {
        // 125 MHz down to 1 kHz needs a divider of 2
        assert_eq!(pwm_timing(125_000_000, 1000), (2, 62_499));
        // Top of the range runs undivided
        assert_eq!(pwm_timing(125_000_000, MAX_STEP_RATE), (1, 2_499));
        // Below the floor the divider saturates
        assert_eq!(pwm_timing(125_000_000, 1).0, 255);
    }
}
