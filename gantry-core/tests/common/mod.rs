//! Simulated gantry for controller tests
//!
//! The controller runs on the test thread against simulated axis drivers
//! and a simulated mechanism; the host runs a [`Client`] on its own thread
//! over the loopback link.

#![allow(dead_code)]

use std::thread;

use gantry_core::config::ThermistorCalibration;
use gantry_core::controller::{AxisRegistry, Controller, Transition};
use gantry_core::motion::{AxisEvent, LimitSwitch};
use gantry_core::traits::{AxisDriver, SensorError, TemperatureProbe};
use gantry_hal::{IrqControl, IrqSource, MemoryStore};
use gantry_protocol::loopback::{pair, LoopbackEndpoint};
use gantry_protocol::{AxisId, Client, Direction, Session, StatusCode};

/// Encoder ticks fed to each moving axis per poll
pub const TICKS_PER_POLL: usize = 20;

/// Simulated time per poll; larger than the limit debounce window
pub const MS_PER_POLL: u32 = 10;

pub type Store = MemoryStore<32>;
pub type SimController = Controller<LoopbackEndpoint, SimDriver, SimProbe, Store>;
pub type HostClient = Client<LoopbackEndpoint>;

/// Axis driver recording what the engine asked of it
#[derive(Debug, Default)]
pub struct SimDriver {
    pub masked: u8,
    pub step_rate: Option<u32>,
    pub first_rate: Option<u32>,
    pub max_rate: u32,
    pub accel_period: Option<u32>,
    pub direction: Option<Direction>,
    home: bool,
    far: bool,
}

impl SimDriver {
    pub fn with_switches(home: bool, far: bool) -> Self {
        Self {
            home,
            far,
            ..Self::default()
        }
    }

    /// Set the raw switch levels the engine reads back
    pub fn set_switches(&mut self, home: bool, far: bool) {
        self.home = home;
        self.far = far;
    }

    fn record_rate(&mut self, rate: u32) {
        self.step_rate = Some(rate);
        self.max_rate = self.max_rate.max(rate);
    }
}

impl IrqControl for SimDriver {
    fn disable_irq(&mut self, source: IrqSource) {
        self.masked |= source.bit();
    }

    fn enable_irq(&mut self, source: IrqSource) {
        self.masked &= !source.bit();
    }
}

impl AxisDriver for SimDriver {
    fn set_direction(&mut self, direction: Direction) {
        self.direction = Some(direction);
    }

    fn start_step_timer(&mut self, rate: u32) {
        self.first_rate = Some(rate);
        self.record_rate(rate);
    }

    fn set_step_rate(&mut self, rate: u32) {
        self.record_rate(rate);
    }

    fn stop_step_timer(&mut self) {
        self.step_rate = None;
    }

    fn start_accel_timer(&mut self, period_us: u32) {
        self.accel_period = Some(period_us);
    }

    fn stop_accel_timer(&mut self) {
        self.accel_period = None;
    }

    fn home_pressed(&self) -> bool {
        self.home
    }

    fn far_pressed(&self) -> bool {
        self.far
    }
}

/// Probe returning `20 + sensor` °C, with channel 3 open circuit
pub struct SimProbe;

impl TemperatureProbe for SimProbe {
    fn read(&mut self, sensor: u8, _: &ThermistorCalibration) -> Result<f32, SensorError> {
        match sensor {
            3 => Err(SensorError::OpenCircuit),
            n => Ok(20.0 + n as f32),
        }
    }
}

/// Mechanism: carriage positions and switch placement
///
/// The home switch closes at absolute position 0 and below; the far switch
/// closes at `far_at` and above.
pub struct Mechanism {
    pub abs: [i64; 2],
    pub far_at: i64,
    home: [bool; 2],
    far: [bool; 2],
    pub now_ms: u32,
    /// Every status transition seen by [`run_host`], in order
    pub transitions: Vec<Transition>,
}

impl Mechanism {
    pub fn new(x: i64, y: i64, far_at: i64) -> Self {
        let mut m = Self {
            abs: [x, y],
            far_at,
            home: [false; 2],
            far: [false; 2],
            now_ms: 1000,
            transitions: Vec::new(),
        };
        for i in 0..2 {
            m.home[i] = m.abs[i] <= 0;
            m.far[i] = m.abs[i] >= far_at;
        }
        m
    }

    /// Drivers whose switch levels match the initial positions
    pub fn drivers(&self) -> AxisRegistry<SimDriver> {
        AxisRegistry::new(
            SimDriver::with_switches(self.home[0], self.far[0]),
            SimDriver::with_switches(self.home[1], self.far[1]),
        )
    }

    /// Advance every moving axis and report switch edges
    pub fn step(&mut self, ctl: &mut SimController) {
        self.now_ms = self.now_ms.wrapping_add(MS_PER_POLL);
        for id in AxisId::ALL {
            let i = id.index();
            if ctl.axes().get(id).is_moving() {
                ctl.handle_axis_event(AxisEvent::AccelTick(id));
            }
            for _ in 0..TICKS_PER_POLL {
                let state = *ctl.axes().get(id).state();
                if !state.moving {
                    break;
                }
                ctl.handle_axis_event(AxisEvent::Encoder(id));
                self.abs[i] += state.direction.sign() as i64;

                let home = self.abs[i] <= 0;
                let far = self.abs[i] >= self.far_at;
                ctl.axes_mut().get_mut(id).driver_mut().set_switches(home, far);
                if home != self.home[i] {
                    self.home[i] = home;
                    ctl.handle_axis_event(self.edge(id, LimitSwitch::Home, home));
                }
                if far != self.far[i] {
                    self.far[i] = far;
                    ctl.handle_axis_event(self.edge(id, LimitSwitch::Far, far));
                }
            }
        }
    }

    fn edge(&self, axis: AxisId, switch: LimitSwitch, pressed: bool) -> AxisEvent {
        AxisEvent::Limit {
            axis,
            switch,
            pressed,
            at_ms: self.now_ms,
        }
    }
}

/// Controller wired to a fresh loopback link, plus the host end
pub fn rig(mechanism: &Mechanism, store: Store) -> (SimController, LoopbackEndpoint) {
    let (host, device) = pair();
    let ctl = Controller::new(Session::new(device), mechanism.drivers(), SimProbe, store);
    (ctl, host)
}

/// Run `script` as the host while the controller and mechanism run here
pub fn run_host<T, F>(
    ctl: &mut SimController,
    mechanism: &mut Mechanism,
    host: LoopbackEndpoint,
    script: F,
) -> T
where
    T: Send + 'static,
    F: FnOnce(&mut HostClient) -> T + Send + 'static,
{
    let handle = thread::spawn(move || {
        let mut client = Client::new(host);
        script(&mut client)
    });
    while !handle.is_finished() {
        let outcome = ctl.poll().expect("device side session failed");
        // Settling runs before dispatch within one poll
        mechanism.transitions.extend(outcome.settled);
        mechanism.transitions.extend(outcome.commanded);
        mechanism.step(ctl);
        ctl.recheck_switches(mechanism.now_ms, |_| {});
    }
    handle.join().expect("host script panicked")
}

/// Poll `get_status` until it reports `want`
pub fn wait_for_status(client: &mut HostClient, want: StatusCode) -> StatusCode {
    let mut last = StatusCode::Idle;
    for _ in 0..500 {
        last = client.status().expect("get_status failed");
        if last == want {
            return last;
        }
        thread::sleep(std::time::Duration::from_millis(2));
    }
    last
}
