//! Gantry controller
//!
//! Owns the session to the host, both axes, the temperature probe and the
//! calibration. The firmware calls [`Controller::poll`] from its main loop
//! and feeds interrupt-side [`AxisEvent`]s through
//! [`Controller::handle_axis_event`].
//!
//! Each poll:
//! 1. reloads the calibration if the store reports a change,
//! 2. settles the status once no axis is moving (homing phases, faults),
//! 3. dispatches at most one inbound command.

pub mod registry;

pub use registry::AxisRegistry;

use gantry_hal::{ByteDevice, CalibrationStore, Scalar, StoreError};
use gantry_protocol::messages::MSG_ACK;
use gantry_protocol::{
    AxisId, Command, DecodeError, Direction, Frame, MoveRequest, Reply, ResultCode, Session,
    SessionError, TransportError,
};
use heapless::spsc::Consumer;

use crate::config::Calibration;
use crate::motion::{AxisEvent, AxisMotionSpec, LimitEdge, LimitSwitch};
use crate::state::{Event, HomingPhase, Status};
use crate::traits::thermal::read_all;
use crate::traits::{AxisDriver, TemperatureProbe};

/// A status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Transition {
    pub from: Status,
    pub to: Status,
}

/// How an inbound frame was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Handled {
    /// Command executed; `result` is set when an `axis_result` was sent
    Executed { id: u8, result: Option<ResultCode> },
    /// Id outside the command catalogue
    Unknown(u8),
    /// Payload rejected; `replied` when `axis_result(invalid)` was sent
    Malformed { id: u8, replied: bool },
}

/// What one [`Controller::poll`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollOutcome {
    /// Calibration was reloaded from the store
    pub reloaded: bool,
    /// Transition taken because every axis came to rest
    pub settled: Option<Transition>,
    /// Transition caused by the dispatched command
    pub commanded: Option<Transition>,
    pub handled: Option<Handled>,
    /// Store write that failed while handling `calibrate`
    pub store_error: Option<StoreError>,
}

/// A link failure during [`Controller::poll`]
///
/// `outcome` holds what the poll did before the failure; its side effects
/// (a reloaded calibration, a status change) have already happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollError<E> {
    pub error: SessionError<E>,
    pub outcome: PollOutcome,
}

impl<E: core::fmt::Debug> core::fmt::Display for PollError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.error)
    }
}

/// Why a motion ended inside an interrupt-side event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotionEnd {
    /// Decelerate segment reached its target
    Completed(AxisId),
    /// Limit switch stopped the axis
    Limit(AxisId, LimitSwitch),
}

/// The gantry controller
pub struct Controller<D, A, P, S>
where
    D: ByteDevice,
    A: AxisDriver,
    P: TemperatureProbe,
    S: CalibrationStore,
{
    session: Session<D>,
    axes: AxisRegistry<A>,
    probe: P,
    store: S,
    calibration: Calibration,
    status: Status,
}

impl<D, A, P, S> Controller<D, A, P, S>
where
    D: ByteDevice,
    A: AxisDriver,
    P: TemperatureProbe,
    S: CalibrationStore,
{
    /// Create an idle controller, loading the calibration from `store`
    ///
    /// A store that cannot be read leaves the defaults in effect.
    pub fn new(session: Session<D>, axes: AxisRegistry<A>, probe: P, mut store: S) -> Self {
        let calibration = Calibration::load(&mut store).unwrap_or_default();
        // Initial load is not a change
        store.take_changed();
        Self {
            session,
            axes,
            probe,
            store,
            calibration,
            status: Status::Idle,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn axes(&self) -> &AxisRegistry<A> {
        &self.axes
    }

    pub fn axes_mut(&mut self) -> &mut AxisRegistry<A> {
        &mut self.axes
    }

    pub fn session(&self) -> &Session<D> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<D> {
        &mut self.session
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Apply one interrupt-side event to its axis
    pub fn handle_axis_event(&mut self, event: AxisEvent) -> Option<MotionEnd> {
        let axis = self.axes.get_mut(event.axis());
        match event {
            AxisEvent::Encoder(id) => axis.on_encoder_tick().then_some(MotionEnd::Completed(id)),
            AxisEvent::AccelTick(_) => {
                axis.on_accel_tick();
                None
            }
            AxisEvent::Limit {
                axis: id,
                switch,
                pressed,
                at_ms,
            } => (axis.on_limit(switch, pressed, at_ms) == LimitEdge::Stopped)
                .then_some(MotionEnd::Limit(id, switch)),
        }
    }

    /// Apply every queued event, returning how many were processed
    ///
    /// `on_end` sees every motion that ended along the way.
    pub fn drain_events<const N: usize>(
        &mut self,
        events: &mut Consumer<'_, AxisEvent, N>,
        mut on_end: impl FnMut(MotionEnd),
    ) -> usize {
        let mut count = 0;
        while let Some(event) = events.dequeue() {
            if let Some(end) = self.handle_axis_event(event) {
                on_end(end);
            }
            count += 1;
        }
        count
    }

    /// Resolve limit edges dropped by the debounce once `now_ms` is past
    /// their window
    ///
    /// `on_end` sees every motion stopped by a recovered edge.
    pub fn recheck_switches(&mut self, now_ms: u32, mut on_end: impl FnMut(MotionEnd)) {
        for axis in self.axes.iter_mut() {
            if let Some(switch) = axis.recheck_switches(now_ms) {
                on_end(MotionEnd::Limit(axis.id(), switch));
            }
        }
    }

    /// Run one iteration of the control loop
    pub fn poll(&mut self) -> Result<PollOutcome, PollError<D::Error>> {
        let mut outcome = PollOutcome::default();

        if self.store.take_changed() {
            if let Ok(calibration) = Calibration::load(&mut self.store) {
                self.calibration = calibration;
                outcome.reloaded = true;
            }
        }

        outcome.settled = self.settle();

        match self.service_link(&mut outcome) {
            Ok(()) => Ok(outcome),
            Err(error) => Err(PollError { error, outcome }),
        }
    }

    fn service_link(&mut self, outcome: &mut PollOutcome) -> Result<(), SessionError<D::Error>> {
        self.session.check_ack_timeout()?;
        match self.session.check_for_message()? {
            // Settles our last reply; nothing to dispatch
            Some(frame) if frame.id == MSG_ACK => Ok(()),
            Some(frame) => self.dispatch(&frame, outcome),
            None => Ok(()),
        }
    }

    fn apply(&mut self, event: Event) -> Option<Transition> {
        let from = self.status;
        let to = from.transition(event);
        self.status = to;
        (from != to).then_some(Transition { from, to })
    }

    /// Advance the status once every axis is at rest
    fn settle(&mut self) -> Option<Transition> {
        if self.axes.any_moving() {
            return None;
        }
        let limits = self.axes.limits();
        let transition = self.apply(Event::Settled(limits))?;

        match (transition.from, transition.to) {
            (Status::Homing(HomingPhase::Seek), Status::Homing(HomingPhase::Retract)) => {
                self.start_homing_leg(Direction::Positive);
                for axis in self.axes.iter_mut() {
                    axis.arm_stop_on_home_release();
                }
            }
            (Status::Homing(HomingPhase::Retract), Status::Idle) => {
                for axis in self.axes.iter_mut() {
                    axis.reset();
                }
            }
            _ => {}
        }
        Some(transition)
    }

    /// Start both axes at home velocity for an unbounded distance
    ///
    /// Axes that refuse to start (switch already pressed) are left alone;
    /// the next settle evaluates the switches.
    fn start_homing_leg(&mut self, direction: Direction) {
        for id in AxisId::ALL {
            let cal = *self.calibration.axis(id);
            let motion = AxisMotionSpec {
                direction,
                distance: direction.sign() * i32::MAX,
                accel: cal.acceleration,
                start_velocity: cal.home_velocity,
                hold_velocity: cal.home_velocity,
            };
            let _ = self.axes.get_mut(id).start(&motion);
        }
    }

    fn dispatch(
        &mut self,
        frame: &Frame,
        outcome: &mut PollOutcome,
    ) -> Result<(), SessionError<D::Error>> {
        let command = match Command::from_frame(frame) {
            Ok(command) => command,
            Err(DecodeError::UnknownId(id)) => {
                outcome.handled = Some(Handled::Unknown(id));
                return Ok(());
            }
            Err(DecodeError::InvalidLength { id, .. } | DecodeError::InvalidValue { id }) => {
                let replied = Command::expects_result(id);
                if replied {
                    self.reply(&Reply::AxisResult(ResultCode::Invalid))?;
                }
                outcome.handled = Some(Handled::Malformed { id, replied });
                return Ok(());
            }
        };

        let id = command.id();
        let mut result = None;
        match command {
            Command::Ping(data) => self.reply(&Reply::Log(data))?,
            Command::GetStatus => {
                let code = self.status.to_code();
                self.reply(&Reply::Status(code))?;
            }
            Command::Home => {
                let code = self.home(outcome);
                result = Some(code);
                self.reply(&Reply::AxisResult(code))?;
            }
            Command::Move(request) => {
                let code = self.start_move(&request, outcome);
                result = Some(code);
                self.reply(&Reply::AxisResult(code))?;
            }
            Command::Stop => {
                self.axes.stop_all();
                outcome.commanded = self.apply(Event::StopRequested);
            }
            Command::GetPosition => {
                let (x, y) = self.axes.positions();
                self.reply(&Reply::Position { x, y })?;
            }
            Command::GetAxisState(axis) => {
                let snapshot = self.axes.get(axis).snapshot();
                self.reply(&Reply::AxisState(snapshot))?;
            }
            Command::GetTemperature => {
                let values = read_all(&mut self.probe, &self.calibration);
                self.reply(&Reply::Temperature(values))?;
            }
            Command::Calibrate { key, value } => {
                let scalar = if key.is_flag() {
                    Scalar::Bool(value != 0.0)
                } else {
                    Scalar::Float(value)
                };
                let code = match self.calibration.apply(key, scalar) {
                    Ok(()) => {
                        outcome.store_error = self.store.write(key.to_byte(), scalar).err();
                        ResultCode::Ok
                    }
                    Err(_) => ResultCode::Invalid,
                };
                result = Some(code);
                self.reply(&Reply::AxisResult(code))?;
            }
        }

        outcome.handled = Some(Handled::Executed { id, result });
        Ok(())
    }

    fn home(&mut self, outcome: &mut PollOutcome) -> ResultCode {
        if self.status != Status::Idle {
            return ResultCode::Busy;
        }
        self.start_homing_leg(Direction::Negative);
        outcome.commanded = self.apply(Event::HomeRequested);
        ResultCode::Ok
    }

    fn start_move(&mut self, request: &MoveRequest, outcome: &mut PollOutcome) -> ResultCode {
        if !self.status.accepts_move() {
            return ResultCode::Busy;
        }
        let cal = *self.calibration.axis(request.axis);
        let motion = AxisMotionSpec {
            direction: request.direction,
            distance: request.distance,
            accel: if request.accel == 0 {
                cal.acceleration
            } else {
                request.accel
            },
            start_velocity: cal.start_velocity,
            hold_velocity: request.hold_velocity,
        };
        match self.axes.get_mut(request.axis).start(&motion) {
            Ok(()) => {
                outcome.commanded = self.apply(Event::MoveAccepted);
                ResultCode::Ok
            }
            Err(e) => e.into(),
        }
    }

    /// Post a reply; the host's ACK is collected by a later poll
    fn reply(&mut self, reply: &Reply) -> Result<(), SessionError<D::Error>> {
        let frame = reply.to_frame().map_err(TransportError::Frame)?;
        self.session.post(&frame)
    }
}
