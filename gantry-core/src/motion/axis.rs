//! Closed-loop axis engine
//!
//! An axis runs one motion at a time. The step timer clocks the motor
//! driver at the current velocity; encoder ticks move the position toward
//! the target of the active segment; acceleration ticks ramp the velocity
//! up during the accelerate segment and down during decelerate. Limit
//! switch edges stop the motion when the switch on the side of travel
//! closes.
//!
//! Interrupt handlers and the control loop share [`AxisState`]. Operations
//! started from the control loop mask the interrupt sources they race with
//! through [`IrqControl`](gantry_hal::IrqControl).

use gantry_hal::{IrqControl, IrqSet, IrqSource};
use gantry_protocol::{AxisId, AxisSnapshot, Direction, ResultCode, Segment};

use super::profile::{AxisMotionSpec, ProfileError, VelocityProfile};
use crate::traits::AxisDriver;

/// Hard ceiling for the step rate in steps per second
pub const MAX_STEP_RATE: u32 = 50_000;

/// Limit switch edges closer than this to the previous accepted edge are bounce
pub const LIMIT_DEBOUNCE_MS: u32 = 5;

const SWITCHES: IrqSet = IrqSet::EMPTY
    .with(IrqSource::HomeSwitch)
    .with(IrqSource::FarSwitch);

/// Acceleration tick period for `accel` counts/s², at least 1 µs
pub fn accel_tick_period_us(accel: u32) -> u32 {
    (1_000_000 / accel.max(1)).max(1)
}

/// End-of-travel switches of one axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LimitSwitch {
    /// Zero-reference end
    Home,
    /// Opposite end
    Far,
}

impl LimitSwitch {
    fn slot(self) -> usize {
        match self {
            LimitSwitch::Home => 0,
            LimitSwitch::Far => 1,
        }
    }

    /// The switch that blocks travel in `direction`
    pub fn facing(direction: Direction) -> Self {
        match direction {
            Direction::Positive => LimitSwitch::Far,
            Direction::Negative => LimitSwitch::Home,
        }
    }
}

/// Reasons a motion is refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StartError {
    AlreadyMoving,
    ZeroDistance,
    DirectionMismatch,
    InvalidProfile(ProfileError),
    /// The switch on the side of travel is pressed
    LimitBlocked,
}

impl core::fmt::Display for StartError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            StartError::AlreadyMoving => write!(f, "axis already moving"),
            StartError::ZeroDistance => write!(f, "zero distance"),
            StartError::DirectionMismatch => write!(f, "distance sign disagrees with direction"),
            StartError::InvalidProfile(e) => write!(f, "invalid profile: {}", e),
            StartError::LimitBlocked => write!(f, "limit switch blocks direction of travel"),
        }
    }
}

impl From<ProfileError> for StartError {
    fn from(e: ProfileError) -> Self {
        StartError::InvalidProfile(e)
    }
}

impl From<StartError> for ResultCode {
    fn from(e: StartError) -> Self {
        match e {
            StartError::AlreadyMoving => ResultCode::AlreadyMoving,
            StartError::ZeroDistance => ResultCode::ZeroDistance,
            StartError::DirectionMismatch => ResultCode::DirectionMismatch,
            StartError::InvalidProfile(_) => ResultCode::InvalidProfile,
            StartError::LimitBlocked => ResultCode::LimitBlocked,
        }
    }
}

/// What a limit switch edge did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LimitEdge {
    /// Inside the debounce window; ignored
    Bounced,
    /// Flag updated
    Recorded,
    /// Flag updated and the motion stopped
    Stopped,
}

/// Shared per-axis state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AxisState {
    pub moving: bool,
    pub home_pressed: bool,
    pub far_pressed: bool,
    /// Current step rate in counts/s
    pub velocity: u32,
    pub segment: Segment,
    /// Encoder position in counts
    pub position: i32,
    /// Position at which the active segment ends
    pub target: i32,
    pub direction: Direction,
    pub profile: VelocityProfile,
    /// Velocity floor for deceleration
    pub start_velocity: u32,
    /// Velocity cap for acceleration
    pub velocity_ceiling: u32,
    /// Stop when the home switch releases (homing retract)
    pub stop_on_home_release: bool,
    last_edge_ms: [Option<u32>; 2],
    /// A bounced edge left the flag possibly stale
    recheck: [bool; 2],
}

impl AxisState {
    /// Position `len` counts from `from` in the commanded direction
    fn offset(&self, from: i32, len: u32) -> i32 {
        let to = from as i64 + self.direction.sign() as i64 * len as i64;
        to.clamp(i32::MIN as i64, i32::MAX as i64) as i32
    }

    /// True once the position has reached or passed the segment target
    fn target_reached(&self) -> bool {
        let remaining = (self.target as i64 - self.position as i64) * self.direction.sign() as i64;
        remaining <= 0
    }

    /// Enter the first segment and skip past any that are empty
    ///
    /// Returns `false` if every segment is empty.
    fn enter_first_segment(&mut self) -> bool {
        self.segment = Segment::Accelerate;
        self.target = self.offset(self.position, self.profile.accel_distance);
        !self.target_reached() || self.advance()
    }

    /// Move to the next segment, carrying the error of the finished one
    ///
    /// Cascades through zero-length segments. Returns `false` when the
    /// decelerate segment has finished.
    fn advance(&mut self) -> bool {
        loop {
            let next = match self.segment {
                Segment::Accelerate => Segment::Hold,
                Segment::Hold => Segment::Decelerate,
                Segment::Decelerate => return false,
            };
            let carry = self.target as i64 - self.position as i64;
            let planned = self.offset(self.position, self.profile.distance(next)) as i64;
            self.segment = next;
            self.target = (planned + carry).clamp(i32::MIN as i64, i32::MAX as i64) as i32;
            if !self.target_reached() {
                return true;
            }
        }
    }
}

/// One axis: its driver and shared state
pub struct Axis<D: AxisDriver> {
    id: AxisId,
    driver: D,
    state: AxisState,
}

impl<D: AxisDriver> Axis<D> {
    /// Create an idle axis at position zero
    pub fn new(id: AxisId, driver: D) -> Self {
        let mut axis = Self {
            id,
            driver,
            state: AxisState::default(),
        };
        axis.sync_switches();
        axis
    }

    pub fn id(&self) -> AxisId {
        self.id
    }

    pub fn state(&self) -> &AxisState {
        &self.state
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn is_moving(&self) -> bool {
        self.state.moving
    }

    /// True if either limit flag is set
    pub fn any_limit(&self) -> bool {
        self.state.home_pressed || self.state.far_pressed
    }

    /// Wire snapshot of this axis
    pub fn snapshot(&self) -> AxisSnapshot {
        let s = &self.state;
        AxisSnapshot {
            axis: self.id,
            moving: s.moving,
            home_pressed: s.home_pressed,
            far_pressed: s.far_pressed,
            direction: s.direction,
            segment: s.segment,
            velocity: s.velocity,
            position: s.position,
            target: s.target,
        }
    }

    /// Read both switch levels from the hardware
    pub fn sync_switches(&mut self) {
        let hw = self.driver.mask(SWITCHES);
        self.state.home_pressed = hw.home_pressed();
        self.state.far_pressed = hw.far_pressed();
    }

    /// Start a motion
    pub fn start(&mut self, motion: &AxisMotionSpec) -> Result<(), StartError> {
        if self.state.moving {
            return Err(StartError::AlreadyMoving);
        }
        if motion.distance == 0 {
            return Err(StartError::ZeroDistance);
        }
        if !motion.sign_matches() {
            return Err(StartError::DirectionMismatch);
        }
        let profile = motion.profile()?;
        let blocked = match LimitSwitch::facing(motion.direction) {
            LimitSwitch::Home => self.state.home_pressed,
            LimitSwitch::Far => self.state.far_pressed,
        };
        if blocked {
            return Err(StartError::LimitBlocked);
        }

        let mut hw = self.driver.mask(IrqSet::MOTION);
        let s = &mut self.state;

        s.direction = motion.direction;
        s.profile = profile;
        s.start_velocity = motion.start_velocity.min(MAX_STEP_RATE);
        s.velocity_ceiling = motion.hold_velocity.min(MAX_STEP_RATE);
        s.velocity = s.start_velocity;
        s.stop_on_home_release = false;
        s.enter_first_segment();
        s.moving = true;

        hw.set_direction(motion.direction);
        hw.start_step_timer(s.velocity);
        if motion.accel > 0 {
            hw.start_accel_timer(accel_tick_period_us(motion.accel));
        }
        Ok(())
    }

    /// Stop the running motion when the home switch releases
    pub fn arm_stop_on_home_release(&mut self) {
        let _hw = self.driver.mask(IrqSet::EMPTY.with(IrqSource::HomeSwitch));
        if self.state.moving {
            self.state.stop_on_home_release = true;
        }
    }

    /// Encoder edge
    ///
    /// Counts in the commanded direction. Returns `true` if this tick
    /// completed the motion.
    pub fn on_encoder_tick(&mut self) -> bool {
        let s = &mut self.state;
        s.position = s.position.wrapping_add(s.direction.sign());
        if !s.moving || !s.target_reached() {
            return false;
        }
        if s.advance() {
            return false;
        }
        self.stop();
        true
    }

    /// Acceleration timer tick
    pub fn on_accel_tick(&mut self) {
        let s = &mut self.state;
        if !s.moving {
            return;
        }
        let next = match s.segment {
            Segment::Accelerate if s.velocity < s.velocity_ceiling => s.velocity + 1,
            Segment::Decelerate if s.velocity > s.start_velocity => s.velocity - 1,
            _ => return,
        };
        s.velocity = next;
        self.driver.set_step_rate(next);
    }

    /// Limit switch edge at `at_ms`
    pub fn on_limit(&mut self, switch: LimitSwitch, pressed: bool, at_ms: u32) -> LimitEdge {
        let s = &mut self.state;
        let slot = switch.slot();
        if let Some(last) = s.last_edge_ms[slot] {
            if at_ms.wrapping_sub(last) < LIMIT_DEBOUNCE_MS {
                s.recheck[slot] = true;
                return LimitEdge::Bounced;
            }
        }
        s.last_edge_ms[slot] = Some(at_ms);
        s.recheck[slot] = false;

        match switch {
            LimitSwitch::Home => s.home_pressed = pressed,
            LimitSwitch::Far => s.far_pressed = pressed,
        }

        if !s.moving {
            return LimitEdge::Recorded;
        }

        let closed_ahead = pressed && switch == LimitSwitch::facing(s.direction);
        let released_home = !pressed && switch == LimitSwitch::Home && s.stop_on_home_release;
        if closed_ahead || released_home {
            self.stop();
            return LimitEdge::Stopped;
        }
        LimitEdge::Recorded
    }

    /// Apply the raw switch level behind a bounced edge
    ///
    /// The bounced edge may have been the last of a burst, so once
    /// `now_ms` is past its debounce window the hardware level is read back
    /// and applied as a fresh edge if it differs from the flag. Returns the
    /// switch that stopped the motion, if any.
    pub fn recheck_switches(&mut self, now_ms: u32) -> Option<LimitSwitch> {
        let (home, far) = {
            let hw = self.driver.mask(SWITCHES);
            (hw.home_pressed(), hw.far_pressed())
        };
        let mut stopped = None;
        for (switch, level) in [(LimitSwitch::Home, home), (LimitSwitch::Far, far)] {
            let slot = switch.slot();
            if !self.state.recheck[slot] {
                continue;
            }
            if let Some(last) = self.state.last_edge_ms[slot] {
                if now_ms.wrapping_sub(last) < LIMIT_DEBOUNCE_MS {
                    continue;
                }
            }
            self.state.recheck[slot] = false;
            let flag = match switch {
                LimitSwitch::Home => self.state.home_pressed,
                LimitSwitch::Far => self.state.far_pressed,
            };
            if level != flag && self.on_limit(switch, level, now_ms) == LimitEdge::Stopped {
                stopped = Some(switch);
            }
        }
        stopped
    }

    /// Halt the motion; safe to call when already stopped
    pub fn stop(&mut self) {
        let mut hw = self.driver.mask(IrqSet::TIMERS);
        hw.stop_step_timer();
        hw.stop_accel_timer();
        self.state.moving = false;
        self.state.velocity = 0;
        self.state.stop_on_home_release = false;
    }

    /// Stop, then zero the encoder position
    pub fn reset(&mut self) {
        self.stop();
        self.state.position = 0;
        self.state.target = 0;
        self.state.segment = Segment::default();
        self.state.direction = Direction::default();
    }
}
