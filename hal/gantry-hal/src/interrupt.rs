//! Interrupt source masking
//!
//! Axis state is shared between the control loop and interrupt handlers.
//! There are no mutexes: exclusion comes from disabling the specific
//! interrupt sources that touch the state, mutating, then re-enabling them.

use core::ops::{Deref, DerefMut};

/// Interrupt sources that mutate axis state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum IrqSource {
    /// Encoder channel edge
    Encoder = 0,
    /// Step-rate timer
    StepTimer = 1,
    /// Acceleration tick timer
    AccelTimer = 2,
    /// Home limit switch edge
    HomeSwitch = 3,
    /// Far limit switch edge
    FarSwitch = 4,
}

impl IrqSource {
    /// All sources, in bit order
    pub const ALL: [IrqSource; 5] = [
        IrqSource::Encoder,
        IrqSource::StepTimer,
        IrqSource::AccelTimer,
        IrqSource::HomeSwitch,
        IrqSource::FarSwitch,
    ];

    /// Bit for this source inside an [`IrqSet`]
    pub const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// A set of interrupt sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IrqSet(u8);

impl IrqSet {
    /// Empty set
    pub const EMPTY: IrqSet = IrqSet(0);

    /// Encoder plus acceleration timer: everything that advances a motion
    pub const MOTION: IrqSet = IrqSet(IrqSource::Encoder.bit() | IrqSource::AccelTimer.bit());

    /// Both timers
    pub const TIMERS: IrqSet = IrqSet(IrqSource::StepTimer.bit() | IrqSource::AccelTimer.bit());

    /// Add a source to the set
    pub const fn with(self, source: IrqSource) -> Self {
        IrqSet(self.0 | source.bit())
    }

    /// Check membership
    pub const fn contains(self, source: IrqSource) -> bool {
        self.0 & source.bit() != 0
    }

    /// Iterate over the sources in the set
    pub fn iter(self) -> impl Iterator<Item = IrqSource> {
        IrqSource::ALL.into_iter().filter(move |s| self.contains(*s))
    }
}

/// Control over the interrupt sources of one axis
pub trait IrqControl {
    /// Mask an interrupt source
    fn disable_irq(&mut self, source: IrqSource);

    /// Unmask an interrupt source
    fn enable_irq(&mut self, source: IrqSource);

    /// Mask `set` until the returned guard is dropped
    fn mask(&mut self, set: IrqSet) -> IrqGuard<'_, Self>
    where
        Self: Sized,
    {
        IrqGuard::new(self, set)
    }
}

/// Scoped interrupt mask
///
/// Disables the sources on construction and re-enables them on drop.
/// Dereferences to the underlying controller so the masked hardware can
/// still be driven inside the critical section.
pub struct IrqGuard<'a, C: IrqControl> {
    ctrl: &'a mut C,
    set: IrqSet,
}

impl<'a, C: IrqControl> IrqGuard<'a, C> {
    /// Mask `set` on `ctrl`
    pub fn new(ctrl: &'a mut C, set: IrqSet) -> Self {
        for source in set.iter() {
            ctrl.disable_irq(source);
        }
        Self { ctrl, set }
    }

    /// The sources held masked by this guard
    pub fn set(&self) -> IrqSet {
        self.set
    }
}

impl<C: IrqControl> Deref for IrqGuard<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.ctrl
    }
}

impl<C: IrqControl> DerefMut for IrqGuard<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.ctrl
    }
}

impl<C: IrqControl> Drop for IrqGuard<'_, C> {
    fn drop(&mut self) {
        for source in self.set.iter() {
            self.ctrl.enable_irq(source);
        }
    }
}
