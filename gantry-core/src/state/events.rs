//! Events that trigger status transitions

/// Limit switch flags aggregated over both axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LimitSummary {
    /// Some switch on some axis is pressed
    pub any_limit: bool,
    /// Every axis has its home switch pressed
    pub all_home: bool,
    /// At least one home switch is pressed
    pub any_home: bool,
}

/// Events that can trigger status transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// An axis accepted a `move`
    MoveAccepted,
    /// Host requested homing
    HomeRequested,
    /// No axis is moving; carries the switch flags at that moment
    Settled(LimitSummary),
    /// Host requested `stop`
    StopRequested,
}
