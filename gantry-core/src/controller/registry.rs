//! Both axes, indexed by [`AxisId`]

use gantry_protocol::AxisId;

use crate::motion::Axis;
use crate::state::LimitSummary;
use crate::traits::AxisDriver;

/// The X and Y axes of the gantry
pub struct AxisRegistry<D: AxisDriver> {
    axes: [Axis<D>; 2],
}

impl<D: AxisDriver> AxisRegistry<D> {
    /// Build the registry from the X and Y drivers
    pub fn new(x: D, y: D) -> Self {
        Self {
            axes: [Axis::new(AxisId::X, x), Axis::new(AxisId::Y, y)],
        }
    }

    pub fn get(&self, id: AxisId) -> &Axis<D> {
        &self.axes[id.index()]
    }

    pub fn get_mut(&mut self, id: AxisId) -> &mut Axis<D> {
        &mut self.axes[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Axis<D>> {
        self.axes.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Axis<D>> {
        self.axes.iter_mut()
    }

    /// True if any axis has a motion in progress
    pub fn any_moving(&self) -> bool {
        self.axes.iter().any(Axis::is_moving)
    }

    /// Current switch flags across both axes
    pub fn limits(&self) -> LimitSummary {
        LimitSummary {
            any_limit: self.axes.iter().any(Axis::any_limit),
            all_home: self.axes.iter().all(|a| a.state().home_pressed),
            any_home: self.axes.iter().any(|a| a.state().home_pressed),
        }
    }

    /// Stop every axis
    pub fn stop_all(&mut self) {
        for axis in &mut self.axes {
            axis.stop();
        }
    }

    /// Positions of X and Y
    pub fn positions(&self) -> (i32, i32) {
        (
            self.get(AxisId::X).state().position,
            self.get(AxisId::Y).state().position,
        )
    }
}
