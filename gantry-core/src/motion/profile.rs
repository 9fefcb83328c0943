//! Trapezoidal velocity profile generation
//!
//! A motion is split into three segments measured in encoder counts:
//! accelerate from the start velocity, hold at the hold velocity, then
//! decelerate back to the start velocity. Acceleration and deceleration
//! are symmetric.

use gantry_protocol::{Direction, Segment};

/// Errors from profile generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProfileError {
    /// Acceleration is zero but the hold velocity differs from the start velocity
    ZeroAcceleration,
}

impl core::fmt::Display for ProfileError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ProfileError::ZeroAcceleration => {
                write!(f, "zero acceleration with a velocity change")
            }
        }
    }
}

/// Segment distances of one motion, in encoder counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VelocityProfile {
    pub accel_distance: u32,
    pub hold_distance: u32,
    pub decel_distance: u32,
}

impl VelocityProfile {
    /// Sum of the three segments
    pub fn total(&self) -> u64 {
        self.accel_distance as u64 + self.hold_distance as u64 + self.decel_distance as u64
    }

    /// Planned length of one segment
    pub fn distance(&self, segment: Segment) -> u32 {
        match segment {
            Segment::Accelerate => self.accel_distance,
            Segment::Hold => self.hold_distance,
            Segment::Decelerate => self.decel_distance,
        }
    }
}

/// Compute the segment distances for a motion of `total` counts
///
/// - `accel == 0` with `v_hold != v_start` is rejected.
/// - `v_hold <= v_start` yields a pure hold profile.
/// - When the ramps do not fit, the profile becomes triangular: both
///   ramps take `total / 2`. For an even `total` the hold is empty; for an
///   odd `total` the leftover count becomes a one-count hold, so the three
///   distances always sum to `total`.
pub fn generate_profile(
    accel: u32,
    v_start: u32,
    v_hold: u32,
    total: u32,
) -> Result<VelocityProfile, ProfileError> {
    if accel == 0 && v_hold != v_start {
        return Err(ProfileError::ZeroAcceleration);
    }

    if v_hold <= v_start {
        return Ok(VelocityProfile {
            accel_distance: 0,
            hold_distance: total,
            decel_distance: 0,
        });
    }

    let v_hold = v_hold as u64;
    let v_start = v_start as u64;
    let ramp = (v_hold * v_hold - v_start * v_start) / (2 * accel as u64);

    if 2 * ramp > total as u64 {
        let half = total / 2;
        return Ok(VelocityProfile {
            accel_distance: half,
            hold_distance: total - 2 * half,
            decel_distance: half,
        });
    }

    // ramp <= total / 2 here, so it fits in u32
    let ramp = ramp as u32;
    Ok(VelocityProfile {
        accel_distance: ramp,
        hold_distance: total - 2 * ramp,
        decel_distance: ramp,
    })
}

/// One commanded motion of one axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AxisMotionSpec {
    pub direction: Direction,
    /// Signed distance in encoder counts; sign must match `direction`
    pub distance: i32,
    /// Counts/s²
    pub accel: u32,
    /// Counts/s
    pub start_velocity: u32,
    /// Counts/s
    pub hold_velocity: u32,
}

impl AxisMotionSpec {
    /// Profile for the magnitude of this motion's distance
    pub fn profile(&self) -> Result<VelocityProfile, ProfileError> {
        generate_profile(
            self.accel,
            self.start_velocity,
            self.hold_velocity,
            self.distance.unsigned_abs(),
        )
    }

    /// True if the sign of `distance` agrees with `direction`
    pub fn sign_matches(&self) -> bool {
        self.distance.signum() == self.direction.sign()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_full_trapezoid() {
        // (500² - 490²) / 20 = 495
        let p = generate_profile(10, 490, 500, 1000).unwrap();
        assert_eq!(p.accel_distance, 495);
        assert_eq!(p.hold_distance, 10);
        assert_eq!(p.decel_distance, 495);
    }

    #[test]
    fn test_triangular_fallback() {
        let p = generate_profile(10, 50, 500, 1000).unwrap();
        assert_eq!(p, VelocityProfile {
            accel_distance: 500,
            hold_distance: 0,
            decel_distance: 500,
        });
    }

    #[test]
    fn test_triangular_odd_total_keeps_sum() {
        let p = generate_profile(1, 0, 1000, 7).unwrap();
        assert_eq!(p.accel_distance, 3);
        assert_eq!(p.decel_distance, 3);
        assert_eq!(p.hold_distance, 1);
    }

    #[test]
    fn test_pure_hold() {
        let p = generate_profile(0, 200, 200, 1234).unwrap();
        assert_eq!(p.accel_distance, 0);
        assert_eq!(p.hold_distance, 1234);
        assert_eq!(p.decel_distance, 0);

        // Hold below start also degenerates
        let p = generate_profile(10, 300, 200, 50).unwrap();
        assert_eq!(p.hold_distance, 50);
    }

    #[test]
    fn test_zero_accel_rejected() {
        assert_eq!(
            generate_profile(0, 50, 500, 1000),
            Err(ProfileError::ZeroAcceleration)
        );
    }

    #[test]
    fn test_motion_sign() {
        let motion = AxisMotionSpec {
            direction: Direction::Negative,
            distance: 100,
            accel: 10,
            start_velocity: 50,
            hold_velocity: 500,
        };
        assert!(!motion.sign_matches());
        let motion = AxisMotionSpec { distance: -100, ..motion };
        assert!(motion.sign_matches());
        assert_eq!(motion.profile().unwrap().total(), 100);
    }

    #[test]
    fn test_extreme_distance() {
        let p = generate_profile(10, 200, 200, i32::MAX as u32 + 1).unwrap();
        assert_eq!(p.total(), 1u64 << 31);
    }

    proptest! {
        #[test]
        fn prop_segments_sum_to_total(
            accel in 1u32..100_000,
            v_start in 0u32..60_000,
            extra in 0u32..60_000,
            total in 0u32..=u32::MAX,
        ) {
            let v_hold = v_start + extra;
            let p = generate_profile(accel, v_start, v_hold, total).unwrap();
            prop_assert_eq!(p.total(), total as u64);
            prop_assert_eq!(p.accel_distance, p.decel_distance);
        }

        #[test]
        fn prop_triangular_when_ramps_do_not_fit(
            accel in 1u32..1000,
            v_start in 0u32..1000,
            extra in 1u32..50_000,
            total in 0u32..100_000,
        ) {
            let v_hold = v_start + extra;
            let ramp = ((v_hold as u64).pow(2) - (v_start as u64).pow(2)) / (2 * accel as u64);
            prop_assume!(2 * ramp > total as u64);

            let p = generate_profile(accel, v_start, v_hold, total).unwrap();
            prop_assert_eq!(p.accel_distance, total / 2);
            prop_assert_eq!(p.decel_distance, total / 2);
            prop_assert!(p.hold_distance <= 1);
        }

        #[test]
        fn prop_equal_velocities_hold_everything(v in 0u32..100_000, accel in 0u32..100, total in 0u32..=u32::MAX) {
            let p = generate_profile(accel, v, v, total).unwrap();
            prop_assert_eq!(p.accel_distance, 0);
            prop_assert_eq!(p.decel_distance, 0);
            prop_assert_eq!(p.hold_distance, total);
        }
    }
}
