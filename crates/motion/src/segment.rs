use coordmap::Vector3;

/// A single planned move, carrying everything the per-axis steppers
/// need to compute step times. There is no cross-segment lookahead:
/// each segment starts and ends at rest (or at a caller-supplied
/// start velocity for homing), matching a single-segment planner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionSegment {
    /// No motion is pending.
    None,
    /// A straight line in Cartesian space, extruding along the way.
    Linear {
        start: Vector3,
        end: Vector3,
        start_e: f32,
        end_e: f32,
        feed_rate: f32,
    },
    /// A circular (or helical, if `start.z != end.z`) arc.
    Arc {
        start: Vector3,
        end: Vector3,
        start_e: f32,
        end_e: f32,
        center: Vector3,
        /// Unit normal of the plane the arc sweeps in; its direction
        /// (right-hand rule) encodes clockwise vs. counterclockwise.
        normal: Vector3,
        /// Total angle swept, in radians, always positive; the sign
        /// convention lives entirely in `normal`.
        angle: f32,
        feed_rate: f32,
    },
    /// Homing: drive the named axes toward their endstops at a fixed
    /// rate until triggered, rather than toward a known target.
    Home { axes: [bool; 3], feed_rate: f32 },
}

impl Default for MotionSegment {
    fn default() -> Self {
        MotionSegment::None
    }
}

impl MotionSegment {
    /// Euclidean distance the effector travels, in millimeters.
    /// `Home` has no fixed distance and reports 0 here; its stepper
    /// terminates on endstop trigger instead.
    pub fn distance(&self) -> f32 {
        match self {
            MotionSegment::None => 0.0,
            MotionSegment::Linear { start, end, .. } => (*end - *start).mag(),
            MotionSegment::Arc { center, angle, .. } => {
                let radius = (*self.arc_start_point() - *center).mag();
                radius * angle
            }
            MotionSegment::Home { .. } => 0.0,
        }
    }

    fn arc_start_point(&self) -> &Vector3 {
        match self {
            MotionSegment::Arc { start, .. } => start,
            _ => unreachable!("arc_start_point only called on Arc segments"),
        }
    }

    pub fn feed_rate(&self) -> f32 {
        match self {
            MotionSegment::None => 0.0,
            MotionSegment::Linear { feed_rate, .. }
            | MotionSegment::Arc { feed_rate, .. }
            | MotionSegment::Home { feed_rate, .. } => *feed_rate,
        }
    }

    /// The effector's Cartesian position `fraction` of the way through
    /// the segment's geometry (0.0 at the start, 1.0 at the end).
    /// Does not apply the velocity profile — callers map elapsed time
    /// to `fraction` via [`crate::accel::AccelerationProfile`].
    pub fn position_at(&self, fraction: f32) -> Vector3 {
        match self {
            MotionSegment::None | MotionSegment::Home { .. } => Vector3::ZERO,
            MotionSegment::Linear { start, end, .. } => {
                *start + (*end - *start) * fraction
            }
            MotionSegment::Arc { start, center, normal, angle, .. } => {
                let radial = *start - *center;
                let theta = angle * fraction;
                // Rodrigues' rotation formula around `normal`.
                let cos_t = theta.cos();
                let sin_t = theta.sin();
                let rotated = radial * cos_t
                    + normal.cross(radial) * sin_t
                    + *normal * (normal.dot(radial) * (1.0 - cos_t));
                *center + rotated
            }
        }
    }

    pub fn extruder_position_at(&self, fraction: f32) -> f32 {
        match self {
            MotionSegment::Linear { start_e, end_e, .. }
            | MotionSegment::Arc { start_e, end_e, .. } => {
                start_e + (end_e - start_e) * fraction
            }
            MotionSegment::None | MotionSegment::Home { .. } => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_distance_matches_euclidean_norm() {
        let seg = MotionSegment::Linear {
            start: Vector3::ZERO,
            end: Vector3::new(3.0, 4.0, 0.0),
            start_e: 0.0,
            end_e: 1.0,
            feed_rate: 50.0,
        };
        assert!((seg.distance() - 5.0).abs() < 1e-5);
    }

    #[test]
    fn arc_quarter_turn_lands_on_expected_point() {
        let seg = MotionSegment::Arc {
            start: Vector3::new(10.0, 0.0, 0.0),
            end: Vector3::new(0.0, 10.0, 0.0),
            start_e: 0.0,
            end_e: 0.0,
            center: Vector3::ZERO,
            normal: Vector3::new(0.0, 0.0, 1.0),
            angle: std::f32::consts::FRAC_PI_2,
            feed_rate: 30.0,
        };
        let end = seg.position_at(1.0);
        assert!((end.x - 0.0).abs() < 1e-3);
        assert!((end.y - 10.0).abs() < 1e-3);
    }
}
