//! A tagged union over the three shipped [`coordmap::CoordMap`]
//! implementations.
//!
//! [`MotionPlanner`](crate::planner::MotionPlanner) needs more than
//! `dyn CoordMap` can give it: building a
//! [`LinearDeltaAxisStepper`](crate::axis_stepper::LinearDeltaAxisStepper)
//! or
//! [`AngularDeltaAxisStepper`](crate::axis_stepper::AngularDeltaAxisStepper)
//! requires the concrete tower geometry, not just the trait's
//! coordinate-mapping methods. Matching on this enum once, at segment
//! setup, gets us both: the trait for everything coordinate-related,
//! and the concrete type for everything stepper-construction-related.

use coordmap::{AngularDelta, Cartesian, CoordMap, CoordMapError, LinearDelta, Matrix3, Vector3};

#[derive(Debug, Clone)]
pub enum Kinematics {
    Cartesian(Cartesian),
    LinearDelta(LinearDelta),
    AngularDelta(AngularDelta),
}

impl Kinematics {
    pub fn as_coord_map(&self) -> &dyn CoordMap {
        match self {
            Kinematics::Cartesian(k) => k,
            Kinematics::LinearDelta(k) => k,
            Kinematics::AngularDelta(k) => k,
        }
    }

    pub fn axis_positions_to_cartesian(&self, axis_positions: &[i32; 3]) -> Vector3 {
        self.as_coord_map().axis_positions_to_cartesian(axis_positions)
    }

    pub fn cartesian_to_axis_positions(&self, target: Vector3) -> Result<[i32; 3], CoordMapError> {
        self.as_coord_map().cartesian_to_axis_positions(target)
    }

    pub fn bed_level(&self) -> Matrix3 {
        self.as_coord_map().bed_level()
    }

    pub fn apply_leveling(&self, p: Vector3) -> Vector3 {
        self.as_coord_map().apply_leveling(p)
    }

    pub fn bound(&self, p: Vector3) -> Vector3 {
        self.as_coord_map().bound(p)
    }

    pub fn home_position(&self) -> [i32; 3] {
        self.as_coord_map().home_position()
    }

    pub fn do_home_before_first_movement(&self) -> bool {
        self.as_coord_map().do_home_before_first_movement()
    }

    pub fn steps_per_mm(&self, axis: usize) -> f32 {
        self.as_coord_map().steps_per_mm(axis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_to_the_wrapped_coord_map() {
        let k = Kinematics::Cartesian(Cartesian::new([80.0, 80.0, 400.0]));
        let axes = k.cartesian_to_axis_positions(Vector3::new(10.0, 0.0, 0.0)).unwrap();
        assert_eq!(axes[0], 800);
    }
}
