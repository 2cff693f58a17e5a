//! Kinematic transforms between Cartesian millimeters and per-motor
//! microstep counts, for the three machine geometries Printipi
//! supports: Cartesian, linear-delta, and angular-delta.

mod angular_delta;
mod cartesian;
mod error;
mod linear_delta;
mod matrix;
mod trilaterate;
mod vector;

pub use angular_delta::AngularDelta;
pub use cartesian::Cartesian;
pub use error::CoordMapError;
pub use linear_delta::LinearDelta;
pub use matrix::Matrix3;
pub use trilaterate::trilaterate;
pub use vector::{Vector3, Vector4};

/// A bidirectional mapping between Cartesian (x, y, z) millimeters and
/// a fixed-size array of per-axis microstep counts, plus the
/// associated bed-leveling, bounding, and homing behavior.
///
/// All three shipped kinematics use exactly 3 mechanical axes (the
/// extruder is always a direct steps/mm axis and is handled
/// separately by callers, since it never participates in the
/// Cartesian coupling).
pub trait CoordMap {
    /// Converts the authoritative axis-position array into a
    /// Cartesian point. This is a pure function of `axis_positions`:
    /// it must not depend on host zero, unit mode, or move history.
    fn axis_positions_to_cartesian(&self, axis_positions: &[i32; 3]) -> Vector3;

    /// Converts a Cartesian target into the axis-position array that
    /// places the effector there, ignoring bounding/leveling (callers
    /// apply those first via [`CoordMap::bound`] and
    /// [`CoordMap::apply_leveling`]).
    fn cartesian_to_axis_positions(&self, target: Vector3) -> Result<[i32; 3], CoordMapError>;

    /// The bed-leveling matrix applied to cartesian targets before
    /// inverse kinematics. Identity unless the machine specifies one.
    fn bed_level(&self) -> Matrix3 {
        Matrix3::identity()
    }

    fn apply_leveling(&self, p: Vector3) -> Vector3 {
        self.bed_level().mul_vec3(p)
    }

    /// Clamps an unreachable coordinate into the machine's build
    /// volume. Default is a no-op; concrete kinematics override this
    /// with their actual bounding geometry.
    fn bound(&self, p: Vector3) -> Vector3 {
        p
    }

    /// The axis-position array homing resets the machine to.
    fn home_position(&self) -> [i32; 3];

    /// Whether a movement command that arrives before the first home
    /// should have a home silently injected ahead of it.
    fn do_home_before_first_movement(&self) -> bool {
        true
    }

    /// Steps per millimeter of cartesian travel for axis `i`, used by
    /// the homing AxisStepper to pick a fixed step rate. For
    /// non-cartesian kinematics this is steps per mm of the
    /// underlying linear/rotary actuator, not of cartesian distance.
    fn steps_per_mm(&self, axis: usize) -> f32;
}
