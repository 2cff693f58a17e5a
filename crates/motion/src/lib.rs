//! Single-segment motion planning: turns a G-code-level move or home
//! request into per-axis step events, one segment at a time. There is
//! deliberately no cross-segment lookahead or velocity joining — each
//! segment starts and ends at rest, matching the original firmware's
//! planner rather than a full jerk-limited trajectory planner.

pub mod accel;
pub mod axis_stepper;
pub mod error;
pub mod kinematics;
pub mod planner;
pub mod segment;

pub use accel::AccelerationProfile;
pub use axis_stepper::{AxisStepper, StepDirection};
pub use error::MotionError;
pub use kinematics::Kinematics;
pub use planner::{MotionPlanner, StepEvent};
pub use segment::MotionSegment;
