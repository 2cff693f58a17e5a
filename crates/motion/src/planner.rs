//! Single-segment motion planning.
//!
//! A [`MotionPlanner`] holds at most one [`MotionSegment`] at a time —
//! there is no lookahead queue, no junction-deviation velocity
//! blending between moves, and no input shaping. Every segment starts
//! and ends at (approximately) rest. This matches a machine whose
//! G-code stream is throttled by the host rather than buffered deep
//! on the controller.

use crate::accel::AccelerationProfile;
use crate::axis_stepper::{
    AngularDeltaAxisStepper, AnyAxisStepper, AxisStepper, CartesianArcAxisStepper,
    HomingAxisStepper, LinearAxisStepper, LinearDeltaAxisStepper, StepDirection,
};
use crate::error::MotionError;
use crate::kinematics::Kinematics;
use crate::segment::MotionSegment;
use coordmap::Vector3;

/// A single microstep, timed relative to the start of the segment that
/// produced it. `axis` is 0..=2 for the machine's mechanical axes (in
/// the order the active [`Kinematics`] defines them) and `3` for the
/// extruder. Absolute scheduling — turning `time` into a wall-clock
/// deadline and expanding it into the pulse's `OutputEvent`s — is the
/// job of the stepper driver that owns this axis, not of the planner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepEvent {
    pub time: f32,
    pub axis: usize,
    pub direction: StepDirection,
}

const EXTRUDER_AXIS: usize = 3;

pub struct MotionPlanner {
    kinematics: Kinematics,
    axis_positions: [i32; 3],
    extruder_position: f32,
    steps_per_mm_e: f32,
    max_extrusion_rate: f32,
    segment: MotionSegment,
    steppers: [AnyAxisStepper; 4],
    /// `None` for homing segments, which run until every requested
    /// axis's endstop triggers rather than for a fixed duration.
    duration: Option<f32>,
}

impl MotionPlanner {
    pub fn new(
        kinematics: Kinematics,
        initial_axis_positions: [i32; 3],
        initial_extruder_position: f32,
        steps_per_mm_e: f32,
        max_extrusion_rate: f32,
    ) -> Self {
        MotionPlanner {
            kinematics,
            axis_positions: initial_axis_positions,
            extruder_position: initial_extruder_position,
            steps_per_mm_e,
            max_extrusion_rate,
            segment: MotionSegment::None,
            steppers: [
                AnyAxisStepper::Inactive,
                AnyAxisStepper::Inactive,
                AnyAxisStepper::Inactive,
                AnyAxisStepper::Inactive,
            ],
            duration: None,
        }
    }

    pub fn ready_for_next_move(&self) -> bool {
        matches!(self.segment, MotionSegment::None)
    }

    pub fn current_position(&self) -> Vector3 {
        self.kinematics.axis_positions_to_cartesian(&self.axis_positions)
    }

    pub fn current_extruder_position(&self) -> f32 {
        self.extruder_position
    }

    pub fn axis_positions(&self) -> [i32; 3] {
        self.axis_positions
    }

    /// Overwrites the authoritative axis-position array without
    /// motion, for G92-style "set current position" semantics. Only
    /// valid between segments.
    pub fn set_axis_positions(&mut self, positions: [i32; 3], extruder_position: f32) {
        self.axis_positions = positions;
        self.extruder_position = extruder_position;
    }

    pub fn kinematics(&self) -> &Kinematics {
        &self.kinematics
    }

    /// Notifies the planner that axis `axis` (0..=2) has reached its
    /// endstop; a no-op unless a `Home` segment naming that axis is in
    /// progress.
    pub fn trigger_endstop(&mut self, axis: usize) {
        if axis < self.steppers.len() {
            self.steppers[axis].trigger();
        }
    }

    /// Begins a straight-line move to `target` (machine coordinates,
    /// pre-leveling/pre-bounding), extruding to `target_e`, at
    /// cartesian feed rate `feed_rate` mm/s, accelerating/decelerating
    /// at `max_accel` mm/s^2.
    pub fn move_to(
        &mut self,
        target: Vector3,
        target_e: f32,
        feed_rate: f32,
        max_accel: f32,
    ) -> Result<(), MotionError> {
        if feed_rate <= 0.0 {
            return Err(MotionError::InvalidFeedRate(feed_rate));
        }
        let start = self.current_position();
        let target = self.kinematics.bound(self.kinematics.apply_leveling(target));
        let start_e = self.extruder_position;

        self.kinematics.cartesian_to_axis_positions(target)?;
        let nominal_distance = (target - start).mag();
        let feed_rate = self.clamp_for_extrusion(nominal_distance, start_e, target_e, feed_rate);

        let segment = MotionSegment::Linear { start, end: target, start_e, end_e: target_e, feed_rate };
        self.begin_segment(segment, AccelerationProfile::ConstantAcceleration { accel: max_accel, cruise_velocity: feed_rate });
        Ok(())
    }

    /// Begins an arc through `center`, sweeping `angle` radians (always
    /// positive; direction lives in `normal`'s right-hand sense) to
    /// `target`, extruding to `target_e`. `center`/`normal`/`angle` are
    /// precomputed by the caller (see the arc-plane derivation in the
    /// state machine's command dispatch) since the planner has no
    /// notion of G-code's I/J/K parameters.
    pub fn arc_to(
        &mut self,
        target: Vector3,
        target_e: f32,
        center: Vector3,
        normal: Vector3,
        angle: f32,
        feed_rate: f32,
        max_accel: f32,
    ) -> Result<(), MotionError> {
        if feed_rate <= 0.0 {
            return Err(MotionError::InvalidFeedRate(feed_rate));
        }
        let start = self.current_position();
        let start_e = self.extruder_position;

        let r_start = (start - center).mag();
        let r_end = (target - center).mag();
        if (r_start - r_end).abs() > r_start.max(r_end).max(1.0) * 0.01 {
            return Err(MotionError::ArcRadiusMismatch(r_start, r_end));
        }

        let normal = normal.normalized();
        let nominal_distance = {
            let probe = MotionSegment::Arc { start, end: target, start_e, end_e: target_e, center, normal, angle, feed_rate };
            probe.distance()
        };
        let feed_rate = self.clamp_for_extrusion(nominal_distance, start_e, target_e, feed_rate);
        let segment = MotionSegment::Arc { start, end: target, start_e, end_e: target_e, center, normal, angle, feed_rate };
        self.begin_segment(segment, AccelerationProfile::ConstantAcceleration { accel: max_accel, cruise_velocity: feed_rate });
        Ok(())
    }

    /// Begins driving the named axes toward their endstops at
    /// `feed_rate` mm/s, each in the given direction, with no
    /// acceleration profile. Ends when every named axis's endstop has
    /// triggered (see [`trigger_endstop`](Self::trigger_endstop)).
    pub fn home_endstops(
        &mut self,
        axes: [bool; 3],
        feed_rate: f32,
        directions: [StepDirection; 3],
    ) -> Result<(), MotionError> {
        if feed_rate <= 0.0 {
            return Err(MotionError::InvalidFeedRate(feed_rate));
        }
        if !self.ready_for_next_move() {
            return Ok(());
        }
        self.segment = MotionSegment::Home { axes, feed_rate };
        self.duration = None;
        for axis in 0..3 {
            self.steppers[axis] = if axes[axis] {
                AnyAxisStepper::Homing(HomingAxisStepper::new(
                    feed_rate,
                    self.kinematics.steps_per_mm(axis),
                    directions[axis],
                ))
            } else {
                AnyAxisStepper::Inactive
            };
        }
        self.steppers[EXTRUDER_AXIS] = AnyAxisStepper::Inactive;
        Ok(())
    }

    /// Reduces `feed_rate` so the implied extrusion velocity stays
    /// within `max_extrusion_rate`, per the initiator contract's step
    /// 3. Leaves `feed_rate` untouched if extrusion is within bounds
    /// or the move has no duration (nominal_distance == 0).
    fn clamp_for_extrusion(&self, nominal_distance: f32, start_e: f32, target_e: f32, feed_rate: f32) -> f32 {
        if nominal_distance <= 0.0 || self.max_extrusion_rate <= 0.0 {
            return feed_rate;
        }
        let nominal_time = nominal_distance / feed_rate;
        let extrusion_rate = (target_e - start_e).abs() / nominal_time;
        if extrusion_rate > self.max_extrusion_rate {
            feed_rate * (self.max_extrusion_rate / extrusion_rate)
        } else {
            feed_rate
        }
    }

    fn begin_segment(&mut self, segment: MotionSegment, profile: AccelerationProfile) {
        let total_distance = segment.distance();
        self.duration = Some(profile.duration(total_distance));

        let (start, end) = match segment {
            MotionSegment::Linear { start, end, .. } => (start, end),
            MotionSegment::Arc { start, end, .. } => (start, end),
            _ => unreachable!("begin_segment only called for Linear/Arc"),
        };
        let is_arc = matches!(segment, MotionSegment::Arc { .. });

        for axis in 0..3 {
            let current_step = self.axis_positions[axis] as i64;
            self.steppers[axis] = match (&self.kinematics, is_arc) {
                (Kinematics::Cartesian(k), false) => {
                    let (s, e) = axis_component(start, end, axis);
                    AnyAxisStepper::Linear(LinearAxisStepper::new(s, e, k.steps_per_mm[axis], total_distance, profile))
                }
                (Kinematics::Cartesian(k), true) => {
                    let MotionSegment::Arc { center, normal, angle, .. } = segment else { unreachable!() };
                    AnyAxisStepper::CartesianArc(CartesianArcAxisStepper::new(
                        axis,
                        center,
                        normal,
                        start,
                        angle,
                        k.steps_per_mm[axis],
                        total_distance,
                        profile,
                        current_step,
                    ))
                }
                (Kinematics::LinearDelta(k), _) => AnyAxisStepper::LinearDelta(LinearDeltaAxisStepper::new(
                    k, axis, start, end, total_distance, profile, current_step,
                )),
                (Kinematics::AngularDelta(k), _) => AnyAxisStepper::AngularDelta(AngularDeltaAxisStepper::new(
                    k.clone(), axis, start, end, total_distance, profile, current_step,
                )),
            };
        }

        let (start_e, end_e) = match segment {
            MotionSegment::Linear { start_e, end_e, .. } => (start_e, end_e),
            MotionSegment::Arc { start_e, end_e, .. } => (start_e, end_e),
            _ => unreachable!(),
        };
        self.steppers[EXTRUDER_AXIS] = AnyAxisStepper::Linear(LinearAxisStepper::new(
            start_e, end_e, self.steps_per_mm_e, total_distance, profile,
        ));

        self.segment = segment;
    }

    /// Produces the next microstep across every axis, or `None` once
    /// the current segment has been fully stepped (at which point the
    /// segment resets to `None` and, for a completed homing move, the
    /// kinematic's home position is latched into the axis-position
    /// array).
    pub fn next_step(&mut self) -> Option<StepEvent> {
        if matches!(self.segment, MotionSegment::None) {
            return None;
        }

        let chosen = match crate::axis_stepper::select_min_time(&self.steppers) {
            Some(i) => i,
            None => {
                self.complete_segment();
                return None;
            }
        };

        let time = self.steppers[chosen].peek_next_step_time().unwrap_or(f32::NAN);
        if !(time > 0.0) || self.duration.is_some_and(|d| time > d) {
            self.complete_segment();
            return None;
        }

        let direction = self.steppers[chosen].direction();
        if chosen < 3 {
            self.axis_positions[chosen] += match direction {
                StepDirection::Positive => 1,
                StepDirection::Negative => -1,
            };
        } else {
            self.extruder_position += match direction {
                StepDirection::Positive => 1.0 / self.steps_per_mm_e,
                StepDirection::Negative => -1.0 / self.steps_per_mm_e,
            };
        }
        self.steppers[chosen].advance();

        Some(StepEvent { time, axis: chosen, direction })
    }

    fn complete_segment(&mut self) {
        let was_home = matches!(self.segment, MotionSegment::Home { .. });
        self.segment = MotionSegment::None;
        self.duration = None;
        for s in &mut self.steppers {
            *s = AnyAxisStepper::Inactive;
        }
        if was_home {
            self.axis_positions = self.kinematics.home_position();
        }
    }
}

fn axis_component(start: Vector3, end: Vector3, axis: usize) -> (f32, f32) {
    match axis {
        0 => (start.x, end.x),
        1 => (start.y, end.y),
        _ => (start.z, end.z),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coordmap::Cartesian;

    fn cartesian_planner() -> MotionPlanner {
        MotionPlanner::new(
            Kinematics::Cartesian(Cartesian::new([80.0, 80.0, 400.0])),
            [0, 0, 0],
            0.0,
            400.0,
            300.0,
        )
    }

    #[test]
    fn linear_move_lands_on_target_within_one_microstep() {
        let mut planner = cartesian_planner();
        planner.move_to(Vector3::new(30.0, -10.0, 15.0), 5.0, 50.0, 1000.0).unwrap();
        assert!(!planner.ready_for_next_move());
        let mut steps = 0;
        while planner.next_step().is_some() {
            steps += 1;
            assert!(steps < 2_000_000, "segment did not terminate");
        }
        assert!(planner.ready_for_next_move());
        let pos = planner.current_position();
        assert!((pos.x - 30.0).abs() < 1.0 / 80.0 + 1e-3);
        assert!((pos.y - -10.0).abs() < 1.0 / 80.0 + 1e-3);
        assert!((pos.z - 15.0).abs() < 1.0 / 400.0 + 1e-3);
        assert!((planner.current_extruder_position() - 5.0).abs() < 1.0 / 400.0 + 1e-3);
    }

    #[test]
    fn second_move_rejected_until_first_completes() {
        let mut planner = cartesian_planner();
        planner.move_to(Vector3::new(10.0, 0.0, 0.0), 0.0, 20.0, 500.0).unwrap();
        assert!(!planner.ready_for_next_move());
    }

    #[test]
    fn arc_quarter_turn_lands_near_expected_point() {
        let mut planner = cartesian_planner();
        planner.set_axis_positions(
            Cartesian::new([80.0, 80.0, 400.0]).cartesian_to_axis_positions(Vector3::new(10.0, 0.0, 0.0)).unwrap(),
            0.0,
        );
        planner
            .arc_to(
                Vector3::new(0.0, 10.0, 0.0),
                0.0,
                Vector3::ZERO,
                Vector3::new(0.0, 0.0, 1.0),
                std::f32::consts::FRAC_PI_2,
                40.0,
                800.0,
            )
            .unwrap();
        let mut steps = 0;
        while planner.next_step().is_some() {
            steps += 1;
            assert!(steps < 2_000_000, "arc did not terminate");
        }
        let pos = planner.current_position();
        assert!((pos.x - 0.0).abs() < 0.5, "x={}", pos.x);
        assert!((pos.y - 10.0).abs() < 0.5, "y={}", pos.y);
    }

    #[test]
    fn homing_completes_once_triggered() {
        let mut planner = cartesian_planner();
        planner
            .home_endstops([true, false, false], 20.0, [StepDirection::Negative; 3])
            .unwrap();
        assert!(!planner.ready_for_next_move());
        for _ in 0..5 {
            assert!(planner.next_step().is_some());
        }
        planner.trigger_endstop(0);
        assert!(planner.next_step().is_none());
        assert!(planner.ready_for_next_move());
    }

    #[test]
    fn extrusion_envelope_reduces_feed_rate() {
        let mut planner = cartesian_planner();
        // 10mm at 100mm/s is 0.1s; extruding 60mm of filament in that
        // time implies 600mm/s, well over the 300mm/s ceiling.
        planner.move_to(Vector3::new(10.0, 0.0, 0.0), 60.0, 100.0, 2000.0).unwrap();
        match planner.segment {
            MotionSegment::Linear { feed_rate, .. } => assert!(feed_rate < 100.0, "feed_rate={feed_rate}"),
            _ => panic!("expected a linear segment"),
        }
    }
}
