/// How the effector's speed varies over the course of a single
/// segment. Unlike a lookahead planner, a segment always starts and
/// ends at (approximately) rest — see [`crate::planner::MotionPlanner`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AccelerationProfile {
    /// Constant velocity for the whole segment; used for homing moves
    /// where acceleration is deliberately omitted so the endstop
    /// trigger time is simple to reason about.
    None,
    /// Trapezoidal ramp: accelerate at `accel` mm/s^2 up to
    /// `cruise_velocity`, cruise, then decelerate back to zero at the
    /// same rate. Degrades to a triangle profile (no cruise phase)
    /// automatically when the segment is too short to reach
    /// `cruise_velocity`.
    ConstantAcceleration { accel: f32, cruise_velocity: f32 },
}

impl AccelerationProfile {
    /// Total time, in seconds, to cover `distance` millimeters under
    /// this profile.
    pub fn duration(&self, distance: f32) -> f32 {
        match *self {
            AccelerationProfile::None => 0.0,
            AccelerationProfile::ConstantAcceleration { accel, cruise_velocity } => {
                if accel <= 0.0 || cruise_velocity <= 0.0 || distance <= 0.0 {
                    return 0.0;
                }
                let accel_dist = cruise_velocity * cruise_velocity / (2.0 * accel);
                if 2.0 * accel_dist >= distance {
                    // Triangle profile: never reaches cruise_velocity.
                    let peak_v = (accel * distance).sqrt();
                    2.0 * peak_v / accel
                } else {
                    let accel_time = cruise_velocity / accel;
                    let cruise_dist = distance - 2.0 * accel_dist;
                    let cruise_time = cruise_dist / cruise_velocity;
                    2.0 * accel_time + cruise_time
                }
            }
        }
    }

    /// Distance covered by time `t` (seconds) into the segment, given
    /// it will travel `total_distance` millimeters overall. Returns
    /// `total_distance` for `t` beyond the profile's [`duration`].
    pub fn distance_at(&self, t: f32, total_distance: f32) -> f32 {
        if t <= 0.0 {
            return 0.0;
        }
        match *self {
            AccelerationProfile::None => {
                // Caller drives this profile with its own constant
                // rate; distance_at isn't meaningful without it, so
                // linear-in-time against total_distance/duration is
                // the degenerate case callers who pass None shouldn't
                // hit (homing uses direction/endstop polling instead).
                total_distance
            }
            AccelerationProfile::ConstantAcceleration { accel, cruise_velocity } => {
                if accel <= 0.0 || cruise_velocity <= 0.0 || total_distance <= 0.0 {
                    return total_distance.max(0.0);
                }
                let total_time = self.duration(total_distance);
                if t >= total_time {
                    return total_distance;
                }
                let accel_dist = cruise_velocity * cruise_velocity / (2.0 * accel);
                let triangle = 2.0 * accel_dist >= total_distance;
                if triangle {
                    let peak_v = (accel * total_distance).sqrt();
                    let accel_time = peak_v / accel;
                    if t <= accel_time {
                        0.5 * accel * t * t
                    } else {
                        let dt = t - accel_time;
                        let half_dist = total_distance / 2.0;
                        half_dist + peak_v * dt - 0.5 * accel * dt * dt
                    }
                } else {
                    let accel_time = cruise_velocity / accel;
                    let cruise_dist = total_distance - 2.0 * accel_dist;
                    let cruise_time = cruise_dist / cruise_velocity;
                    if t <= accel_time {
                        0.5 * accel * t * t
                    } else if t <= accel_time + cruise_time {
                        accel_dist + cruise_velocity * (t - accel_time)
                    } else {
                        let dt = t - accel_time - cruise_time;
                        accel_dist + cruise_dist + cruise_velocity * dt - 0.5 * accel * dt * dt
                    }
                }
            }
        }
    }

    /// Inverse of [`distance_at`](Self::distance_at): the elapsed time
    /// at which this profile has covered `d` millimeters of a segment
    /// totaling `total_distance` millimeters. `d` is clamped to
    /// `[0, total_distance]`.
    pub fn time_at_distance(&self, d: f32, total_distance: f32) -> f32 {
        let d = d.clamp(0.0, total_distance.max(0.0));
        match *self {
            AccelerationProfile::None => 0.0,
            AccelerationProfile::ConstantAcceleration { accel, cruise_velocity } => {
                if accel <= 0.0 || cruise_velocity <= 0.0 || total_distance <= 0.0 {
                    return 0.0;
                }
                let accel_dist = cruise_velocity * cruise_velocity / (2.0 * accel);
                let triangle = 2.0 * accel_dist >= total_distance;
                if triangle {
                    let peak_v = (accel * total_distance).sqrt();
                    let accel_time = peak_v / accel;
                    let half_dist = total_distance / 2.0;
                    if d <= half_dist {
                        (2.0 * d / accel).sqrt()
                    } else {
                        // d = half_dist + peak_v*dt - 0.5*accel*dt^2
                        let rem = d - half_dist;
                        let dt = solve_decel_quadratic(accel, peak_v, rem);
                        accel_time + dt
                    }
                } else {
                    let accel_time = cruise_velocity / accel;
                    let cruise_dist = total_distance - 2.0 * accel_dist;
                    let cruise_time = cruise_dist / cruise_velocity;
                    if d <= accel_dist {
                        (2.0 * d / accel).sqrt()
                    } else if d <= accel_dist + cruise_dist {
                        accel_time + (d - accel_dist) / cruise_velocity
                    } else {
                        let rem = d - accel_dist - cruise_dist;
                        let dt = solve_decel_quadratic(accel, cruise_velocity, rem);
                        accel_time + cruise_time + dt
                    }
                }
            }
        }
    }
}

/// Solves `rem = v*dt - 0.5*accel*dt^2` for the smaller non-negative
/// root of `dt`, the deceleration-phase time since the phase started
/// at velocity `v`.
fn solve_decel_quadratic(accel: f32, v: f32, rem: f32) -> f32 {
    // 0.5*accel*dt^2 - v*dt + rem = 0
    let a = 0.5 * accel;
    let b = -v;
    let c = rem;
    let disc = (b * b - 4.0 * a * c).max(0.0);
    let sqrt_disc = disc.sqrt();
    let dt1 = (-b - sqrt_disc) / (2.0 * a);
    let dt2 = (-b + sqrt_disc) / (2.0 * a);
    if dt1 >= 0.0 { dt1 } else { dt2.max(0.0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trapezoid_reaches_full_distance_at_total_duration() {
        let profile = AccelerationProfile::ConstantAcceleration { accel: 1000.0, cruise_velocity: 50.0 };
        let distance = 100.0;
        let total = profile.duration(distance);
        let at_end = profile.distance_at(total, distance);
        assert!((at_end - distance).abs() < 1e-2);
    }

    #[test]
    fn triangle_profile_when_distance_too_short_to_cruise() {
        let profile = AccelerationProfile::ConstantAcceleration { accel: 1000.0, cruise_velocity: 1000.0 };
        let distance = 1.0;
        let total = profile.duration(distance);
        let halfway = profile.distance_at(total / 2.0, distance);
        // Peak velocity point should be roughly half the total distance.
        assert!((halfway - distance / 2.0).abs() < distance * 0.1);
    }

    #[test]
    fn time_at_distance_round_trips_distance_at() {
        let profile = AccelerationProfile::ConstantAcceleration { accel: 800.0, cruise_velocity: 40.0 };
        let distance = 60.0;
        for frac in [0.1, 0.3, 0.5, 0.7, 0.9] {
            let d = distance * frac;
            let t = profile.time_at_distance(d, distance);
            let back = profile.distance_at(t, distance);
            assert!((back - d).abs() < 1e-2, "frac={frac} d={d} back={back}");
        }
    }

    #[test]
    fn distance_is_monotonic() {
        let profile = AccelerationProfile::ConstantAcceleration { accel: 500.0, cruise_velocity: 30.0 };
        let distance = 40.0;
        let total = profile.duration(distance);
        let mut last = 0.0;
        let mut t = 0.0;
        while t < total {
            let d = profile.distance_at(t, distance);
            assert!(d + 1e-4 >= last);
            last = d;
            t += total / 50.0;
        }
    }
}
