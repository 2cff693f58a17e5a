use crate::{trilaterate, CoordMap, CoordMapError, Matrix3, Vector3};

/// Angular-delta ("Rostock-arm" / SCARA-delta hybrid) kinematics:
/// three shoulder servos rotate rigid upper arms (length `rf`) about
/// a fixed pivot circle of radius `r`; each upper arm connects through
/// a passive joint to a forearm (length `re`) that reaches the
/// effector.
///
/// Unlike linear-delta, the controlled quantity per tower is an
/// *angle*, not a carriage height — so axis positions are in whole
/// microsteps of shoulder rotation, scaled by `steps_per_degree`.
#[derive(Debug, Clone)]
pub struct AngularDelta {
    /// Horizontal radius from machine center to each shoulder pivot.
    pub r: f32,
    /// Upper (driven) arm length, pivot to elbow.
    pub rf: f32,
    /// Forearm length, elbow to effector attachment.
    pub re: f32,
    pub steps_per_degree: f32,
    /// Shoulder angle, in degrees, corresponding to axis position 0.
    pub home_angle_degrees: f32,
    pub print_radius: f32,
    pub z_min: f32,
    pub z_max: f32,
    pub bed_level: Matrix3,
}

impl AngularDelta {
    pub fn new(r: f32, rf: f32, re: f32, steps_per_degree: f32) -> Self {
        AngularDelta {
            r,
            rf,
            re,
            steps_per_degree,
            home_angle_degrees: 0.0,
            print_radius: r + rf,
            z_min: f32::NEG_INFINITY,
            z_max: f32::INFINITY,
            bed_level: Matrix3::identity(),
        }
    }

    fn tower_angle(idx: usize) -> f32 {
        idx as f32 * 2.0 * std::f32::consts::PI / 3.0
    }

    fn shoulder_angle_radians(&self, axis_position: i32) -> f32 {
        (self.home_angle_degrees + axis_position as f32 / self.steps_per_degree).to_radians()
    }

    /// The elbow (upper-arm/forearm joint) position for tower `idx`
    /// at shoulder angle `theta` (radians), in machine coordinates.
    fn joint_position(&self, idx: usize, theta: f32) -> Vector3 {
        let w = Self::tower_angle(idx);
        let horiz = self.r + self.rf * theta.cos();
        Vector3::new(horiz * w.sin(), horiz * w.cos(), self.rf * theta.sin())
    }
}

impl CoordMap for AngularDelta {
    fn axis_positions_to_cartesian(&self, axis_positions: &[i32; 3]) -> Vector3 {
        let joints: Vec<Vector3> = (0..3)
            .map(|i| {
                let theta = self.shoulder_angle_radians(axis_positions[i]);
                self.joint_position(i, theta)
            })
            .collect();
        trilaterate(joints[0], joints[1], joints[2], self.re).unwrap_or(Vector3::ZERO)
    }

    fn cartesian_to_axis_positions(&self, target: Vector3) -> Result<[i32; 3], CoordMapError> {
        let mut out = [0i32; 3];
        for i in 0..3 {
            let w = Self::tower_angle(i);
            // Project the target into tower i's local (v, u) frame:
            // v runs radially outward through the tower, u is the
            // perpendicular horizontal offset the forearm must absorb
            // sideways (reducing its effective reach in the v-z plane).
            let v = target.x * w.sin() + target.y * w.cos();
            let u = target.x * w.cos() - target.y * w.sin();
            let re_eff_sq = self.re * self.re - u * u;
            if re_eff_sq < 0.0 {
                return Err(CoordMapError::Unreachable(target.x, target.y, target.z));
            }
            let re_eff = re_eff_sq.sqrt();

            // In the local (horizontal, z) plane, the shoulder pivots
            // on a circle of radius rf centered at (r, 0); the elbow
            // must also lie a distance re_eff from (v, target.z).
            let local_x = v - self.r;
            let local_z = target.z;
            let d_sq = local_x * local_x + local_z * local_z;
            let d = d_sq.sqrt();
            if d == 0.0 {
                return Err(CoordMapError::Unreachable(target.x, target.y, target.z));
            }
            let cos_alpha = (self.rf * self.rf + d_sq - re_eff * re_eff) / (2.0 * self.rf * d);
            if !(-1.0..=1.0).contains(&cos_alpha) {
                return Err(CoordMapError::Unreachable(target.x, target.y, target.z));
            }
            let alpha = cos_alpha.acos();
            let base = local_z.atan2(local_x);
            // Elbow-down solution: arm swings below the line to the
            // target, matching the original firmware's convention for
            // this machine's build direction.
            let theta = base - alpha;

            let degrees = theta.to_degrees();
            let steps = (degrees - self.home_angle_degrees) * self.steps_per_degree;
            out[i] = steps.round() as i32;
        }
        Ok(out)
    }

    fn bed_level(&self) -> Matrix3 {
        self.bed_level
    }

    fn bound(&self, p: Vector3) -> Vector3 {
        let radial = (p.x * p.x + p.y * p.y).sqrt();
        let clamped = if radial > self.print_radius && radial > 0.0 {
            let scale = self.print_radius / radial;
            Vector3::new(p.x * scale, p.y * scale, p.z)
        } else {
            p
        };
        Vector3::new(clamped.x, clamped.y, clamped.z.clamp(self.z_min, self.z_max))
    }

    fn home_position(&self) -> [i32; 3] {
        [0, 0, 0]
    }

    fn steps_per_mm(&self, _axis: usize) -> f32 {
        // Rotary axis: the homing AxisStepper uses this as a
        // steps-per-unit fixed rate, here degrees rather than mm.
        self.steps_per_degree
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_machine() -> AngularDelta {
        let mut m = AngularDelta::new(80.0, 120.0, 280.0, 100.0);
        m.home_angle_degrees = 0.0;
        m
    }

    #[test]
    fn round_trip_near_center() {
        let map = sample_machine();
        let target = Vector3::new(0.0, 0.0, -200.0);
        let axes = map.cartesian_to_axis_positions(target).unwrap();
        let back = map.axis_positions_to_cartesian(&axes);
        assert!((back.x - target.x).abs() < 0.5);
        assert!((back.y - target.y).abs() < 0.5);
        assert!((back.z - target.z).abs() < 0.5);
    }

    #[test]
    fn far_out_of_reach_point_errors() {
        let map = sample_machine();
        let err = map.cartesian_to_axis_positions(Vector3::new(0.0, 0.0, 10_000.0));
        assert!(err.is_err());
    }

    #[test]
    fn joint_position_sits_on_pivot_circle_horizontally_at_theta_zero() {
        let map = sample_machine();
        let joint = map.joint_position(0, 0.0);
        // At theta = 0 the elbow is straight out at r + rf along tower 0's axis.
        assert!((joint.x).abs() < 1e-3);
        assert!((joint.y - (map.r + map.rf)).abs() < 1e-3);
        assert!(joint.z.abs() < 1e-3);
    }
}
