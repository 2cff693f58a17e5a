use crate::{CoordMap, CoordMapError, Matrix3, Vector3};

/// Standard Cartesian kinematics: each motor maps directly to one
/// Cartesian axis, scaled by that axis's steps/mm.
#[derive(Debug, Clone)]
pub struct Cartesian {
    pub steps_per_mm: [f32; 3],
    pub bed_level: Matrix3,
    pub bound_min: Vector3,
    pub bound_max: Vector3,
}

impl Cartesian {
    pub fn new(steps_per_mm: [f32; 3]) -> Self {
        Cartesian {
            steps_per_mm,
            bed_level: Matrix3::identity(),
            bound_min: Vector3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
            bound_max: Vector3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
        }
    }

    pub fn with_bounds(mut self, min: Vector3, max: Vector3) -> Self {
        self.bound_min = min;
        self.bound_max = max;
        self
    }
}

impl CoordMap for Cartesian {
    fn axis_positions_to_cartesian(&self, axis_positions: &[i32; 3]) -> Vector3 {
        Vector3::new(
            axis_positions[0] as f32 / self.steps_per_mm[0],
            axis_positions[1] as f32 / self.steps_per_mm[1],
            axis_positions[2] as f32 / self.steps_per_mm[2],
        )
    }

    fn cartesian_to_axis_positions(&self, target: Vector3) -> Result<[i32; 3], CoordMapError> {
        Ok([
            (target.x * self.steps_per_mm[0]).round() as i32,
            (target.y * self.steps_per_mm[1]).round() as i32,
            (target.z * self.steps_per_mm[2]).round() as i32,
        ])
    }

    fn bed_level(&self) -> Matrix3 {
        self.bed_level
    }

    fn bound(&self, p: Vector3) -> Vector3 {
        Vector3::new(
            p.x.clamp(self.bound_min.x, self.bound_max.x),
            p.y.clamp(self.bound_min.y, self.bound_max.y),
            p.z.clamp(self.bound_min.z, self.bound_max.z),
        )
    }

    fn home_position(&self) -> [i32; 3] {
        [0, 0, 0]
    }

    fn steps_per_mm(&self, axis: usize) -> f32 {
        self.steps_per_mm[axis]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_is_exact_to_one_microstep() {
        let map = Cartesian::new([80.0, 80.0, 400.0]);
        let target = Vector3::new(30.0, -10.0, 15.0);
        let axes = map.cartesian_to_axis_positions(target).unwrap();
        let back = map.axis_positions_to_cartesian(&axes);
        assert!((back.x - target.x).abs() < 1.0 / 80.0);
        assert!((back.y - target.y).abs() < 1.0 / 80.0);
        assert!((back.z - target.z).abs() < 1.0 / 400.0);
    }

    #[test]
    fn bound_clamps_outside_volume() {
        let map = Cartesian::new([80.0, 80.0, 400.0])
            .with_bounds(Vector3::ZERO, Vector3::new(200.0, 200.0, 200.0));
        let clamped = map.bound(Vector3::new(-5.0, 250.0, 100.0));
        assert_eq!(clamped, Vector3::new(0.0, 200.0, 100.0));
    }
}
