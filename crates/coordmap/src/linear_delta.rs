use crate::{trilaterate, CoordMap, CoordMapError, Matrix3, Vector3};

/// Linear-delta kinematics: three vertical carriages on a circle of
/// radius `r`, connected by fixed rods of length `l` to an end
/// effector (a Kossel-style machine).
///
/// Tower angles follow the original firmware's convention (CW from
/// the +y axis): tower A at 0°, B at 120°, C at 240°, so tower
/// position is `(r * sin(w), r * cos(w))`.
#[derive(Debug, Clone)]
pub struct LinearDelta {
    /// Horizontal radius from the machine center to each tower.
    pub r: f32,
    /// Fixed rod length connecting each carriage to the effector.
    pub l: f32,
    /// Microsteps per millimeter of carriage travel (same for all
    /// three towers by construction).
    pub steps_per_mm: f32,
    /// Carriage height, in mm, corresponding to axis position 0 — the
    /// homed (fully-retracted, switches-triggered) position.
    pub home_carriage_height: f32,
    /// Maximum horizontal reach from the center column, used for
    /// bounding.
    pub print_radius: f32,
    pub z_min: f32,
    pub z_max: f32,
    pub bed_level: Matrix3,
}

impl LinearDelta {
    pub fn new(r: f32, l: f32, steps_per_mm: f32) -> Self {
        LinearDelta {
            r,
            l,
            steps_per_mm,
            home_carriage_height: 0.0,
            print_radius: r,
            z_min: 0.0,
            z_max: f32::INFINITY,
            bed_level: Matrix3::identity(),
        }
    }

    /// Angle (radians) of tower `idx` (0=A, 1=B, 2=C), CW from +y.
    pub fn tower_angle(idx: usize) -> f32 {
        idx as f32 * 2.0 * std::f32::consts::PI / 3.0
    }

    /// The fixed (x, y) position of tower `idx`.
    pub fn tower_xy(&self, idx: usize) -> (f32, f32) {
        let w = Self::tower_angle(idx);
        (self.r * w.sin(), self.r * w.cos())
    }

    fn tower_position(&self, idx: usize, carriage_height: f32) -> Vector3 {
        let (x, y) = self.tower_xy(idx);
        Vector3::new(x, y, carriage_height)
    }
}

impl CoordMap for LinearDelta {
    fn axis_positions_to_cartesian(&self, axis_positions: &[i32; 3]) -> Vector3 {
        let heights: Vec<f32> = (0..3)
            .map(|i| {
                self.home_carriage_height + axis_positions[i] as f32 / self.steps_per_mm
            })
            .collect();
        let towers: Vec<Vector3> = (0..3).map(|i| self.tower_position(i, heights[i])).collect();
        trilaterate(towers[0], towers[1], towers[2], self.l).unwrap_or(Vector3::ZERO)
    }

    fn cartesian_to_axis_positions(&self, target: Vector3) -> Result<[i32; 3], CoordMapError> {
        let mut out = [0i32; 3];
        for i in 0..3 {
            let (tx, ty) = self.tower_xy(i);
            let dx = target.x - tx;
            let dy = target.y - ty;
            let under_root = self.l * self.l - dx * dx - dy * dy;
            if under_root < 0.0 {
                return Err(CoordMapError::Unreachable(target.x, target.y, target.z));
            }
            // Carriage sits above the effector in this machine's
            // convention (rods hang down to the effector).
            let carriage_height = target.z + under_root.sqrt();
            let steps = (carriage_height - self.home_carriage_height) * self.steps_per_mm;
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
        self.steps_per_mm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_near_center() {
        let map = LinearDelta::new(150.0, 320.0, 100.0);
        let target = Vector3::new(5.0, -3.0, 100.0);
        let axes = map.cartesian_to_axis_positions(target).unwrap();
        let back = map.axis_positions_to_cartesian(&axes);
        assert!((back.x - target.x).abs() < 0.05);
        assert!((back.y - target.y).abs() < 0.05);
        assert!((back.z - target.z).abs() < 0.05);
    }

    #[test]
    fn unreachable_point_errors() {
        let map = LinearDelta::new(150.0, 320.0, 100.0);
        let err = map.cartesian_to_axis_positions(Vector3::new(10_000.0, 0.0, 0.0));
        assert!(err.is_err());
    }

    #[test]
    fn tower_a_matches_spec_convention() {
        // Tower A (idx 0) sits at (0, r): CW from +y axis.
        let map = LinearDelta::new(100.0, 300.0, 100.0);
        let (x, y) = map.tower_xy(0);
        assert!(x.abs() < 1e-4);
        assert!((y - 100.0).abs() < 1e-4);
    }
}
