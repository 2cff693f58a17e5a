use crate::vector::Vector3;

/// Solves forward kinematics for a delta-style robot: given three
/// tower/joint positions and a common rod length, find the effector
/// position that is exactly `rod_len` from each of them.
///
/// This is the "intersection of three spheres" construction named in
/// SPEC_FULL.md 3 (CoordMap) for both the linear-delta and
/// angular-delta variants — linear-delta towers are fixed carriage
/// positions, angular-delta "towers" are the per-arm lower-arm pivot
/// positions computed from the current servo angle; either way the
/// final step is the same trilateration, reused here once.
///
/// Reduces to a quadratic in the effector's height along the local
/// `ez` axis (SPEC_FULL.md's "forward kinematics solves a quadratic
/// in z"); returns `None` if the spheres do not intersect (rod length
/// too short for the tower spread — a geometrically invalid machine
/// configuration, not expected in practice for a correctly calibrated
/// machine).
pub fn trilaterate(p1: Vector3, p2: Vector3, p3: Vector3, rod_len: f32) -> Option<Vector3> {
    let p12 = p2 - p1;
    let d = p12.mag();
    if d == 0.0 {
        return None;
    }
    let ex = p12.normalized();

    let p13 = p3 - p1;
    let i = ex.dot(p13);

    let iex = ex * i;
    let ey_un = p13 - iex;
    let ey_mag = ey_un.mag();
    if ey_mag == 0.0 {
        return None;
    }
    let ey = ey_un.normalized();
    let j = ey.dot(p13);

    let ez = ex.cross(ey);

    let x = d / 2.0;
    if j == 0.0 {
        return None;
    }
    let y = (i * i + j * j) / (2.0 * j) - (i / j) * x;

    let z_sq = rod_len * rod_len - x * x - y * y;
    if z_sq < 0.0 {
        return None;
    }
    let z = z_sq.sqrt();

    // Effector hangs below the plane spanned by (ex, ey); ez points
    // "up" out of that plane by construction, so subtract.
    Some(p1 + ex * x + ey * y - ez * z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symmetric_towers_place_effector_on_axis() {
        // Three towers at the same height, symmetric about the z axis,
        // with the effector directly below the centroid.
        let r = 100.0;
        let towers = [0.0_f32, 120.0, 240.0].map(|deg| {
            let rad = deg.to_radians();
            Vector3::new(r * rad.sin(), r * rad.cos(), 300.0)
        });
        let rod = 250.0;
        let effector = trilaterate(towers[0], towers[1], towers[2], rod).unwrap();
        assert!(effector.x.abs() < 1e-3);
        assert!(effector.y.abs() < 1e-3);
        assert!(effector.z < towers[0].z);
    }
}
