// quadric.rs - Plane quadrics for error-driven simplification
//
// Symmetric 4x4 matrix stored as its upper triangle:
//   [0 1 2 3]
//   [  4 5 6]
//   [    7 8]
//   [      9]

use glam::{DMat3, DVec3};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Quadric([f64; 10]);

impl Quadric {
    /// Squared distance to the plane through `a, b, c`, weighted by triangle area.
    pub fn from_triangle(a: DVec3, b: DVec3, c: DVec3) -> Self {
        let cross = (b - a).cross(c - a);
        let len = cross.length();
        if len <= f64::EPSILON {
            return Self::default();
        }
        let n = cross / len;
        Self::from_plane(n, -n.dot(a), len * 0.5)
    }

    pub fn from_plane(n: DVec3, d: f64, weight: f64) -> Self {
        let (x, y, z) = (n.x, n.y, n.z);
        Self([
            x * x, x * y, x * z, x * d,
            y * y, y * z, y * d,
            z * z, z * d,
            d * d,
        ].map(|v| v * weight))
    }

    pub fn error(&self, p: DVec3) -> f64 {
        let q = &self.0;
        let (x, y, z) = (p.x, p.y, p.z);
        let e = q[0] * x * x + 2.0 * q[1] * x * y + 2.0 * q[2] * x * z + 2.0 * q[3] * x
            + q[4] * y * y + 2.0 * q[5] * y * z + 2.0 * q[6] * y
            + q[7] * z * z + 2.0 * q[8] * z
            + q[9];
        e.max(0.0)
    }

    /// Point minimizing the error, `None` when the 3x3 system is near singular
    /// (flat or single-crease neighborhoods).
    pub fn minimizer(&self) -> Option<DVec3> {
        let q = &self.0;
        let m = DMat3::from_cols(
            DVec3::new(q[0], q[1], q[2]),
            DVec3::new(q[1], q[4], q[5]),
            DVec3::new(q[2], q[5], q[7]),
        );
        let scale = q[0] + q[4] + q[7];
        let det = m.determinant();
        if scale <= 0.0 || det.abs() <= 1e-9 * scale * scale * scale {
            return None;
        }
        let p = m.inverse() * DVec3::new(-q[3], -q[6], -q[8]);
        p.is_finite().then_some(p)
    }
}

impl std::ops::Add for Quadric {
    type Output = Self;
    fn add(self, o: Self) -> Self {
        let mut out = self.0;
        for (a, b) in out.iter_mut().zip(o.0) {
            *a += b;
        }
        Self(out)
    }
}

impl std::ops::AddAssign for Quadric {
    fn add_assign(&mut self, o: Self) {
        *self = *self + o;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_distance() {
        let q = Quadric::from_plane(DVec3::Z, -2.0, 1.0);
        assert!((q.error(DVec3::new(5.0, -3.0, 5.0)) - 9.0).abs() < 1e-12);
        assert_eq!(q.error(DVec3::new(1.0, 1.0, 2.0)), 0.0);
        assert!(q.minimizer().is_none());
    }

    #[test]
    fn test_corner_minimizer() {
        let q = Quadric::from_plane(DVec3::X, -1.0, 1.0)
            + Quadric::from_plane(DVec3::Y, -2.0, 1.0)
            + Quadric::from_plane(DVec3::Z, -3.0, 1.0);
        let p = q.minimizer().unwrap();
        assert!((p - DVec3::new(1.0, 2.0, 3.0)).length() < 1e-9);
    }

    #[test]
    fn test_triangle_weight_is_area() {
        let q = Quadric::from_triangle(DVec3::ZERO, DVec3::new(2.0, 0.0, 0.0), DVec3::new(0.0, 2.0, 0.0));
        // area 2, distance 1 -> error 2
        assert!((q.error(DVec3::new(0.3, 0.3, 1.0)) - 2.0).abs() < 1e-12);
    }
}
