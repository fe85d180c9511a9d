// bend.rs - Parabolic bend along X
//
// z -= factor * t^2, t = -1 at the left edge, 0 at the center, 1 at the
// right. Every Y cross-section bends the same way. Positive factors sag the
// ends down, negative factors lift them.

use super::Mesh;
use crate::error::{Result, config_err};

pub fn bend(mut mesh: Mesh, factor: f32) -> Result<Mesh> {
    if !factor.is_finite() {
        return Err(config_err(format!("bend factor must be finite, got {factor}")));
    }
    if factor == 0.0 {
        return Ok(mesh);
    }
    let Some((lo, hi)) = mesh.bounds() else { return Ok(mesh) };

    let center = (lo.x + hi.x) / 2.0;
    let half = hi.x - center;
    if half <= 0.0 {
        return Ok(mesh);
    }

    for v in &mut mesh.vertices {
        let t = (v.x - center) / half;
        v.z -= factor * t * t;
    }
    tracing::debug!(factor, "bent mesh");
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::height::HeightField;
    use crate::mesh::build;
    use glam::Vec3;

    fn slab() -> Mesh {
        let field = HeightField::new(5, 3, vec![2.0; 15]).unwrap();
        build(&field, 8.0, 4.0).unwrap()
    }

    #[test]
    fn test_zero_is_identity() {
        let mesh = slab();
        assert_eq!(bend(mesh.clone(), 0.0).unwrap(), mesh);
    }

    #[test]
    fn test_parabola() {
        let mesh = slab();
        let bent = bend(mesh.clone(), 3.0).unwrap();
        assert_eq!(bent.faces, mesh.faces);
        assert_eq!(bent.vertex_count(), mesh.vertex_count());

        for (before, after) in mesh.vertices.iter().zip(&bent.vertices) {
            let t = (before.x - 4.0) / 4.0;
            assert!((after.z - (before.z - 3.0 * t * t)).abs() < 1e-6);
            assert_eq!((after.x, after.y), (before.x, before.y));
        }
        // Ends drop by the full factor, the middle column stays put.
        let top_left = bent.vertices[15];
        let top_mid = bent.vertices[15 + 2];
        assert_eq!(top_left, Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(top_mid.z, 2.0);
    }

    #[test]
    fn test_single_column_is_noop() {
        let mesh = Mesh::new(vec![Vec3::new(1.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 0.0), Vec3::new(1.0, 0.0, 1.0)], vec![[0, 1, 2]])
            .unwrap();
        assert_eq!(bend(mesh.clone(), 5.0).unwrap(), mesh);
    }

    #[test]
    fn test_rejects_nan() {
        assert!(bend(slab(), f32::NAN).is_err());
    }
}
