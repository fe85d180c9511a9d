// mesh/ - Triangle mesh and the passes that produce and refine it
//
//   grid     - height field -> closed solid
//   bend     - parabolic sag/crown along X
//   simplify - quadric error edge collapse
//   normals  - consistent outward winding

mod bend;
mod grid;
mod normals;
mod quadric;
mod simplify;

pub use bend::bend;
pub use grid::{build, grid_face_count};
pub use normals::fix_normals;
pub use simplify::simplify;

use std::collections::{HashMap, HashSet};

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{Result, geometry_err};

/// Indexed triangle mesh. Faces wind counter-clockwise seen from outside.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub vertices: Vec<Vec3>,
    pub faces: Vec<[u32; 3]>,
}

impl Mesh {
    /// Checked constructor: indices in bounds, three distinct corners per face.
    pub fn new(vertices: Vec<Vec3>, faces: Vec<[u32; 3]>) -> Result<Self> {
        let mesh = Self { vertices, faces };
        mesh.validate()?;
        Ok(mesh)
    }

    pub fn validate(&self) -> Result<()> {
        let n = self.vertices.len();
        for (i, f) in self.faces.iter().enumerate() {
            if f.iter().any(|&v| v as usize >= n) {
                return Err(geometry_err(format!("face {i} {f:?} indexes past {n} vertices")));
            }
            if f[0] == f[1] || f[1] == f[2] || f[0] == f[2] {
                return Err(geometry_err(format!("face {i} {f:?} is degenerate")));
            }
        }
        Ok(())
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Unnormalized face normal (length = 2 * area).
    pub fn face_normal(&self, face: usize) -> Vec3 {
        let [a, b, c] = self.faces[face].map(|v| self.vertices[v as usize]);
        (b - a).cross(c - a)
    }

    /// Number of faces on each undirected edge.
    pub fn edge_face_counts(&self) -> HashMap<(u32, u32), u32> {
        let mut counts = HashMap::with_capacity(self.faces.len() * 3 / 2);
        for f in &self.faces {
            for (a, b) in face_edges(f) {
                *counts.entry((a.min(b), a.max(b))).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Edges bordered by fewer or more than two faces.
    pub fn boundary_edge_count(&self) -> usize {
        self.edge_face_counts().values().filter(|&&n| n != 2).count()
    }

    pub fn is_closed_manifold(&self) -> bool {
        !self.faces.is_empty() && self.boundary_edge_count() == 0
    }

    /// Every interior edge is walked in opposite directions by its two faces.
    pub fn is_winding_consistent(&self) -> bool {
        let mut seen = HashSet::with_capacity(self.faces.len() * 3);
        self.faces.iter().flat_map(face_edges).all(|e| seen.insert(e))
    }

    /// Positive when faces wind outward on a closed mesh.
    pub fn signed_volume(&self) -> f64 {
        self.faces
            .iter()
            .map(|f| {
                let [a, b, c] = f.map(|v| self.vertices[v as usize].as_dvec3());
                a.dot(b.cross(c)) / 6.0
            })
            .sum()
    }

    /// Axis-aligned bounds, `None` for an empty mesh.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.vertices.first()?;
        Some(self.vertices.iter().fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))))
    }

    /// Flat xyz triples and index triples for export.
    pub fn to_buffers(&self) -> (Vec<f32>, Vec<u32>) {
        let vertices = self.vertices.iter().flat_map(|v| v.to_array()).collect();
        let indices = self.faces.iter().flatten().copied().collect();
        (vertices, indices)
    }

    /// Fails unless every edge borders exactly two faces.
    pub(crate) fn ensure_closed(&self, stage: &str) -> Result<()> {
        let open = self.boundary_edge_count();
        if open > 0 || self.faces.is_empty() {
            return Err(geometry_err(format!("{stage} produced a mesh with {open} open or non-manifold edges")));
        }
        Ok(())
    }
}

/// Directed edges of a face in winding order.
#[inline]
pub(crate) fn face_edges(f: &[u32; 3]) -> [(u32, u32); 3] {
    [(f[0], f[1]), (f[1], f[2]), (f[2], f[0])]
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Unit tetrahedron with outward winding.
    pub(crate) fn tetrahedron() -> Mesh {
        Mesh::new(
            vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z],
            vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]],
        )
        .unwrap()
    }

    #[test]
    fn test_tetrahedron_topology() {
        let mesh = tetrahedron();
        assert!(mesh.is_closed_manifold());
        assert!(mesh.is_winding_consistent());
        assert!((mesh.signed_volume() - 1.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_bad_faces() {
        assert!(Mesh::new(vec![Vec3::ZERO; 3], vec![[0, 1, 3]]).is_err());
        assert!(Mesh::new(vec![Vec3::ZERO; 3], vec![[0, 1, 1]]).is_err());
    }

    #[test]
    fn test_open_mesh() {
        let mesh = Mesh::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![[0, 1, 2]]).unwrap();
        assert_eq!(mesh.boundary_edge_count(), 3);
        assert!(mesh.ensure_closed("test").is_err());
    }

    #[test]
    fn test_flipped_face_breaks_consistency() {
        let mut mesh = tetrahedron();
        mesh.faces[3] = [1, 3, 2];
        assert!(mesh.is_closed_manifold());
        assert!(!mesh.is_winding_consistent());
    }

    #[test]
    fn test_buffers() {
        let mesh = tetrahedron();
        let (v, i) = mesh.to_buffers();
        assert_eq!(v.len(), 12);
        assert_eq!(&i[..3], &[0, 2, 1]);
    }
}
