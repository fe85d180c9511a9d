// simplify.rs - Quadric error edge collapse
//
// Arena storage: vertex and face arrays are never shrunk while collapsing,
// removed entries are tombstoned and the survivors compacted at the end.
// Queue entries carry the endpoint versions they were computed against so
// stale entries are skipped on pop instead of being searched for and removed.
// Equal costs are ordered by edge length, shortest first. An edge rejected on
// pop is parked with its endpoints and queued again only when a collapse
// touches one of them.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

use glam::DVec3;
use ordered_float::OrderedFloat;

use super::quadric::Quadric;
use super::{Mesh, face_edges};
use crate::cancel::CancelToken;
use crate::error::{Result, config_err};

/// Never reduce below a tetrahedron.
const MIN_FACES: usize = 4;

/// Smallest allowed cosine between a face normal before and after a collapse.
const MIN_NORMAL_COS: f64 = 0.1;

/// Optimal points farther than this many edge lengths from the edge midpoint
/// are treated as numerically unreliable.
const MAX_OPTIMUM_REACH: f64 = 2.0;

type Entry = Reverse<(OrderedFloat<f64>, OrderedFloat<f64>, u32, u32, u32, u32)>;

struct Collapser {
    positions: Vec<DVec3>,
    quadrics: Vec<Quadric>,
    vertex_alive: Vec<bool>,
    version: Vec<u32>,
    vertex_faces: Vec<Vec<u32>>,
    /// Other endpoints of edges rejected while this vertex was unchanged.
    parked: Vec<Vec<u32>>,

    faces: Vec<[u32; 3]>,
    face_alive: Vec<bool>,
    live_faces: usize,

    heap: BinaryHeap<Entry>,
}

impl Collapser {
    fn new(mesh: &Mesh) -> Self {
        let positions: Vec<DVec3> = mesh.vertices.iter().map(|v| v.as_dvec3()).collect();
        let mut quadrics = vec![Quadric::default(); positions.len()];
        let mut vertex_faces = vec![Vec::new(); positions.len()];

        for (i, f) in mesh.faces.iter().enumerate() {
            let q = Quadric::from_triangle(positions[f[0] as usize], positions[f[1] as usize], positions[f[2] as usize]);
            for &v in f {
                quadrics[v as usize] += q;
                vertex_faces[v as usize].push(i as u32);
            }
        }

        let mut this = Self {
            vertex_alive: vec![true; positions.len()],
            version: vec![0; positions.len()],
            parked: vec![Vec::new(); positions.len()],
            positions,
            quadrics,
            vertex_faces,
            faces: mesh.faces.clone(),
            face_alive: vec![true; mesh.faces.len()],
            live_faces: mesh.faces.len(),
            heap: BinaryHeap::new(),
        };

        let mut edges = HashSet::new();
        for f in &mesh.faces {
            for (a, b) in face_edges(f) {
                if edges.insert((a.min(b), a.max(b))) {
                    this.push_edge(a.min(b), a.max(b));
                }
            }
        }
        this
    }

    /// Collapse target and its error for edge `a-b`.
    fn target(&self, a: u32, b: u32) -> (f64, DVec3) {
        let q = self.quadrics[a as usize] + self.quadrics[b as usize];
        let (pa, pb) = (self.positions[a as usize], self.positions[b as usize]);
        let mid = (pa + pb) * 0.5;
        let reach = (pb - pa).length() * MAX_OPTIMUM_REACH;

        if let Some(p) = q.minimizer().filter(|p| p.distance(mid) <= reach) {
            return (q.error(p), p);
        }
        // First minimum wins, so flat neighborhoods collapse to the midpoint.
        [mid, pa, pb]
            .into_iter()
            .map(|p| (q.error(p), p))
            .min_by(|x, y| x.0.total_cmp(&y.0))
            .unwrap_or((0.0, mid))
    }

    fn push_edge(&mut self, a: u32, b: u32) {
        let (cost, _) = self.target(a, b);
        let length = self.positions[a as usize].distance_squared(self.positions[b as usize]);
        self.heap.push(Reverse((
            OrderedFloat(cost),
            OrderedFloat(length),
            a,
            b,
            self.version[a as usize],
            self.version[b as usize],
        )));
    }

    fn neighbors(&self, v: u32) -> HashSet<u32> {
        self.vertex_faces[v as usize]
            .iter()
            .flat_map(|&f| self.faces[f as usize])
            .filter(|&u| u != v)
            .collect()
    }

    fn can_collapse(&self, a: u32, b: u32, target: DVec3) -> bool {
        // Exactly two faces on the edge, and removing them leaves a solid.
        let shared: Vec<u32> = self.vertex_faces[a as usize]
            .iter()
            .copied()
            .filter(|&f| self.faces[f as usize].contains(&b))
            .collect();
        if shared.len() != 2 || self.live_faces - shared.len() < MIN_FACES {
            return false;
        }

        // Link condition: the only common neighbors are the two opposite corners.
        let common = self.neighbors(a).intersection(&self.neighbors(b)).count();
        if common != 2 {
            return false;
        }

        // No surviving face may flip or collapse to zero area.
        for &v in &[a, b] {
            for &f in &self.vertex_faces[v as usize] {
                let face = self.faces[f as usize];
                if face.contains(&a) && face.contains(&b) {
                    continue;
                }
                let before = face.map(|u| self.positions[u as usize]);
                let after = face.map(|u| if u == v { target } else { self.positions[u as usize] });
                let n0 = (before[1] - before[0]).cross(before[2] - before[0]);
                let n1 = (after[1] - after[0]).cross(after[2] - after[0]);
                let (l0, l1) = (n0.length(), n1.length());
                if l1 <= 1e-12 * l0.max(1e-12) {
                    return false;
                }
                if l0 > 0.0 && n0.dot(n1) / (l0 * l1) < MIN_NORMAL_COS {
                    return false;
                }
            }
        }
        true
    }

    /// Merge `b` into `a` at `target`.
    fn collapse(&mut self, a: u32, b: u32, target: DVec3) {
        self.positions[a as usize] = target;
        let qb = self.quadrics[b as usize];
        self.quadrics[a as usize] += qb;

        for f in std::mem::take(&mut self.vertex_faces[b as usize]) {
            let face = &mut self.faces[f as usize];
            if face.contains(&a) {
                self.face_alive[f as usize] = false;
                self.live_faces -= 1;
                for u in *face {
                    if u != b {
                        self.vertex_faces[u as usize].retain(|&g| g != f);
                    }
                }
            } else {
                for u in face.iter_mut() {
                    if *u == b {
                        *u = a;
                    }
                }
                self.vertex_faces[a as usize].push(f);
            }
        }

        self.vertex_alive[b as usize] = false;
        self.version[a as usize] += 1;

        // Only edges on `a` change cost. Parked edges around it may have
        // become valid.
        self.parked[b as usize].clear();
        let ring = self.neighbors(a);
        for &n in &ring {
            self.push_edge(a.min(n), a.max(n));
        }
        for v in ring.iter().copied().chain([a]) {
            for u in std::mem::take(&mut self.parked[v as usize]) {
                if u != v && self.vertex_alive[u as usize] && !(v == a && ring.contains(&u)) {
                    self.push_edge(u.min(v), u.max(v));
                }
            }
        }
    }

    fn park(&mut self, a: u32, b: u32) {
        self.parked[a as usize].push(b);
        self.parked[b as usize].push(a);
    }

    fn into_mesh(self) -> Mesh {
        let mut remap = vec![u32::MAX; self.positions.len()];
        let mut vertices = Vec::new();
        let mut faces = Vec::with_capacity(self.live_faces);

        for (f, face) in self.faces.iter().enumerate() {
            if !self.face_alive[f] {
                continue;
            }
            faces.push(face.map(|v| {
                let slot = &mut remap[v as usize];
                if *slot == u32::MAX {
                    *slot = vertices.len() as u32;
                    vertices.push(self.positions[v as usize].as_vec3());
                }
                *slot
            }));
        }
        Mesh { vertices, faces }
    }
}

/// Collapse edges until `ratio` of the faces are gone or no collapse is valid.
///
/// `ratio` must be in `[0, 1)`; 0 returns the mesh unchanged.
pub fn simplify(mesh: &Mesh, ratio: f32, cancel: &CancelToken) -> Result<Mesh> {
    if !(0.0..1.0).contains(&ratio) {
        return Err(config_err(format!("target reduction must be in [0, 1), got {ratio}")));
    }
    mesh.validate()?;
    if ratio == 0.0 || mesh.face_count() <= MIN_FACES {
        return Ok(mesh.clone());
    }

    let original = mesh.face_count();
    let goal = ((ratio as f64 * original as f64) - 1e-9).ceil().max(0.0) as usize;
    let mut state = Collapser::new(mesh);
    let mut collapses = 0usize;

    while original - state.live_faces < goal {
        cancel.check()?;
        let Some(Reverse((_, _, a, b, va, vb))) = state.heap.pop() else { break };
        let (ai, bi) = (a as usize, b as usize);
        if !state.vertex_alive[ai] || !state.vertex_alive[bi] || state.version[ai] != va || state.version[bi] != vb {
            continue;
        }
        let (_, target) = state.target(a, b);
        if !state.can_collapse(a, b, target) {
            state.park(a, b);
            continue;
        }
        state.collapse(a, b, target);
        collapses += 1;
    }

    let out = state.into_mesh();
    out.ensure_closed("simplification")?;
    tracing::info!(
        before = original,
        after = out.face_count(),
        collapses,
        ratio,
        "simplified mesh"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::height::HeightField;
    use crate::mesh::build;
    use crate::mesh::tests::tetrahedron;

    fn bumpy(w: usize, h: usize) -> Mesh {
        let values = (0..w * h)
            .map(|i| {
                let (x, y) = ((i % w) as f32, (i / w) as f32);
                5.0 + if (x - w as f32 / 2.0).powi(2) + (y - h as f32 / 2.0).powi(2) < (w as f32 / 4.0).powi(2) { 2.0 } else { 0.0 }
            })
            .collect();
        build(&HeightField::new(w, h, values).unwrap(), 70.0, 40.0).unwrap()
    }

    #[test]
    fn test_zero_ratio_is_noop() {
        let mesh = bumpy(8, 8);
        assert_eq!(simplify(&mesh, 0.0, &CancelToken::new()).unwrap(), mesh);
    }

    #[test]
    fn test_rejects_ratio_out_of_range() {
        let mesh = tetrahedron();
        for r in [1.0, 1.5, -0.1, f32::NAN] {
            assert!(matches!(simplify(&mesh, r, &CancelToken::new()), Err(Error::Configuration(_))));
        }
    }

    #[test]
    fn test_flat_slab_collapses_to_box() {
        let field = HeightField::new(12, 9, vec![3.0; 108]).unwrap();
        let mesh = build(&field, 11.0, 8.0).unwrap();
        let out = simplify(&mesh, 0.9, &CancelToken::new()).unwrap();

        assert!(out.is_closed_manifold());
        assert!(out.face_count() <= mesh.face_count() / 10 + 1);
        assert!(out.face_count() >= MIN_FACES);
        // Shape is preserved: same box volume and extent.
        assert!((out.signed_volume().abs() - 11.0 * 8.0 * 3.0).abs() < 1e-2);
        let ((lo, hi), (lo0, hi0)) = (out.bounds().unwrap(), mesh.bounds().unwrap());
        assert!(lo.abs_diff_eq(lo0, 1e-4) && hi.abs_diff_eq(hi0, 1e-4));
    }

    #[test]
    fn test_reduction_bound() {
        let mesh = bumpy(24, 24);
        let out = simplify(&mesh, 0.5, &CancelToken::new()).unwrap();
        assert!(out.face_count() as f64 <= mesh.face_count() as f64 * 0.5 + 2.0);
        assert!(out.is_closed_manifold());
        assert!(out.is_winding_consistent());
    }

    #[test]
    fn test_large_disc_within_deadline() {
        // Flat plateaus used to funnel every collapse into one vertex.
        let n = 100;
        let c = n as f32 / 2.0;
        let values = (0..n * n)
            .map(|i| {
                let (x, y) = ((i % n) as f32 - c, (i / n) as f32 - c);
                if x * x + y * y < c * c / 2.0 { 7.0 } else { 5.0 }
            })
            .collect();
        let mesh = build(&HeightField::new(n, n, values).unwrap(), 70.0, 70.0).unwrap();

        let cancel = CancelToken::with_deadline(std::time::Duration::from_secs(60));
        let out = simplify(&mesh, 0.9, &cancel).unwrap();
        assert!(out.face_count() * 10 <= mesh.face_count() + 10);
        assert!(out.is_closed_manifold());
    }

    #[test]
    fn test_tetrahedron_cannot_shrink() {
        let mesh = tetrahedron();
        let out = simplify(&mesh, 0.9, &CancelToken::new()).unwrap();
        assert_eq!(out.face_count(), 4);
    }

    #[test]
    fn test_cancelled() {
        let cancel = CancelToken::new();
        cancel.cancel();
        assert_eq!(simplify(&bumpy(6, 6), 0.5, &cancel).unwrap_err(), Error::Cancelled);
    }
}
