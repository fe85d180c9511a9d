// normals.rs - Make face winding consistent and outward
//
// Breadth-first over edge-adjacent faces: a neighbor that walks a shared edge
// in the same direction as the face it was reached from is flipped. Each
// connected shell is then flipped as a whole if its signed volume is negative.

use std::collections::{HashMap, VecDeque};

use super::{Mesh, face_edges};

fn flip(face: &mut [u32; 3]) {
    face.swap(1, 2);
}

fn shell_volume(mesh: &Mesh, shell: &[usize]) -> f64 {
    shell
        .iter()
        .map(|&f| {
            let [a, b, c] = mesh.faces[f].map(|v| mesh.vertices[v as usize].as_dvec3());
            a.dot(b.cross(c))
        })
        .sum()
}

pub fn fix_normals(mut mesh: Mesh) -> Mesh {
    let mut edge_faces: HashMap<(u32, u32), Vec<usize>> = HashMap::with_capacity(mesh.faces.len() * 3 / 2);
    for (i, f) in mesh.faces.iter().enumerate() {
        for (a, b) in face_edges(f) {
            edge_faces.entry((a.min(b), a.max(b))).or_default().push(i);
        }
    }

    let mut visited = vec![false; mesh.faces.len()];
    let mut queue = VecDeque::new();
    let mut flipped = 0usize;

    for seed in 0..mesh.faces.len() {
        if visited[seed] {
            continue;
        }
        visited[seed] = true;
        queue.push_back(seed);
        let mut shell = Vec::new();

        while let Some(f) = queue.pop_front() {
            shell.push(f);
            for (a, b) in face_edges(&mesh.faces[f]) {
                for &g in &edge_faces[&(a.min(b), a.max(b))] {
                    if visited[g] {
                        continue;
                    }
                    visited[g] = true;
                    if face_edges(&mesh.faces[g]).contains(&(a, b)) {
                        flip(&mut mesh.faces[g]);
                        flipped += 1;
                    }
                    queue.push_back(g);
                }
            }
        }

        if shell_volume(&mesh, &shell) < 0.0 {
            for &f in &shell {
                flip(&mut mesh.faces[f]);
            }
            flipped += shell.len();
        }
    }

    tracing::debug!(faces = mesh.face_count(), flipped, "fixed normals");
    mesh
}
