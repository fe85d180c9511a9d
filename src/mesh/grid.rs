// grid.rs - Height field -> closed solid
//
// Vertex layout: base vertex (row, col) at row * w + col with z = 0, its top
// twin at that index + w * h with z = field value. Base faces point down, top
// faces up, and a skirt of wall triangles runs around the four outer edges so
// every edge is shared by exactly two faces.

use glam::Vec3;

use super::Mesh;
use crate::error::{Result, config_err, geometry_err};
use crate::height::HeightField;

/// Face count of a `w x h` grid solid.
pub fn grid_face_count(w: usize, h: usize) -> usize {
    4 * (w - 1) * (h - 1) + 4 * (w - 1) + 4 * (h - 1)
}

fn grid_faces(w: u32, h: u32) -> Vec<[u32; 3]> {
    let top = w * h;
    let idx = |row: u32, col: u32| row * w + col;
    let mut faces = Vec::with_capacity(grid_face_count(w as usize, h as usize));

    for y in 0..h - 1 {
        for x in 0..w - 1 {
            let i00 = idx(y, x);
            let i10 = idx(y, x + 1);
            let i01 = idx(y + 1, x);
            let i11 = idx(y + 1, x + 1);

            // Base (clockwise seen from above)
            faces.push([i00, i01, i10]);
            faces.push([i10, i01, i11]);

            // Top (counter-clockwise)
            faces.push([i00 + top, i10 + top, i01 + top]);
            faces.push([i10 + top, i11 + top, i01 + top]);
        }
    }

    for y in 0..h - 1 {
        // Left (col 0)
        let (i0, i1) = (idx(y, 0), idx(y + 1, 0));
        faces.push([i0, i0 + top, i1]);
        faces.push([i1, i0 + top, i1 + top]);

        // Right (last col)
        let (i0, i1) = (idx(y, w - 1), idx(y + 1, w - 1));
        faces.push([i0, i1, i0 + top]);
        faces.push([i1, i1 + top, i0 + top]);
    }

    for x in 0..w - 1 {
        // Front (row 0)
        let (i0, i1) = (idx(0, x), idx(0, x + 1));
        faces.push([i0, i1, i0 + top]);
        faces.push([i1, i1 + top, i0 + top]);

        // Back (last row)
        let (i0, i1) = (idx(h - 1, x), idx(h - 1, x + 1));
        faces.push([i0, i0 + top, i1]);
        faces.push([i1, i0 + top, i1 + top]);
    }

    faces
}

/// Build the closed solid for `field` spanning `object_width x object_height`.
pub fn build(field: &HeightField, object_width: f32, object_height: f32) -> Result<Mesh> {
    let (w, h) = (field.width(), field.height());
    if w < 2 || h < 2 {
        return Err(geometry_err(format!("grid of {w}x{h} points is too small, need at least 2x2")));
    }
    if !(object_width.is_finite() && object_width > 0.0) || !(object_height.is_finite() && object_height > 0.0) {
        return Err(config_err(format!(
            "object size must be positive, got {object_width} x {object_height}"
        )));
    }
    if 2 * w * h > u32::MAX as usize {
        return Err(geometry_err(format!("grid of {w}x{h} points exceeds 32-bit vertex indices")));
    }

    let sx = object_width / (w - 1) as f32;
    let sy = object_height / (h - 1) as f32;

    let mut vertices = Vec::with_capacity(2 * w * h);
    for z in [None, Some(field)] {
        for row in 0..h {
            for col in 0..w {
                let top = z.map_or(0.0, |f| f.get(row, col));
                vertices.push(Vec3::new(col as f32 * sx, row as f32 * sy, top));
            }
        }
    }

    let mesh = Mesh { vertices, faces: grid_faces(w as u32, h as u32) };
    mesh.ensure_closed("grid build")?;
    tracing::debug!(w, h, faces = mesh.face_count(), "built grid solid");
    Ok(mesh)
}
