// output.rs - JSON export of the finished relief

use std::fs;
use std::path::Path;

use anyhow::Context;
use relief_engine::Mesh;
use serde::Serialize;

#[derive(Serialize)]
pub struct ReliefDocument<'a> {
    pub palette: &'a [String],
    pub vertex_count: usize,
    pub face_count: usize,
    pub closed: bool,
    pub volume: f64,
    #[serde(flatten)]
    pub mesh: &'a Mesh,
}

impl<'a> ReliefDocument<'a> {
    pub fn new(mesh: &'a Mesh, palette: &'a [String]) -> Self {
        Self {
            palette,
            vertex_count: mesh.vertex_count(),
            face_count: mesh.face_count(),
            closed: mesh.is_closed_manifold(),
            volume: mesh.signed_volume(),
            mesh,
        }
    }
}

pub fn write_json(path: &Path, doc: &ReliefDocument) -> anyhow::Result<()> {
    let json = serde_json::to_string(doc).context("serializing relief")?;
    fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
