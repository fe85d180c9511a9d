use wasm_bindgen::prelude::*;

// ============================================================================
// RELIEF ENGINE - Images to printable relief meshes
// ============================================================================
//
// The Rust API lives in the modules below. This file also exposes the
// pipeline to the browser through wasm-bindgen so the web client can build
// meshes in a worker.

pub mod cancel;
pub mod color;
pub mod config;
pub mod error;
pub mod height;
pub mod mesh;
pub mod pipeline;
pub mod raster;

pub use cancel::CancelToken;
pub use color::{ClusterConfig, Rgb};
pub use config::ReliefConfig;
pub use error::{Error, Result};
pub use height::{HeightField, HeightTable};
pub use mesh::Mesh;
pub use raster::{MaskRaster, RgbRaster};

fn js_err(e: Error) -> JsError {
    JsError::new(&e.to_string())
}

/// Mesh buffers handed to JavaScript.
#[wasm_bindgen]
pub struct ReliefMesh {
    vertices: Vec<f32>,
    indices: Vec<u32>,
}

impl From<Mesh> for ReliefMesh {
    fn from(mesh: Mesh) -> Self {
        let (vertices, indices) = mesh.to_buffers();
        Self { vertices, indices }
    }
}

#[wasm_bindgen]
impl ReliefMesh {
    pub fn vertices(&self) -> js_sys::Float32Array {
        js_sys::Float32Array::from(self.vertices.as_slice())
    }

    pub fn indices(&self) -> js_sys::Uint32Array {
        js_sys::Uint32Array::from(self.indices.as_slice())
    }

    pub fn vertex_ptr(&self) -> *const f32 { self.vertices.as_ptr() }
    pub fn vertex_len(&self) -> usize { self.vertices.len() }
    pub fn index_ptr(&self) -> *const u32 { self.indices.as_ptr() }
    pub fn index_len(&self) -> usize { self.indices.len() }
    pub fn face_count(&self) -> usize { self.indices.len() / 3 }
}

/// Quantized image (RGBA) plus its palette in tier order.
#[wasm_bindgen]
pub struct QuantizedImage {
    rgba: Vec<u8>,
    palette: Vec<String>,
}

#[wasm_bindgen]
impl QuantizedImage {
    pub fn rgba(&self) -> js_sys::Uint8ClampedArray {
        js_sys::Uint8ClampedArray::from(self.rgba.as_slice())
    }

    pub fn palette(&self) -> js_sys::Array {
        self.palette.iter().map(|s| JsValue::from_str(s)).collect()
    }
}

/// Palette entries as strings; the first non-string is reported by index.
fn hex_entries(values: impl IntoIterator<Item = Option<String>>) -> Result<Vec<String>> {
    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| v.ok_or_else(|| Error::Configuration(format!("palette entry {i} is not a string"))))
        .collect()
}

/// Parse a JS array of hex strings. Empty array means no target palette.
fn target_palette(colors: &js_sys::Array) -> Result<Option<Vec<Rgb>>> {
    if colors.length() == 0 {
        return Ok(None);
    }
    let hex = hex_entries(colors.iter().map(|v| v.as_string()))?;
    color::parse_palette(&hex).map(Some)
}

/// Parse the JSON config sent by the worker, falling back to defaults.
fn parse_config(json: &str) -> std::result::Result<ReliefConfig, JsError> {
    if json.trim().is_empty() {
        return Ok(ReliefConfig::default());
    }
    let config: ReliefConfig = serde_json::from_str(json).map_err(|e| JsError::new(&format!("bad config: {e}")))?;
    config.validate().map_err(js_err)?;
    Ok(config)
}

/// Quantize RGBA pixel data (canvas `ImageData.data`) to `k` colors.
#[wasm_bindgen]
pub fn quantize_image(
    rgba: &[u8],
    width: usize,
    height: usize,
    k: usize,
    target: &js_sys::Array,
    reversed: bool,
    seed: u32,
) -> std::result::Result<QuantizedImage, JsError> {
    let image = RgbRaster::from_interleaved(width, height, rgba).map_err(js_err)?;
    let target = target_palette(target).map_err(js_err)?;
    let config = ClusterConfig { k, seed: seed as u64, ..Default::default() };
    let q = color::quantize(&image, &config, target.as_deref(), reversed, &CancelToken::new()).map_err(js_err)?;
    Ok(QuantizedImage { rgba: q.image.to_rgba(), palette: q.hex_palette() })
}

/// Mask (one byte per pixel) to a finished relief mesh.
#[wasm_bindgen]
pub fn mesh_from_mask(mask: &[u8], width: usize, height: usize, config_json: &str) -> std::result::Result<ReliefMesh, JsError> {
    let config = parse_config(config_json)?;
    let mask = MaskRaster::new(width, height, mask.to_vec()).map_err(js_err)?;
    pipeline::relief_from_mask(&mask, &config, &CancelToken::new())
        .map(ReliefMesh::from)
        .map_err(js_err)
}

/// Palette image (RGBA) to a relief with one height tier per palette color.
/// Colors missing from `palette` sit at the base height.
#[wasm_bindgen]
pub fn mesh_from_heightmap(
    rgba: &[u8],
    width: usize,
    height: usize,
    palette: &js_sys::Array,
    config_json: &str,
) -> std::result::Result<ReliefMesh, JsError> {
    let config = parse_config(config_json)?;
    let image = RgbRaster::from_interleaved(width, height, rgba).map_err(js_err)?;
    let palette = target_palette(palette).map_err(js_err)?.unwrap_or_default();
    let table = HeightTable::assign(&palette, config.base_height, config.image_height).map_err(js_err)?;
    let field = HeightField::from_palette_image(&image, &table).map_err(js_err)?;
    pipeline::mesh_from_field(&field, &config, &CancelToken::new())
        .map(ReliefMesh::from)
        .map_err(js_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_string_palette_entry_reports_index() {
        let entries = vec![Some("ff0000".to_string()), None, Some("00ff00".to_string())];
        let err = hex_entries(entries).unwrap_err();
        assert_eq!(err, Error::Configuration("palette entry 1 is not a string".into()));

        let ok = hex_entries(vec![Some("ff0000".to_string())]).unwrap();
        assert_eq!(color::parse_palette(&ok).unwrap(), vec![Rgb::new(255, 0, 0)]);
    }
}
