// ai.rs - Background removal (U^2-Net salient object detection)
//
// The model is loaded once per process and shared behind a mutex. Without a
// model the cut-out degrades to the plain luma of the photo.

use std::path::Path;
use std::sync::{Mutex, OnceLock};

use anyhow::{Context, bail};
use ndarray::Array4;
use ort::session::Session;
use ort::value::Value;
use relief_engine::pipeline::BackgroundRemover;
use relief_engine::{Error, MaskRaster, Rgb, RgbRaster};

// ImageNet normalization constants
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

const U2NET_SIZE: usize = 320;

static SESSION: OnceLock<Mutex<Session>> = OnceLock::new();

/// Load the ONNX model. Returns false when the file is missing so the caller
/// can fall back to plain grayscale.
pub fn init(model_path: &Path) -> anyhow::Result<bool> {
    if SESSION.get().is_some() {
        return Ok(true);
    }
    if !model_path.exists() {
        tracing::warn!(path = %model_path.display(), "background model not found, using fallback");
        return Ok(false);
    }

    let session = Session::builder()
        .context("creating onnx session builder")?
        .commit_from_file(model_path)
        .with_context(|| format!("loading {}", model_path.display()))?;
    if SESSION.set(Mutex::new(session)).is_err() {
        bail!("background model initialized twice");
    }
    tracing::info!(path = %model_path.display(), "background model loaded");
    Ok(true)
}

/// Cut-out grayscale: luma scaled by the predicted foreground alpha.
pub struct U2Net;

impl BackgroundRemover for U2Net {
    fn remove_background(&self, image: &RgbRaster) -> relief_engine::Result<MaskRaster> {
        let Some(session) = SESSION.get() else {
            return Ok(fallback_gray(image));
        };
        let mut session = session
            .lock()
            .map_err(|_| Error::BackgroundRemoval("model session poisoned".into()))?;

        println!("    Running U2-Net...");
        let alpha = predict_alpha(&mut session, image).map_err(|e| Error::BackgroundRemoval(format!("{e:#}")))?;

        let pixels = image
            .pixels
            .iter()
            .zip(&alpha)
            .map(|(&p, &a)| (luma(p) * a.clamp(0.0, 1.0)).round() as u8)
            .collect();
        MaskRaster::new(image.width, image.height, pixels)
    }
}

fn predict_alpha(session: &mut Session, image: &RgbRaster) -> anyhow::Result<Vec<f32>> {
    let (w, h) = (image.width, image.height);

    // Nearest sample into the model's square input
    let mut input = Array4::<f32>::zeros((1, 3, U2NET_SIZE, U2NET_SIZE));
    for y in 0..U2NET_SIZE {
        for x in 0..U2NET_SIZE {
            let sx = ((x as f32 + 0.5) * w as f32 / U2NET_SIZE as f32) as usize;
            let sy = ((y as f32 + 0.5) * h as f32 / U2NET_SIZE as f32) as usize;
            let p = image.pixels[sy.min(h - 1) * w + sx.min(w - 1)];
            for (c, v) in [p.r, p.g, p.b].into_iter().enumerate() {
                input[[0, c, y, x]] = (v as f32 / 255.0 - MEAN[c]) / STD[c];
            }
        }
    }

    let input_val = Value::from_array(input).context("building input tensor")?;
    let input_name = session.inputs.first().map(|i| i.name.clone()).unwrap_or_else(|| "input.1".into());
    let outputs = session.run(ort::inputs![input_name => input_val]).context("running model")?;
    let arr = outputs[0].try_extract_array::<f32>().context("reading model output")?;

    let shape = arr.shape();
    let (oh, ow) = match shape.len() {
        4 => (shape[2], shape[3]),
        3 => (shape[1], shape[2]),
        2 => (shape[0], shape[1]),
        n => bail!("unexpected output rank {n}"),
    };

    let flat: Vec<f32> = arr.iter().copied().collect();
    let (lo, hi) = flat.iter().fold((f32::MAX, f32::MIN), |(mn, mx), &v| (mn.min(v), mx.max(v)));
    let range = (hi - lo).max(1e-6);

    Ok(bilinear_resize(&flat, ow, oh, w, h, lo, range))
}

/// Rec. 601 luma, as a grayscale conversion of the cut-out would give.
fn luma(p: Rgb) -> f32 {
    0.299 * p.r as f32 + 0.587 * p.g as f32 + 0.114 * p.b as f32
}

fn fallback_gray(image: &RgbRaster) -> MaskRaster {
    image.map(|&p| luma(p).round().min(255.0) as u8)
}

/// Resample a `sw x sh` map to `tw x th`, normalizing to [0, 1] on the way.
fn bilinear_resize(src: &[f32], sw: usize, sh: usize, tw: usize, th: usize, lo: f32, range: f32) -> Vec<f32> {
    let (sx, sy) = (sw as f32 / tw as f32, sh as f32 / th as f32);
    let mut out = vec![0.0f32; tw * th];

    for y in 0..th {
        for x in 0..tw {
            let (fx, fy) = (x as f32 * sx, y as f32 * sy);
            let (x0, y0) = ((fx as usize).min(sw - 1), (fy as usize).min(sh - 1));
            let (x1, y1) = ((x0 + 1).min(sw - 1), (y0 + 1).min(sh - 1));
            let (tx, ty) = (fx.fract(), fy.fract());

            let sample = |sx: usize, sy: usize| (src.get(sy * sw + sx).copied().unwrap_or(lo) - lo) / range;

            out[y * tw + x] = sample(x0, y0) * (1.0 - tx) * (1.0 - ty)
                + sample(x1, y0) * tx * (1.0 - ty)
                + sample(x0, y1) * (1.0 - tx) * ty
                + sample(x1, y1) * tx * ty;
        }
    }

    out
}
