// quantize.rs - Reduce an image to a lightness-ordered palette
//
// Clusters are ranked by L*. In remap mode rank i of the derived palette is
// paired with rank i of the target palette, so a caller's palette can be
// assigned to height tiers independent of the photo's actual hues.

use std::collections::BTreeMap;

use super::{ClusterConfig, Color, Rgb, kmeans, order_by_lightness, palette_to_hex};
use crate::cancel::CancelToken;
use crate::error::{Result, config_err};
use crate::raster::RgbRaster;

#[derive(Clone, Debug)]
pub struct Quantized {
    /// Input image with every pixel replaced by its palette color.
    pub image: RgbRaster,
    /// Palette rank per pixel.
    pub labels: Vec<usize>,
    /// Output palette in rank order.
    pub palette: Vec<Rgb>,
}

impl Quantized {
    pub fn hex_palette(&self) -> Vec<String> {
        palette_to_hex(&self.palette)
    }
}

/// Distinct colors of `image` in ascending `Rgb` order, with pixel counts.
pub fn distinct_colors(image: &RgbRaster) -> (Vec<Rgb>, Vec<f32>) {
    let mut counts: BTreeMap<Rgb, u32> = BTreeMap::new();
    for &p in &image.pixels {
        *counts.entry(p).or_default() += 1;
    }
    counts.into_iter().map(|(c, n)| (c, n as f32)).unzip()
}

fn ranked(palette: &[Rgb], reversed: bool) -> Vec<usize> {
    let mut order = order_by_lightness(palette);
    if reversed {
        order.reverse();
    }
    order
}

/// Quantize `image` to `config.k` colors.
///
/// With `target` set, pixels are remapped onto it (`target.len()` must equal
/// `k`); otherwise each pixel takes its own cluster's centroid color.
pub fn quantize(
    image: &RgbRaster,
    config: &ClusterConfig,
    target: Option<&[Rgb]>,
    reversed: bool,
    cancel: &CancelToken,
) -> Result<Quantized> {
    if image.is_empty() {
        return Err(config_err("cannot quantize an empty image"));
    }
    match target {
        Some(t) if t.len() != config.k => {
            return Err(config_err(format!(
                "target palette has {} colors but k={}",
                t.len(),
                config.k
            )));
        }
        _ => {}
    }

    let (distinct, weights) = distinct_colors(image);
    let points: Vec<Color> = distinct.iter().map(|&c| Color::from_rgb(c)).collect();
    let clusters = kmeans(&points, &weights, config, cancel)?;

    let derived: Vec<Rgb> = clusters.centroids.iter().map(|c| c.to_rgb()).collect();
    let derived_order = ranked(&derived, reversed);
    let mut rank_of = vec![0usize; derived.len()];
    for (rank, &cluster) in derived_order.iter().enumerate() {
        rank_of[cluster] = rank;
    }

    let palette: Vec<Rgb> = match target {
        Some(t) => ranked(t, reversed).into_iter().map(|i| t[i]).collect(),
        None => derived_order.iter().map(|&i| derived[i]).collect(),
    };

    let labels: Vec<usize> = image
        .pixels
        .iter()
        .map(|p| {
            // Every pixel color is in `distinct`, which is sorted.
            let point = distinct.binary_search(p).unwrap_or(0);
            rank_of[clusters.labels[point]]
        })
        .collect();
    let image = RgbRaster {
        width: image.width,
        height: image.height,
        pixels: labels.iter().map(|&r| palette[r]).collect(),
    };

    tracing::info!(
        k = config.k,
        distinct = distinct.len(),
        remapped = target.is_some(),
        reversed,
        "quantized image"
    );
    Ok(Quantized { image, labels, palette })
}
