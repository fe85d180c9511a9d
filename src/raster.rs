// raster.rs - Decoded image buffers
//
// Row-major, one element per pixel. Decoding and encoding of image files
// happens outside the core.

use crate::color::Rgb;
use crate::error::{Result, config_err};

#[derive(Debug, Clone, PartialEq)]
pub struct Raster<T> {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<T>,
}

/// Three-channel photo.
pub type RgbRaster = Raster<Rgb>;

/// Single-channel mask or grayscale image.
pub type MaskRaster = Raster<u8>;

impl<T> Raster<T> {
    pub fn new(width: usize, height: usize, pixels: Vec<T>) -> Result<Self> {
        if pixels.len() != width * height {
            return Err(config_err(format!(
                "raster of {width}x{height} needs {} pixels, got {}",
                width * height,
                pixels.len()
            )));
        }
        Ok(Self { width, height, pixels })
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> &T {
        &self.pixels[row * self.width + col]
    }

    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> Raster<U> {
        Raster {
            width: self.width,
            height: self.height,
            pixels: self.pixels.iter().map(f).collect(),
        }
    }
}

impl RgbRaster {
    /// Build from interleaved RGB (3 bytes) or RGBA (4 bytes) data. Alpha is dropped.
    pub fn from_interleaved(width: usize, height: usize, data: &[u8]) -> Result<Self> {
        let n = width * height;
        let stride = match data.len() {
            l if n > 0 && l == n * 3 => 3,
            l if n > 0 && l == n * 4 => 4,
            l => return Err(config_err(format!(
                "expected {} RGB or {} RGBA bytes for {width}x{height}, got {l}",
                n * 3,
                n * 4
            ))),
        };
        let pixels = data.chunks_exact(stride).map(|p| Rgb::new(p[0], p[1], p[2])).collect();
        Self::new(width, height, pixels)
    }

    pub fn to_rgba(&self) -> Vec<u8> {
        self.pixels.iter().flat_map(|p| [p.r, p.g, p.b, 255]).collect()
    }
}
