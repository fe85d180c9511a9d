// color/ - Color types, perceptual ordering, palette quantization
//
// `Rgb` is the 8-bit interchange color (palettes, rasters, hex strings).
// `Color` is the float working type used while clustering.

mod kmeans;
mod lab;
mod quantize;

pub use kmeans::{ClusterConfig, Clusters, kmeans};
pub use lab::{lightness, order_by_lightness};
pub use quantize::{Quantized, distinct_colors, quantize};

use serde::{Deserialize, Serialize};

use crate::error::{Result, config_err};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Lowercase `rrggbb`.
    pub fn to_hex(self) -> String {
        format!("{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Parse `rrggbb` or `#rrggbb`, either case.
    pub fn from_hex(s: &str) -> Result<Self> {
        let digits = s.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(config_err(format!("invalid hex color {s:?}")));
        }
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16);
        match (channel(0), channel(2), channel(4)) {
            (Ok(r), Ok(g), Ok(b)) => Ok(Self { r, g, b }),
            _ => Err(config_err(format!("invalid hex color {s:?}"))),
        }
    }
}

/// Parse a list of hex strings into a palette.
pub fn parse_palette<S: AsRef<str>>(colors: &[S]) -> Result<Vec<Rgb>> {
    colors.iter().map(|s| Rgb::from_hex(s.as_ref())).collect()
}

pub fn palette_to_hex(palette: &[Rgb]) -> Vec<String> {
    palette.iter().map(|c| c.to_hex()).collect()
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub fn from_rgb(c: Rgb) -> Self {
        Self { r: c.r as f32, g: c.g as f32, b: c.b as f32 }
    }

    /// Nearest 8-bit color.
    pub fn to_rgb(self) -> Rgb {
        let q = |v: f32| v.round().clamp(0.0, 255.0) as u8;
        Rgb::new(q(self.r), q(self.g), q(self.b))
    }

    pub fn dist_sq(self, other: Color) -> f32 {
        let dr = self.r - other.r;
        let dg = self.g - other.g;
        let db = self.b - other.b;
        dr * dr + dg * dg + db * db
    }
}

impl std::ops::Add for Color {
    type Output = Self;
    fn add(self, o: Self) -> Self {
        Self { r: self.r + o.r, g: self.g + o.g, b: self.b + o.b }
    }
}

impl std::ops::Mul<f32> for Color {
    type Output = Self;
    fn mul(self, s: f32) -> Self {
        Self { r: self.r * s, g: self.g * s, b: self.b * s }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex() {
        let c = Rgb::new(255, 8, 171);
        assert_eq!(c.to_hex(), "ff08ab");
        assert_eq!(Rgb::from_hex("#FF08ab").unwrap(), c);
        assert_eq!(Rgb::from_hex("ff08ab").unwrap(), c);
        assert!(Rgb::from_hex("ff08a").is_err());
        assert!(Rgb::from_hex("gg0000").is_err());
        assert!(Rgb::from_hex("+f+f+f").is_err());
    }

    #[test]
    fn test_to_rgb_rounds_and_clamps() {
        let c = Color { r: 254.6, g: -3.0, b: 300.0 };
        assert_eq!(c.to_rgb(), Rgb::new(255, 0, 255));
    }
}
