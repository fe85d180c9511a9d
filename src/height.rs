// height.rs - Height fields and palette height tiers
//
// A HeightField holds the top-surface z for every pixel. It comes either from
// a mask (two levels), a grayscale ramp, or a palette image where each palette
// rank owns one tier.

use crate::color::Rgb;
use crate::error::{Result, config_err};
use crate::raster::{MaskRaster, RgbRaster};

/// Largest power-of-two sample skip accepted by [`HeightField::resample`].
pub const MAX_SIMPLIFICATION_LEVEL: u32 = 8;

#[derive(Clone, Debug, PartialEq)]
pub struct HeightField {
    width: usize,
    height: usize,
    values: Vec<f32>,
}

fn check_heights(base_height: f32, range: f32, range_name: &str) -> Result<()> {
    if !base_height.is_finite() || base_height < 0.0 {
        return Err(config_err(format!("base height must be >= 0, got {base_height}")));
    }
    if !range.is_finite() || range < 0.0 {
        return Err(config_err(format!("{range_name} must be >= 0, got {range}")));
    }
    Ok(())
}

impl HeightField {
    /// Field from raw row-major heights. Heights must be finite and >= 0.
    pub fn new(width: usize, height: usize, values: Vec<f32>) -> Result<Self> {
        if values.len() != width * height {
            return Err(config_err(format!(
                "height field of {width}x{height} needs {} values, got {}",
                width * height,
                values.len()
            )));
        }
        if let Some(v) = values.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(config_err(format!("heights must be finite and >= 0, got {v}")));
        }
        Ok(Self { width, height, values })
    }

    /// `base_height` where the mask is 0, `base_height + image_height` elsewhere.
    pub fn from_mask(mask: &MaskRaster, base_height: f32, image_height: f32) -> Result<Self> {
        check_heights(base_height, image_height, "image height")?;
        let values = mask
            .pixels
            .iter()
            .map(|&m| if m == 0 { base_height } else { base_height + image_height })
            .collect();
        Self::new(mask.width, mask.height, values)
    }

    /// Continuous variant of `from_mask`: height scales with the gray value.
    pub fn from_grayscale(gray: &MaskRaster, base_height: f32, image_height: f32) -> Result<Self> {
        check_heights(base_height, image_height, "image height")?;
        let values = gray
            .pixels
            .iter()
            .map(|&v| base_height + image_height * (v as f32 / 255.0))
            .collect();
        Self::new(gray.width, gray.height, values)
    }

    /// Per-pixel lookup of a palette image against its height tiers.
    pub fn from_palette_image(image: &RgbRaster, table: &HeightTable) -> Result<Self> {
        let values = image.pixels.iter().map(|&c| table.lookup(c)).collect();
        Self::new(image.width, image.height, values)
    }

    /// Nearest-sample resample: scale the grid by `resolution`, then keep
    /// every `2^level`-th sample along each axis.
    pub fn resample(&self, resolution: f32, level: u32) -> Result<Self> {
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(config_err(format!("resolution must be > 0, got {resolution}")));
        }
        if level > MAX_SIMPLIFICATION_LEVEL {
            return Err(config_err(format!(
                "simplification level must be <= {MAX_SIMPLIFICATION_LEVEL}, got {level}"
            )));
        }
        if resolution == 1.0 && level == 0 {
            return Ok(self.clone());
        }

        let step = 1usize << level;
        let axis = |n: usize| -> Vec<usize> {
            let scaled = (n as f32 * resolution).floor() as usize;
            (0..scaled)
                .step_by(step)
                .map(|i| ((i as f32 / resolution) as usize).min(n - 1))
                .collect()
        };
        let (cols, rows) = (axis(self.width), axis(self.height));
        let values = rows
            .iter()
            .flat_map(|&r| cols.iter().map(move |&c| self.get(r, c)))
            .collect();
        Self::new(cols.len(), rows.len(), values)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.values[row * self.width + col]
    }
}

/// Palette color -> height, one evenly spaced tier per rank.
#[derive(Clone, Debug, PartialEq)]
pub struct HeightTable {
    base_height: f32,
    entries: Vec<(Rgb, f32)>,
}

impl HeightTable {
    /// Rank 0 sits at `base_height`, the last rank at `base_height + height_range`.
    pub fn assign(palette: &[Rgb], base_height: f32, height_range: f32) -> Result<Self> {
        check_heights(base_height, height_range, "height range")?;
        if palette.is_empty() {
            return Err(config_err("palette must not be empty"));
        }
        let steps = palette.len().saturating_sub(1).max(1) as f32;
        let entries = palette
            .iter()
            .enumerate()
            .map(|(rank, &c)| (c, base_height + height_range * rank as f32 / steps))
            .collect();
        Ok(Self { base_height, entries })
    }

    /// Exact match; colors outside the palette fall back to the base height.
    /// If a color appears twice the lower rank wins.
    pub fn lookup(&self, color: Rgb) -> f32 {
        self.entries
            .iter()
            .find(|(c, _)| *c == color)
            .map_or(self.base_height, |&(_, h)| h)
    }

    pub fn heights(&self) -> impl Iterator<Item = f32> + '_ {
        self.entries.iter().map(|&(_, h)| h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiers_evenly_spaced() {
        let palette = [Rgb::new(0, 0, 0), Rgb::new(90, 90, 90), Rgb::new(180, 180, 180), Rgb::new(255, 255, 255)];
        let table = HeightTable::assign(&palette, 5.0, 3.0).unwrap();
        assert_eq!(table.heights().collect::<Vec<_>>(), vec![5.0, 6.0, 7.0, 8.0]);
        assert_eq!(table.lookup(palette[2]), 7.0);
    }

    #[test]
    fn test_unknown_color_falls_back_to_base() {
        let table = HeightTable::assign(&[Rgb::new(1, 2, 3), Rgb::new(4, 5, 6)], 2.5, 1.0).unwrap();
        assert_eq!(table.lookup(Rgb::new(9, 9, 9)), 2.5);
    }

    #[test]
    fn test_single_color_palette() {
        let table = HeightTable::assign(&[Rgb::new(7, 7, 7)], 4.0, 2.0).unwrap();
        assert_eq!(table.lookup(Rgb::new(7, 7, 7)), 4.0);
    }

    #[test]
    fn test_mask_levels() {
        let mask = MaskRaster::new(2, 2, vec![0, 255, 1, 0]).unwrap();
        let field = HeightField::from_mask(&mask, 5.0, 2.0).unwrap();
        assert_eq!(field.values(), &[5.0, 7.0, 7.0, 5.0]);
    }

    #[test]
    fn test_grayscale_ramp() {
        let gray = MaskRaster::new(3, 1, vec![0, 51, 255]).unwrap();
        let field = HeightField::from_grayscale(&gray, 1.0, 5.0).unwrap();
        for (got, want) in field.values().iter().zip([1.0, 2.0, 6.0]) {
            assert!((got - want).abs() < 1e-5, "{got} != {want}");
        }
    }

    #[test]
    fn test_resample_halves_and_skips() {
        let field = HeightField::new(4, 4, (0..16).map(|v| v as f32).collect()).unwrap();
        assert_eq!(field.resample(1.0, 0).unwrap(), field);

        let half = field.resample(0.5, 0).unwrap();
        assert_eq!((half.width(), half.height()), (2, 2));
        assert_eq!(half.values(), &[0.0, 2.0, 8.0, 10.0]);

        let skipped = field.resample(1.0, 1).unwrap();
        assert_eq!(skipped.values(), &[0.0, 2.0, 8.0, 10.0]);

        let double = field.resample(2.0, 0).unwrap();
        assert_eq!((double.width(), double.height()), (8, 8));
        assert_eq!(double.get(7, 7), 15.0);
        assert_eq!(double.get(1, 2), 1.0);
    }

    #[test]
    fn test_resample_rejects_bad_parameters() {
        let field = HeightField::new(2, 2, vec![1.0; 4]).unwrap();
        assert!(field.resample(0.0, 0).is_err());
        assert!(field.resample(f32::NAN, 0).is_err());
        assert!(field.resample(1.0, MAX_SIMPLIFICATION_LEVEL + 1).is_err());
    }

    #[test]
    fn test_rejects_negative_heights() {
        let mask = MaskRaster::new(1, 1, vec![0]).unwrap();
        assert!(HeightField::from_mask(&mask, -1.0, 2.0).is_err());
        assert!(HeightField::from_mask(&mask, 1.0, -2.0).is_err());
        assert!(HeightField::new(1, 1, vec![f32::NAN]).is_err());
    }
}
