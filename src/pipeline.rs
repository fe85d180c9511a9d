// pipeline.rs - Image -> printable relief
//
//   photo:  quantize -> height tiers -> grid -> bend -> simplify -> normals
//   mask:   mask levels            -> grid -> bend -> simplify -> normals
//   cutout: background removal, then the grayscale path
//
// Every stage returns a new value; nothing here holds state between calls.

use crate::cancel::CancelToken;
use crate::color::{Rgb, palette_to_hex, quantize};
use crate::config::ReliefConfig;
use crate::error::Result;
use crate::height::{HeightField, HeightTable};
use crate::mesh::{self, Mesh};
use crate::raster::{MaskRaster, RgbRaster};

/// Turns a photo into a grayscale image whose background is black.
///
/// The model behind it lives outside the core; callers inject it.
pub trait BackgroundRemover {
    fn remove_background(&self, image: &RgbRaster) -> Result<MaskRaster>;
}

impl<F> BackgroundRemover for F
where
    F: Fn(&RgbRaster) -> Result<MaskRaster>,
{
    fn remove_background(&self, image: &RgbRaster) -> Result<MaskRaster> {
        self(image)
    }
}

/// Output of the photo path.
#[derive(Clone, Debug)]
pub struct Relief {
    pub mesh: Mesh,
    /// Palette in tier order as lowercase hex.
    pub palette: Vec<String>,
    /// The photo after quantization, one palette color per pixel.
    pub quantized: RgbRaster,
}

/// Grid, bend, simplify and fix normals for a finished height field.
pub fn mesh_from_field(field: &HeightField, config: &ReliefConfig, cancel: &CancelToken) -> Result<Mesh> {
    config.validate()?;
    let field = field.resample(config.resolution, config.simplification_level)?;
    let grid = mesh::build(&field, config.object_width, config.object_height)?;
    let bent = mesh::bend(grid, config.bend_factor)?;
    let simplified = mesh::simplify(&bent, config.target_reduction, cancel)?;
    Ok(mesh::fix_normals(simplified))
}

/// Two-level relief: raised wherever the mask is non-zero.
pub fn relief_from_mask(mask: &MaskRaster, config: &ReliefConfig, cancel: &CancelToken) -> Result<Mesh> {
    let field = HeightField::from_mask(mask, config.base_height, config.image_height)?;
    mesh_from_field(&field, config, cancel)
}

/// Relief whose height follows the gray value.
pub fn relief_from_grayscale(gray: &MaskRaster, config: &ReliefConfig, cancel: &CancelToken) -> Result<Mesh> {
    let field = HeightField::from_grayscale(gray, config.base_height, config.image_height)?;
    mesh_from_field(&field, config, cancel)
}

/// Background removal followed by the grayscale path, so soft alpha left in
/// the background stays near the base.
pub fn relief_from_cutout(
    image: &RgbRaster,
    remover: &dyn BackgroundRemover,
    config: &ReliefConfig,
    cancel: &CancelToken,
) -> Result<Mesh> {
    let gray = remover.remove_background(image)?;
    cancel.check()?;
    relief_from_grayscale(&gray, config, cancel)
}

/// Multi-tone relief: each palette rank is one height tier.
///
/// `target` is used only when `config.remap_palette` is set; otherwise the
/// image keeps its own cluster colors.
pub fn relief_from_photo(
    image: &RgbRaster,
    target: Option<&[Rgb]>,
    config: &ReliefConfig,
    cancel: &CancelToken,
) -> Result<Relief> {
    config.validate()?;
    let target = target.filter(|_| config.remap_palette);
    let quantized = quantize(image, &config.cluster, target, config.reverse_palette, cancel)?;

    let table = HeightTable::assign(&quantized.palette, config.base_height, config.image_height)?;
    let field = HeightField::from_palette_image(&quantized.image, &table)?;
    let mesh = mesh_from_field(&field, config, cancel)?;

    Ok(Relief {
        mesh,
        palette: palette_to_hex(&quantized.palette),
        quantized: quantized.image,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn disc_mask(n: usize) -> MaskRaster {
        let c = n as f32 / 2.0;
        let pixels = (0..n * n)
            .map(|i| {
                let (x, y) = ((i % n) as f32 - c, (i / n) as f32 - c);
                if x * x + y * y < c * c / 2.0 { 255 } else { 0 }
            })
            .collect();
        MaskRaster::new(n, n, pixels).unwrap()
    }

    #[test]
    fn test_mask_relief_is_closed() {
        let config = ReliefConfig { target_reduction: 0.5, ..Default::default() };
        let mesh = relief_from_mask(&disc_mask(16), &config, &CancelToken::new()).unwrap();
        assert!(mesh.is_closed_manifold());
        assert!(mesh.is_winding_consistent());
        assert!(mesh.signed_volume() > 0.0);
    }

    #[test]
    fn test_cutout_uses_injected_remover() {
        let image = RgbRaster::new(4, 4, vec![Rgb::new(10, 20, 30); 16]).unwrap();
        let remover = |img: &RgbRaster| -> Result<MaskRaster> { Ok(img.map(|p| if p.r > 0 { 255 } else { 0 })) };
        let config = ReliefConfig { target_reduction: 0.0, ..Default::default() };
        let mesh = relief_from_cutout(&image, &remover, &config, &CancelToken::new()).unwrap();

        let top_z: Vec<f32> = mesh.vertices[16..].iter().map(|v| v.z).collect();
        assert!(top_z.iter().all(|&z| z == 7.0));
    }

    #[test]
    fn test_cutout_background_residue_stays_low() {
        let n = 20;
        let image = RgbRaster::new(n, n, vec![Rgb::new(90, 90, 90); n * n]).unwrap();
        let subject = |i: usize| (5..15).contains(&(i % n)) && (5..15).contains(&(i / n));
        let remover = |img: &RgbRaster| -> Result<MaskRaster> {
            let pixels = (0..img.len()).map(|i| if subject(i) { 200 } else { 3 }).collect();
            MaskRaster::new(img.width, img.height, pixels)
        };
        let config = ReliefConfig { target_reduction: 0.0, ..Default::default() };
        let mesh = relief_from_cutout(&image, &remover, &config, &CancelToken::new()).unwrap();

        for (i, v) in mesh.vertices[n * n..].iter().enumerate() {
            if subject(i) {
                assert!(v.z > 6.5, "subject pixel {i} at {}", v.z);
            } else {
                assert!(v.z < 5.05, "background pixel {i} at {}", v.z);
            }
        }
    }

    #[test]
    fn test_resolution_shrinks_grid() {
        let mask = disc_mask(16);
        let config = ReliefConfig { target_reduction: 0.0, resolution: 0.5, simplification_level: 1, ..Default::default() };
        let mesh = relief_from_mask(&mask, &config, &CancelToken::new()).unwrap();
        // 16 -> 8 by resolution, every other sample -> 4 per axis
        assert_eq!(mesh.face_count(), mesh::grid_face_count(4, 4));
        let (lo, hi) = mesh.bounds().unwrap();
        assert!(lo.abs_diff_eq(glam::Vec3::new(0.0, 0.0, 0.0), 1e-4));
        assert!((hi.x - 70.0).abs() < 1e-4 && (hi.y - 40.0).abs() < 1e-4);
    }

    #[test]
    fn test_invalid_config_fails_before_work() {
        let config = ReliefConfig { target_reduction: 1.2, ..Default::default() };
        let err = relief_from_mask(&disc_mask(4), &config, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
