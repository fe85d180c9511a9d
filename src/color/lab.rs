// lab.rs - Perceptual lightness (CIE L*)
//
// sRGB -> linear -> relative luminance Y (D65) -> L* in [0, 100].

use super::Rgb;

fn linearize(c: u8) -> f64 {
    let c = c as f64 / 255.0;
    if c <= 0.04045 { c / 12.92 } else { ((c + 0.055) / 1.055).powf(2.4) }
}

/// CIE L* of an sRGB color.
pub fn lightness(c: Rgb) -> f64 {
    const EPSILON: f64 = 216.0 / 24389.0;
    const KAPPA: f64 = 24389.0 / 27.0;

    let y = 0.212_671 * linearize(c.r) + 0.715_160 * linearize(c.g) + 0.072_169 * linearize(c.b);
    if y > EPSILON { 116.0 * y.cbrt() - 16.0 } else { KAPPA * y }
}

/// Indices of `palette` sorted by ascending lightness. Stable, so equal
/// lightness keeps input order.
pub fn order_by_lightness(palette: &[Rgb]) -> Vec<usize> {
    let keys: Vec<f64> = palette.iter().map(|&c| lightness(c)).collect();
    let mut order: Vec<usize> = (0..palette.len()).collect();
    order.sort_by(|&a, &b| keys[a].total_cmp(&keys[b]));
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lightness_endpoints() {
        assert!(lightness(Rgb::new(0, 0, 0)).abs() < 1e-9);
        assert!((lightness(Rgb::new(255, 255, 255)) - 100.0).abs() < 1e-3);
        // Mid gray is ~53.6 L*, not 50.
        let mid = lightness(Rgb::new(128, 128, 128));
        assert!((mid - 53.585).abs() < 0.05, "{mid}");
    }

    #[test]
    fn test_green_lighter_than_blue() {
        let order = order_by_lightness(&[Rgb::new(0, 255, 0), Rgb::new(0, 0, 255), Rgb::new(255, 0, 0)]);
        assert_eq!(order, vec![1, 2, 0]);
    }
}
