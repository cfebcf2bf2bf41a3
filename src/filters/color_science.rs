//! Colour-space helpers for perceptual comparisons.
//!
//! sRGB (D65) to CIE L*a*b*, and the ΔE76 distance used by the perceptual
//! selection metric.

/// Convert 8-bit sRGB to CIE L*a*b* (D65 white point).
pub fn srgb_to_lab(r: u8, g: u8, b: u8) -> [f32; 3] {
    let r = srgb_to_linear(r);
    let g = srgb_to_linear(g);
    let b = srgb_to_linear(b);

    // RGB to XYZ (D65)
    let x = r * 0.4124564 + g * 0.3575761 + b * 0.1804375;
    let y = r * 0.2126729 + g * 0.7151522 + b * 0.0721750;
    let z = r * 0.0193339 + g * 0.1191920 + b * 0.9503041;

    // Normalize for D65
    let x = x / 0.95047;
    let z = z / 1.08883;

    let fx = lab_f(x);
    let fy = lab_f(y);
    let fz = lab_f(z);

    [116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz)]
}

/// L* of an 8-bit gray level, with a* = b* = 0.
pub fn gray_to_lab(v: u8) -> [f32; 3] {
    let [l, _, _] = srgb_to_lab(v, v, v);
    [l, 0.0, 0.0]
}

/// CIE76 colour difference.
#[inline]
pub fn delta_e(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    let dl = a[0] - b[0];
    let da = a[1] - b[1];
    let db = a[2] - b[2];
    (dl * dl + da * da + db * db).sqrt()
}

#[inline]
fn srgb_to_linear(v: u8) -> f32 {
    let v = v as f32 / 255.0;
    if v > 0.04045 {
        ((v + 0.055) / 1.055).powf(2.4)
    } else {
        v / 12.92
    }
}

#[inline]
fn lab_f(t: f32) -> f32 {
    if t > 0.008856 {
        t.powf(1.0 / 3.0)
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_white_and_black_lightness() {
        let white = srgb_to_lab(255, 255, 255);
        let black = srgb_to_lab(0, 0, 0);
        assert!((white[0] - 100.0).abs() < 0.1);
        assert!(black[0].abs() < 0.1);
        assert!(white[1].abs() < 0.1 && white[2].abs() < 0.1);
        assert!((delta_e(&white, &black) - 100.0).abs() < 0.2);
    }

    #[test]
    fn test_gray_matches_rgb_gray() {
        let a = gray_to_lab(128);
        let b = srgb_to_lab(128, 128, 128);
        assert!(delta_e(&a, &b) < 0.1);
    }
}
