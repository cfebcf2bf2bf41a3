//! Luminance extraction.
//!
//! Uses ITU-R BT.709 luminosity coefficients. Output is a single f32 plane
//! with values 0.0-1.0, which is what the edge and saliency stages consume.

use ndarray::Array2;

use crate::buffer::PixelBuffer;

/// ITU-R BT.709 luminosity coefficients
const LUMA_R: f32 = 0.2126;
const LUMA_G: f32 = 0.7152;
const LUMA_B: f32 = 0.0722;

/// Luminance of one pixel's samples, 0.0-1.0.
///
/// Grayscale pixels use their single channel; alpha is ignored.
#[inline]
pub fn luma(pixel: &[u8]) -> f32 {
    if pixel.len() < 3 {
        return pixel[0] as f32 / 255.0;
    }
    let r = pixel[0] as f32;
    let g = pixel[1] as f32;
    let b = pixel[2] as f32;
    (LUMA_R * r + LUMA_G * g + LUMA_B * b) / 255.0
}

/// Convert an image to a luminance plane of shape (height, width).
pub fn luminance(image: &PixelBuffer) -> Array2<f32> {
    let (width, height) = (image.width(), image.height());
    Array2::from_shape_fn((height, width), |(y, x)| luma(image.pixel(x, y)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_white_and_black() {
        assert!((luma(&[255, 255, 255]) - 1.0).abs() < 1e-5);
        assert_eq!(luma(&[0, 0, 0, 255]), 0.0);
    }

    #[test]
    fn test_green_dominates() {
        assert!(luma(&[0, 255, 0]) > luma(&[255, 0, 0]));
        assert!(luma(&[255, 0, 0]) > luma(&[0, 0, 255]));
    }

    #[test]
    fn test_gray_channel_passthrough() {
        let img = PixelBuffer::filled(2, 3, &[51]).unwrap();
        let plane = luminance(&img);
        assert_eq!(plane.dim(), (3, 2));
        assert!((plane[[2, 1]] - 0.2).abs() < 1e-6);
    }
}
