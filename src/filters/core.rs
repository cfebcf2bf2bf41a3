//! Core utilities shared by the engines.
//!
//! This module provides:
//! - Gaussian kernel generation
//! - Summed-area tables for O(1) region sums
//! - Conversions between u8 masks and f32 planes

use ndarray::{Array2, ArrayView2};

/// Generate a 1D Gaussian kernel.
///
/// # Arguments
/// * `sigma` - Standard deviation of the Gaussian
///
/// # Returns
/// Normalized 1D kernel as Vec<f32>
pub fn gaussian_kernel_1d(sigma: f32) -> Vec<f32> {
    if sigma <= 0.0 || !sigma.is_finite() {
        return vec![1.0];
    }

    // Kernel size = 6 sigma (covers 99.7% of distribution), ensure odd
    let kernel_size = ((sigma * 6.0).ceil() as usize) | 1;
    let half = kernel_size / 2;

    let mut kernel: Vec<f32> = (0..kernel_size)
        .map(|i| {
            let x = i as f32 - half as f32;
            (-x * x / (2.0 * sigma * sigma)).exp()
        })
        .collect();

    // Normalize
    let sum: f32 = kernel.iter().sum();
    for v in kernel.iter_mut() {
        *v /= sum;
    }

    kernel
}

/// Summed-area table over a single f32 plane.
///
/// Sums are accumulated in f64 so large images do not lose precision.
#[derive(Debug, Clone)]
pub struct SummedArea {
    width: usize,
    height: usize,
    table: Vec<f64>,
}

impl SummedArea {
    pub fn new(plane: ArrayView2<f32>) -> Self {
        let (height, width) = plane.dim();
        let stride = width + 1;
        let mut table = vec![0.0f64; stride * (height + 1)];

        for y in 0..height {
            let mut row_sum = 0.0f64;
            for x in 0..width {
                row_sum += plane[[y, x]] as f64;
                table[(y + 1) * stride + x + 1] = table[y * stride + x + 1] + row_sum;
            }
        }

        Self {
            width,
            height,
            table,
        }
    }

    /// Sum over `[x0, x1) x [y0, y1)`, clamped to the plane.
    pub fn sum(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> f64 {
        let x1 = x1.min(self.width);
        let y1 = y1.min(self.height);
        if x0 >= x1 || y0 >= y1 {
            return 0.0;
        }
        let stride = self.width + 1;
        self.table[y1 * stride + x1] - self.table[y0 * stride + x1] - self.table[y1 * stride + x0]
            + self.table[y0 * stride + x0]
    }

    pub fn total(&self) -> f64 {
        self.sum(0, 0, self.width, self.height)
    }
}

/// Convert a u8 mask to an f32 plane (0-255 -> 0.0-1.0).
pub fn mask_to_f32(mask: ArrayView2<u8>) -> Array2<f32> {
    mask.mapv(|v| v as f32 / 255.0)
}

/// Convert an f32 plane (0.0-1.0) back to a u8 mask, rounding to nearest.
pub fn f32_to_mask(plane: ArrayView2<f32>) -> Array2<u8> {
    plane.mapv(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_is_normalized_and_odd() {
        let k = gaussian_kernel_1d(1.5);
        assert_eq!(k.len() % 2, 1);
        let sum: f32 = k.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        // Symmetric, peak in the middle
        let half = k.len() / 2;
        assert!((k[0] - k[k.len() - 1]).abs() < 1e-7);
        assert!(k[half] > k[0]);
    }

    #[test]
    fn test_zero_sigma_is_identity_kernel() {
        assert_eq!(gaussian_kernel_1d(0.0), vec![1.0]);
    }

    #[test]
    fn test_summed_area_region_sums() {
        let plane = Array2::from_shape_fn((4, 5), |(y, x)| (y * 5 + x) as f32);
        let sat = SummedArea::new(plane.view());
        assert_eq!(sat.total(), (0..20).sum::<usize>() as f64);
        // Rows 1..3, columns 2..4 -> 7 + 8 + 12 + 13
        assert_eq!(sat.sum(2, 1, 4, 3), 40.0);
        assert_eq!(sat.sum(3, 3, 3, 4), 0.0);
        // Clamped to bounds
        assert_eq!(sat.sum(4, 3, 100, 100), 19.0);
    }

    #[test]
    fn test_mask_plane_roundtrip_rounds() {
        let mask = Array2::from_shape_vec((1, 3), vec![0u8, 128, 255]).unwrap();
        let plane = mask_to_f32(mask.view());
        assert_eq!(f32_to_mask(plane.view()), mask);
    }
}
