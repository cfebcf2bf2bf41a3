//! Gaussian blur for single-channel planes and masks.
//!
//! Uses separable 2-pass convolution with edge clamping. Each pass is split
//! into row bands processed in parallel with rayon; every worker writes only
//! its own output rows.

use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;

use super::core::{f32_to_mask, gaussian_kernel_1d, mask_to_f32};
use crate::error::Result;

/// Apply Gaussian blur to an f32 plane.
///
/// # Arguments
/// * `input` - Plane of shape (height, width)
/// * `sigma` - Standard deviation of the Gaussian kernel
///
/// # Returns
/// Blurred plane with the same dimensions
pub fn gaussian_blur_plane(input: ArrayView2<f32>, sigma: f32) -> Result<Array2<f32>> {
    let (height, width) = input.dim();
    if sigma <= 0.0 || width == 0 || height == 0 {
        return Ok(input.to_owned());
    }

    let kernel = gaussian_kernel_1d(sigma);
    let half = (kernel.len() / 2) as isize;

    // Horizontal pass
    let mut temp = vec![0.0f32; height * width];
    temp.par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, out) in row.iter_mut().enumerate() {
                let mut sum = 0.0f32;
                for (ki, &kv) in kernel.iter().enumerate() {
                    let sx = (x as isize + ki as isize - half).clamp(0, width as isize - 1) as usize;
                    sum += input[[y, sx]] * kv;
                }
                *out = sum;
            }
        });

    // Vertical pass
    let mut output = vec![0.0f32; height * width];
    output
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, out) in row.iter_mut().enumerate() {
                let mut sum = 0.0f32;
                for (ki, &kv) in kernel.iter().enumerate() {
                    let sy = (y as isize + ki as isize - half).clamp(0, height as isize - 1) as usize;
                    sum += temp[sy * width + x] * kv;
                }
                *out = sum;
            }
        });

    Ok(Array2::from_shape_vec((height, width), output)?)
}

/// Apply Gaussian blur to a u8 mask.
///
/// Works in f32 for precision and rounds back, so a uniform mask stays
/// exactly uniform.
pub fn gaussian_blur_mask(mask: ArrayView2<u8>, sigma: f32) -> Result<Array2<u8>> {
    if sigma <= 0.0 {
        return Ok(mask.to_owned());
    }
    let plane = mask_to_f32(mask);
    let blurred = gaussian_blur_plane(plane.view(), sigma)?;
    Ok(f32_to_mask(blurred.view()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_plane_unchanged() {
        let plane = Array2::from_elem((6, 7), 0.25f32);
        let blurred = gaussian_blur_plane(plane.view(), 2.0).unwrap();
        for v in blurred.iter() {
            assert!((v - 0.25).abs() < 1e-5);
        }
    }

    #[test]
    fn test_blur_softens_hard_edge() {
        let mut mask = Array2::<u8>::zeros((1, 10));
        for x in 5..10 {
            mask[[0, x]] = 255;
        }
        let blurred = gaussian_blur_mask(mask.view(), 1.0).unwrap();
        assert!(blurred[[0, 4]] > 0);
        assert!(blurred[[0, 5]] < 255);
        assert_eq!(blurred[[0, 0]], 0);
        assert_eq!(blurred[[0, 9]], 255);
    }

    #[test]
    fn test_full_mask_stays_full() {
        let mask = Array2::from_elem((5, 5), 255u8);
        let blurred = gaussian_blur_mask(mask.view(), 3.0).unwrap();
        assert!(blurred.iter().all(|&v| v == 255));
    }
}
