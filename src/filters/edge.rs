//! Sobel edge magnitude on a luminance plane.
//!
//! Input and output are single f32 planes with values 0.0-1.0. The outermost
//! ring of pixels has no full 3x3 neighbourhood and is set to zero.

use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;

use crate::error::Result;

const KERNEL_H: [[f32; 3]; 3] = [[-1.0, 0.0, 1.0], [-2.0, 0.0, 2.0], [-1.0, 0.0, 1.0]];
const KERNEL_V: [[f32; 3]; 3] = [[-1.0, -2.0, -1.0], [0.0, 0.0, 0.0], [1.0, 2.0, 1.0]];

/// Largest possible magnitude for inputs in 0.0-1.0: sqrt(4^2 + 4^2).
const MAX_MAGNITUDE: f32 = 5.657;

/// Compute normalized Sobel gradient magnitude.
///
/// # Arguments
/// * `luma` - Luminance plane (height, width), values 0.0-1.0
///
/// # Returns
/// Magnitude plane, values 0.0-1.0
pub fn sobel_magnitude(luma: ArrayView2<f32>) -> Result<Array2<f32>> {
    let (height, width) = luma.dim();
    let mut output = vec![0.0f32; height * width];

    if width >= 3 && height >= 3 {
        output
            .par_chunks_mut(width)
            .enumerate()
            .filter(|(y, _)| *y >= 1 && *y + 1 < height)
            .for_each(|(y, row)| {
                for x in 1..width - 1 {
                    let mut gx = 0.0f32;
                    let mut gy = 0.0f32;

                    for ky in 0..3 {
                        for kx in 0..3 {
                            let lum = luma[[y + ky - 1, x + kx - 1]];
                            gx += lum * KERNEL_H[ky][kx];
                            gy += lum * KERNEL_V[ky][kx];
                        }
                    }

                    row[x] = ((gx * gx + gy * gy).sqrt() / MAX_MAGNITUDE).min(1.0);
                }
            });
    }

    Ok(Array2::from_shape_vec((height, width), output)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_plane_has_no_edges() {
        let plane = Array2::from_elem((5, 5), 0.6f32);
        let edges = sobel_magnitude(plane.view()).unwrap();
        assert!(edges.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_vertical_step_detected() {
        let plane = Array2::from_shape_fn((5, 6), |(_, x)| if x < 3 { 0.0 } else { 1.0 });
        let edges = sobel_magnitude(plane.view()).unwrap();
        // Columns next to the step respond, far columns and border ring do not
        assert!(edges[[2, 2]] > 0.5);
        assert!(edges[[2, 3]] > 0.5);
        assert_eq!(edges[[2, 1]], 0.0);
        assert_eq!(edges[[0, 3]], 0.0);
    }

    #[test]
    fn test_tiny_plane_is_all_zero() {
        let plane = Array2::from_elem((2, 2), 1.0f32);
        let edges = sobel_magnitude(plane.view()).unwrap();
        assert_eq!(edges.dim(), (2, 2));
        assert!(edges.iter().all(|&v| v == 0.0));
    }
}
