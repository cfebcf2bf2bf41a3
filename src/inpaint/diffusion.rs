//! Diffusion fill: solve the discrete Laplace equation over the hole.
//!
//! The hole is first seeded by onion peeling, then relaxed in raster order
//! with successive over-relaxation. Known pixels are fixed boundary values
//! and are never written.

use log::{debug, warn};
use ndarray::Array2;

use super::{from_f32, onion_peel, to_f32, FillMethod, InpaintOptions, Inpainted};
use crate::buffer::PixelBuffer;
use crate::cancel::CancelToken;
use crate::error::{EditError, Result};
use crate::filters::blur::gaussian_blur_plane;

pub(crate) fn fill(
    image: &PixelBuffer,
    hole: Vec<bool>,
    options: &InpaintOptions,
    cancel: &CancelToken,
) -> Result<Inpainted> {
    let (width, height, channels) = (image.width(), image.height(), image.channels());
    let mut values = to_f32(image);
    let layers = onion_peel(&mut values, &hole, width, height, channels);
    debug!("diffusion seeded from {} onion layers", layers);

    let seeded = values.clone();
    match relax(&mut values, &hole, width, height, channels, options, cancel) {
        Ok(iterations) => Ok(Inpainted {
            image: from_f32(image, &values, &hole)?,
            method: FillMethod::Diffusion,
            iterations,
            fell_back: false,
        }),
        Err(EditError::AlgorithmDivergence { iterations, .. }) if options.fallback => {
            warn!(
                "diffusion did not converge in {} sweeps; using blur approximation",
                iterations
            );
            let smoothed = blur_fill(seeded, &hole, width, height, channels, options)?;
            Ok(Inpainted {
                image: from_f32(image, &smoothed, &hole)?,
                method: FillMethod::Diffusion,
                iterations,
                fell_back: true,
            })
        }
        Err(e) => Err(e),
    }
}

/// SOR sweeps until the largest update drops below the tolerance.
fn relax(
    values: &mut [f32],
    hole: &[bool],
    width: usize,
    height: usize,
    channels: usize,
    options: &InpaintOptions,
    cancel: &CancelToken,
) -> Result<usize> {
    let omega = options.relaxation.clamp(1.0, 1.99);
    let targets: Vec<usize> = (0..width * height).filter(|&i| hole[i]).collect();

    for sweep in 1..=options.max_iterations {
        cancel.check()?;

        let mut max_change = 0.0f32;
        for &idx in &targets {
            let (x, y) = (idx % width, idx / width);
            let mut neighbours = [0usize; 4];
            let mut count = 0;
            if x > 0 {
                neighbours[count] = idx - 1;
                count += 1;
            }
            if x + 1 < width {
                neighbours[count] = idx + 1;
                count += 1;
            }
            if y > 0 {
                neighbours[count] = idx - width;
                count += 1;
            }
            if y + 1 < height {
                neighbours[count] = idx + width;
                count += 1;
            }

            for c in 0..channels {
                let mean = neighbours[..count]
                    .iter()
                    .map(|&n| values[n * channels + c])
                    .sum::<f32>()
                    / count as f32;
                let slot = &mut values[idx * channels + c];
                let delta = omega * (mean - *slot);
                *slot += delta;
                max_change = max_change.max(delta.abs());
            }
        }

        if max_change < options.tolerance {
            return Ok(sweep);
        }
    }

    Err(EditError::AlgorithmDivergence {
        method: "diffusion",
        iterations: options.max_iterations,
    })
}

/// Onion-peeled values smoothed with a Gaussian inside the hole only.
fn blur_fill(
    mut values: Vec<f32>,
    hole: &[bool],
    width: usize,
    height: usize,
    channels: usize,
    options: &InpaintOptions,
) -> Result<Vec<f32>> {
    for c in 0..channels {
        let plane = Array2::from_shape_fn((height, width), |(y, x)| {
            values[(y * width + x) * channels + c]
        });
        let blurred = gaussian_blur_plane(plane.view(), options.fallback_sigma)?;
        for (idx, &h) in hole.iter().enumerate() {
            if h {
                values[idx * channels + c] = blurred[[idx / width, idx % width]];
            }
        }
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: usize, height: usize) -> PixelBuffer {
        let mut samples = Vec::with_capacity(width * height * 3);
        for y in 0..height {
            for x in 0..width {
                samples.extend_from_slice(&[(x * 10) as u8, (y * 10) as u8, 128]);
            }
        }
        PixelBuffer::new(width, height, 3, samples).unwrap()
    }

    fn square_hole(width: usize, height: usize) -> Vec<bool> {
        (0..width * height)
            .map(|i| {
                let (x, y) = (i % width, i / width);
                (6..12).contains(&x) && (6..12).contains(&y)
            })
            .collect()
    }

    #[test]
    fn test_recovers_linear_gradient() {
        let image = gradient(20, 20);
        let hole = square_hole(20, 20);
        let out = fill(&image, hole, &InpaintOptions::default(), &CancelToken::new()).unwrap();

        assert!(!out.fell_back);
        // A linear ramp is harmonic, so the fill reproduces it closely
        for y in 6..12 {
            for x in 6..12 {
                let px = out.image.pixel(x, y);
                assert!((px[0] as i32 - (x * 10) as i32).abs() <= 2);
                assert!((px[1] as i32 - (y * 10) as i32).abs() <= 2);
            }
        }
    }

    #[test]
    fn test_known_pixels_untouched() {
        let image = gradient(20, 20);
        let hole = square_hole(20, 20);
        let out = fill(&image, hole.clone(), &InpaintOptions::default(), &CancelToken::new())
            .unwrap();
        for (i, &h) in hole.iter().enumerate() {
            if !h {
                let (x, y) = (i % 20, i / 20);
                assert_eq!(out.image.pixel(x, y), image.pixel(x, y));
            }
        }
    }

    #[test]
    fn test_iteration_cap_falls_back() {
        let image = gradient(20, 20);
        let options = InpaintOptions {
            max_iterations: 1,
            tolerance: 1e-6,
            ..Default::default()
        };
        let out = fill(&image, square_hole(20, 20), &options, &CancelToken::new()).unwrap();
        assert!(out.fell_back);
        assert_eq!(out.iterations, 1);

        let strict = InpaintOptions {
            fallback: false,
            ..options
        };
        assert!(matches!(
            fill(&image, square_hole(20, 20), &strict, &CancelToken::new()),
            Err(EditError::AlgorithmDivergence { .. })
        ));
    }
}
