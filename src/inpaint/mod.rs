//! Content-aware fill of masked regions.
//!
//! The mask marks pixels to discard (selected, >= 128). Two methods fill
//! them:
//!
//! - [`FillMethod::Diffusion`]: harmonic interpolation by successive
//!   over-relaxation, for small or smooth holes
//! - [`FillMethod::PatchMatch`]: exemplar copying from the best-matching
//!   source patch, for larger or textured holes
//!
//! Both are deterministic and both copy every unselected pixel from the
//! input unchanged.

mod diffusion;
mod patch_match;

use std::str::FromStr;

use log::debug;
use rayon::prelude::*;
use serde::Deserialize;

use crate::buffer::{Mask, PixelBuffer};
use crate::cancel::CancelToken;
use crate::error::{EditError, Result};
use crate::filters::edge::sobel_magnitude;
use crate::filters::grayscale::luminance;
use crate::filters::morphology::dilate;

/// Inpainting algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillMethod {
    #[default]
    Diffusion,
    PatchMatch,
}

impl FillMethod {
    /// Pick a method for this hole with default thresholds.
    pub fn recommended(image: &PixelBuffer, mask: &Mask) -> Result<Self> {
        Self::recommended_with(image, mask, &InpaintOptions::default())
    }

    /// PatchMatch for holes larger than `auto_patch_area` or surrounded by
    /// texture, Diffusion otherwise.
    pub fn recommended_with(
        image: &PixelBuffer,
        mask: &Mask,
        options: &InpaintOptions,
    ) -> Result<Self> {
        mask.ensure_matches(image)?;
        let area = mask.selected_count();
        if area > options.auto_patch_area {
            return Ok(FillMethod::PatchMatch);
        }
        if area == 0 {
            return Ok(FillMethod::Diffusion);
        }

        // Mean edge strength in a thin ring around the hole
        let hole = mask.view().mapv(|v| if v >= Mask::SELECTED_THRESHOLD { 255u8 } else { 0 });
        let ring = dilate(hole.view(), 3.0)?;
        let edges = sobel_magnitude(luminance(image).view())?;
        let mut sum = 0.0f32;
        let mut count = 0usize;
        for ((&r, &h), &e) in ring.iter().zip(hole.iter()).zip(edges.iter()) {
            if r > 0 && h == 0 {
                sum += e;
                count += 1;
            }
        }
        let texture = if count > 0 { sum / count as f32 } else { 0.0 };
        debug!("hole of {} px, surround texture {:.3}", area, texture);

        Ok(if texture > options.texture_threshold {
            FillMethod::PatchMatch
        } else {
            FillMethod::Diffusion
        })
    }
}

impl FromStr for FillMethod {
    type Err = EditError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "diffusion" | "telea" | "ns" => Ok(FillMethod::Diffusion),
            "patch_match" | "patchmatch" | "patch" => Ok(FillMethod::PatchMatch),
            other => Err(EditError::unsupported(format!(
                "unknown fill method '{}'",
                other
            ))),
        }
    }
}

/// Inpainting tunables.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct InpaintOptions {
    /// Sweep cap for diffusion.
    pub max_iterations: usize,
    /// Diffusion stops once no sample changes by more than this in a sweep.
    pub tolerance: f32,
    /// Over-relaxation factor, 1.0 (Gauss-Seidel) to below 2.0.
    pub relaxation: f32,
    /// Substitute the blur approximation when diffusion hits its cap.
    pub fallback: bool,
    pub fallback_sigma: f32,

    /// Patch side in pixels (odd).
    pub patch_size: usize,
    /// Half-width of the source search window. Search cost grows with its
    /// square.
    pub search_radius: usize,
    /// Step between candidate source centres; 2 cuts search cost by about 4x.
    pub search_stride: usize,

    /// Holes above this many pixels are recommended PatchMatch.
    pub auto_patch_area: usize,
    /// Ring edge strength above which PatchMatch is recommended.
    pub texture_threshold: f32,
}

impl Default for InpaintOptions {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            tolerance: 0.05,
            relaxation: 1.8,
            fallback: true,
            fallback_sigma: 1.5,
            patch_size: 7,
            search_radius: 48,
            search_stride: 1,
            auto_patch_area: 400,
            texture_threshold: 0.12,
        }
    }
}

/// Fill result with the bookkeeping the editor shows to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct Inpainted {
    pub image: PixelBuffer,
    pub method: FillMethod,
    /// Diffusion sweeps or PatchMatch passes performed.
    pub iterations: usize,
    /// Diffusion did not converge and the blur approximation was used.
    pub fell_back: bool,
}

/// Fill the selected pixels of `mask` with default options.
pub fn fill(image: &PixelBuffer, mask: &Mask, method: FillMethod) -> Result<PixelBuffer> {
    fill_with(
        image,
        mask,
        method,
        &InpaintOptions::default(),
        &CancelToken::new(),
    )
    .map(|out| out.image)
}

/// [`fill`] with explicit options and cancellation.
pub fn fill_with(
    image: &PixelBuffer,
    mask: &Mask,
    method: FillMethod,
    options: &InpaintOptions,
    cancel: &CancelToken,
) -> Result<Inpainted> {
    mask.ensure_matches(image)?;
    let hole: Vec<bool> = mask
        .as_slice()
        .iter()
        .map(|&v| v >= Mask::SELECTED_THRESHOLD)
        .collect();
    let area = hole.iter().filter(|&&h| h).count();

    if area == 0 {
        return Ok(Inpainted {
            image: image.clone(),
            method,
            iterations: 0,
            fell_back: false,
        });
    }
    if area == hole.len() {
        return Err(EditError::unsupported(
            "mask selects every pixel; nothing to fill from",
        ));
    }

    let result = match method {
        FillMethod::Diffusion => diffusion::fill(image, hole, options, cancel)?,
        FillMethod::PatchMatch => patch_match::fill(image, hole, options, cancel)?,
    };
    debug!(
        "{:?} fill of {} px: {} iterations{}",
        method,
        area,
        result.iterations,
        if result.fell_back { " (fallback)" } else { "" }
    );
    Ok(result)
}

/// Image samples as f32, row-major `(y, x, c)`.
pub(crate) fn to_f32(image: &PixelBuffer) -> Vec<f32> {
    image.as_slice().iter().map(|&v| v as f32).collect()
}

/// Rebuild an image from f32 samples, copying unselected pixels verbatim.
pub(crate) fn from_f32(image: &PixelBuffer, values: &[f32], hole: &[bool]) -> Result<PixelBuffer> {
    let channels = image.channels();
    let original = image.as_slice();
    let mut samples = original.to_vec();
    samples
        .par_chunks_mut(channels)
        .zip(values.par_chunks(channels))
        .zip(hole.par_iter())
        .for_each(|((out, src), &h)| {
            if h {
                for (o, &v) in out.iter_mut().zip(src) {
                    *o = v.round().clamp(0.0, 255.0) as u8;
                }
            }
        });
    PixelBuffer::new(image.width(), image.height(), channels, samples)
}

const NEIGHBOURS_4: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// Hole pixels with at least one known 4-neighbour.
pub(crate) fn boundary(unknown: &[bool], width: usize, height: usize) -> Vec<usize> {
    (0..width * height)
        .into_par_iter()
        .filter(|&idx| {
            unknown[idx] && known_neighbours(unknown, width, height, idx).next().is_some()
        })
        .collect()
}

/// Indices of the known 4-neighbours of `idx`.
pub(crate) fn known_neighbours<'a>(
    unknown: &'a [bool],
    width: usize,
    height: usize,
    idx: usize,
) -> impl Iterator<Item = usize> + 'a {
    let (x, y) = ((idx % width) as isize, (idx / width) as isize);
    NEIGHBOURS_4.iter().filter_map(move |&(dx, dy)| {
        let (nx, ny) = (x + dx, y + dy);
        if nx < 0 || ny < 0 || nx >= width as isize || ny >= height as isize {
            return None;
        }
        let n = ny as usize * width + nx as usize;
        (!unknown[n]).then_some(n)
    })
}

/// Fill the hole layer by layer from its boundary inward, each pixel taking
/// the mean of its known neighbours from the previous layer.
///
/// Returns the number of layers peeled.
pub(crate) fn onion_peel(
    values: &mut [f32],
    hole: &[bool],
    width: usize,
    height: usize,
    channels: usize,
) -> usize {
    let mut unknown = hole.to_vec();
    let mut layers = 0;

    loop {
        let layer = boundary(&unknown, width, height);
        if layer.is_empty() {
            break;
        }
        let fills: Vec<(usize, Vec<f32>)> = layer
            .par_iter()
            .map(|&idx| {
                let mut acc = vec![0.0f32; channels];
                let mut count = 0usize;
                for n in known_neighbours(&unknown, width, height, idx) {
                    for (a, &v) in acc.iter_mut().zip(&values[n * channels..(n + 1) * channels]) {
                        *a += v;
                    }
                    count += 1;
                }
                acc.iter_mut().for_each(|a| *a /= count.max(1) as f32);
                (idx, acc)
            })
            .collect();

        for (idx, color) in fills {
            values[idx * channels..(idx + 1) * channels].copy_from_slice(&color);
            unknown[idx] = false;
        }
        layers += 1;
    }

    layers
}
