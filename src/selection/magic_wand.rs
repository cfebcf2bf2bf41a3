//! Magic wand selection using flood fill.
//!
//! Selects regions of similar color based on a 0-100 tolerance. Contiguous
//! selection grows breadth-first from the seed over an explicit queue and a
//! visited bitset; non-contiguous selection tests every pixel against the
//! seed color in parallel row bands.

use std::collections::VecDeque;

use log::debug;
use rayon::prelude::*;
use serde::Deserialize;

use super::modify::{modify, MaskOp};
use crate::buffer::{Mask, PixelBuffer};
use crate::error::{EditError, Result};
use crate::filters::blur::gaussian_blur_mask;
use crate::filters::color_science::{delta_e, gray_to_lab, srgb_to_lab};

/// Largest ΔE76 between two sRGB colours, rounded up.
const PERCEPTUAL_RANGE: f32 = 260.0;

/// Pixel adjacency used when growing a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    #[default]
    Four,
    Eight,
}

impl Connectivity {
    fn offsets(self) -> &'static [(isize, isize)] {
        match self {
            Connectivity::Four => &[(-1, 0), (1, 0), (0, -1), (0, 1)],
            Connectivity::Eight => &[
                (-1, 0),
                (1, 0),
                (0, -1),
                (0, 1),
                (-1, -1),
                (1, -1),
                (-1, 1),
                (1, 1),
            ],
        }
    }
}

impl TryFrom<u8> for Connectivity {
    type Error = EditError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            4 => Ok(Connectivity::Four),
            8 => Ok(Connectivity::Eight),
            other => Err(EditError::unsupported(format!(
                "connectivity must be 4 or 8, got {}",
                other
            ))),
        }
    }
}

/// How color distance is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMetric {
    /// Euclidean distance over all channels, alpha included.
    #[default]
    Euclidean,
    /// CIE76 ΔE on the color channels.
    Perceptual,
}

/// Which color a candidate pixel is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthReference {
    /// The seed pixel's color.
    #[default]
    Seed,
    /// The already-selected neighbor the candidate was reached from.
    Neighbor,
}

/// Tunables for point selection.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SelectOptions {
    pub metric: ColorMetric,
    pub reference: GrowthReference,
    /// Only select pixels connected to the seed.
    pub contiguous: bool,
    /// Soften the hard selection edge with a 3x3 Gaussian.
    pub anti_alias: bool,
    /// Feather radius applied after selection (0 = none).
    pub feather: f32,
}

impl Default for SelectOptions {
    fn default() -> Self {
        Self {
            metric: ColorMetric::Euclidean,
            reference: GrowthReference::Seed,
            contiguous: true,
            anti_alias: false,
            feather: 0.0,
        }
    }
}

/// Fixed-size bitset over pixel indices.
pub(crate) struct VisitedSet {
    words: Vec<u64>,
}

impl VisitedSet {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
        }
    }

    /// Mark `idx`; returns false if it was already marked.
    #[inline]
    pub(crate) fn insert(&mut self, idx: usize) -> bool {
        let word = &mut self.words[idx / 64];
        let bit = 1u64 << (idx % 64);
        let fresh = *word & bit == 0;
        *word |= bit;
        fresh
    }
}

/// Compares pixels under one metric and threshold.
struct Matcher<'a> {
    image: &'a PixelBuffer,
    metric: ColorMetric,
    threshold: f32,
    lab: Option<Vec<[f32; 3]>>,
}

impl<'a> Matcher<'a> {
    fn new(image: &'a PixelBuffer, metric: ColorMetric, tolerance: f32) -> Self {
        let tolerance = tolerance.clamp(0.0, 100.0);
        let range = match metric {
            ColorMetric::Euclidean => 255.0 * (image.channels() as f32).sqrt(),
            ColorMetric::Perceptual => PERCEPTUAL_RANGE,
        };
        let threshold = if tolerance >= 100.0 {
            f32::INFINITY
        } else {
            tolerance / 100.0 * range
        };
        let lab = (metric == ColorMetric::Perceptual).then(|| lab_plane(image));
        Self {
            image,
            metric,
            threshold,
            lab,
        }
    }

    #[inline]
    fn matches(&self, a: (usize, usize), b: (usize, usize)) -> bool {
        if self.threshold.is_infinite() {
            return true;
        }
        match (&self.lab, self.metric) {
            (Some(lab), ColorMetric::Perceptual) => {
                let w = self.image.width();
                delta_e(&lab[a.1 * w + a.0], &lab[b.1 * w + b.0]) <= self.threshold
            }
            _ => {
                let pa = self.image.pixel(a.0, a.1);
                let pb = self.image.pixel(b.0, b.1);
                let sq: f32 = pa
                    .iter()
                    .zip(pb)
                    .map(|(&u, &v)| {
                        let d = u as f32 - v as f32;
                        d * d
                    })
                    .sum();
                sq.sqrt() <= self.threshold
            }
        }
    }
}

fn lab_plane(image: &PixelBuffer) -> Vec<[f32; 3]> {
    let (width, height) = (image.width(), image.height());
    let mut lab = vec![[0.0f32; 3]; width * height];
    lab.par_chunks_mut(width).enumerate().for_each(|(y, row)| {
        for (x, out) in row.iter_mut().enumerate() {
            let p = image.pixel(x, y);
            *out = if p.len() >= 3 {
                srgb_to_lab(p[0], p[1], p[2])
            } else {
                gray_to_lab(p[0])
            };
        }
    });
    lab
}

/// Select the region similar to the seed pixel.
///
/// # Arguments
/// * `image` - Source image
/// * `seed` - Seed pixel (x, y)
/// * `tolerance` - 0 selects identical colors only, 100 selects everything reachable
/// * `connectivity` - 4- or 8-neighbour growth
///
/// # Returns
/// Binary mask (255 = selected), or `OutOfBounds` for a seed outside the image
pub fn select_by_point(
    image: &PixelBuffer,
    seed: (i64, i64),
    tolerance: f32,
    connectivity: Connectivity,
) -> Result<Mask> {
    select_by_point_with(image, seed, tolerance, connectivity, &SelectOptions::default())
}

/// [`select_by_point`] with explicit options.
pub fn select_by_point_with(
    image: &PixelBuffer,
    seed: (i64, i64),
    tolerance: f32,
    connectivity: Connectivity,
    options: &SelectOptions,
) -> Result<Mask> {
    let (width, height) = (image.width(), image.height());
    let (sx, sy) = seed;
    if sx < 0 || sy < 0 || sx as usize >= width || sy as usize >= height {
        return Err(EditError::OutOfBounds {
            x: sx,
            y: sy,
            width,
            height,
        });
    }
    if !tolerance.is_finite() {
        return Err(EditError::unsupported("tolerance must be finite"));
    }
    let seed = (sx as usize, sy as usize);
    let matcher = Matcher::new(image, options.metric, tolerance);

    let mut mask = if options.contiguous {
        flood_fill(&matcher, seed, connectivity, options.reference)
    } else {
        global_select(&matcher, seed)?
    };

    debug!(
        "magic wand at {:?}: tolerance {:.1}, {} pixels selected",
        seed,
        tolerance,
        mask.selected_count()
    );

    if options.anti_alias {
        mask = Mask::from_array(gaussian_blur_mask(mask.view(), 0.5)?);
    }
    if options.feather > 0.0 {
        mask = modify(&mask, MaskOp::Feather, options.feather)?;
    }
    Ok(mask)
}

fn flood_fill(
    matcher: &Matcher<'_>,
    seed: (usize, usize),
    connectivity: Connectivity,
    reference: GrowthReference,
) -> Mask {
    let (width, height) = (matcher.image.width(), matcher.image.height());
    let mut mask = Mask::new(width, height);
    let mut visited = VisitedSet::new(width * height);
    let mut queue = VecDeque::new();

    visited.insert(seed.1 * width + seed.0);
    mask.set(seed.0, seed.1, 255);
    queue.push_back(seed);

    while let Some((x, y)) = queue.pop_front() {
        for &(dx, dy) in connectivity.offsets() {
            let nx = x as isize + dx;
            let ny = y as isize + dy;
            if nx < 0 || ny < 0 || nx >= width as isize || ny >= height as isize {
                continue;
            }
            let (nx, ny) = (nx as usize, ny as usize);

            let anchor = match reference {
                GrowthReference::Seed => seed,
                GrowthReference::Neighbor => (x, y),
            };
            if !matcher.matches((nx, ny), anchor) {
                // Under neighbor growth another path may still reach it.
                continue;
            }
            if visited.insert(ny * width + nx) {
                mask.set(nx, ny, 255);
                queue.push_back((nx, ny));
            }
        }
    }

    mask
}

fn global_select(matcher: &Matcher<'_>, seed: (usize, usize)) -> Result<Mask> {
    let (width, height) = (matcher.image.width(), matcher.image.height());
    let mut values = vec![0u8; width * height];
    values
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, out) in row.iter_mut().enumerate() {
                if matcher.matches((x, y), seed) {
                    *out = 255;
                }
            }
        });
    Mask::from_vec(width, height, values)
}
