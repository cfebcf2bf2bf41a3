//! Deterministic k-means over colour vectors.
//!
//! Initialisation is farthest-point: the first centroid is a caller-chosen
//! anchor (the border mean colour), each following one is the sample
//! farthest from every centroid chosen so far. Ties always go to the lower
//! index, so the same samples give the same clusters.

use log::debug;
use rayon::prelude::*;

use crate::buffer::PixelBuffer;
use crate::cancel::CancelToken;
use crate::error::Result;

/// Fitted cluster centres, one `Vec` of colour channels each.
#[derive(Debug, Clone, PartialEq)]
pub struct Clusters {
    pub centroids: Vec<Vec<f32>>,
}

impl Clusters {
    /// Index of the centroid closest to `color`.
    #[inline]
    pub fn nearest(&self, color: &[f32]) -> usize {
        let mut best = 0;
        let mut best_dist = f32::INFINITY;
        for (i, c) in self.centroids.iter().enumerate() {
            let d = dist_sq(c, color);
            if d < best_dist {
                best = i;
                best_dist = d;
            }
        }
        best
    }

    /// Label every pixel of `image` with its nearest centroid.
    pub fn assign(&self, image: &PixelBuffer) -> Vec<usize> {
        let (width, height) = (image.width(), image.height());
        let channels = image.color_channels();
        let mut labels = vec![0usize; width * height];
        labels
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                let mut color = vec![0.0f32; channels];
                for (x, label) in row.iter_mut().enumerate() {
                    let px = image.pixel(x, y);
                    for (c, v) in color.iter_mut().enumerate() {
                        *v = px[c] as f32;
                    }
                    *label = self.nearest(&color);
                }
            });
        labels
    }
}

#[inline]
fn dist_sq(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(u, v)| (u - v) * (u - v)).sum()
}

/// Strided sample of the colour channels, at most `max_samples` pixels.
pub fn sample_colors(image: &PixelBuffer, max_samples: usize) -> Vec<Vec<f32>> {
    let (width, height) = (image.width(), image.height());
    let channels = image.color_channels();
    let total = width * height;
    let stride = total.div_ceil(max_samples.max(1)).max(1);
    (0..total)
        .step_by(stride)
        .map(|i| {
            let px = image.pixel(i % width, i / width);
            px[..channels].iter().map(|&v| v as f32).collect()
        })
        .collect()
}

/// Fit `k` clusters to `samples`, starting from `anchor`.
pub fn fit(
    samples: &[Vec<f32>],
    anchor: &[f32],
    k: usize,
    iterations: usize,
    cancel: &CancelToken,
) -> Result<Clusters> {
    let k = k.max(1);
    let mut centroids = vec![anchor.to_vec()];
    let mut min_dist: Vec<f32> = samples.iter().map(|s| dist_sq(s, anchor)).collect();

    while centroids.len() < k && !samples.is_empty() {
        let mut far = 0;
        for (i, &d) in min_dist.iter().enumerate() {
            if d > min_dist[far] {
                far = i;
            }
        }
        let next = samples[far].clone();
        for (d, s) in min_dist.iter_mut().zip(samples) {
            *d = d.min(dist_sq(s, &next));
        }
        centroids.push(next);
    }

    let mut clusters = Clusters { centroids };
    let dims = anchor.len();
    let mut labels = vec![usize::MAX; samples.len()];

    for iteration in 0..iterations {
        cancel.check()?;

        let mut changed = false;
        for (label, s) in labels.iter_mut().zip(samples) {
            let nearest = clusters.nearest(s);
            if *label != nearest {
                *label = nearest;
                changed = true;
            }
        }
        if !changed {
            debug!("k-means converged after {} iterations", iteration);
            break;
        }

        let mut sums = vec![vec![0.0f64; dims]; clusters.centroids.len()];
        let mut counts = vec![0usize; clusters.centroids.len()];
        for (&label, s) in labels.iter().zip(samples) {
            counts[label] += 1;
            for (acc, &v) in sums[label].iter_mut().zip(s) {
                *acc += v as f64;
            }
        }
        for ((centroid, sum), &count) in clusters.centroids.iter_mut().zip(&sums).zip(&counts) {
            // Empty clusters keep their previous centre
            if count > 0 {
                for (c, &s) in centroid.iter_mut().zip(sum) {
                    *c = (s / count as f64) as f32;
                }
            }
        }
    }

    Ok(clusters)
}
