//! Foreground/background vote producers.
//!
//! Each [`Signal`] turns one image analysis into a boolean plane where
//! `true` is a foreground vote. The set of producers is closed: adding a
//! signal means adding a variant here and a weight in
//! [`SignalWeights`](super::SignalWeights).

use std::collections::VecDeque;

use log::debug;
use ndarray::Array2;
use rayon::prelude::*;
use serde::Deserialize;

use super::kmeans::{fit, sample_colors};
use super::SegmentationOptions;
use crate::analysis::{in_border_band, ImageAnalysis};
use crate::cancel::CancelToken;
use crate::error::Result;
use crate::filters::morphology::close;
use crate::selection::magic_wand::VisitedSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Closed edge contours; whatever the border cannot reach is foreground.
    Edge,
    /// Colour clusters unlike the border are foreground.
    ColorCluster,
    /// Centre prior modulated by border contrast.
    CenterSaliency,
}

impl Signal {
    pub const ALL: [Signal; 3] = [Signal::Edge, Signal::ColorCluster, Signal::CenterSaliency];

    /// Produce this signal's foreground votes.
    pub fn vote(
        self,
        analysis: &ImageAnalysis<'_>,
        options: &SegmentationOptions,
        cancel: &CancelToken,
    ) -> Result<Array2<bool>> {
        cancel.check()?;
        let votes = match self {
            Signal::Edge => edge_votes(analysis, options)?,
            Signal::ColorCluster => cluster_votes(analysis, options, cancel)?,
            Signal::CenterSaliency => saliency_votes(analysis, options)?,
        };
        debug!(
            "{:?} signal: {} foreground votes",
            self,
            votes.iter().filter(|&&v| v).count()
        );
        Ok(votes)
    }
}

fn edge_votes(analysis: &ImageAnalysis<'_>, options: &SegmentationOptions) -> Result<Array2<bool>> {
    let gradient = analysis.gradient()?;
    let (height, width) = gradient.dim();
    let threshold = options.edge_threshold;
    let edges = gradient.mapv(|g| if g > threshold { 255u8 } else { 0 });
    let barrier = close(edges.view(), options.edge_close_radius)?;

    // Flood background in from every open border pixel
    let mut background = Array2::from_elem((height, width), false);
    let mut visited = VisitedSet::new(width * height);
    let mut queue = VecDeque::new();
    for y in 0..height {
        for x in 0..width {
            if in_border_band(x, y, width, height, 1)
                && barrier[[y, x]] == 0
                && visited.insert(y * width + x)
            {
                background[[y, x]] = true;
                queue.push_back((x, y));
            }
        }
    }

    while let Some((x, y)) = queue.pop_front() {
        let neighbours = [
            (x.wrapping_sub(1), y),
            (x + 1, y),
            (x, y.wrapping_sub(1)),
            (x, y + 1),
        ];
        for (nx, ny) in neighbours {
            if nx >= width || ny >= height || barrier[[ny, nx]] != 0 {
                continue;
            }
            if visited.insert(ny * width + nx) {
                background[[ny, nx]] = true;
                queue.push_back((nx, ny));
            }
        }
    }

    Ok(background.mapv(|bg| !bg))
}

fn cluster_votes(
    analysis: &ImageAnalysis<'_>,
    options: &SegmentationOptions,
    cancel: &CancelToken,
) -> Result<Array2<bool>> {
    let image = analysis.image();
    let (width, height) = (image.width(), image.height());
    let border = analysis.border();

    let samples = sample_colors(image, options.max_cluster_samples);
    let clusters = fit(
        &samples,
        &border.mean,
        options.clusters,
        options.kmeans_iterations,
        cancel,
    )?;
    let labels = clusters.assign(image);

    let k = clusters.centroids.len();
    let mut background = vec![false; k];
    background[clusters.nearest(&border.mean)] = true;

    let mut border_counts = vec![0usize; k];
    for y in 0..height {
        for x in 0..width {
            if in_border_band(x, y, width, height, border.band) {
                border_counts[labels[y * width + x]] += 1;
            }
        }
    }
    for (flag, &count) in background.iter_mut().zip(&border_counts) {
        if count as f32 >= options.border_cluster_share * border.pixel_count as f32 {
            *flag = true;
        }
    }
    debug!(
        "colour clusters {:?}, background flags {:?}",
        clusters.centroids, background
    );

    let votes: Vec<bool> = labels.iter().map(|&l| !background[l]).collect();
    Ok(Array2::from_shape_vec((height, width), votes)?)
}

fn saliency_votes(
    analysis: &ImageAnalysis<'_>,
    options: &SegmentationOptions,
) -> Result<Array2<bool>> {
    let image = analysis.image();
    let (width, height) = (image.width(), image.height());
    let contrast = analysis.contrast();
    let floor = options.center_floor.clamp(0.0, 1.0);
    let threshold = options.saliency_threshold;
    let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);

    let mut votes = vec![false; width * height];
    votes
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            let dy = (y as f32 + 0.5 - cy) / cy;
            for (x, out) in row.iter_mut().enumerate() {
                let dx = (x as f32 + 0.5 - cx) / cx;
                let prior = (1.0 - (dx * dx + dy * dy)).max(0.0);
                let score = prior * (floor + (1.0 - floor) * contrast[[y, x]]);
                *out = score > threshold;
            }
        });
    Ok(Array2::from_shape_vec((height, width), votes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::PixelBuffer;

    fn framed() -> PixelBuffer {
        let mut samples = Vec::with_capacity(40 * 40 * 3);
        for y in 0..40 {
            for x in 0..40 {
                let inside = (14..26).contains(&x) && (14..26).contains(&y);
                let color: &[u8] = if inside { &[240, 220, 60] } else { &[40, 90, 40] };
                samples.extend_from_slice(color);
            }
        }
        PixelBuffer::new(40, 40, 3, samples).unwrap()
    }

    fn votes(signal: Signal) -> Array2<bool> {
        let image = framed();
        let analysis = ImageAnalysis::new(&image);
        signal
            .vote(&analysis, &SegmentationOptions::default(), &CancelToken::new())
            .unwrap()
    }

    #[test]
    fn test_each_signal_marks_object() {
        for signal in Signal::ALL {
            let v = votes(signal);
            assert!(v[[20, 20]], "{:?} missed the object", signal);
            assert!(!v[[2, 2]], "{:?} marked the border", signal);
        }
    }

    #[test]
    fn test_edge_signal_on_flat_image_is_background() {
        let image = PixelBuffer::filled(16, 16, &[128, 128, 128]).unwrap();
        let analysis = ImageAnalysis::new(&image);
        let v = Signal::Edge
            .vote(&analysis, &SegmentationOptions::default(), &CancelToken::new())
            .unwrap();
        assert!(v.iter().all(|&f| !f));
    }

    #[test]
    fn test_cluster_signal_is_exact_on_two_colors() {
        let v = votes(Signal::ColorCluster);
        assert_eq!(v.iter().filter(|&&f| f).count(), 12 * 12);
    }
}
