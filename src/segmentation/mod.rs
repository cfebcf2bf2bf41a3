//! Automatic background removal.
//!
//! Three independent [`Signal`]s vote per pixel on foreground versus
//! background. They run concurrently on a shared [`ImageAnalysis`]; once all
//! three finish, one weighted vote combines them, ties going to background.
//! The voted mask is cleaned with a square close/open pass and feathered.
//!
//! The reported confidence is the fraction of pixels where all three
//! signals agree. A degenerate result (nothing or everything selected) is
//! always reported with zero confidence.

mod kmeans;
mod options;
mod signals;

pub use kmeans::Clusters;
pub use options::{SegmentationOptions, SignalWeights};
pub use signals::Signal;

use log::{debug, warn};
use ndarray::{Array2, Zip};

use crate::analysis::ImageAnalysis;
use crate::buffer::{Mask, PixelBuffer};
use crate::cancel::CancelToken;
use crate::error::{EditError, Result};
use crate::filters::morphology::{close_with, open_with, Element};
use crate::selection::modify::{modify, MaskOp};

/// Result of background removal.
#[derive(Debug, Clone, PartialEq)]
pub struct Segmentation {
    /// Feathered foreground mask (255 = foreground).
    pub mask: Mask,
    /// Fraction of pixels on which every signal agreed, 0.0-1.0.
    pub confidence: f32,
    /// Foreground share voted by each signal.
    pub signal_shares: [(Signal, f32); 3],
}

impl Segmentation {
    /// True when the caller should offer manual refinement.
    pub fn needs_refinement(&self, threshold: f32) -> bool {
        self.confidence < threshold
    }
}

/// Separate foreground from background with default options.
pub fn remove_background(image: &PixelBuffer) -> Result<Segmentation> {
    remove_background_with(image, &SegmentationOptions::default(), &CancelToken::new())
}

/// [`remove_background`] with explicit options and cancellation.
pub fn remove_background_with(
    image: &PixelBuffer,
    options: &SegmentationOptions,
    cancel: &CancelToken,
) -> Result<Segmentation> {
    let analysis = ImageAnalysis::with_options(image, options.analysis);
    remove_background_in(&analysis, options, cancel)
}

/// Background removal over caller-owned cached maps.
pub fn remove_background_in(
    analysis: &ImageAnalysis<'_>,
    options: &SegmentationOptions,
    cancel: &CancelToken,
) -> Result<Segmentation> {
    let image = analysis.image();
    let (width, height) = (image.width(), image.height());
    if width < options.min_size || height < options.min_size {
        return Err(EditError::unsupported(format!(
            "background removal needs at least {}x{} pixels, got {}x{}",
            options.min_size, options.min_size, width, height
        )));
    }

    let (edge, (cluster, saliency)) = rayon::join(
        || Signal::Edge.vote(analysis, options, cancel),
        || {
            rayon::join(
                || Signal::ColorCluster.vote(analysis, options, cancel),
                || Signal::CenterSaliency.vote(analysis, options, cancel),
            )
        },
    );
    let (edge, cluster, saliency) = (edge?, cluster?, saliency?);
    cancel.check()?;

    let (voted, agreement) = vote(&edge, &cluster, &saliency, &options.weights);
    let cleaned = close_with(voted.view(), options.cleanup_radius, Element::Square)?;
    let cleaned = Mask::from_array(open_with(
        cleaned.view(),
        options.cleanup_radius,
        Element::Square,
    )?);

    let pixels = (width * height) as f32;
    let mut confidence = agreement as f32 / pixels;
    if cleaned.is_empty() || cleaned.is_full() {
        warn!(
            "background removal produced a degenerate mask ({}); confidence forced to 0",
            if cleaned.is_empty() { "empty" } else { "full" }
        );
        confidence = 0.0;
    }

    let mask = modify(&cleaned, MaskOp::Feather, options.feather_radius)?;
    cancel.check()?;

    let share = |plane: &Array2<bool>| plane.iter().filter(|&&v| v).count() as f32 / pixels;
    let signal_shares = [
        (Signal::Edge, share(&edge)),
        (Signal::ColorCluster, share(&cluster)),
        (Signal::CenterSaliency, share(&saliency)),
    ];

    debug!(
        "background removal {}x{}: {} foreground pixels, confidence {:.3}, shares {:?}",
        width,
        height,
        cleaned.selected_count(),
        confidence,
        signal_shares
    );
    if confidence < options.confidence_threshold {
        warn!(
            "segmentation confidence {:.3} below threshold {:.3}",
            confidence, options.confidence_threshold
        );
    }

    Ok(Segmentation {
        mask,
        confidence,
        signal_shares,
    })
}

/// Weighted per-pixel vote. Returns the binary mask and the number of
/// pixels where all three signals agreed.
fn vote(
    edge: &Array2<bool>,
    cluster: &Array2<bool>,
    saliency: &Array2<bool>,
    weights: &SignalWeights,
) -> (Array2<u8>, usize) {
    let mut agreement = 0usize;
    let mut voted = Array2::<u8>::zeros(edge.dim());

    Zip::from(&mut voted)
        .and(edge)
        .and(cluster)
        .and(saliency)
        .for_each(|out, &e, &c, &s| {
            let mut fg = 0.0f32;
            let mut bg = 0.0f32;
            for (v, w) in [(e, weights.edge), (c, weights.cluster), (s, weights.saliency)] {
                if v {
                    fg += w;
                } else {
                    bg += w;
                }
            }
            if fg > bg {
                *out = 255;
            }
            if e == c && c == s {
                agreement += 1;
            }
        });

    (voted, agreement)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framed(size: usize, inner: usize) -> PixelBuffer {
        let start = (size - inner) / 2;
        let mut samples = Vec::with_capacity(size * size * 4);
        for y in 0..size {
            for x in 0..size {
                let inside = (start..start + inner).contains(&x) && (start..start + inner).contains(&y);
                let color: &[u8] = if inside {
                    &[230, 40, 40, 255]
                } else {
                    &[235, 235, 235, 255]
                };
                samples.extend_from_slice(color);
            }
        }
        PixelBuffer::new(size, size, 4, samples).unwrap()
    }

    #[test]
    fn test_framed_object() {
        let image = framed(64, 24);
        let result = remove_background(&image).unwrap();

        assert!(result.confidence >= 0.6, "confidence {}", result.confidence);
        assert!(!result.needs_refinement(0.6));
        // Every object pixel, corners included, is foreground
        for y in 20..44 {
            for x in 20..44 {
                assert!(
                    result.mask.is_selected(x, y),
                    "object pixel ({}, {}) = {}",
                    x,
                    y,
                    result.mask.get(x, y)
                );
            }
        }
        assert!(!result.mask.is_selected(3, 3));
        assert!(!result.mask.is_selected(60, 10));
    }

    #[test]
    fn test_uniform_image_has_zero_confidence() {
        let image = PixelBuffer::filled(20, 20, &[90, 90, 90]).unwrap();
        let result = remove_background(&image).unwrap();
        assert!(result.mask.is_empty());
        assert_eq!(result.confidence, 0.0);
        assert!(result.needs_refinement(0.6));
    }

    #[test]
    fn test_too_small() {
        let image = PixelBuffer::filled(7, 20, &[0, 0, 0]).unwrap();
        assert!(matches!(
            remove_background(&image),
            Err(EditError::UnsupportedInput(_))
        ));
    }

    #[test]
    fn test_ties_go_to_background() {
        let fg = Array2::from_elem((1, 1), true);
        let bg = Array2::from_elem((1, 1), false);
        let weights = SignalWeights {
            edge: 1.0,
            cluster: 0.5,
            saliency: 0.5,
        };
        let (voted, agreement) = vote(&fg, &bg, &bg, &weights);
        assert_eq!(voted[[0, 0]], 0);
        assert_eq!(agreement, 0);

        let (voted, agreement) = vote(&fg, &fg, &bg, &SignalWeights::default());
        assert_eq!(voted[[0, 0]], 255);
        assert_eq!(agreement, 0);
    }

    #[test]
    fn test_cancelled() {
        let image = framed(32, 10);
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(matches!(
            remove_background_with(&image, &SegmentationOptions::default(), &cancel),
            Err(EditError::Cancelled)
        ));
    }
}
