//! Automatic crop selection.
//!
//! Candidate windows of the requested aspect ratio are enumerated over a
//! fixed grid of scales and positions and scored against a
//! [`CompositionRule`] on a saliency (or edge density) map. Region sums come
//! from a summed-area table, so each candidate costs O(1).
//!
//! ## Enumeration
//!
//! - Scales run from the largest fitting window down in `step_fraction`
//!   steps while both sides stay at least `min_scale` of the image
//! - Positions step by `step_fraction` of the image side, plus the flush
//!   right/bottom and centred positions
//! - Ties prefer the window closest to the image centre, then the larger
//!   window, then the earlier candidate

mod rules;

pub use rules::CompositionRule;

use std::fmt;
use std::str::FromStr;

use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::analysis::ImageAnalysis;
use crate::buffer::{PixelBuffer, Rect};
use crate::cancel::CancelToken;
use crate::error::{EditError, Result};
use crate::filters::core::SummedArea;
use rules::Scorer;

const TIE_EPSILON: f64 = 1e-9;

/// Target width:height ratio.
///
/// Deserialization goes through [`AspectRatio::new`], so non-positive sides
/// are rejected when loaded.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "RawAspect")]
pub struct AspectRatio {
    pub width: f64,
    pub height: f64,
}

#[derive(Deserialize)]
struct RawAspect {
    width: f64,
    height: f64,
}

impl TryFrom<RawAspect> for AspectRatio {
    type Error = EditError;

    fn try_from(raw: RawAspect) -> Result<Self> {
        AspectRatio::new(raw.width, raw.height)
    }
}

impl AspectRatio {
    pub fn new(width: f64, height: f64) -> Result<Self> {
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(EditError::unsupported(format!(
                "aspect ratio sides must be positive, got {}:{}",
                width, height
            )));
        }
        Ok(Self { width, height })
    }

    pub fn ratio(&self) -> f64 {
        self.width / self.height
    }
}

impl FromStr for AspectRatio {
    type Err = EditError;

    /// Parse `"16:9"`, `"16x9"` or a bare ratio such as `"1.5"`.
    fn from_str(s: &str) -> Result<Self> {
        let parse = |v: &str| {
            v.trim()
                .parse::<f64>()
                .map_err(|_| EditError::unsupported(format!("invalid aspect ratio '{}'", s)))
        };
        match s.split_once([':', 'x', '/']) {
            Some((w, h)) => AspectRatio::new(parse(w)?, parse(h)?),
            None => AspectRatio::new(parse(s)?, 1.0),
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

/// Map the windows are scored on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropSignal {
    /// Border contrast blended with edge density.
    #[default]
    Saliency,
    /// Smoothed gradient energy only.
    EdgeDensity,
}

/// Crop search tunables.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct CropOptions {
    /// Scale and position step as a fraction of the image side.
    pub step_fraction: f64,
    /// Smallest window side as a fraction of the image side.
    pub min_scale: f64,
    /// Weight of retained saliency against rule alignment.
    pub coverage_weight: f64,
    /// Anchor band half-width as a fraction of the window side.
    pub band_fraction: f64,
    pub signal: CropSignal,
}

impl Default for CropOptions {
    fn default() -> Self {
        Self {
            step_fraction: 0.05,
            min_scale: 0.10,
            coverage_weight: 0.6,
            band_fraction: 1.0 / 12.0,
            signal: CropSignal::Saliency,
        }
    }
}

/// Best crop window and its score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CropCandidate {
    pub rect: Rect,
    pub score: f64,
}

/// Find the best crop window with default options.
pub fn best_crop(
    image: &PixelBuffer,
    aspect: AspectRatio,
    rule: CompositionRule,
) -> Result<CropCandidate> {
    best_crop_with(image, aspect, rule, &CropOptions::default(), &CancelToken::new())
}

/// [`best_crop`] with explicit options and cancellation.
pub fn best_crop_with(
    image: &PixelBuffer,
    aspect: AspectRatio,
    rule: CompositionRule,
    options: &CropOptions,
    cancel: &CancelToken,
) -> Result<CropCandidate> {
    let analysis = ImageAnalysis::new(image);
    best_crop_in(&analysis, aspect, rule, options, cancel)
}

/// Crop search over caller-owned cached maps.
pub fn best_crop_in(
    analysis: &ImageAnalysis<'_>,
    aspect: AspectRatio,
    rule: CompositionRule,
    options: &CropOptions,
    cancel: &CancelToken,
) -> Result<CropCandidate> {
    // Fields are public, so a literal can skip the constructor
    let aspect = AspectRatio::new(aspect.width, aspect.height)?;
    let image = analysis.image();
    let (width, height) = (image.width(), image.height());
    let sizes = window_sizes(width, height, aspect, options);
    if sizes.is_empty() {
        return Err(EditError::NoValidCrop {
            aspect: aspect.ratio(),
        });
    }

    let map = match options.signal {
        CropSignal::Saliency => analysis.saliency()?,
        CropSignal::EdgeDensity => analysis.edge_density()?,
    };
    let sat = SummedArea::new(map.view());
    let scorer = Scorer {
        sat: &sat,
        total: sat.total(),
        width,
        height,
        rule,
        coverage_weight: options.coverage_weight,
        band_fraction: options.band_fraction,
    };
    let step_x = ((width as f64 * options.step_fraction).round() as usize).max(1);
    let step_y = ((height as f64 * options.step_fraction).round() as usize).max(1);

    let per_scale: Vec<Option<CropCandidate>> = sizes
        .par_iter()
        .map(|&(w, h)| {
            cancel.check()?;
            let mut best: Option<CropCandidate> = None;
            for y in positions(height, h, step_y) {
                for x in positions(width, w, step_x) {
                    let rect = Rect::new(x, y, w, h);
                    let candidate = CropCandidate {
                        rect,
                        score: scorer.score(rect),
                    };
                    best = Some(pick(best, candidate, width, height));
                }
            }
            Ok(best)
        })
        .collect::<Result<_>>()?;

    let winner = per_scale
        .into_iter()
        .flatten()
        .fold(None, |best, c| Some(pick(best, c, width, height)))
        .ok_or(EditError::NoValidCrop {
            aspect: aspect.ratio(),
        })?;

    debug!(
        "{:?} crop at {}: {} scales, best {:?} scoring {:.4}",
        rule,
        aspect,
        sizes.len(),
        winner.rect,
        winner.score
    );
    Ok(winner)
}

/// Window sizes from the largest fitting window down.
fn window_sizes(
    width: usize,
    height: usize,
    aspect: AspectRatio,
    options: &CropOptions,
) -> Vec<(usize, usize)> {
    let ratio = aspect.ratio();
    let (base_w, base_h) = if width as f64 / height as f64 > ratio {
        (height as f64 * ratio, height as f64)
    } else {
        (width as f64, width as f64 / ratio)
    };
    let min_w = ((width as f64 * options.min_scale).ceil() as usize).max(1);
    let min_h = ((height as f64 * options.min_scale).ceil() as usize).max(1);
    let step = options.step_fraction.clamp(1e-3, 1.0);

    let mut sizes = Vec::new();
    let mut k = 0;
    loop {
        let scale = 1.0 - step * k as f64;
        if scale <= 0.0 {
            break;
        }
        let w = ((base_w * scale).round() as usize).min(width);
        let h = ((base_h * scale).round() as usize).min(height);
        if w < min_w || h < min_h {
            break;
        }
        if sizes.last() != Some(&(w, h)) {
            sizes.push((w, h));
        }
        k += 1;
    }
    sizes
}

/// Grid offsets for a window of `size` along a side of `extent`.
fn positions(extent: usize, size: usize, step: usize) -> Vec<usize> {
    let last = extent - size;
    let mut out: Vec<usize> = (0..=last).step_by(step).collect();
    out.push(last / 2);
    out.push(last);
    out.sort_unstable();
    out.dedup();
    out
}

/// Keep the better of `best` and `candidate`; earlier wins a full tie.
fn pick(best: Option<CropCandidate>, candidate: CropCandidate, width: usize, height: usize) -> CropCandidate {
    let Some(best) = best else {
        return candidate;
    };
    if candidate.score > best.score + TIE_EPSILON {
        return candidate;
    }
    if candidate.score < best.score - TIE_EPSILON {
        return best;
    }

    let center = |r: Rect| {
        let (cx, cy) = r.center();
        let dx = cx - width as f64 / 2.0;
        let dy = cy - height as f64 / 2.0;
        dx * dx + dy * dy
    };
    let (dc, db) = (center(candidate.rect), center(best.rect));
    if dc < db - TIE_EPSILON {
        candidate
    } else if dc > db + TIE_EPSILON {
        best
    } else if candidate.rect.area() > best.rect.area() {
        candidate
    } else {
        best
    }
}

/// Largest window of `aspect` centred on `focus` (image centre when
/// `None`), shifted to stay inside the image.
pub fn crop_around_focus(
    width: usize,
    height: usize,
    aspect: AspectRatio,
    focus: Option<(f64, f64)>,
) -> Result<Rect> {
    let ratio = AspectRatio::new(aspect.width, aspect.height)?.ratio();
    let (w, h) = if width as f64 / height as f64 > ratio {
        (((height as f64 * ratio).round() as usize).min(width), height)
    } else {
        (width, ((width as f64 / ratio).round() as usize).min(height))
    };
    if w == 0 || h == 0 {
        return Err(EditError::NoValidCrop { aspect: ratio });
    }

    let (fx, fy) = focus.unwrap_or((width as f64 / 2.0, height as f64 / 2.0));
    let x = (fx - w as f64 / 2.0).round().clamp(0.0, (width - w) as f64) as usize;
    let y = (fy - h as f64 / 2.0).round().clamp(0.0, (height - h) as f64) as usize;
    Ok(Rect::new(x, y, w, h))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Dark canvas with a bright square at `(x0, y0)`.
    fn subject(width: usize, height: usize, x0: usize, y0: usize, size: usize) -> PixelBuffer {
        let mut samples = Vec::with_capacity(width * height * 3);
        for y in 0..height {
            for x in 0..width {
                let inside = (x0..x0 + size).contains(&x) && (y0..y0 + size).contains(&y);
                let v: u8 = if inside { 250 } else { 10 };
                samples.extend_from_slice(&[v, v, v]);
            }
        }
        PixelBuffer::new(width, height, 3, samples).unwrap()
    }

    #[test]
    fn test_aspect_parsing() {
        let a: AspectRatio = "16:9".parse().unwrap();
        assert!((a.ratio() - 16.0 / 9.0).abs() < 1e-12);
        assert_eq!("4x5".parse::<AspectRatio>().unwrap().ratio(), 0.8);
        assert_eq!("1.5".parse::<AspectRatio>().unwrap().ratio(), 1.5);
        assert!("0:9".parse::<AspectRatio>().is_err());
        assert!("wide".parse::<AspectRatio>().is_err());
    }

    #[test]
    fn test_invalid_aspect_is_unsupported_input() {
        let loaded: AspectRatio = serde_json::from_str(r#"{"width": 3.0, "height": 2.0}"#).unwrap();
        assert_eq!(loaded.ratio(), 1.5);
        assert!(serde_json::from_str::<AspectRatio>(r#"{"width": 0.0, "height": 0.0}"#).is_err());
        assert!(serde_json::from_str::<AspectRatio>(r#"{"width": -4.0, "height": 3.0}"#).is_err());

        let image = PixelBuffer::filled(40, 40, &[0, 0, 0]).unwrap();
        let literal = AspectRatio {
            width: 0.0,
            height: 0.0,
        };
        assert!(matches!(
            best_crop(&image, literal, CompositionRule::RuleOfThirds),
            Err(EditError::UnsupportedInput(_))
        ));
        assert!(matches!(
            crop_around_focus(40, 40, literal, None),
            Err(EditError::UnsupportedInput(_))
        ));
    }

    #[test]
    fn test_window_sizes_respect_minimum() {
        let sizes = window_sizes(200, 100, AspectRatio::new(1.0, 1.0).unwrap(), &CropOptions::default());
        assert_eq!(sizes[0], (100, 100));
        assert!(sizes.iter().all(|&(w, h)| w >= 20 && h >= 10 && w == h));
        assert_eq!(sizes.last(), Some(&(20, 20)));
    }

    #[test]
    fn test_positions_include_flush_and_centre() {
        assert_eq!(positions(100, 60, 5), (0..=40).step_by(5).collect::<Vec<_>>());
        assert_eq!(positions(10, 3, 5), vec![0, 3, 5, 7]);
        assert_eq!(positions(10, 10, 5), vec![0]);
    }

    #[test]
    fn test_crop_follows_subject() {
        // Square crop of a wide image must slide toward the subject
        let image = subject(160, 80, 120, 30, 16);
        let best = best_crop(&image, "1:1".parse().unwrap(), CompositionRule::RuleOfThirds).unwrap();
        assert_eq!(best.rect.width, best.rect.height);
        assert!(best.rect.fits_within(160, 80));
        assert!(best.rect.contains(127, 37));
    }

    #[test]
    fn test_flat_image_prefers_centred_largest_window() {
        let image = PixelBuffer::filled(100, 50, &[30, 30, 30]).unwrap();
        let best = best_crop(&image, "1:1".parse().unwrap(), CompositionRule::GoldenRatio).unwrap();
        assert_eq!(best.rect, Rect::new(25, 0, 50, 50));
    }

    #[test]
    fn test_impossible_aspect() {
        let image = PixelBuffer::filled(100, 100, &[0, 0, 0]).unwrap();
        assert!(matches!(
            best_crop(&image, AspectRatio::new(1.0, 1000.0).unwrap(), CompositionRule::CenterWeighted),
            Err(EditError::NoValidCrop { .. })
        ));
    }

    #[test]
    fn test_crop_around_focus() {
        let aspect = AspectRatio::new(1.0, 1.0).unwrap();
        assert_eq!(crop_around_focus(300, 100, aspect, None).unwrap(), Rect::new(100, 0, 100, 100));
        assert_eq!(
            crop_around_focus(300, 100, aspect, Some((290.0, 50.0))).unwrap(),
            Rect::new(200, 0, 100, 100)
        );
        let tall = AspectRatio::new(1.0, 2.0).unwrap();
        assert_eq!(crop_around_focus(100, 100, tall, Some((0.0, 0.0))).unwrap(), Rect::new(0, 0, 50, 100));
    }

    #[test]
    fn test_cancelled() {
        let image = subject(60, 60, 20, 20, 10);
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(matches!(
            best_crop_with(
                &image,
                AspectRatio::new(1.0, 1.0).unwrap(),
                CompositionRule::RuleOfThirds,
                &CropOptions::default(),
                &cancel
            ),
            Err(EditError::Cancelled)
        ));
    }
}
