//! Composition rules and window scoring.
//!
//! A rule places anchor lines at fixed fractions of the crop window. A
//! window scores well when it keeps most of the image's salient mass and
//! that mass sits on its anchor lines rather than being spread evenly.

use std::str::FromStr;

use serde::Deserialize;

use crate::buffer::Rect;
use crate::error::{EditError, Result};
use crate::filters::core::SummedArea;

const THIRDS: [f64; 2] = [1.0 / 3.0, 2.0 / 3.0];
const GOLDEN: [f64; 2] = [0.382, 0.618];
const CENTER: [f64; 1] = [0.5];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositionRule {
    #[default]
    RuleOfThirds,
    GoldenRatio,
    CenterWeighted,
}

impl CompositionRule {
    /// Anchor line positions as fractions of the window side.
    pub fn anchors(self) -> &'static [f64] {
        match self {
            CompositionRule::RuleOfThirds => &THIRDS,
            CompositionRule::GoldenRatio => &GOLDEN,
            CompositionRule::CenterWeighted => &CENTER,
        }
    }
}

impl FromStr for CompositionRule {
    type Err = EditError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "rule_of_thirds" | "thirds" => Ok(CompositionRule::RuleOfThirds),
            "golden_ratio" | "golden" => Ok(CompositionRule::GoldenRatio),
            "center_weighted" | "center" | "centre" => Ok(CompositionRule::CenterWeighted),
            other => Err(EditError::unsupported(format!(
                "unknown composition rule '{}'",
                other
            ))),
        }
    }
}

/// Scores windows of one signal map against one rule.
pub(crate) struct Scorer<'a> {
    pub sat: &'a SummedArea,
    pub total: f64,
    pub width: usize,
    pub height: usize,
    pub rule: CompositionRule,
    pub coverage_weight: f64,
    pub band_fraction: f64,
}

impl Scorer<'_> {
    pub fn score(&self, rect: Rect) -> f64 {
        let window = self.sum(rect.x, rect.y, rect.right(), rect.bottom());
        let coverage = if self.total > 0.0 {
            window / self.total
        } else {
            0.0
        };
        let window_density = window / rect.area() as f64;

        let mut alignment = self.alignment(rect, window_density);
        if self.rule == CompositionRule::CenterWeighted {
            alignment = 0.5 * alignment + 0.5 * self.center_prior(rect);
        }

        let w = self.coverage_weight.clamp(0.0, 1.0);
        w * coverage + (1.0 - w) * alignment
    }

    fn sum(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> f64 {
        self.sat.sum(x0, y0, x1, y1)
    }

    /// Anchor band density relative to the window's overall density.
    ///
    /// Vertical and horizontal bands overlap at the anchor intersections,
    /// so those areas are counted twice.
    fn alignment(&self, rect: Rect, window_density: f64) -> f64 {
        let half_w = (rect.width as f64 * self.band_fraction).max(0.5);
        let half_h = (rect.height as f64 * self.band_fraction).max(0.5);
        let mut mass = 0.0;
        let mut area = 0usize;

        for &f in self.rule.anchors() {
            let cx = rect.x as f64 + f * rect.width as f64;
            let (x0, x1) = band(cx, half_w, rect.x, rect.right());
            mass += self.sum(x0, rect.y, x1, rect.bottom());
            area += (x1 - x0) * rect.height;

            let cy = rect.y as f64 + f * rect.height as f64;
            let (y0, y1) = band(cy, half_h, rect.y, rect.bottom());
            mass += self.sum(rect.x, y0, rect.right(), y1);
            area += (y1 - y0) * rect.width;
        }

        if area == 0 {
            return 0.0;
        }
        let anchor_density = mass / area as f64;
        let denom = anchor_density + window_density;
        if denom > 0.0 {
            anchor_density / denom
        } else {
            0.0
        }
    }

    /// 1 at the image centre, falling to 0 at the farthest corner.
    fn center_prior(&self, rect: Rect) -> f64 {
        let (cx, cy) = rect.center();
        let dx = cx - self.width as f64 / 2.0;
        let dy = cy - self.height as f64 / 2.0;
        let max = ((self.width * self.width + self.height * self.height) as f64).sqrt() / 2.0;
        (1.0 - (dx * dx + dy * dy).sqrt() / max).max(0.0)
    }
}

/// Pixel span `[lo, hi)` of a band around `center`, clamped to `[min, max)`.
fn band(center: f64, half: f64, min: usize, max: usize) -> (usize, usize) {
    let lo = ((center - half).floor().max(min as f64) as usize).min(max);
    let hi = ((center + half).ceil().max(lo as f64) as usize).min(max);
    (lo, hi)
}
