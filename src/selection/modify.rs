//! Selection modifiers and mask boolean operations.

use std::str::FromStr;

use log::debug;
use ndarray::Zip;
use serde::Deserialize;

use crate::buffer::Mask;
use crate::error::{EditError, Result};
use crate::filters::blur::gaussian_blur_mask;
use crate::filters::morphology::{dilate, erode};

/// Single-mask modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskOp {
    /// Dilate with a disk of radius `amount`.
    Grow,
    /// Erode with a disk of radius `amount`.
    Shrink,
    /// Gaussian softening over roughly `amount` pixels.
    Feather,
    /// `255 - value`; ignores `amount`.
    Invert,
}

impl FromStr for MaskOp {
    type Err = EditError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "grow" | "expand" => Ok(MaskOp::Grow),
            "shrink" | "contract" => Ok(MaskOp::Shrink),
            "feather" => Ok(MaskOp::Feather),
            "invert" => Ok(MaskOp::Invert),
            other => Err(EditError::unsupported(format!("unknown mask op '{}'", other))),
        }
    }
}

/// Pixel-wise combination of two masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombineOp {
    /// max(a, b)
    Union,
    /// min(a, b)
    Intersect,
    /// a - b, clamped at 0
    Subtract,
    /// |a - b|
    SymmetricDifference,
}

impl FromStr for CombineOp {
    type Err = EditError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "union" | "add" => Ok(CombineOp::Union),
            "intersect" | "intersection" => Ok(CombineOp::Intersect),
            "subtract" | "difference" => Ok(CombineOp::Subtract),
            "symmetric_difference" | "xor" => Ok(CombineOp::SymmetricDifference),
            other => Err(EditError::unsupported(format!(
                "unknown combine op '{}'",
                other
            ))),
        }
    }
}

/// Apply a modifier to a mask, returning a new mask.
///
/// # Arguments
/// * `mask` - Input selection
/// * `op` - Modifier
/// * `amount` - Radius in pixels (0 is the identity)
pub fn modify(mask: &Mask, op: MaskOp, amount: f32) -> Result<Mask> {
    if op != MaskOp::Invert && (!amount.is_finite() || amount < 0.0) {
        return Err(EditError::unsupported(format!(
            "modifier amount must be a non-negative number, got {}",
            amount
        )));
    }

    let out = match op {
        MaskOp::Grow => Mask::from_array(dilate(mask.view(), amount)?),
        MaskOp::Shrink => Mask::from_array(erode(mask.view(), amount)?),
        MaskOp::Feather => Mask::from_array(gaussian_blur_mask(mask.view(), amount / 3.0)?),
        MaskOp::Invert => Mask::from_array(mask.view().mapv(|v| 255 - v)),
    };

    debug!(
        "{:?} by {:.1}: {} -> {} selected pixels",
        op,
        amount,
        mask.selected_count(),
        out.selected_count()
    );
    Ok(out)
}

/// Combine two masks of equal size.
pub fn combine(a: &Mask, b: &Mask, op: CombineOp) -> Result<Mask> {
    a.ensure_same_size(b)?;
    let merged = Zip::from(a.view()).and(b.view()).map_collect(|&u, &v| match op {
        CombineOp::Union => u.max(v),
        CombineOp::Intersect => u.min(v),
        CombineOp::Subtract => u.saturating_sub(v),
        CombineOp::SymmetricDifference => u.abs_diff(v),
    });
    Ok(Mask::from_array(merged))
}

pub fn union(a: &Mask, b: &Mask) -> Result<Mask> {
    combine(a, b, CombineOp::Union)
}

pub fn intersect(a: &Mask, b: &Mask) -> Result<Mask> {
    combine(a, b, CombineOp::Intersect)
}

pub fn subtract(a: &Mask, b: &Mask) -> Result<Mask> {
    combine(a, b, CombineOp::Subtract)
}

pub fn symmetric_difference(a: &Mask, b: &Mask) -> Result<Mask> {
    combine(a, b, CombineOp::SymmetricDifference)
}
