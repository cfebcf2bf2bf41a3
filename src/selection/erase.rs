//! Erase the selected pixels of an image.
//!
//! Mask strength scales the effect, so feathered selections fade out
//! instead of leaving a hard cut. Unselected (0) pixels are copied
//! unchanged.

use ndarray::{Array3, Axis, Zip};
use serde::Deserialize;

use crate::buffer::{Mask, PixelBuffer};
use crate::error::Result;
use crate::filters::grayscale::luma;

/// What erased pixels become.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EraseMode {
    /// Scale alpha by `(255 - m) / 255`. Output is always RGBA.
    #[default]
    Transparent,
    /// Blend toward an RGBA colour by `m / 255`, keeping the image's channel layout.
    Color([u8; 4]),
}

/// Erase the pixels selected by `mask`.
pub fn erase_selection(image: &PixelBuffer, mask: &Mask, mode: EraseMode) -> Result<PixelBuffer> {
    mask.ensure_matches(image)?;

    match mode {
        EraseMode::Transparent => {
            let mut data = image.to_rgba().into_array();
            Zip::from(data.lanes_mut(Axis(2)))
                .and(mask.view())
                .for_each(|mut px, &m| {
                    if m > 0 {
                        px[3] = scale(px[3], 255 - m);
                    }
                });
            PixelBuffer::from_array(data)
        }
        EraseMode::Color(color) => {
            let target = target_samples(color, image.channels());
            let mut data: Array3<u8> = image.view().to_owned();
            Zip::from(data.lanes_mut(Axis(2)))
                .and(mask.view())
                .for_each(|mut px, &m| {
                    if m > 0 {
                        for (v, &t) in px.iter_mut().zip(&target) {
                            *v = blend(*v, t, m);
                        }
                    }
                });
            PixelBuffer::from_array(data)
        }
    }
}

/// The erase colour expressed in `channels` samples.
fn target_samples(color: [u8; 4], channels: usize) -> Vec<u8> {
    match channels {
        1 => vec![(luma(&color[..3]) * 255.0).round() as u8],
        3 => color[..3].to_vec(),
        _ => color.to_vec(),
    }
}

#[inline]
fn scale(value: u8, factor: u8) -> u8 {
    ((value as u32 * factor as u32 + 127) / 255) as u8
}

#[inline]
fn blend(from: u8, to: u8, amount: u8) -> u8 {
    let t = amount as f32 / 255.0;
    (from as f32 + (to as f32 - from as f32) * t).round() as u8
}
