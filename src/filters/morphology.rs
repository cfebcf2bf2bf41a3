//! Morphology on masks: Dilate, Erode, Close, Open.
//!
//! Operations use a circular (disk) structuring element unless a
//! [`Element::Square`] is requested through [`close_with`] / [`open_with`].
//! Neighbours
//! outside the raster are ignored rather than treated as black, so a full
//! mask stays full under erosion and an empty mask stays empty under
//! dilation.
//!
//! Rows are processed in parallel with rayon.

use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;

use crate::error::Result;

#[derive(Clone, Copy)]
enum Extremum {
    Max,
    Min,
}

/// Structuring element shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Element {
    /// Pixels within `radius` of the centre. Radius 1 is a 4-neighbour cross.
    #[default]
    Disk,
    /// Full `(2r+1) x (2r+1)` square. Keeps right-angle corners under opening.
    Square,
}

/// Horizontal half-width of the element for each row offset `-r..=r`.
fn element_rows(radius: f32, element: Element) -> Vec<(isize, isize)> {
    let r = radius.max(0.0).floor() as isize;
    let r_sq = radius * radius;
    (-r..=r)
        .map(|dy| match element {
            Element::Disk => {
                let rem = (r_sq - (dy * dy) as f32).max(0.0);
                (dy, rem.sqrt().floor() as isize)
            }
            Element::Square => (dy, r),
        })
        .collect()
}

fn morph(input: ArrayView2<u8>, radius: f32, element: Element, op: Extremum) -> Result<Array2<u8>> {
    let (height, width) = input.dim();
    if radius < 1.0 || width == 0 || height == 0 {
        return Ok(input.to_owned());
    }

    let rows = element_rows(radius, element);
    let (start, saturated) = match op {
        Extremum::Max => (0u8, 255u8),
        Extremum::Min => (255u8, 0u8),
    };

    let mut output = vec![0u8; height * width];
    output
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, out) in row.iter_mut().enumerate() {
                let mut acc = start;

                'disk: for &(dy, half) in &rows {
                    let sy = y as isize + dy;
                    if sy < 0 || sy >= height as isize {
                        continue;
                    }
                    let x_start = (x as isize - half).max(0) as usize;
                    let x_end = (x as isize + half).min(width as isize - 1) as usize;
                    for sx in x_start..=x_end {
                        let v = input[[sy as usize, sx]];
                        acc = match op {
                            Extremum::Max => acc.max(v),
                            Extremum::Min => acc.min(v),
                        };
                        if acc == saturated {
                            break 'disk;
                        }
                    }
                }

                *out = acc;
            }
        });

    Ok(Array2::from_shape_vec((height, width), output)?)
}

/// Apply dilation to a mask.
///
/// Dilate takes the maximum value in the disk neighborhood,
/// making selected regions grow.
///
/// # Arguments
/// * `input` - Mask of shape (height, width)
/// * `radius` - Disk radius in pixels (below 1.0 is the identity)
pub fn dilate(input: ArrayView2<u8>, radius: f32) -> Result<Array2<u8>> {
    morph(input, radius, Element::Disk, Extremum::Max)
}

/// Apply erosion to a mask.
///
/// Erode takes the minimum value in the disk neighborhood,
/// making selected regions shrink.
pub fn erode(input: ArrayView2<u8>, radius: f32) -> Result<Array2<u8>> {
    morph(input, radius, Element::Disk, Extremum::Min)
}

/// Dilate then erode: bridges gaps and fills pinholes.
pub fn close(input: ArrayView2<u8>, radius: f32) -> Result<Array2<u8>> {
    close_with(input, radius, Element::Disk)
}

/// Erode then dilate: removes specks narrower than the disk.
pub fn open(input: ArrayView2<u8>, radius: f32) -> Result<Array2<u8>> {
    open_with(input, radius, Element::Disk)
}

/// [`close`] with an explicit structuring element.
pub fn close_with(input: ArrayView2<u8>, radius: f32, element: Element) -> Result<Array2<u8>> {
    let dilated = morph(input, radius, element, Extremum::Max)?;
    morph(dilated.view(), radius, element, Extremum::Min)
}

/// [`open`] with an explicit structuring element.
pub fn open_with(input: ArrayView2<u8>, radius: f32, element: Element) -> Result<Array2<u8>> {
    let eroded = morph(input, radius, element, Extremum::Min)?;
    morph(eroded.view(), radius, element, Extremum::Max)
}
