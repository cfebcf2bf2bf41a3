//! WebAssembly exports for maskforge.
//!
//! These functions are exposed to JavaScript via wasm-bindgen.
//!
//! Images cross the boundary as flat RGBA bytes (length = width * height * 4,
//! the layout of `ImageData.data`); masks as flat bytes of length
//! width * height. Errors are returned to JavaScript as string exceptions.

use wasm_bindgen::prelude::*;

use crate::buffer::{Mask, PixelBuffer};
use crate::composition::{self, AspectRatio, CompositionRule};
use crate::error::EditError;
use crate::inpaint::{self, FillMethod};
use crate::segmentation;
use crate::selection::{self, Connectivity};

fn to_js(err: EditError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn rgba(data: &[u8], width: usize, height: usize) -> Result<PixelBuffer, JsValue> {
    PixelBuffer::new(width, height, 4, data.to_vec()).map_err(to_js)
}

// ============================================================================
// Selection
// ============================================================================

/// Magic wand selection from a seed pixel.
///
/// # Arguments
/// * `data` - Flat array of RGBA bytes
/// * `x`, `y` - Seed pixel
/// * `tolerance` - 0-100
/// * `connectivity` - 4 or 8
///
/// # Returns
/// Flat mask bytes (0 or 255)
#[wasm_bindgen]
pub fn select_by_point_wasm(
    data: &[u8],
    width: usize,
    height: usize,
    x: i32,
    y: i32,
    tolerance: f32,
    connectivity: u8,
) -> Result<Vec<u8>, JsValue> {
    let image = rgba(data, width, height)?;
    let connectivity = Connectivity::try_from(connectivity).map_err(to_js)?;
    let mask = selection::select_by_point(&image, (x as i64, y as i64), tolerance, connectivity)
        .map_err(to_js)?;
    Ok(mask.into_array().into_raw_vec_and_offset().0)
}

// ============================================================================
// Background removal
// ============================================================================

/// Separate foreground from background.
///
/// # Returns
/// Flat f32 array: `[confidence, m0, m1, ...]` where `m` are mask values
/// 0.0-255.0 in raster order
#[wasm_bindgen]
pub fn remove_background_wasm(
    data: &[u8],
    width: usize,
    height: usize,
) -> Result<Vec<f32>, JsValue> {
    let image = rgba(data, width, height)?;
    let result = segmentation::remove_background(&image).map_err(to_js)?;

    let mut out = Vec::with_capacity(1 + width * height);
    out.push(result.confidence);
    out.extend(result.mask.as_slice().iter().map(|&m| m as f32));
    Ok(out)
}

// ============================================================================
// Content-aware fill
// ============================================================================

/// Fill the masked region of an RGBA image.
///
/// # Arguments
/// * `method` - "diffusion", "patch_match" or "auto"
#[wasm_bindgen]
pub fn fill_wasm(
    data: &[u8],
    mask: &[u8],
    width: usize,
    height: usize,
    method: &str,
) -> Result<Vec<u8>, JsValue> {
    let image = rgba(data, width, height)?;
    let mask = Mask::from_vec(width, height, mask.to_vec()).map_err(to_js)?;
    let method = if method.eq_ignore_ascii_case("auto") {
        FillMethod::recommended(&image, &mask).map_err(to_js)?
    } else {
        method.parse().map_err(to_js)?
    };
    let result = inpaint::fill(&image, &mask, method).map_err(to_js)?;
    Ok(result.into_array().into_raw_vec_and_offset().0)
}

// ============================================================================
// Smart crop
// ============================================================================

/// Best crop window for an aspect ratio such as "16:9".
///
/// # Returns
/// `[x, y, width, height, score]`
#[wasm_bindgen]
pub fn best_crop_wasm(
    data: &[u8],
    width: usize,
    height: usize,
    aspect: &str,
    rule: &str,
) -> Result<Vec<f64>, JsValue> {
    let image = rgba(data, width, height)?;
    let aspect: AspectRatio = aspect.parse().map_err(to_js)?;
    let rule: CompositionRule = rule.parse().map_err(to_js)?;
    let best = composition::best_crop(&image, aspect, rule).map_err(to_js)?;
    let r = best.rect;
    Ok(vec![
        r.x as f64,
        r.y as f64,
        r.width as f64,
        r.height as f64,
        best.score,
    ])
}
