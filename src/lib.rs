//! maskforge - selection and content-aware editing engine
//!
//! Pixel-level algorithms behind an image editor's selection tools, with
//! Python bindings via PyO3 and WASM bindings for JavaScript.
//!
//! ## Image Format
//! Images are `ndarray` arrays in (height, width, channels) layout, 8 bits
//! per channel:
//! - **Grayscale**: (height, width, 1) - single channel
//! - **RGB**: (height, width, 3) - 3 color channels
//! - **RGBA**: (height, width, 4) - 3 color channels + alpha
//!
//! Masks are (height, width) `u8` arrays: 0 = unselected, 255 = fully
//! selected, values in between are partial (feathered) selection.
//!
//! ## Engines
//! - [`selection`] - magic wand, shapes, grow/shrink/feather/invert, erase
//! - [`segmentation`] - background removal by three voting signals
//! - [`inpaint`] - diffusion and patch-based fill of masked regions
//! - [`composition`] - best crop window for an aspect ratio and rule
//!
//! Every operation is a pure function of its inputs. Derived maps shared
//! between segmentation and composition live in an [`ImageAnalysis`] the
//! caller creates per image; nothing is cached globally.

pub mod analysis;
pub mod buffer;
pub mod cancel;
pub mod composition;
pub mod error;
pub mod filters;
pub mod inpaint;
pub mod segmentation;
pub mod selection;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use analysis::{AnalysisOptions, ImageAnalysis};
pub use buffer::{Mask, PixelBuffer, Rect};
pub use cancel::CancelToken;
pub use composition::{
    best_crop, best_crop_in, best_crop_with, crop_around_focus, AspectRatio, CompositionRule,
    CropCandidate, CropOptions, CropSignal,
};
pub use error::{EditError, Result};
pub use inpaint::{fill, fill_with, FillMethod, InpaintOptions, Inpainted};
pub use segmentation::{
    remove_background, remove_background_in, remove_background_with, Segmentation,
    SegmentationOptions, Signal, SignalWeights,
};
pub use selection::{
    combine, erase_selection, intersect, modify, select_by_point, select_by_point_with,
    select_by_shape, subtract, symmetric_difference, union, ColorMetric, CombineOp, Connectivity,
    EraseMode, GrowthReference, MaskOp, SelectOptions, Shape,
};

// Python bindings (only when python feature is enabled)
#[cfg(feature = "python")]
mod python {
    use numpy::{IntoPyArray, PyArray2, PyArray3, PyReadonlyArray2, PyReadonlyArray3};
    use pyo3::exceptions::PyValueError;
    use pyo3::prelude::*;

    use crate::buffer::{Mask, PixelBuffer};
    use crate::composition::{self, AspectRatio, CompositionRule};
    use crate::error::EditError;
    use crate::inpaint::{self, FillMethod};
    use crate::segmentation;
    use crate::selection::{self, CombineOp, Connectivity, EraseMode, MaskOp, SelectOptions, Shape};

    impl From<EditError> for PyErr {
        fn from(err: EditError) -> PyErr {
            PyValueError::new_err(err.to_string())
        }
    }

    fn to_image(image: &PyReadonlyArray3<'_, u8>) -> PyResult<PixelBuffer> {
        Ok(PixelBuffer::from_array(image.as_array().to_owned())?)
    }

    fn to_mask(mask: &PyReadonlyArray2<'_, u8>) -> Mask {
        Mask::from_array(mask.as_array().to_owned())
    }

    // ========================================================================
    // Selection
    // ========================================================================

    /// Magic wand selection from a seed pixel.
    ///
    /// # Arguments
    /// * `image` - Input image (1, 3, or 4 channels)
    /// * `x`, `y` - Seed pixel
    /// * `tolerance` - 0-100
    /// * `connectivity` - 4 or 8
    /// * `contiguous` - Only select pixels connected to the seed
    /// * `perceptual` - Compare in CIE Lab instead of raw channels
    #[pyfunction]
    #[pyo3(signature = (image, x, y, tolerance=32.0, connectivity=4, contiguous=true, perceptual=false, anti_alias=false, feather=0.0))]
    #[allow(clippy::too_many_arguments)]
    pub fn select_by_point<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, u8>,
        x: i64,
        y: i64,
        tolerance: f32,
        connectivity: u8,
        contiguous: bool,
        perceptual: bool,
        anti_alias: bool,
        feather: f32,
    ) -> PyResult<Bound<'py, PyArray2<u8>>> {
        let buffer = to_image(&image)?;
        let connectivity = Connectivity::try_from(connectivity)?;
        let options = SelectOptions {
            metric: if perceptual {
                selection::ColorMetric::Perceptual
            } else {
                selection::ColorMetric::Euclidean
            },
            contiguous,
            anti_alias,
            feather,
            ..Default::default()
        };
        let mask =
            selection::select_by_point_with(&buffer, (x, y), tolerance, connectivity, &options)?;
        Ok(mask.into_array().into_pyarray(py))
    }

    /// Rectangular selection.
    #[pyfunction]
    pub fn select_rect<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, u8>,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> PyResult<Bound<'py, PyArray2<u8>>> {
        let buffer = to_image(&image)?;
        let mask = selection::select_by_shape(
            &buffer,
            &Shape::Rect {
                x,
                y,
                width,
                height,
            },
        )?;
        Ok(mask.into_array().into_pyarray(py))
    }

    /// Elliptical selection around (cx, cy).
    #[pyfunction]
    pub fn select_ellipse<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, u8>,
        cx: f32,
        cy: f32,
        rx: f32,
        ry: f32,
    ) -> PyResult<Bound<'py, PyArray2<u8>>> {
        let buffer = to_image(&image)?;
        let mask = selection::select_by_shape(&buffer, &Shape::Ellipse { cx, cy, rx, ry })?;
        Ok(mask.into_array().into_pyarray(py))
    }

    /// Freehand (lasso) selection from a closed list of points.
    #[pyfunction]
    pub fn select_lasso<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, u8>,
        points: Vec<(f32, f32)>,
    ) -> PyResult<Bound<'py, PyArray2<u8>>> {
        let buffer = to_image(&image)?;
        let mask = selection::select_by_shape(&buffer, &Shape::Polygon(points))?;
        Ok(mask.into_array().into_pyarray(py))
    }

    /// Grow, shrink, feather or invert a mask.
    #[pyfunction]
    #[pyo3(signature = (mask, op, amount=0.0))]
    pub fn modify_selection<'py>(
        py: Python<'py>,
        mask: PyReadonlyArray2<'py, u8>,
        op: &str,
        amount: f32,
    ) -> PyResult<Bound<'py, PyArray2<u8>>> {
        let op: MaskOp = op.parse()?;
        let result = selection::modify(&to_mask(&mask), op, amount)?;
        Ok(result.into_array().into_pyarray(py))
    }

    /// Combine two masks: union, intersection, difference or symmetric_difference.
    #[pyfunction]
    #[pyo3(signature = (a, b, op="union"))]
    pub fn combine_selections<'py>(
        py: Python<'py>,
        a: PyReadonlyArray2<'py, u8>,
        b: PyReadonlyArray2<'py, u8>,
        op: &str,
    ) -> PyResult<Bound<'py, PyArray2<u8>>> {
        let op: CombineOp = op.parse()?;
        let result = selection::combine(&to_mask(&a), &to_mask(&b), op)?;
        Ok(result.into_array().into_pyarray(py))
    }

    /// Erase selected pixels to transparency, or to `color` (RGBA) if given.
    #[pyfunction]
    #[pyo3(signature = (image, mask, color=None))]
    pub fn erase_selection<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, u8>,
        mask: PyReadonlyArray2<'py, u8>,
        color: Option<[u8; 4]>,
    ) -> PyResult<Bound<'py, PyArray3<u8>>> {
        let mode = color.map_or(EraseMode::Transparent, EraseMode::Color);
        let result = selection::erase_selection(&to_image(&image)?, &to_mask(&mask), mode)?;
        Ok(result.into_array().into_pyarray(py))
    }

    // ========================================================================
    // Segmentation, fill, crop
    // ========================================================================

    /// Foreground mask and confidence (0.0-1.0).
    #[pyfunction]
    pub fn remove_background<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, u8>,
    ) -> PyResult<(Bound<'py, PyArray2<u8>>, f32)> {
        let buffer = to_image(&image)?;
        let result = py.allow_threads(|| segmentation::remove_background(&buffer))?;
        Ok((result.mask.into_array().into_pyarray(py), result.confidence))
    }

    /// Content-aware fill of the selected region.
    ///
    /// `method` is "diffusion", "patch_match" or "auto".
    #[pyfunction]
    #[pyo3(signature = (image, mask, method="diffusion"))]
    pub fn fill<'py>(
        py: Python<'py>,
        image: PyReadonlyArray3<'py, u8>,
        mask: PyReadonlyArray2<'py, u8>,
        method: &str,
    ) -> PyResult<Bound<'py, PyArray3<u8>>> {
        let buffer = to_image(&image)?;
        let mask = to_mask(&mask);
        let method = if method.eq_ignore_ascii_case("auto") {
            FillMethod::recommended(&buffer, &mask)?
        } else {
            method.parse()?
        };
        let result = py.allow_threads(|| inpaint::fill(&buffer, &mask, method))?;
        Ok(result.into_array().into_pyarray(py))
    }

    /// Best crop window as (x, y, width, height, score).
    #[pyfunction]
    #[pyo3(signature = (image, aspect, rule="rule_of_thirds"))]
    pub fn best_crop(
        py: Python<'_>,
        image: PyReadonlyArray3<'_, u8>,
        aspect: &str,
        rule: &str,
    ) -> PyResult<(usize, usize, usize, usize, f64)> {
        let buffer = to_image(&image)?;
        let aspect: AspectRatio = aspect.parse()?;
        let rule: CompositionRule = rule.parse()?;
        let best = py.allow_threads(|| composition::best_crop(&buffer, aspect, rule))?;
        let r = best.rect;
        Ok((r.x, r.y, r.width, r.height, best.score))
    }

    /// maskforge Rust extension module
    #[pymodule]
    pub fn maskforge(m: &Bound<'_, PyModule>) -> PyResult<()> {
        // Selection
        m.add_function(wrap_pyfunction!(select_by_point, m)?)?;
        m.add_function(wrap_pyfunction!(select_rect, m)?)?;
        m.add_function(wrap_pyfunction!(select_ellipse, m)?)?;
        m.add_function(wrap_pyfunction!(select_lasso, m)?)?;
        m.add_function(wrap_pyfunction!(modify_selection, m)?)?;
        m.add_function(wrap_pyfunction!(combine_selections, m)?)?;
        m.add_function(wrap_pyfunction!(erase_selection, m)?)?;

        // Segmentation, fill, crop
        m.add_function(wrap_pyfunction!(remove_background, m)?)?;
        m.add_function(wrap_pyfunction!(fill, m)?)?;
        m.add_function(wrap_pyfunction!(best_crop, m)?)?;

        Ok(())
    }
}

#[cfg(feature = "python")]
pub use python::maskforge;
