//! Error type shared by every engine in the crate.
//!
//! All failures are returned as values. Nothing in the library panics on
//! caller input, and no operation hands back a partially written buffer.

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EditError>;

/// Errors produced by selection, segmentation, inpainting and cropping.
#[derive(Debug, thiserror::Error)]
pub enum EditError {
    /// A coordinate lies outside the image.
    #[error("coordinate ({x}, {y}) lies outside the {width}x{height} image")]
    OutOfBounds {
        x: i64,
        y: i64,
        width: usize,
        height: usize,
    },

    /// The input cannot be processed (too small, wrong channel layout, bad parameter).
    #[error("unsupported input: {0}")]
    UnsupportedInput(String),

    /// A mask is not paired 1:1 with the image or mask it is combined with.
    #[error("dimension mismatch: expected {expected_width}x{expected_height}, found {found_width}x{found_height}")]
    DimensionMismatch {
        expected_width: usize,
        expected_height: usize,
        found_width: usize,
        found_height: usize,
    },

    /// An iterative method did not settle within its iteration cap.
    #[error("{method} did not converge within {iterations} iterations")]
    AlgorithmDivergence {
        method: &'static str,
        iterations: usize,
    },

    /// The requested aspect ratio does not fit at or above the minimum scale.
    #[error("no crop window with aspect {aspect:.4} fits the image at the minimum scale")]
    NoValidCrop { aspect: f64 },

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// Internal array assembly failed.
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}

impl EditError {
    pub(crate) fn unsupported(reason: impl Into<String>) -> Self {
        EditError::UnsupportedInput(reason.into())
    }
}
