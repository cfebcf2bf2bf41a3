//! Selection algorithms for image editing.
//!
//! This module builds and edits [`Mask`](crate::buffer::Mask)s from user gestures:
//! - **Magic wand**: Tolerance-based region growing from a seed pixel
//! - **Shapes**: Rectangle, ellipse and lasso rasterisation
//! - **Modifiers**: Grow, shrink, feather, invert and boolean combination
//! - **Erase**: Apply a mask to an image as transparency or a fill colour

pub mod erase;
pub mod magic_wand;
pub mod modify;
pub mod shape;

pub use erase::{erase_selection, EraseMode};
pub use magic_wand::{
    select_by_point, select_by_point_with, ColorMetric, Connectivity, GrowthReference,
    SelectOptions,
};
pub use modify::{
    combine, intersect, modify, subtract, symmetric_difference, union, CombineOp, MaskOp,
};
pub use shape::{select_by_shape, Shape};
