//! Pixel kernels shared by the selection, segmentation, inpainting and
//! composition engines.
//!
//! ## Planes
//!
//! | Kind | Shape | Type | Description |
//! |------|-------|------|-------------|
//! | Mask | (H, W) | u8 | Selection strength, 0-255 |
//! | Plane | (H, W) | f32 | Luminance, edge magnitude or saliency, 0.0-1.0 |
//!
//! ## Architecture
//!
//! - **Pure functions** - inputs are borrowed views, outputs are new arrays
//! - **Row-band parallelism** - rayon workers write disjoint output rows
//! - **Edge clamping** - convolutions clamp at the border, morphology ignores
//!   out-of-raster neighbours

pub mod blur;
pub mod color_science;
pub mod core;
pub mod edge;
pub mod grayscale;
pub mod morphology;
