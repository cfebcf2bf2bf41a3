//! Raster containers: the image, its selection mask, and axis-aligned rectangles.
//!
//! ## Layout
//!
//! | Type | Shape | Type | Description |
//! |------|-------|------|-------------|
//! | PixelBuffer | (H, W, C) | u8 | C ∈ {1, 3, 4}: gray, RGB or RGBA |
//! | Mask | (H, W) | u8 | 0 = unselected, 255 = fully selected |
//!
//! Both wrap owned `ndarray` arrays in standard (row-major) layout, so the
//! sample slice of a buffer is always `width * height * channels` long.

use ndarray::{Array2, Array3, ArrayView2, ArrayView3};

use crate::error::{EditError, Result};

/// Axis-aligned rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Rect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Rect {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self { x, y, width, height }
    }

    /// Exclusive right edge.
    pub fn right(&self) -> usize {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> usize {
        self.y + self.height
    }

    pub fn area(&self) -> usize {
        self.width * self.height
    }

    /// Width divided by height (0.0 for a degenerate rectangle).
    pub fn aspect(&self) -> f64 {
        if self.height == 0 {
            0.0
        } else {
            self.width as f64 / self.height as f64
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// True when the rectangle lies inside a `width` x `height` raster.
    pub fn fits_within(&self, width: usize, height: usize) -> bool {
        self.width > 0 && self.height > 0 && self.right() <= width && self.bottom() <= height
    }
}

// ============================================================================
// PixelBuffer
// ============================================================================

/// An 8-bit raster image with 1, 3 or 4 interleaved channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    data: Array3<u8>,
}

impl PixelBuffer {
    /// Build a buffer from row-major interleaved samples.
    pub fn new(width: usize, height: usize, channels: usize, samples: Vec<u8>) -> Result<Self> {
        check_layout(width, height, channels)?;
        if samples.len() != width * height * channels {
            return Err(EditError::unsupported(format!(
                "expected {} samples for {}x{}x{}, got {}",
                width * height * channels,
                width,
                height,
                channels,
                samples.len()
            )));
        }
        Ok(Self {
            data: Array3::from_shape_vec((height, width, channels), samples)?,
        })
    }

    /// Wrap an existing `(height, width, channels)` array.
    pub fn from_array(data: Array3<u8>) -> Result<Self> {
        let (height, width, channels) = data.dim();
        check_layout(width, height, channels)?;
        // Re-own in standard layout so `as_slice` always succeeds.
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().to_owned()
        };
        Ok(Self { data })
    }

    /// A buffer where every pixel is `color` (its length sets the channel count).
    pub fn filled(width: usize, height: usize, color: &[u8]) -> Result<Self> {
        let channels = color.len();
        check_layout(width, height, channels)?;
        let samples = color
            .iter()
            .copied()
            .cycle()
            .take(width * height * channels)
            .collect();
        Self::new(width, height, channels, samples)
    }

    pub fn width(&self) -> usize {
        self.data.dim().1
    }

    pub fn height(&self) -> usize {
        self.data.dim().0
    }

    pub fn channels(&self) -> usize {
        self.data.dim().2
    }

    pub fn has_alpha(&self) -> bool {
        self.channels() == 4
    }

    /// Number of colour channels (alpha excluded).
    pub fn color_channels(&self) -> usize {
        if self.channels() == 4 {
            3
        } else {
            self.channels()
        }
    }

    #[inline]
    pub fn sample(&self, x: usize, y: usize, c: usize) -> u8 {
        self.data[[y, x, c]]
    }

    /// Samples of one pixel.
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> &[u8] {
        let c = self.channels();
        let start = (y * self.width() + x) * c;
        &self.as_slice()[start..start + c]
    }

    pub fn view(&self) -> ArrayView3<'_, u8> {
        self.data.view()
    }

    /// Row-major interleaved samples.
    pub fn as_slice(&self) -> &[u8] {
        // Constructors guarantee standard layout.
        self.data.as_slice().unwrap_or(&[])
    }

    pub fn into_array(self) -> Array3<u8> {
        self.data
    }

    /// Convert to RGBA, replicating gray and adding opaque alpha as needed.
    pub fn to_rgba(&self) -> PixelBuffer {
        if self.channels() == 4 {
            return self.clone();
        }
        let (height, width, channels) = self.data.dim();
        let mut output = Array3::<u8>::zeros((height, width, 4));
        for y in 0..height {
            for x in 0..width {
                for c in 0..3 {
                    let src = if channels == 1 { 0 } else { c };
                    output[[y, x, c]] = self.data[[y, x, src]];
                }
                output[[y, x, 3]] = 255;
            }
        }
        PixelBuffer { data: output }
    }

    /// Copy out the pixels inside `rect`.
    pub fn crop(&self, rect: Rect) -> Result<PixelBuffer> {
        if !rect.fits_within(self.width(), self.height()) {
            return Err(EditError::OutOfBounds {
                x: rect.right() as i64,
                y: rect.bottom() as i64,
                width: self.width(),
                height: self.height(),
            });
        }
        let region = self
            .data
            .slice(ndarray::s![rect.y..rect.bottom(), rect.x..rect.right(), ..])
            .to_owned();
        Ok(PixelBuffer { data: region })
    }
}

fn check_layout(width: usize, height: usize, channels: usize) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(EditError::unsupported(format!(
            "image dimensions must be positive, got {}x{}",
            width, height
        )));
    }
    if !matches!(channels, 1 | 3 | 4) {
        return Err(EditError::unsupported(format!(
            "channel count must be 1, 3 or 4, got {}",
            channels
        )));
    }
    Ok(())
}

// ============================================================================
// Mask
// ============================================================================

/// Single-channel selection strength raster paired with a [`PixelBuffer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    data: Array2<u8>,
}

impl Mask {
    /// Values at or above this count as selected for erase and fill.
    pub const SELECTED_THRESHOLD: u8 = 128;

    /// An empty (all-zero) mask.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            data: Array2::zeros((height, width)),
        }
    }

    pub fn full(width: usize, height: usize, value: u8) -> Self {
        Self {
            data: Array2::from_elem((height, width), value),
        }
    }

    /// Wrap a `(height, width)` array.
    pub fn from_array(data: Array2<u8>) -> Self {
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().to_owned()
        };
        Self { data }
    }

    pub fn from_vec(width: usize, height: usize, values: Vec<u8>) -> Result<Self> {
        if values.len() != width * height {
            return Err(EditError::unsupported(format!(
                "expected {} mask values for {}x{}, got {}",
                width * height,
                width,
                height,
                values.len()
            )));
        }
        Ok(Self {
            data: Array2::from_shape_vec((height, width), values)?,
        })
    }

    pub fn width(&self) -> usize {
        self.data.dim().1
    }

    pub fn height(&self) -> usize {
        self.data.dim().0
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[[y, x]]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: u8) {
        self.data[[y, x]] = value;
    }

    #[inline]
    pub fn is_selected(&self, x: usize, y: usize) -> bool {
        self.data[[y, x]] >= Self::SELECTED_THRESHOLD
    }

    pub fn view(&self) -> ArrayView2<'_, u8> {
        self.data.view()
    }

    pub fn as_slice(&self) -> &[u8] {
        self.data.as_slice().unwrap_or(&[])
    }

    pub fn into_array(self) -> Array2<u8> {
        self.data
    }

    /// Number of selected pixels.
    pub fn selected_count(&self) -> usize {
        self.data
            .iter()
            .filter(|&&v| v >= Self::SELECTED_THRESHOLD)
            .count()
    }

    /// True when no pixel carries any selection strength.
    pub fn is_empty(&self) -> bool {
        self.data.iter().all(|&v| v == 0)
    }

    /// True when every pixel is fully selected.
    pub fn is_full(&self) -> bool {
        self.data.iter().all(|&v| v == 255)
    }

    /// Tight bounding box of the selected pixels.
    pub fn bounds(&self) -> Option<Rect> {
        let (height, width) = self.data.dim();
        let mut min_x = width;
        let mut min_y = height;
        let mut max_x = 0;
        let mut max_y = 0;
        let mut any = false;

        for y in 0..height {
            for x in 0..width {
                if self.data[[y, x]] >= Self::SELECTED_THRESHOLD {
                    any = true;
                    min_x = min_x.min(x);
                    min_y = min_y.min(y);
                    max_x = max_x.max(x);
                    max_y = max_y.max(y);
                }
            }
        }

        any.then(|| Rect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
    }

    /// Reject a mask that is not aligned 1:1 with `image`.
    pub fn ensure_matches(&self, image: &PixelBuffer) -> Result<()> {
        if self.width() != image.width() || self.height() != image.height() {
            return Err(EditError::DimensionMismatch {
                expected_width: image.width(),
                expected_height: image.height(),
                found_width: self.width(),
                found_height: self.height(),
            });
        }
        Ok(())
    }

    /// Reject a mask whose size differs from `other`.
    pub fn ensure_same_size(&self, other: &Mask) -> Result<()> {
        if self.width() != other.width() || self.height() != other.height() {
            return Err(EditError::DimensionMismatch {
                expected_width: self.width(),
                expected_height: self.height(),
                found_width: other.width(),
                found_height: other.height(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_bad_layouts() {
        assert!(PixelBuffer::new(2, 2, 2, vec![0; 8]).is_err());
        assert!(PixelBuffer::new(2, 2, 3, vec![0; 11]).is_err());
        assert!(PixelBuffer::new(0, 2, 3, vec![]).is_err());
        assert!(PixelBuffer::new(2, 2, 3, vec![0; 12]).is_ok());
    }

    #[test]
    fn test_filled_and_pixel_access() {
        let img = PixelBuffer::filled(3, 2, &[10, 20, 30]).unwrap();
        assert_eq!(img.width(), 3);
        assert_eq!(img.height(), 2);
        assert_eq!(img.channels(), 3);
        assert_eq!(img.pixel(2, 1), &[10, 20, 30]);
        assert_eq!(img.as_slice().len(), 18);
    }

    #[test]
    fn test_to_rgba_from_gray() {
        let img = PixelBuffer::filled(2, 2, &[77]).unwrap();
        let rgba = img.to_rgba();
        assert_eq!(rgba.channels(), 4);
        assert_eq!(rgba.pixel(1, 1), &[77, 77, 77, 255]);
    }

    #[test]
    fn test_crop_copies_region() {
        let samples: Vec<u8> = (0..16).collect();
        let img = PixelBuffer::new(4, 4, 1, samples).unwrap();
        let cropped = img.crop(Rect::new(1, 2, 2, 2)).unwrap();
        assert_eq!(cropped.as_slice(), &[9, 10, 13, 14]);
        assert!(img.crop(Rect::new(3, 3, 2, 1)).is_err());
    }

    #[test]
    fn test_mask_bounds_and_counts() {
        let mut mask = Mask::new(5, 4);
        assert!(mask.bounds().is_none());
        mask.set(1, 1, 255);
        mask.set(3, 2, 200);
        mask.set(4, 3, 100); // below threshold
        assert_eq!(mask.selected_count(), 2);
        assert_eq!(mask.bounds(), Some(Rect::new(1, 1, 3, 2)));
        assert!(!mask.is_empty());
        assert!(Mask::full(2, 2, 255).is_full());
    }

    #[test]
    fn test_mask_pairing() {
        let img = PixelBuffer::filled(4, 3, &[0, 0, 0, 255]).unwrap();
        assert!(Mask::new(4, 3).ensure_matches(&img).is_ok());
        assert!(matches!(
            Mask::new(3, 4).ensure_matches(&img),
            Err(EditError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_rect_geometry() {
        let r = Rect::new(10, 20, 160, 90);
        assert_eq!(r.right(), 170);
        assert_eq!(r.bottom(), 110);
        assert!((r.aspect() - 16.0 / 9.0).abs() < 1e-9);
        assert_eq!(r.center(), (90.0, 65.0));
        assert!(r.contains(10, 20));
        assert!(!r.contains(170, 20));
        assert!(r.fits_within(170, 110));
        assert!(!r.fits_within(169, 110));
    }
}
