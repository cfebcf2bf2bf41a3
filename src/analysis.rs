//! Derived per-image maps, memoized for the lifetime of one analysis.
//!
//! An [`ImageAnalysis`] borrows a single [`PixelBuffer`] and computes each
//! map at most once. The caller creates it, passes it to
//! [`remove_background_in`](crate::segmentation::remove_background_in) and
//! [`best_crop_in`](crate::composition::best_crop_in), and drops it with the
//! image. There is no module-level cache.

use std::sync::OnceLock;

use ndarray::Array2;
use rayon::prelude::*;
use serde::Deserialize;

use crate::buffer::PixelBuffer;
use crate::error::Result;
use crate::filters::blur::gaussian_blur_plane;
use crate::filters::edge::sobel_magnitude;
use crate::filters::grayscale::luminance;

/// Parameters of the border model behind contrast and saliency.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    /// Border band thickness as a fraction of the smaller image side.
    pub border_fraction: f32,
    /// Colour distance (0-255 units) beyond the border spread that maps to
    /// full contrast.
    pub contrast_scale: f32,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            border_fraction: 0.05,
            contrast_scale: 64.0,
        }
    }
}

/// Colour statistics of the border band.
#[derive(Debug, Clone, PartialEq)]
pub struct BorderStats {
    /// Band thickness in pixels (at least 1).
    pub band: usize,
    /// Mean of each colour channel (alpha excluded).
    pub mean: Vec<f32>,
    /// RMS distance of border colours from the mean.
    pub spread: f32,
    /// Number of pixels in the band.
    pub pixel_count: usize,
}

impl BorderStats {
    /// Euclidean distance of `pixel`'s colour channels from the border mean.
    #[inline]
    pub fn distance(&self, pixel: &[u8]) -> f32 {
        self.mean
            .iter()
            .zip(pixel)
            .map(|(&m, &v)| {
                let d = v as f32 - m;
                d * d
            })
            .sum::<f32>()
            .sqrt()
    }
}

/// True when `(x, y)` lies in a border band of thickness `band`.
#[inline]
pub fn in_border_band(x: usize, y: usize, width: usize, height: usize, band: usize) -> bool {
    x < band || y < band || x + band >= width || y + band >= height
}

/// Lazily computed maps of one image.
#[derive(Debug)]
pub struct ImageAnalysis<'a> {
    image: &'a PixelBuffer,
    options: AnalysisOptions,
    luminance: OnceLock<Array2<f32>>,
    gradient: OnceLock<Array2<f32>>,
    border: OnceLock<BorderStats>,
    contrast: OnceLock<Array2<f32>>,
    edge_density: OnceLock<Array2<f32>>,
    saliency: OnceLock<Array2<f32>>,
}

impl<'a> ImageAnalysis<'a> {
    pub fn new(image: &'a PixelBuffer) -> Self {
        Self::with_options(image, AnalysisOptions::default())
    }

    pub fn with_options(image: &'a PixelBuffer, options: AnalysisOptions) -> Self {
        Self {
            image,
            options,
            luminance: OnceLock::new(),
            gradient: OnceLock::new(),
            border: OnceLock::new(),
            contrast: OnceLock::new(),
            edge_density: OnceLock::new(),
            saliency: OnceLock::new(),
        }
    }

    pub fn image(&self) -> &'a PixelBuffer {
        self.image
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    /// BT.709 luminance, 0.0-1.0.
    pub fn luminance(&self) -> &Array2<f32> {
        self.luminance.get_or_init(|| luminance(self.image))
    }

    /// Normalized Sobel magnitude of the luminance.
    pub fn gradient(&self) -> Result<&Array2<f32>> {
        if let Some(map) = self.gradient.get() {
            return Ok(map);
        }
        let map = sobel_magnitude(self.luminance().view())?;
        Ok(self.gradient.get_or_init(|| map))
    }

    /// Border band colour statistics.
    pub fn border(&self) -> &BorderStats {
        self.border
            .get_or_init(|| border_stats(self.image, self.options.border_fraction))
    }

    /// Per-pixel contrast against the border colour model, 0.0-1.0.
    pub fn contrast(&self) -> &Array2<f32> {
        self.contrast.get_or_init(|| {
            let border = self.border();
            let (width, height) = (self.image.width(), self.image.height());
            let scale = self.options.contrast_scale.max(1.0);
            let mut values = vec![0.0f32; width * height];
            values
                .par_chunks_mut(width)
                .enumerate()
                .for_each(|(y, row)| {
                    for (x, out) in row.iter_mut().enumerate() {
                        let d = border.distance(self.image.pixel(x, y));
                        *out = ((d - border.spread) / scale).clamp(0.0, 1.0);
                    }
                });
            Array2::from_shape_vec((height, width), values)
                .unwrap_or_else(|_| Array2::zeros((height, width)))
        })
    }

    /// Smoothed gradient energy normalized to its maximum, 0.0-1.0.
    pub fn edge_density(&self) -> Result<&Array2<f32>> {
        if let Some(map) = self.edge_density.get() {
            return Ok(map);
        }
        let side = self.image.width().min(self.image.height()) as f32;
        let sigma = (side / 50.0).max(1.0);
        let mut map = gaussian_blur_plane(self.gradient()?.view(), sigma)?;
        let peak = map.iter().cloned().fold(0.0f32, f32::max);
        if peak > 1e-6 {
            map.mapv_inplace(|v| v / peak);
        } else {
            map.fill(0.0);
        }
        Ok(self.edge_density.get_or_init(|| map))
    }

    /// Saliency: equal blend of border contrast and edge density.
    pub fn saliency(&self) -> Result<&Array2<f32>> {
        if let Some(map) = self.saliency.get() {
            return Ok(map);
        }
        let density = self.edge_density()?;
        let map = ndarray::Zip::from(self.contrast())
            .and(density)
            .map_collect(|&c, &e| 0.5 * c + 0.5 * e);
        Ok(self.saliency.get_or_init(|| map))
    }
}

/// Colour statistics of the border band of `image`.
pub fn border_stats(image: &PixelBuffer, border_fraction: f32) -> BorderStats {
    let (width, height) = (image.width(), image.height());
    let channels = image.color_channels();
    let side = width.min(height) as f32;
    let band = ((side * border_fraction.max(0.0)).round() as usize).clamp(1, width.min(height));

    let mut sum = vec![0.0f64; channels];
    let mut count = 0usize;
    for y in 0..height {
        for x in 0..width {
            if in_border_band(x, y, width, height, band) {
                for (c, s) in sum.iter_mut().enumerate() {
                    *s += image.sample(x, y, c) as f64;
                }
                count += 1;
            }
        }
    }
    let mean: Vec<f32> = sum.iter().map(|s| (s / count as f64) as f32).collect();

    let mut sq = 0.0f64;
    for y in 0..height {
        for x in 0..width {
            if in_border_band(x, y, width, height, band) {
                for (c, &m) in mean.iter().enumerate() {
                    let d = image.sample(x, y, c) as f64 - m as f64;
                    sq += d * d;
                }
            }
        }
    }

    BorderStats {
        band,
        mean,
        spread: (sq / count as f64).sqrt() as f32,
        pixel_count: count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Solid border colour with a square of `inner` in the middle.
    fn framed(size: usize, inner: usize, border: [u8; 3], object: [u8; 3]) -> PixelBuffer {
        let start = (size - inner) / 2;
        let mut samples = Vec::with_capacity(size * size * 3);
        for y in 0..size {
            for x in 0..size {
                let inside = (start..start + inner).contains(&x) && (start..start + inner).contains(&y);
                samples.extend_from_slice(if inside { &object } else { &border });
            }
        }
        PixelBuffer::new(size, size, 3, samples).unwrap()
    }

    #[test]
    fn test_border_stats_of_framed_image() {
        let img = framed(40, 10, [20, 40, 60], [250, 250, 250]);
        let stats = border_stats(&img, 0.05);
        assert_eq!(stats.band, 2);
        assert_eq!(stats.mean, vec![20.0, 40.0, 60.0]);
        assert_eq!(stats.spread, 0.0);
        assert_eq!(stats.pixel_count, 40 * 40 - 36 * 36);
    }

    #[test]
    fn test_contrast_marks_object_only() {
        let img = framed(40, 10, [20, 40, 60], [250, 250, 250]);
        let analysis = ImageAnalysis::new(&img);
        let contrast = analysis.contrast();
        assert_eq!(contrast[[20, 20]], 1.0);
        assert_eq!(contrast[[2, 2]], 0.0);
    }

    #[test]
    fn test_uniform_image_has_no_saliency() {
        let img = PixelBuffer::filled(16, 12, &[90, 90, 90, 255]).unwrap();
        let analysis = ImageAnalysis::new(&img);
        let saliency = analysis.saliency().unwrap();
        assert!(saliency.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_saliency_peaks_on_object() {
        let img = framed(60, 12, [0, 0, 0], [255, 255, 255]);
        let analysis = ImageAnalysis::new(&img);
        let saliency = analysis.saliency().unwrap();
        assert!(saliency[[30, 30]] > saliency[[5, 5]]);
        // Memoized: second call returns the same allocation
        let again = analysis.saliency().unwrap();
        assert!(std::ptr::eq(saliency, again));
    }
}
