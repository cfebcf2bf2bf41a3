//! Rasterise geometric and freehand outlines into binary masks.
//!
//! Every pixel is sampled at its centre `(x + 0.5, y + 0.5)`. Centres that
//! fall exactly on an outline count as inside. Polygons use the even-odd
//! rule with half-open vertex handling, so a path that retraces a loop cuts
//! a hole.

use rayon::prelude::*;
use serde::Deserialize;

use crate::buffer::{Mask, PixelBuffer};
use crate::error::{EditError, Result};

/// Distance below which a centre is treated as lying on an edge.
const EDGE_EPSILON: f32 = 1e-4;

/// Selection outline in pixel coordinates.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    /// Axis-aligned rectangle with top-left corner `(x, y)`.
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    /// Axis-aligned ellipse around `(cx, cy)`.
    Ellipse { cx: f32, cy: f32, rx: f32, ry: f32 },
    /// Closed freehand or lasso path; the last point joins the first.
    Polygon(Vec<(f32, f32)>),
}

impl Shape {
    fn validate(&self) -> Result<()> {
        let finite = match self {
            Shape::Rect {
                x,
                y,
                width,
                height,
            } => [x, y, width, height].iter().all(|v| v.is_finite()),
            Shape::Ellipse { cx, cy, rx, ry } => {
                if *rx < 0.0 || *ry < 0.0 {
                    return Err(EditError::unsupported("ellipse radii must not be negative"));
                }
                [cx, cy, rx, ry].iter().all(|v| v.is_finite())
            }
            Shape::Polygon(points) => points.iter().all(|(x, y)| x.is_finite() && y.is_finite()),
        };
        if finite {
            Ok(())
        } else {
            Err(EditError::unsupported("shape coordinates must be finite"))
        }
    }
}

/// Rasterise `shape` into a mask sized to `image`.
///
/// Pixels inside (or on) the outline are 255, all others 0.
pub fn select_by_shape(image: &PixelBuffer, shape: &Shape) -> Result<Mask> {
    shape.validate()?;
    let (width, height) = (image.width(), image.height());
    let mut values = vec![0u8; width * height];

    match shape {
        Shape::Rect {
            x,
            y,
            width: w,
            height: h,
        } => {
            let (x0, x1) = ordered(*x, x + w);
            let (y0, y1) = ordered(*y, y + h);
            fill_rows(&mut values, width, |px, py| {
                px >= x0 && px <= x1 && py >= y0 && py <= y1
            });
        }
        Shape::Ellipse { cx, cy, rx, ry } => {
            if *rx > 0.0 && *ry > 0.0 {
                fill_rows(&mut values, width, |px, py| {
                    let nx = (px - cx) / rx;
                    let ny = (py - cy) / ry;
                    nx * nx + ny * ny <= 1.0
                });
            }
        }
        Shape::Polygon(points) => {
            if points.len() >= 3 {
                values
                    .par_chunks_mut(width)
                    .enumerate()
                    .for_each(|(y, row)| polygon_row(points, y as f32 + 0.5, row));
            }
        }
    }

    Mask::from_vec(width, height, values)
}

#[inline]
fn ordered(a: f32, b: f32) -> (f32, f32) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn fill_rows<F>(values: &mut [u8], width: usize, inside: F)
where
    F: Fn(f32, f32) -> bool + Sync,
{
    values
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            let py = y as f32 + 0.5;
            for (x, out) in row.iter_mut().enumerate() {
                if inside(x as f32 + 0.5, py) {
                    *out = 255;
                }
            }
        });
}

/// Even-odd scanline fill of one row at height `py`.
fn polygon_row(points: &[(f32, f32)], py: f32, row: &mut [u8]) {
    let n = points.len();
    let mut crossings: Vec<f32> = Vec::new();
    // Parts of the outline lying exactly on this scanline
    let mut spans: Vec<(f32, f32)> = Vec::new();

    for i in 0..n {
        let (x1, y1) = points[i];
        let (x2, y2) = points[(i + 1) % n];

        if y1 == py {
            spans.push((x1, x1));
        }
        if y1 == y2 {
            if y1 == py {
                spans.push(ordered(x1, x2));
            }
            continue;
        }
        if (y1 <= py) != (y2 <= py) {
            crossings.push(x1 + (py - y1) * (x2 - x1) / (y2 - y1));
        }
    }

    if crossings.is_empty() && spans.is_empty() {
        return;
    }
    crossings.sort_by(|a, b| a.total_cmp(b));

    for (x, out) in row.iter_mut().enumerate() {
        let px = x as f32 + 0.5;
        let on_edge = crossings.iter().any(|c| (c - px).abs() <= EDGE_EPSILON)
            || spans
                .iter()
                .any(|&(a, b)| px >= a - EDGE_EPSILON && px <= b + EDGE_EPSILON);
        // Crossings are sorted, so count those right of the centre
        let right = crossings.len() - crossings.partition_point(|&c| c <= px);
        if on_edge || right % 2 == 1 {
            *out = 255;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas(width: usize, height: usize) -> PixelBuffer {
        PixelBuffer::filled(width, height, &[0, 0, 0, 255]).unwrap()
    }

    #[test]
    fn test_rect_covers_pixel_centres() {
        let mask = select_by_shape(
            &canvas(5, 5),
            &Shape::Rect {
                x: 1.0,
                y: 1.0,
                width: 2.0,
                height: 2.0,
            },
        )
        .unwrap();
        assert_eq!(mask.selected_count(), 4);
        assert!(mask.is_selected(1, 1));
        assert!(mask.is_selected(2, 2));
        assert!(!mask.is_selected(3, 3));
    }

    #[test]
    fn test_rect_boundary_is_inclusive() {
        // Edges pass exactly through the centres of pixels 0 and 1
        let mask = select_by_shape(
            &canvas(4, 4),
            &Shape::Rect {
                x: 0.5,
                y: 0.5,
                width: 1.0,
                height: 1.0,
            },
        )
        .unwrap();
        assert_eq!(mask.selected_count(), 4);
    }

    #[test]
    fn test_negative_rect_extent_is_normalized() {
        let a = select_by_shape(
            &canvas(6, 6),
            &Shape::Rect {
                x: 4.0,
                y: 4.0,
                width: -3.0,
                height: -3.0,
            },
        )
        .unwrap();
        let b = select_by_shape(
            &canvas(6, 6),
            &Shape::Rect {
                x: 1.0,
                y: 1.0,
                width: 3.0,
                height: 3.0,
            },
        )
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_ellipse() {
        let mask = select_by_shape(
            &canvas(10, 10),
            &Shape::Ellipse {
                cx: 5.0,
                cy: 5.0,
                rx: 2.0,
                ry: 2.0,
            },
        )
        .unwrap();
        assert_eq!(mask.selected_count(), 12);
        assert!(mask.is_selected(4, 4));
        assert!(!mask.is_selected(3, 3));
    }

    #[test]
    fn test_polygon_square() {
        let square = Shape::Polygon(vec![(0.5, 0.5), (2.5, 0.5), (2.5, 2.5), (0.5, 2.5)]);
        let mask = select_by_shape(&canvas(5, 5), &square).unwrap();
        assert_eq!(mask.selected_count(), 9);
        assert!(!mask.is_selected(3, 1));
    }

    #[test]
    fn test_polygon_even_odd_hole() {
        // Outer square, then the inner square traced from the same path
        let path = Shape::Polygon(vec![
            (0.0, 0.0),
            (6.0, 0.0),
            (6.0, 6.0),
            (0.0, 6.0),
            (0.0, 0.0),
            (2.0, 2.0),
            (4.0, 2.0),
            (4.0, 4.0),
            (2.0, 4.0),
            (2.0, 2.0),
        ]);
        let mask = select_by_shape(&canvas(6, 6), &path).unwrap();
        assert_eq!(mask.selected_count(), 32);
        assert!(!mask.is_selected(2, 2));
        assert!(!mask.is_selected(3, 3));
        assert!(mask.is_selected(0, 5));
    }

    #[test]
    fn test_degenerate_polygon_is_empty() {
        let line = Shape::Polygon(vec![(0.0, 0.0), (4.0, 4.0)]);
        let mask = select_by_shape(&canvas(5, 5), &line).unwrap();
        assert!(mask.is_empty());
    }

    #[test]
    fn test_non_finite_rejected() {
        let bad = Shape::Rect {
            x: f32::NAN,
            y: 0.0,
            width: 1.0,
            height: 1.0,
        };
        assert!(matches!(
            select_by_shape(&canvas(3, 3), &bad),
            Err(EditError::UnsupportedInput(_))
        ));
    }

    #[test]
    fn test_shape_is_deterministic() {
        let lasso = Shape::Polygon(vec![(1.2, 0.3), (8.7, 2.1), (6.4, 9.9), (0.2, 7.5)]);
        let image = canvas(10, 10);
        let a = select_by_shape(&image, &lasso).unwrap();
        let b = select_by_shape(&image, &lasso).unwrap();
        assert_eq!(a, b);
    }
}
