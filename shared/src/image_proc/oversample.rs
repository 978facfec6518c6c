//! Upsampling of small image regions for partial-pixel apertures.
//!
//! Output pixel `(i, j)` of an `factor`-times oversampled region samples
//! the source at array coordinate `((j + 0.5) / factor - 0.5, (i + 0.5) /
//! factor - 0.5)`, so the block of dense pixels replacing a source pixel is
//! centered on that pixel. Intensities are not rescaled here.

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// Interpolation used when oversampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    /// Order 0: every dense pixel copies its parent pixel. No smoothing.
    #[default]
    Nearest,
    /// Order 1: bilinear between the four surrounding pixel centers,
    /// clamped at the region edge.
    Bilinear,
}

/// Oversample `region` by an integer `factor`.
///
/// The result has shape `(rows * factor, cols * factor)`.
pub fn oversample(region: &ArrayView2<f64>, factor: usize, method: Interpolation) -> Array2<f64> {
    let (rows, cols) = region.dim();
    let factor = factor.max(1);
    let shape = (rows * factor, cols * factor);
    if rows == 0 || cols == 0 {
        return Array2::zeros(shape);
    }

    match method {
        Interpolation::Nearest => {
            Array2::from_shape_fn(shape, |(i, j)| region[[i / factor, j / factor]])
        }
        Interpolation::Bilinear => {
            let g = factor as f64;
            let source = |dense: usize, len: usize| -> (usize, usize, f64) {
                let u = ((dense as f64 + 0.5) / g - 0.5).clamp(0.0, (len - 1) as f64);
                let lo = u.floor() as usize;
                let hi = (lo + 1).min(len - 1);
                (lo, hi, u - lo as f64)
            };
            Array2::from_shape_fn(shape, |(i, j)| {
                let (r0, r1, fr) = source(i, rows);
                let (c0, c1, fc) = source(j, cols);
                let top = region[[r0, c0]] * (1.0 - fc) + region[[r0, c1]] * fc;
                let bottom = region[[r1, c0]] * (1.0 - fc) + region[[r1, c1]] * fc;
                top * (1.0 - fr) + bottom * fr
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_nearest_replicates_blocks() {
        let region = array![[1.0, 2.0], [3.0, 4.0]];
        let dense = oversample(&region.view(), 3, Interpolation::Nearest);
        assert_eq!(dense.dim(), (6, 6));
        assert_eq!(dense[[0, 0]], 1.0);
        assert_eq!(dense[[2, 2]], 1.0);
        assert_eq!(dense[[2, 3]], 2.0);
        assert_eq!(dense[[5, 5]], 4.0);
        assert_relative_eq!(dense.sum(), region.sum() * 9.0);
    }

    #[test]
    fn test_bilinear_hits_pixel_centers() {
        let region = array![[0.0, 10.0, 20.0], [30.0, 40.0, 50.0], [60.0, 70.0, 80.0]];
        let dense = oversample(&region.view(), 3, Interpolation::Bilinear);
        // Dense (4, 4) is the center of source pixel (1, 1)
        assert_relative_eq!(dense[[4, 4]], 40.0);
        // One dense step right of that center is a third of the way to (1, 2)
        assert_relative_eq!(dense[[4, 5]], 40.0 + 10.0 / 3.0, epsilon = 1e-12);
        // Edges clamp to the outermost pixel values
        assert_relative_eq!(dense[[0, 0]], 0.0);
        assert_relative_eq!(dense[[8, 8]], 80.0);
    }

    #[test]
    fn test_factor_one_is_identity() {
        let region = array![[1.0, 2.0], [3.0, 4.0]];
        for method in [Interpolation::Nearest, Interpolation::Bilinear] {
            assert_eq!(oversample(&region.view(), 1, method), region);
        }
    }
}
