//! Centroid calculation for stellar images
//!
//! [`compute_centroid_from_mask`] gives the raw intensity moments of a
//! masked region. [`MomentCentroider`] builds the locate-a-star primitive on
//! top of it: given an approximate position and a search radius it
//! iteratively re-centers on the light above the local sky, and reports a
//! [`CentroidResult`] with an ok flag instead of failing.

use ndarray::{s, Array2, ArrayView2};
use phot_math::Position;
use serde::{Deserialize, Serialize};

use crate::algo::stats::{median_absolute_deviation, MAD_TO_SIGMA};
use crate::coords::{to_array_coords, to_centroid_coords};
use crate::image_size::ImageSize;

/// Intensity moments of a masked region, in array coordinates relative to
/// the sub-image origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotMoments {
    /// Centroid x-coordinate (column direction)
    pub x: f64,
    /// Centroid y-coordinate (row direction)
    pub y: f64,
    /// Sum of intensities inside the mask
    pub flux: f64,
    /// Second central moment μ₂₀
    pub m_xx: f64,
    /// Second central moment μ₀₂
    pub m_yy: f64,
    /// Second central moment μ₁₁
    pub m_xy: f64,
    /// Number of pixels in the mask
    pub n_pixels: usize,
}

/// Calculate centroid and shape moments from image data and binary mask
///
/// Position is NaN when the masked intensity does not sum to a positive value.
///
/// # Arguments
///
/// * `image` - Sub-image containing the object
/// * `mask` - Binary mask (same size as image) with true where pixels belong to object
pub fn compute_centroid_from_mask(
    image: &ArrayView2<f64>,
    mask: &ArrayView2<bool>,
) -> SpotMoments {
    assert_eq!(
        image.shape(),
        mask.shape(),
        "Image and mask must have same dimensions"
    );

    let mut m00 = 0.0;
    let mut m10 = 0.0;
    let mut m01 = 0.0;
    let mut n_pixels = 0;

    for ((row, col), &inside) in mask.indexed_iter() {
        if inside {
            let intensity = image[[row, col]];
            m00 += intensity;
            m10 += col as f64 * intensity;
            m01 += row as f64 * intensity;
            n_pixels += 1;
        }
    }

    if m00 <= 0.0 {
        return SpotMoments {
            x: f64::NAN,
            y: f64::NAN,
            flux: m00,
            m_xx: f64::NAN,
            m_yy: f64::NAN,
            m_xy: f64::NAN,
            n_pixels,
        };
    }

    let x = m10 / m00;
    let y = m01 / m00;

    let mut mu20 = 0.0;
    let mut mu02 = 0.0;
    let mut mu11 = 0.0;
    for ((row, col), &inside) in mask.indexed_iter() {
        if inside {
            let intensity = image[[row, col]];
            let dx = col as f64 - x;
            let dy = row as f64 - y;
            mu20 += intensity * dx * dx;
            mu02 += intensity * dy * dy;
            mu11 += intensity * dx * dy;
        }
    }

    SpotMoments {
        x,
        y,
        flux: m00,
        m_xx: mu20 / m00,
        m_yy: mu02 / m00,
        m_xy: mu11 / m00,
        n_pixels,
    }
}

/// Outcome of one centroid attempt.
///
/// `position` is in the centroid convention (pixel centers at `n + 0.5`).
/// When `ok` is false, `position` echoes the requested position and
/// `diagnostic` says why nothing was found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentroidResult {
    pub position: Position,
    pub ok: bool,
    pub diagnostic: String,
    /// Sky-subtracted flux of the significant pixels (0 when not ok)
    pub flux: f64,
}

impl CentroidResult {
    fn found(position: Position, flux: f64, diagnostic: String) -> Self {
        Self {
            position,
            ok: true,
            diagnostic,
            flux,
        }
    }

    fn not_found(position: Position, diagnostic: String) -> Self {
        Self {
            position,
            ok: false,
            diagnostic,
            flux: 0.0,
        }
    }
}

/// Acceptance thresholds for [`MomentCentroider`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentroidParams {
    /// Pixels more than this many sky sigmas above the sky contribute to the centroid
    pub detection_sigma: f64,
    /// Minimum peak signal-to-noise for a valid detection
    pub min_snr: f64,
    /// Minimum number of significant pixels
    pub min_pixels: usize,
    /// Re-centering iterations before giving up on convergence
    pub max_iterations: usize,
    /// Stop once an iteration moves the center by less than this (pixels)
    pub convergence: f64,
}

impl Default for CentroidParams {
    fn default() -> Self {
        Self {
            detection_sigma: 3.0,
            min_snr: 5.0,
            min_pixels: 3,
            max_iterations: 10,
            convergence: 0.01,
        }
    }
}

/// Iterative moment centroider over a circular search window.
#[derive(Debug, Clone, Default)]
pub struct MomentCentroider {
    params: CentroidParams,
}

impl MomentCentroider {
    pub fn new(params: CentroidParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &CentroidParams {
        &self.params
    }

    /// Locate the star nearest `position` (centroid convention).
    ///
    /// Sky level and noise come from an annulus just outside the search
    /// radius. The result is not ok when the position is off the frame, no
    /// significant source lies inside the window, the centroid wanders
    /// further than `search_radius` from where it started, or it is still
    /// moving after `max_iterations` passes.
    pub fn centroid(
        &self,
        image: &ArrayView2<f64>,
        position: &Position,
        search_radius: f64,
    ) -> CentroidResult {
        let size = ImageSize::of(image);
        let start = to_array_coords(position);

        if !(search_radius > 0.0) {
            return CentroidResult::not_found(
                *position,
                format!("search radius must be positive, got {search_radius}"),
            );
        }
        if !size.contains(start.x, start.y) {
            return CentroidResult::not_found(
                *position,
                format!(
                    "position ({:.2}, {:.2}) is outside the {size} frame",
                    position.x, position.y
                ),
            );
        }

        let mut center = start;
        let mut flux = 0.0;
        let mut iterations = 0;
        let mut converged = false;

        for _ in 0..self.params.max_iterations {
            iterations += 1;
            let spot = match self.measure_window(image, &size, &center, search_radius) {
                Ok(spot) => spot,
                Err(reason) => return CentroidResult::not_found(*position, reason),
            };

            let next = Position::new(spot.x, spot.y);
            let moved = (next - center).norm();
            center = next;
            flux = spot.flux;

            if (center - start).norm() > search_radius {
                return CentroidResult::not_found(
                    *position,
                    format!("centroid wandered beyond the {search_radius:.1} px search radius"),
                );
            }
            if moved < self.params.convergence {
                converged = true;
                break;
            }
        }

        if !converged {
            return CentroidResult::not_found(
                *position,
                format!(
                    "centroid did not converge within {} iterations",
                    self.params.max_iterations
                ),
            );
        }

        CentroidResult::found(
            to_centroid_coords(&center),
            flux,
            format!("converged after {iterations} iterations"),
        )
    }

    /// One moment pass over the window centered at `center` (array coordinates).
    fn measure_window(
        &self,
        image: &ArrayView2<f64>,
        size: &ImageSize,
        center: &Position,
        radius: f64,
    ) -> Result<SpotMoments, String> {
        let sky_outer = radius + (radius / 2.0).max(3.0);
        let reach = sky_outer.ceil() as i64;
        let (cx, cy) = (center.x.round() as i64, center.y.round() as i64);

        let col0 = (cx - reach).max(0) as usize;
        let row0 = (cy - reach).max(0) as usize;
        let col1 = ((cx + reach + 1).min(size.width as i64)).max(0) as usize;
        let row1 = ((cy + reach + 1).min(size.height as i64)).max(0) as usize;
        if col0 >= col1 || row0 >= row1 {
            return Err("search window does not overlap the frame".to_string());
        }

        let sub = image.slice(s![row0..row1, col0..col1]);
        let distance = |row: usize, col: usize| {
            let dx = (col0 + col) as f64 - center.x;
            let dy = (row0 + row) as f64 - center.y;
            (dx * dx + dy * dy).sqrt()
        };

        let sky: Vec<f64> = sub
            .indexed_iter()
            .filter(|&((row, col), _)| {
                let d = distance(row, col);
                d > radius && d <= sky_outer
            })
            .map(|(_, &v)| v)
            .collect();
        if sky.len() < 4 {
            return Err(format!("only {} sky pixels around the window", sky.len()));
        }
        let (sky_level, mad) = median_absolute_deviation(&sky)?;
        let sigma = mad * MAD_TO_SIGMA;
        let threshold = self.params.detection_sigma * sigma;

        let residual: Array2<f64> = sub.mapv(|v| v - sky_level);
        let mut mask = Array2::from_elem(sub.dim(), false);
        let mut peak = f64::NEG_INFINITY;
        for ((row, col), &r) in residual.indexed_iter() {
            if distance(row, col) <= radius && r > threshold {
                mask[[row, col]] = true;
                peak = peak.max(r);
            }
        }

        let spot = compute_centroid_from_mask(&residual.view(), &mask.view());
        if spot.n_pixels < self.params.min_pixels {
            return Err(format!(
                "no source above {:.1} sigma within {radius:.1} px",
                self.params.detection_sigma
            ));
        }
        if sigma > 0.0 && peak / sigma < self.params.min_snr {
            return Err(format!(
                "peak SNR {:.1} below {:.1}",
                peak / sigma,
                self.params.min_snr
            ));
        }

        Ok(SpotMoments {
            x: spot.x + col0 as f64,
            y: spot.y + row0 as f64,
            ..spot
        })
    }
}
