//! Oversampled aperture photometry.
//!
//! A square region around the star is upsampled by an odd factor `g` so
//! that a circular aperture can be approximated at sub-pixel resolution.
//! Dense pixels are scaled by `1/g²` to conserve flux, the sky level is the
//! median of the dense pixels inside the sky annulus, and the aperture sum
//! is taken after subtracting that level everywhere.
//!
//! Centers passed to [`AperturePhotometer::measure`] are in array
//! coordinates (pixel `(row, col)` centered at `(col, row)`). Convert
//! centroid results with [`crate::coords::to_array_coords`] first.

use ndarray::{s, Array2, ArrayView2};
use phot_math::Position;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::oversample::{oversample, Interpolation};
use crate::algo::stats::median;
use crate::image_size::ImageSize;

/// Errors from aperture photometry
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PhotometryError {
    /// Extraction region around the star is not fully inside the frame
    #[error("region of half-width {half_size} around ({x:.2}, {y:.2}) leaves the {size} frame")]
    RegionOutOfBounds {
        x: f64,
        y: f64,
        half_size: usize,
        size: ImageSize,
    },

    #[error("invalid aperture radii: {0}")]
    InvalidRadii(String),

    #[error("oversample factor must be at least 1")]
    InvalidOversample,

    /// No dense pixels fell inside the named sample region
    #[error("{0} sample is empty")]
    EmptySample(&'static str),
}

/// Aperture and sky annulus radii in original pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ApertureRadii {
    /// Radius of the measurement aperture
    pub aperture: f64,
    /// Inner sky radius; 0 means no inner bound
    pub sky_inner: f64,
    /// Outer sky radius
    pub sky_outer: f64,
}

impl ApertureRadii {
    pub fn new(aperture: f64, sky_inner: f64, sky_outer: f64) -> Self {
        Self {
            aperture,
            sky_inner,
            sky_outer,
        }
    }

    pub fn validate(&self) -> Result<(), PhotometryError> {
        let all_finite = [self.aperture, self.sky_inner, self.sky_outer]
            .iter()
            .all(|r| r.is_finite());
        if !all_finite {
            return Err(PhotometryError::InvalidRadii(format!(
                "radii must be finite, got {self:?}"
            )));
        }
        if self.aperture <= 0.0 {
            return Err(PhotometryError::InvalidRadii(format!(
                "aperture radius must be positive, got {}",
                self.aperture
            )));
        }
        if self.sky_inner < 0.0 {
            return Err(PhotometryError::InvalidRadii(format!(
                "sky inner radius must not be negative, got {}",
                self.sky_inner
            )));
        }
        if self.sky_inner >= self.sky_outer {
            return Err(PhotometryError::InvalidRadii(format!(
                "sky inner radius {} must be below sky outer radius {}",
                self.sky_inner, self.sky_outer
            )));
        }
        if self.aperture > self.sky_outer {
            return Err(PhotometryError::InvalidRadii(format!(
                "aperture radius {} exceeds sky outer radius {}",
                self.aperture, self.sky_outer
            )));
        }
        Ok(())
    }
}

/// Result of measuring one star.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApertureMeasurement {
    /// Sky-subtracted counts inside the aperture
    pub total_counts: f64,
    /// Sky level per original pixel
    pub sky_level: f64,
    /// Oversample factor actually used (always odd)
    pub oversample: usize,
    /// Star center in the oversampled region's coordinates
    pub center: Position,
    pub radii: ApertureRadii,
    /// Dense pixels summed in the aperture
    pub aperture_points: usize,
    /// Dense pixels contributing to the sky median
    pub sky_points: usize,
}

impl ApertureMeasurement {
    /// Sky level per oversampled point.
    pub fn sky_per_point(&self) -> f64 {
        self.sky_level / (self.oversample * self.oversample) as f64
    }
}

/// Round an even count up to the next odd one.
pub fn force_odd(n: usize) -> usize {
    if n % 2 == 0 {
        n + 1
    } else {
        n
    }
}

/// Aperture photometry engine with fixed radii and sampling.
#[derive(Debug, Clone, PartialEq)]
pub struct AperturePhotometer {
    radii: ApertureRadii,
    oversample: usize,
    interpolation: Interpolation,
}

impl AperturePhotometer {
    /// Create a photometer. Even oversample factors are bumped to the next
    /// odd value so the oversampled region keeps a single center pixel.
    pub fn new(
        radii: ApertureRadii,
        oversample: usize,
        interpolation: Interpolation,
    ) -> Result<Self, PhotometryError> {
        radii.validate()?;
        if oversample == 0 {
            return Err(PhotometryError::InvalidOversample);
        }
        let odd = force_odd(oversample);
        if odd != oversample {
            log::debug!("Oversample factor {oversample} is even, using {odd}");
        }
        Ok(Self {
            radii,
            oversample: odd,
            interpolation,
        })
    }

    pub fn radii(&self) -> &ApertureRadii {
        &self.radii
    }

    pub fn oversample(&self) -> usize {
        self.oversample
    }

    /// Half-width of the square region extracted around a star.
    ///
    /// Covers the outer sky radius from any center within half a pixel of
    /// the central pixel. The region side `2 * half + 1` is always odd.
    pub fn region_half_size(&self) -> usize {
        (self.radii.sky_outer + 0.5).ceil() as usize
    }

    /// Whether the extraction region around `center` fits inside `size`.
    pub fn fits(&self, size: &ImageSize, center: &Position) -> bool {
        center.x.is_finite()
            && center.y.is_finite()
            && size.contains_square(
                center.x.round() as i64,
                center.y.round() as i64,
                self.region_half_size(),
            )
    }

    /// Measure the star at `center` (array coordinates).
    ///
    /// # Errors
    /// * `PhotometryError::RegionOutOfBounds` - The extraction region leaves the frame
    /// * `PhotometryError::EmptySample` - The sky annulus or aperture contains no dense pixels
    pub fn measure(
        &self,
        image: &ArrayView2<f64>,
        center: &Position,
    ) -> Result<ApertureMeasurement, PhotometryError> {
        let size = ImageSize::of(image);
        let half = self.region_half_size();
        if !self.fits(&size, center) {
            return Err(PhotometryError::RegionOutOfBounds {
                x: center.x,
                y: center.y,
                half_size: half,
                size,
            });
        }

        // Pixel nearest the center anchors the region
        let col = center.x.round() as usize;
        let row = center.y.round() as usize;
        let region = image.slice(s![row - half..=row + half, col - half..=col + half]);

        let g = self.oversample as f64;
        let mut dense = oversample(&region, self.oversample, self.interpolation);
        dense.mapv_inplace(|v| v / (g * g));

        let dense_center = Self::dense_center(&dense, col, row, center, g);

        let sky = radial_extract(
            &dense,
            &dense_center,
            self.radii.sky_inner * g,
            self.radii.sky_outer * g,
        );
        let sky_per_point = median(&sky).map_err(|_| PhotometryError::EmptySample("sky"))?;

        dense.mapv_inplace(|v| v - sky_per_point);
        let aperture = radial_extract(&dense, &dense_center, 0.0, self.radii.aperture * g);
        if aperture.is_empty() {
            return Err(PhotometryError::EmptySample("aperture"));
        }

        Ok(ApertureMeasurement {
            total_counts: aperture.iter().sum(),
            sky_level: sky_per_point * g * g,
            oversample: self.oversample,
            center: dense_center,
            radii: self.radii,
            aperture_points: aperture.len(),
            sky_points: sky.len(),
        })
    }

    /// Star center in the dense region: the middle dense pixel, displaced by
    /// the sub-pixel offset of `center` from the anchor pixel.
    fn dense_center(
        dense: &Array2<f64>,
        col: usize,
        row: usize,
        center: &Position,
        g: f64,
    ) -> Position {
        let mid = ((dense.nrows() - 1) / 2) as f64;
        Position::new(
            mid - (col as f64 - center.x) * g,
            mid - (row as f64 - center.y) * g,
        )
    }
}

/// Values whose distance from `center` lies in `[inner, outer]`.
fn radial_extract(data: &Array2<f64>, center: &Position, inner: f64, outer: f64) -> Vec<f64> {
    data.indexed_iter()
        .filter(|&((row, col), _)| {
            let dx = col as f64 - center.x;
            let dy = row as f64 - center.y;
            let d = (dx * dx + dy * dy).sqrt();
            d >= inner && d <= outer
        })
        .map(|(_, &v)| v)
        .collect()
}
