//! Synthetic star fields rendered with Gaussian PSFs and uniform noise.

use std::sync::Arc;

use fieldtrack::{brightest_catalog, FieldSolution, StarFinder, TrackError, TrackerConfig};
use ndarray::Array2;
use phot_math::Position;
use rand::Rng;
use shared::coords::to_centroid_coords;

/// Gaussian FWHM to sigma conversion factor
pub const FWHM_TO_SIGMA: f64 = 2.355;

/// A point source placed in array coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticStar {
    pub position: Position,
    /// Integrated counts
    pub flux: f64,
}

impl SyntheticStar {
    pub fn new(x: f64, y: f64, flux: f64) -> Self {
        Self {
            position: Position::new(x, y),
            flux,
        }
    }
}

/// A field of stars over a flat background.
///
/// The first star is the target, the rest are comparisons.
#[derive(Debug, Clone)]
pub struct SyntheticField {
    pub width: usize,
    pub height: usize,
    pub background: f64,
    /// Half-width of the uniform noise added to every pixel
    pub noise: f64,
    pub fwhm: f64,
    pub stars: Vec<SyntheticStar>,
}

impl SyntheticField {
    /// Target plus three comparison stars on a 96x96 frame, every pair more
    /// than 20 px apart.
    pub fn four_star() -> Self {
        Self {
            width: 96,
            height: 96,
            background: 100.0,
            noise: 10.0,
            fwhm: 3.0,
            stars: vec![
                SyntheticStar::new(24.3, 25.6, 30000.0),
                SyntheticStar::new(70.2, 19.7, 45000.0),
                SyntheticStar::new(29.6, 71.1, 38000.0),
                SyntheticStar::new(67.8, 65.4, 26000.0),
            ],
        }
    }

    pub fn target_index(&self) -> usize {
        0
    }

    pub fn comparison_count(&self) -> usize {
        self.stars.len().saturating_sub(1)
    }

    /// Star position in the centroid convention.
    pub fn centroid_position(&self, index: usize) -> Position {
        to_centroid_coords(&self.stars[index].position)
    }

    /// Render the field moved by `shift` pixels, leaving out the stars
    /// listed in `omit`.
    pub fn render<R: Rng>(&self, shift: &Position, omit: &[usize], rng: &mut R) -> Array2<f64> {
        let sigma = self.fwhm / FWHM_TO_SIGMA;
        let two_sigma_sq = 2.0 * sigma * sigma;
        let reach = (5.0 * sigma).ceil() as i64;

        let mut image = Array2::from_elem((self.height, self.width), self.background);
        for (i, star) in self.stars.iter().enumerate() {
            if omit.contains(&i) {
                continue;
            }
            let center = star.position + shift;
            let amplitude = star.flux / (std::f64::consts::PI * two_sigma_sq);
            let (cx, cy) = (center.x.round() as i64, center.y.round() as i64);

            for row in (cy - reach).max(0)..(cy + reach + 1).min(self.height as i64) {
                for col in (cx - reach).max(0)..(cx + reach + 1).min(self.width as i64) {
                    let dx = col as f64 - center.x;
                    let dy = row as f64 - center.y;
                    image[[row as usize, col as usize]] +=
                        amplitude * (-(dx * dx + dy * dy) / two_sigma_sq).exp();
                }
            }
        }

        if self.noise > 0.0 {
            image.mapv_inplace(|v| v + rng.random_range(-self.noise..self.noise));
        }
        image
    }

    /// Field solution taken from a rendered reference frame: true star
    /// positions plus the catalog the finder reports on that frame.
    pub fn field_solution<F: StarFinder>(
        &self,
        reference: Array2<f64>,
        finder: &F,
        config: &TrackerConfig,
    ) -> Result<FieldSolution, TrackError> {
        let catalog = brightest_catalog(finder, &reference.view(), config);
        log::debug!("Reference catalog holds {} stars", catalog.len());
        let comparisons = (1..self.stars.len())
            .map(|i| self.centroid_position(i))
            .collect();
        FieldSolution::new(
            self.centroid_position(self.target_index()),
            comparisons,
            catalog,
            Arc::new(reference),
        )
    }
}
