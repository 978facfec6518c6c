//! Seams to the per-frame image primitives.
//!
//! The tracker only needs two capabilities from the image layer: refine a
//! position into a centroid, and list the stars in a frame. Both speak the
//! centroid coordinate convention (pixel centers at `n + 0.5`).

use ndarray::ArrayView2;
use phot_math::{Locatable2d, Position};
use shared::coords::to_centroid_coords;
use shared::image_proc::{detect_stars, CentroidResult, DetectionParams, MomentCentroider};

/// Locates a star near an approximate position.
///
/// Implementations report `ok = false` rather than failing when nothing
/// valid is found.
pub trait Centroider {
    fn centroid(
        &self,
        image: &ArrayView2<f64>,
        position: &Position,
        search_radius: f64,
    ) -> CentroidResult;
}

impl Centroider for MomentCentroider {
    fn centroid(
        &self,
        image: &ArrayView2<f64>,
        position: &Position,
        search_radius: f64,
    ) -> CentroidResult {
        MomentCentroider::centroid(self, image, position, search_radius)
    }
}

/// A source reported by a [`StarFinder`].
#[derive(Debug, Clone, PartialEq)]
pub struct FoundStar {
    /// Position in the centroid convention
    pub position: Position,
    /// Relative brightness used for ranking
    pub flux: f64,
}

impl Locatable2d for FoundStar {
    fn x(&self) -> f64 {
        self.position.x
    }

    fn y(&self) -> f64 {
        self.position.y
    }
}

/// Lists the stars in a frame. Order is unspecified; callers rank by flux.
pub trait StarFinder {
    fn find_stars(&self, image: &ArrayView2<f64>) -> Vec<FoundStar>;
}

/// [`StarFinder`] backed by threshold segmentation.
#[derive(Debug, Clone, Default)]
pub struct ThresholdStarFinder {
    params: DetectionParams,
}

impl ThresholdStarFinder {
    pub fn new(params: DetectionParams) -> Self {
        Self { params }
    }
}

impl StarFinder for ThresholdStarFinder {
    fn find_stars(&self, image: &ArrayView2<f64>) -> Vec<FoundStar> {
        detect_stars(image, &self.params)
            .into_iter()
            .map(|d| FoundStar {
                position: to_centroid_coords(&d.position()),
                flux: d.flux,
            })
            .collect()
    }
}
