//! Naive star detection using threshold segmentation and image moments.
//!
//! 1. Estimate the sky and its scatter from the whole frame (median / MAD)
//! 2. Mask pixels more than `threshold_sigma` above the sky
//! 3. Group masked pixels into 8-connected components
//! 4. Centroid each component on its sky-subtracted intensities
//!
//! Detections are returned brightest first, in array coordinates.

use ndarray::{s, ArrayView2};
use phot_math::Locatable2d;
use serde::{Deserialize, Serialize};

use super::thresholding::{apply_threshold, connected_components, robust_threshold};
use crate::image_proc::centroid::compute_centroid_from_mask;

/// A detected source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StarDetection {
    /// Sequential identifier in label order
    pub id: usize,
    /// Centroid x-coordinate (array convention)
    pub x: f64,
    /// Centroid y-coordinate (array convention)
    pub y: f64,
    /// Sky-subtracted flux over the component
    pub flux: f64,
    /// Pixels in the component
    pub n_pixels: usize,
}

impl Locatable2d for StarDetection {
    fn x(&self) -> f64 {
        self.x
    }

    fn y(&self) -> f64 {
        self.y
    }
}

/// Parameters for [`detect_stars`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionParams {
    /// Detection threshold in sky sigmas
    pub threshold_sigma: f64,
    /// Components smaller than this are rejected as hot pixels or noise
    pub min_pixels: usize,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            threshold_sigma: 5.0,
            min_pixels: 3,
        }
    }
}

/// Detect stars in a frame, brightest first.
pub fn detect_stars(image: &ArrayView2<f64>, params: &DetectionParams) -> Vec<StarDetection> {
    let (sky, threshold) = match robust_threshold(image, params.threshold_sigma) {
        Ok(t) => t,
        Err(e) => {
            log::warn!("Star detection skipped: {e}");
            return Vec::new();
        }
    };

    let mask = apply_threshold(image, threshold);
    let (labels, boxes) = connected_components(&mask.view());

    let mut detections: Vec<StarDetection> = boxes
        .iter()
        .enumerate()
        .filter_map(|(idx, bbox)| {
            let label = idx as u32 + 1;
            let rows = bbox.min_row..bbox.max_row + 1;
            let cols = bbox.min_col..bbox.max_col + 1;
            let sub = image.slice(s![rows.clone(), cols.clone()]).mapv(|v| v - sky);
            let sub_mask = labels.slice(s![rows, cols]).mapv(|l| l == label);

            let spot = compute_centroid_from_mask(&sub.view(), &sub_mask.view());
            if spot.n_pixels < params.min_pixels || !spot.x.is_finite() {
                return None;
            }
            Some(StarDetection {
                id: idx,
                x: spot.x + bbox.min_col as f64,
                y: spot.y + bbox.min_row as f64,
                flux: spot.flux,
                n_pixels: spot.n_pixels,
            })
        })
        .collect();

    detections.sort_by(|a, b| b.flux.total_cmp(&a.flux));
    log::debug!(
        "Detected {} sources above {:.1} (sky {:.1})",
        detections.len(),
        threshold,
        sky
    );
    detections
}
