//! Star detection: thresholding, segmentation and component centroiding.

pub mod naive;
pub mod thresholding;

pub use naive::{detect_stars, DetectionParams, StarDetection};
pub use thresholding::{apply_threshold, connected_components, robust_threshold, BoundingBox};
