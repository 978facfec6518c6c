//! Single-frame image processing for differential photometry.
//!
//! # Module Organization
//!
//! - **centroid**: intensity moments and the iterative [`MomentCentroider`]
//! - **detection**: threshold segmentation and brightness-ranked star finding
//! - **oversample**: nearest and bilinear upsampling of small regions
//! - **aperture_photometry**: oversampled aperture sums with median sky subtraction

pub mod aperture_photometry;
pub mod centroid;
pub mod detection;
pub mod oversample;

pub use aperture_photometry::{
    force_odd, ApertureMeasurement, AperturePhotometer, ApertureRadii, PhotometryError,
};
pub use centroid::{
    compute_centroid_from_mask, CentroidParams, CentroidResult, MomentCentroider, SpotMoments,
};
pub use detection::{
    apply_threshold, connected_components, detect_stars, robust_threshold, DetectionParams,
    StarDetection,
};
pub use oversample::{oversample, Interpolation};
