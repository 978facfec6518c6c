use std::fs;
use std::path::Path;

use phot_math::MatchConfig;
use serde::{Deserialize, Serialize};
use shared::image_proc::{
    AperturePhotometer, ApertureRadii, CentroidParams, DetectionParams, Interpolation,
};

use crate::error::TrackError;

/// Aperture photometry settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotometryConfig {
    /// Aperture radius (pixels)
    pub aperture_radius: f64,
    /// Inner sky annulus radius (pixels); 0 disables the inner bound
    pub sky_inner_radius: f64,
    /// Outer sky annulus radius (pixels)
    pub sky_outer_radius: f64,
    /// Oversample factor; even values are bumped to the next odd one
    pub oversample: usize,
    /// Interpolation used while oversampling
    #[serde(default)]
    pub interpolation: Interpolation,
}

impl Default for PhotometryConfig {
    fn default() -> Self {
        Self {
            aperture_radius: 3.0,
            sky_inner_radius: 6.0,
            sky_outer_radius: 8.0,
            oversample: 21,
            interpolation: Interpolation::Nearest,
        }
    }
}

impl PhotometryConfig {
    pub fn radii(&self) -> ApertureRadii {
        ApertureRadii::new(
            self.aperture_radius,
            self.sky_inner_radius,
            self.sky_outer_radius,
        )
    }

    /// Build the photometer these settings describe.
    pub fn photometer(&self) -> Result<AperturePhotometer, TrackError> {
        AperturePhotometer::new(self.radii(), self.oversample, self.interpolation)
            .map_err(|e| TrackError::InvalidConfiguration(e.to_string()))
    }
}

/// Configuration for the field tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Aperture photometry settings
    pub photometry: PhotometryConfig,
    /// Triangle matcher tolerances and time budget
    pub matching: MatchConfig,
    /// Centroider acceptance thresholds
    pub centroid: CentroidParams,
    /// Star finder settings used when re-matching
    pub detection: DetectionParams,
    /// Radius searched around each expected star position (pixels)
    pub search_radius: f64,
    /// Catalog size used for triangle matching
    pub brightest_stars: usize,
    /// Catalog entries closer than this are treated as one source (pixels)
    pub duplicate_tolerance: f64,
    /// Photometry worker threads; 0 uses the available parallelism
    #[serde(default)]
    pub photometry_workers: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            photometry: PhotometryConfig::default(),
            matching: MatchConfig::default(),
            centroid: CentroidParams::default(),
            detection: DetectionParams::default(),
            search_radius: 8.0,
            brightest_stars: 10,
            duplicate_tolerance: 2.0,
            photometry_workers: 0,
        }
    }
}

impl TrackerConfig {
    /// Check every field; the first problem found is reported.
    pub fn validate(&self) -> Result<(), TrackError> {
        self.photometry.photometer()?;
        self.matching
            .validate()
            .map_err(|e| TrackError::InvalidConfiguration(e.to_string()))?;

        if !(self.search_radius > 0.0) || !self.search_radius.is_finite() {
            return Err(TrackError::InvalidConfiguration(format!(
                "search_radius must be positive, got {}",
                self.search_radius
            )));
        }
        if self.brightest_stars < 3 {
            return Err(TrackError::InvalidConfiguration(format!(
                "brightest_stars must be at least 3 to form triangles, got {}",
                self.brightest_stars
            )));
        }
        if !(self.duplicate_tolerance >= 0.0) {
            return Err(TrackError::InvalidConfiguration(format!(
                "duplicate_tolerance must not be negative, got {}",
                self.duplicate_tolerance
            )));
        }
        if !(self.centroid.detection_sigma >= 0.0) || self.centroid.max_iterations == 0 {
            return Err(TrackError::InvalidConfiguration(
                "centroid parameters need a non-negative detection_sigma and at least one iteration"
                    .to_string(),
            ));
        }
        if !(self.detection.threshold_sigma > 0.0) {
            return Err(TrackError::InvalidConfiguration(format!(
                "detection threshold_sigma must be positive, got {}",
                self.detection.threshold_sigma
            )));
        }
        Ok(())
    }

    /// Number of photometry workers to spawn.
    pub fn worker_count(&self) -> usize {
        if self.photometry_workers > 0 {
            self.photometry_workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, TrackError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, TrackError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<(), TrackError> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }
}
