use phot_math::MatchError;
use shared::image_proc::PhotometryError;
use thiserror::Error;

/// Errors produced while tracking a field and measuring its stars.
///
/// Only `InvalidConfiguration` (and the file-layer variants) stop a run;
/// every other variant is recorded against a single frame or star.
#[derive(Error, Debug)]
pub enum TrackError {
    /// The centroider found no valid source near the expected position.
    #[error("no centroid near ({x:.2}, {y:.2}): {reason}")]
    CentroidNotFound {
        /// Requested X position (centroid convention)
        x: f64,
        /// Requested Y position (centroid convention)
        y: f64,
        /// Diagnostic from the centroider
        reason: String,
    },

    /// The target could not be located; the frame is skipped.
    #[error("target lost in frame {frame}: {cause}")]
    TargetLost {
        frame: usize,
        #[source]
        cause: Box<TrackError>,
    },

    /// Triangle matching against the reference catalog failed; the frame is skipped.
    #[error("field re-match failed in frame {frame}: {source}")]
    MatchFailed {
        frame: usize,
        #[source]
        source: MatchError,
    },

    /// A comparison star could not be located; its flux is NaN for this frame.
    #[error("comparison star {index} lost in frame {frame}: {cause}")]
    ComparisonLost {
        frame: usize,
        index: usize,
        #[source]
        cause: Box<TrackError>,
    },

    /// Configuration validation failure.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The photometry region around a star leaves the frame.
    #[error("photometry region around ({x:.2}, {y:.2}) leaves the frame")]
    RegionOutOfBounds {
        /// Star X position (centroid convention)
        x: f64,
        /// Star Y position (centroid convention)
        y: f64,
    },

    #[error("photometry failed: {0}")]
    Photometry(#[from] PhotometryError),

    #[error("exposure time must be positive and finite, got {0}")]
    InvalidExposure(f64),

    #[error("invalid DATE-OBS value {value:?}: {reason}")]
    InvalidTimestamp { value: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
