use phot_math::Position;
use std::sync::Arc;

use crate::state::TrackingMode;

/// Events emitted for external callbacks
#[derive(Debug, Clone)]
pub enum TrackerEvent {
    /// Direct centroiding missed at least one star; the field is being re-matched
    Escalated {
        frame: usize,
        /// Stars the direct attempt could not locate
        missing: usize,
    },
    /// Triangle matching produced a new offset
    Rematched {
        frame: usize,
        offset: Position,
        verified_triangles: usize,
    },
    /// A comparison star was lost and will be NaN-filled
    ComparisonLost { frame: usize, comparison: usize },
    /// The frame produced no measurement
    FrameSkipped { frame: usize, reason: String },
    /// Photometry finished for a frame (fired from a photometry worker)
    FrameMeasured {
        frame: usize,
        mode: TrackingMode,
        differential_ratio: f64,
    },
}

/// Callback ID for registration/deregistration
pub type CallbackId = u64;

/// Callback function type
pub type TrackerCallback = Arc<dyn Fn(&TrackerEvent) + Send + Sync>;
