//! Drift-tolerant field tracking and differential aperture photometry.
//!
//! A [`FieldTracker`] follows a target star and its comparison stars through
//! a sequence of frames. Each frame is first tried directly at the carried
//! positions; when any star is missed the field is re-matched against the
//! reference catalog with triangle invariants and the stars are sought again
//! at the recovered offset. Tracked frames are then measured with oversampled
//! aperture photometry and reduced to a differential ratio.

pub mod callback;
pub mod config;
pub mod error;
pub mod frame;
pub mod output;
pub mod pipeline;
pub mod primitives;
pub mod reducer;
pub mod state;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use ndarray::ArrayView2;
use phot_math::{Position, StarCatalog, TriangleMatcher};
use serde::{Deserialize, Serialize};
use shared::coords::to_array_coords;
use shared::image_proc::{ApertureMeasurement, AperturePhotometer, MomentCentroider};

pub use callback::{CallbackId, TrackerCallback, TrackerEvent};
pub use config::{PhotometryConfig, TrackerConfig};
pub use error::TrackError;
pub use frame::{parse_date_obs, Frame};
pub use pipeline::{PhotometryRun, RunReport};
pub use primitives::{Centroider, FoundStar, StarFinder, ThresholdStarFinder};
pub use reducer::{DifferentialMeasurement, DifferentialReducer};
pub use state::{FieldSolution, FrameOutcome, FrameSolution, TrackerState, TrackingMode};

/// Photometry of one tracked frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameMeasurement {
    /// Positions and offset the measurement was taken at
    pub solution: FrameSolution,
    pub exposure_time: f64,
    pub target: ApertureMeasurement,
    /// `None` for comparisons that were lost or could not be measured
    pub comparisons: Vec<Option<ApertureMeasurement>>,
    pub differential: DifferentialMeasurement,
}

/// Where each star was found in one attempt.
struct StarFixes {
    target: Result<Position, TrackError>,
    comparisons: Vec<Result<Position, TrackError>>,
}

impl StarFixes {
    fn missing(&self) -> usize {
        usize::from(self.target.is_err()) + self.comparisons.iter().filter(|c| c.is_err()).count()
    }
}

/// Build the matching catalog for a frame: the brightest stars the finder
/// reports, with near-duplicates removed.
pub fn brightest_catalog<F: StarFinder>(
    finder: &F,
    image: &ArrayView2<f64>,
    config: &TrackerConfig,
) -> StarCatalog {
    let stars = finder.find_stars(image);
    StarCatalog::from_brightest(
        &stars,
        |s: &FoundStar| s.flux,
        config.brightest_stars,
        config.duplicate_tolerance,
    )
}

/// Tracks a frozen field solution through a frame sequence.
pub struct FieldTracker<C: Centroider = MomentCentroider, F: StarFinder = ThresholdStarFinder> {
    config: TrackerConfig,
    solution: FieldSolution,
    centroider: C,
    finder: F,
    matcher: TriangleMatcher,
    photometer: AperturePhotometer,
    callbacks: Arc<Mutex<HashMap<CallbackId, TrackerCallback>>>,
    next_callback_id: Arc<Mutex<CallbackId>>,
}

impl FieldTracker<MomentCentroider, ThresholdStarFinder> {
    /// Tracker using the moment centroider and threshold star finder
    /// configured by `config`.
    pub fn with_defaults(
        config: TrackerConfig,
        solution: FieldSolution,
    ) -> Result<Self, TrackError> {
        let centroider = MomentCentroider::new(config.centroid.clone());
        let finder = ThresholdStarFinder::new(config.detection.clone());
        Self::new(config, solution, centroider, finder)
    }
}

impl<C: Centroider, F: StarFinder> FieldTracker<C, F> {
    /// Create a tracker. The solution is copied in and never changes, so
    /// repeated runs from the same solution are reproducible.
    ///
    /// # Errors
    /// * `TrackError::InvalidConfiguration` - The configuration failed validation
    pub fn new(
        config: TrackerConfig,
        solution: FieldSolution,
        centroider: C,
        finder: F,
    ) -> Result<Self, TrackError> {
        config.validate()?;
        let photometer = config.photometry.photometer()?;
        let matcher = TriangleMatcher::new(config.matching.clone());

        log::info!(
            "Field tracker ready: {} comparison stars, {} reference catalog stars, \
             search radius {:.1} px",
            solution.comparisons().len(),
            solution.reference_catalog().len(),
            config.search_radius
        );

        Ok(Self {
            config,
            solution,
            centroider,
            finder,
            matcher,
            photometer,
            callbacks: Arc::new(Mutex::new(HashMap::new())),
            next_callback_id: Arc::new(Mutex::new(0)),
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn solution(&self) -> &FieldSolution {
        &self.solution
    }

    pub fn photometer(&self) -> &AperturePhotometer {
        &self.photometer
    }

    /// Register a callback for tracker events
    pub fn register_callback<Cb>(&self, callback: Cb) -> CallbackId
    where
        Cb: Fn(&TrackerEvent) + Send + Sync + 'static,
    {
        let mut id_guard = match self.next_callback_id.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let id = *id_guard;
        *id_guard += 1;
        drop(id_guard);

        let mut callbacks = match self.callbacks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        callbacks.insert(id, Arc::new(callback));
        id
    }

    /// Remove a callback; returns false if the id was unknown
    pub fn deregister_callback(&self, id: CallbackId) -> bool {
        match self.callbacks.lock() {
            Ok(mut callbacks) => callbacks.remove(&id).is_some(),
            Err(poisoned) => poisoned.into_inner().remove(&id).is_some(),
        }
    }

    pub fn callback_count(&self) -> usize {
        match self.callbacks.lock() {
            Ok(callbacks) => callbacks.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    fn emit_event(&self, event: &TrackerEvent) {
        // Snapshot so a callback may register or deregister without deadlocking
        let callbacks: Vec<TrackerCallback> = match self.callbacks.lock() {
            Ok(callbacks) => callbacks.values().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().values().cloned().collect(),
        };
        for callback in callbacks {
            callback(event);
        }
    }

    /// Centroid one star expected at `expected - offset`, then make sure its
    /// photometry region stays on the frame.
    fn locate(
        &self,
        image: &ArrayView2<f64>,
        expected: &Position,
        offset: &Position,
    ) -> Result<Position, TrackError> {
        let guess = expected - offset;
        let result = self
            .centroider
            .centroid(image, &guess, self.config.search_radius);
        if !result.ok {
            return Err(TrackError::CentroidNotFound {
                x: guess.x,
                y: guess.y,
                reason: result.diagnostic,
            });
        }

        let size = shared::ImageSize::of(image);
        if !self.photometer.fits(&size, &to_array_coords(&result.position)) {
            return Err(TrackError::RegionOutOfBounds {
                x: result.position.x,
                y: result.position.y,
            });
        }
        Ok(result.position)
    }

    fn locate_all(&self, image: &ArrayView2<f64>, offset: &Position) -> StarFixes {
        StarFixes {
            target: self.locate(image, self.solution.target(), offset),
            comparisons: self
                .solution
                .comparisons()
                .iter()
                .map(|c| self.locate(image, c, offset))
                .collect(),
        }
    }

    /// Locate the field in one frame.
    ///
    /// Returns the state to carry into the next frame along with the
    /// outcome. Failures are recorded in the outcome and never abort the
    /// sequence: a lost target or failed re-match skips the frame and a lost
    /// comparison star is reported as `None`.
    pub fn track_frame(
        &self,
        frame: &Frame,
        index: usize,
        state: TrackerState,
    ) -> (TrackerState, FrameOutcome) {
        let image = frame.view();

        let direct = self.locate_all(&image, &state.offset);
        if let StarFixes {
            target: Ok(target),
            comparisons,
        } = &direct
        {
            if comparisons.iter().all(|c| c.is_ok()) {
                let comparisons = comparisons.iter().map(|c| c.as_ref().ok().copied()).collect();
                log::debug!("Frame {index}: all stars found directly");
                let solution = FrameSolution {
                    frame_index: index,
                    timestamp: frame.timestamp,
                    target: *target,
                    comparisons,
                    offset: state.offset,
                    mode: TrackingMode::Direct,
                };
                return (state.advance(state.offset), FrameOutcome::Tracked(solution));
            }
        }

        let missing = direct.missing();
        log::info!("Frame {index}: {missing} star(s) missed at carried offset, re-matching field");
        self.emit_event(&TrackerEvent::Escalated {
            frame: index,
            missing,
        });

        let catalog = brightest_catalog(&self.finder, &image, &self.config);
        let matched = match self
            .matcher
            .match_catalogs(self.solution.reference_catalog().positions(), catalog.positions())
        {
            Ok(matched) => matched,
            Err(source) => {
                let error = TrackError::MatchFailed {
                    frame: index,
                    source,
                };
                return self.skip(index, state.advance(state.offset), error);
            }
        };

        let offset = matched.offset;
        log::info!(
            "Frame {index}: re-matched with {} verified triangles, offset ({:.2}, {:.2})",
            matched.matches.len(),
            offset.x,
            offset.y
        );
        self.emit_event(&TrackerEvent::Rematched {
            frame: index,
            offset,
            verified_triangles: matched.matches.len(),
        });

        let retry = self.locate_all(&image, &offset);
        let target = match retry.target {
            Ok(target) => target,
            Err(cause) => {
                // The recovered offset is kept for the next frame
                log::warn!(
                    "Frame {index}: target still missing after re-match, \
                     keeping offset ({:.2}, {:.2})",
                    offset.x,
                    offset.y
                );
                let error = TrackError::TargetLost {
                    frame: index,
                    cause: Box::new(cause),
                };
                return self.skip(index, state.advance(offset), error);
            }
        };

        let comparisons = retry
            .comparisons
            .into_iter()
            .enumerate()
            .map(|(i, fix)| match fix {
                Ok(position) => Some(position),
                Err(cause) => {
                    let lost = TrackError::ComparisonLost {
                        frame: index,
                        index: i,
                        cause: Box::new(cause),
                    };
                    log::warn!("{lost}; flux will be NaN");
                    self.emit_event(&TrackerEvent::ComparisonLost {
                        frame: index,
                        comparison: i,
                    });
                    None
                }
            })
            .collect();

        let solution = FrameSolution {
            frame_index: index,
            timestamp: frame.timestamp,
            target,
            comparisons,
            offset,
            mode: TrackingMode::Rematched,
        };
        (state.advance(offset), FrameOutcome::Tracked(solution))
    }

    fn skip(
        &self,
        index: usize,
        next: TrackerState,
        error: TrackError,
    ) -> (TrackerState, FrameOutcome) {
        log::warn!("Skipping frame {index}: {error}");
        self.emit_event(&TrackerEvent::FrameSkipped {
            frame: index,
            reason: error.to_string(),
        });
        (next, FrameOutcome::Skipped(error))
    }

    fn photometry_at(
        &self,
        image: &ArrayView2<f64>,
        position: &Position,
    ) -> Result<ApertureMeasurement, TrackError> {
        Ok(self.photometer.measure(image, &to_array_coords(position))?)
    }

    /// Measure the stars of a tracked frame and reduce them.
    ///
    /// A comparison star that cannot be measured is NaN-filled like a lost
    /// one.
    ///
    /// # Errors
    /// * `TrackError::TargetLost` - Photometry of the target failed; the frame is skipped
    pub fn measure_frame(
        &self,
        frame: &Frame,
        solution: FrameSolution,
    ) -> Result<FrameMeasurement, TrackError> {
        let image = frame.view();
        let index = solution.frame_index;
        let target = match self.photometry_at(&image, &solution.target) {
            Ok(target) => target,
            Err(cause) => {
                let error = TrackError::TargetLost {
                    frame: index,
                    cause: Box::new(cause),
                };
                log::warn!("Skipping frame {index}: {error}");
                self.emit_event(&TrackerEvent::FrameSkipped {
                    frame: index,
                    reason: error.to_string(),
                });
                return Err(error);
            }
        };
        let comparisons: Vec<Option<ApertureMeasurement>> = solution
            .comparisons
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let position = c.as_ref()?;
                match self.photometry_at(&image, position) {
                    Ok(measurement) => Some(measurement),
                    Err(e) => {
                        log::warn!("Frame {index}: comparison {i} photometry failed: {e}");
                        None
                    }
                }
            })
            .collect();

        let differential =
            DifferentialReducer::reduce(Some(&target), &comparisons, frame.exposure_time());
        log::info!(
            "Frame {} measured ({:?}): ratio {:.5}",
            solution.frame_index,
            solution.mode,
            differential.differential_ratio
        );
        self.emit_event(&TrackerEvent::FrameMeasured {
            frame: solution.frame_index,
            mode: solution.mode,
            differential_ratio: differential.differential_ratio,
        });

        Ok(FrameMeasurement {
            solution,
            exposure_time: frame.exposure_time(),
            target,
            comparisons,
            differential,
        })
    }
}

#[cfg(test)]
mod tests;
