//! Whole-sequence driver.
//!
//! Tracking is sequential because each frame starts from the previous
//! frame's offset. Photometry of a tracked frame depends only on that
//! frame's solution, so it is handed to a pool of worker threads over a
//! bounded channel while tracking moves on.

use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{bounded, unbounded};

use crate::error::TrackError;
use crate::frame::Frame;
use crate::primitives::{Centroider, StarFinder};
use crate::state::{FrameOutcome, TrackerState, TrackingMode};
use crate::{FieldTracker, FrameMeasurement};

/// What happened over a run, besides the measurements themselves.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Frames handed to the tracker
    pub frames_seen: usize,
    /// Frames whose photometry completed
    pub measured: usize,
    /// Frames dropped, with the reason, in frame order
    pub skipped: Vec<(usize, TrackError)>,
    /// `(frame, comparison)` pairs reported as NaN
    pub nan_filled: Vec<(usize, usize)>,
    /// Frames that needed a field re-match
    pub escalations: usize,
}

impl RunReport {
    pub fn skipped_frames(&self) -> Vec<usize> {
        self.skipped.iter().map(|(frame, _)| *frame).collect()
    }
}

/// Measurements of a run in frame order, plus its report.
#[derive(Debug)]
pub struct PhotometryRun {
    pub measurements: Vec<FrameMeasurement>,
    pub report: RunReport,
    /// State after the last frame examined
    pub final_state: TrackerState,
    /// True if the run stopped early on request
    pub cancelled: bool,
}

impl<C, F> FieldTracker<C, F>
where
    C: Centroider + Sync,
    F: StarFinder + Sync,
{
    /// Track and measure every frame.
    pub fn run<I>(&self, frames: I) -> PhotometryRun
    where
        I: IntoIterator<Item = Frame>,
    {
        self.run_with_cancel(frames, &AtomicBool::new(false))
    }

    /// Track and measure frames until `cancel` is set.
    ///
    /// The flag is checked before each frame. Frames tracked before the
    /// cancellation are still measured and returned. A frame whose target
    /// photometry fails is reported as skipped.
    pub fn run_with_cancel<I>(&self, frames: I, cancel: &AtomicBool) -> PhotometryRun
    where
        I: IntoIterator<Item = Frame>,
    {
        let num_workers = self.config().worker_count();
        let (job_tx, job_rx) = bounded::<(Frame, crate::FrameSolution)>(num_workers * 2);
        let (result_tx, result_rx) =
            unbounded::<(usize, Result<FrameMeasurement, TrackError>)>();

        let mut report = RunReport::default();
        let mut state = TrackerState::initial();
        let mut cancelled = false;

        std::thread::scope(|scope| {
            for worker_id in 0..num_workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    log::debug!("Photometry worker {worker_id} started");
                    while let Ok((frame, solution)) = job_rx.recv() {
                        let index = solution.frame_index;
                        let result = self.measure_frame(&frame, solution);
                        if result_tx.send((index, result)).is_err() {
                            break;
                        }
                    }
                    log::debug!("Photometry worker {worker_id} shutting down");
                });
            }
            drop(job_rx);
            drop(result_tx);

            for (index, frame) in frames.into_iter().enumerate() {
                if cancel.load(Ordering::Relaxed) {
                    log::info!("Run cancelled before frame {index}");
                    cancelled = true;
                    break;
                }
                report.frames_seen += 1;

                let (next, outcome) = self.track_frame(&frame, index, state);
                state = next;
                match outcome {
                    FrameOutcome::Tracked(solution) => {
                        if solution.mode == TrackingMode::Rematched {
                            report.escalations += 1;
                        }
                        report
                            .nan_filled
                            .extend(solution.lost_comparisons().map(|c| (index, c)));
                        if job_tx.send((frame, solution)).is_err() {
                            log::error!(
                                "Photometry workers have shut down; stopping at frame {index}"
                            );
                            break;
                        }
                    }
                    FrameOutcome::Skipped(error) => {
                        // Skips only happen after a re-match attempt
                        report.escalations += 1;
                        report.skipped.push((index, error));
                    }
                }
            }
            drop(job_tx);
        });

        let mut measurements = Vec::new();
        for (index, result) in result_rx.iter() {
            match result {
                Ok(measurement) => measurements.push(measurement),
                Err(error) => report.skipped.push((index, error)),
            }
        }
        measurements.sort_by_key(|m| m.solution.frame_index);
        report.skipped.sort_by_key(|(index, _)| *index);
        report.measured = measurements.len();

        log::info!(
            "Run finished: {} frames, {} measured, {} skipped, {} re-matched, {} NaN comparisons",
            report.frames_seen,
            report.measured,
            report.skipped.len(),
            report.escalations,
            report.nan_filled.len()
        );

        PhotometryRun {
            measurements,
            report,
            final_state: state,
            cancelled,
        }
    }
}
