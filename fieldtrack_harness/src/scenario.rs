//! Drift scenarios: a sequence of field shifts and star dropouts run
//! through a [`FieldTracker`].

use chrono::{Duration, NaiveDateTime};
use fieldtrack::{
    parse_date_obs, FieldTracker, Frame, PhotometryRun, TrackError, TrackerConfig, TrackingMode,
};
use phot_math::Position;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::synthetic::SyntheticField;

/// Start time of every synthetic sequence
pub const SEQUENCE_START: &str = "2012-05-20T11:29:23.338";

/// One frame of a scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameStep {
    /// Field displacement relative to the reference frame (pixels)
    pub shift: Position,
    /// Stars left out of this frame
    pub omit: Vec<usize>,
}

impl FrameStep {
    pub fn shifted(dx: f64, dy: f64) -> Self {
        Self {
            shift: Position::new(dx, dy),
            omit: Vec::new(),
        }
    }

    pub fn without(mut self, star: usize) -> Self {
        self.omit.push(star);
        self
    }
}

/// A named frame sequence.
#[derive(Debug, Clone)]
pub struct DriftScenario {
    pub name: String,
    pub steps: Vec<FrameStep>,
    pub exposure_time: f64,
    /// Seed for the pixel noise
    pub seed: u64,
}

impl DriftScenario {
    /// Five frames; the third loses comparison star 1 and the field jumps by
    /// (2, 2) pixels for the rest of the sequence.
    pub fn dropout_and_shift() -> Self {
        Self {
            name: "dropout_and_shift".to_string(),
            steps: vec![
                FrameStep::shifted(0.0, 0.0),
                FrameStep::shifted(0.0, 0.0),
                FrameStep::shifted(2.0, 2.0).without(1),
                FrameStep::shifted(2.0, 2.0),
                FrameStep::shifted(2.0, 2.0),
            ],
            exposure_time: 30.0,
            seed: 12345,
        }
    }

    /// Steady drift of `per_frame` pixels per frame.
    pub fn linear_drift(frames: usize, per_frame: Position) -> Self {
        Self {
            name: format!("linear_drift_{:.1}_{:.1}", per_frame.x, per_frame.y),
            steps: (0..frames)
                .map(|i| FrameStep {
                    shift: per_frame * i as f64,
                    omit: Vec::new(),
                })
                .collect(),
            exposure_time: 30.0,
            seed: 2024,
        }
    }

    /// The target vanishes for one frame in the middle of the sequence.
    pub fn target_dropout() -> Self {
        Self {
            name: "target_dropout".to_string(),
            steps: vec![
                FrameStep::shifted(0.0, 0.0),
                FrameStep::shifted(1.0, -1.0),
                FrameStep::shifted(3.0, -1.0).without(0),
                FrameStep::shifted(3.0, -1.0),
            ],
            exposure_time: 30.0,
            seed: 7,
        }
    }

    pub fn standard_set(frames: usize) -> Vec<Self> {
        vec![
            Self::dropout_and_shift(),
            Self::target_dropout(),
            Self::linear_drift(frames, Position::new(1.5, 0.5)),
            Self::linear_drift(frames, Position::new(-0.5, 2.5)),
        ]
    }

    /// Render the reference frame and every step, in that order.
    pub fn render(&self, field: &SyntheticField) -> Result<(Frame, Vec<Frame>), TrackError> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let start: NaiveDateTime = parse_date_obs(SEQUENCE_START)?;

        let reference_data = field.render(&Position::zeros(), &[], &mut rng);
        let reference = Frame::new(reference_data, self.exposure_time)?.with_timestamp(start);
        let cadence = Duration::milliseconds((self.exposure_time * 1000.0).round() as i64);
        let frames = self
            .steps
            .iter()
            .enumerate()
            .map(|(i, step)| {
                let data = field.render(&step.shift, &step.omit, &mut rng);
                Ok(Frame::new(data, self.exposure_time)?
                    .with_timestamp(start + cadence * (i as i32 + 1)))
            })
            .collect::<Result<Vec<_>, TrackError>>()?;
        Ok((reference, frames))
    }
}

/// A finished scenario run.
#[derive(Debug)]
pub struct ScenarioOutcome {
    pub name: String,
    pub run: PhotometryRun,
    /// True shift of every step
    pub true_shifts: Vec<Position>,
}

impl ScenarioOutcome {
    /// Largest distance between a measured target position and the true one.
    pub fn max_target_error(&self, field: &SyntheticField) -> f64 {
        self.run
            .measurements
            .iter()
            .map(|m| {
                let truth = field.centroid_position(field.target_index())
                    + self.true_shifts[m.solution.frame_index];
                (m.solution.target - truth).norm()
            })
            .fold(0.0, f64::max)
    }

    pub fn rematched_frames(&self) -> Vec<usize> {
        self.run
            .measurements
            .iter()
            .filter(|m| m.solution.mode == TrackingMode::Rematched)
            .map(|m| m.solution.frame_index)
            .collect()
    }

    /// One-line CSV summary
    pub fn csv_row(&self, field: &SyntheticField) -> String {
        let report = &self.run.report;
        format!(
            "{},{},{},{},{},{},{:.4}",
            self.name,
            report.frames_seen,
            report.measured,
            report.skipped.len(),
            report.escalations,
            report.nan_filled.len(),
            self.max_target_error(field)
        )
    }

    pub fn csv_header() -> &'static str {
        "scenario,frames,measured,skipped,escalations,nan_comparisons,max_target_error_px"
    }
}

/// Render a scenario and run it through a default-primitives tracker.
pub fn run_scenario(
    field: &SyntheticField,
    scenario: &DriftScenario,
    config: &TrackerConfig,
) -> Result<ScenarioOutcome, TrackError> {
    let (reference, frames) = scenario.render(field)?;
    let finder = fieldtrack::ThresholdStarFinder::new(config.detection.clone());
    let solution = field.field_solution(reference.data, &finder, config)?;
    let tracker = FieldTracker::with_defaults(config.clone(), solution)?;

    log::info!(
        "Running scenario {} over {} frames",
        scenario.name,
        frames.len()
    );
    let run = tracker.run(frames);

    Ok(ScenarioOutcome {
        name: scenario.name.clone(),
        run,
        true_shifts: scenario.steps.iter().map(|s| s.shift).collect(),
    })
}
