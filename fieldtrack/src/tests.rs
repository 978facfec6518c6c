//! Tracker state machine tests on sparse marker images.
//!
//! Each star is a single bright pixel. The centroider and star finder
//! below read those pixels directly, which keeps the state machine
//! independent of centroiding accuracy.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use approx::assert_abs_diff_eq;
use ndarray::{Array2, ArrayView2};
use phot_math::Position;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use shared::image_proc::{CentroidResult, PhotometryError};

use super::*;

const SIZE: usize = 64;

/// Reference stars as (col, row) array indices: target first
const STARS: [(usize, usize); 4] = [(20, 20), (44, 16), (28, 46), (50, 40)];
const FLUX: [f64; 4] = [500.0, 1000.0, 800.0, 600.0];

struct PixelCentroider;

impl Centroider for PixelCentroider {
    fn centroid(
        &self,
        image: &ArrayView2<f64>,
        position: &Position,
        search_radius: f64,
    ) -> CentroidResult {
        let nearest = image
            .indexed_iter()
            .filter(|(_, v)| **v > 0.0)
            .map(|((r, c), v)| (Position::new(c as f64 + 0.5, r as f64 + 0.5), *v))
            .filter(|(p, _)| (p - position).norm() <= search_radius)
            .min_by(|a, b| {
                (a.0 - position)
                    .norm()
                    .total_cmp(&(b.0 - position).norm())
            });
        match nearest {
            Some((p, flux)) => CentroidResult {
                position: p,
                ok: true,
                diagnostic: String::new(),
                flux,
            },
            None => CentroidResult {
                position: *position,
                ok: false,
                diagnostic: "no marker in window".to_string(),
                flux: 0.0,
            },
        }
    }
}

/// Reports every marker displaced by a fixed sub-pixel amount.
struct DisplacedCentroider(Position);

impl Centroider for DisplacedCentroider {
    fn centroid(
        &self,
        image: &ArrayView2<f64>,
        position: &Position,
        search_radius: f64,
    ) -> CentroidResult {
        let mut result = PixelCentroider.centroid(image, position, search_radius);
        if result.ok {
            result.position += self.0;
        }
        result
    }
}

struct PixelFinder;

impl StarFinder for PixelFinder {
    fn find_stars(&self, image: &ArrayView2<f64>) -> Vec<FoundStar> {
        image
            .indexed_iter()
            .filter(|(_, v)| **v > 0.0)
            .map(|((r, c), v)| FoundStar {
                position: Position::new(c as f64 + 0.5, r as f64 + 0.5),
                flux: *v,
            })
            .collect()
    }
}

/// Marker image with the listed stars shifted by `(dx, dy)` pixels.
fn marker_frame(keep: &[usize], dx: i64, dy: i64) -> Frame {
    let mut data = Array2::zeros((SIZE, SIZE));
    for &i in keep {
        let (c, r) = STARS[i];
        data[[(r as i64 + dy) as usize, (c as i64 + dx) as usize]] = FLUX[i];
    }
    Frame::new(data, 10.0).unwrap()
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn center(i: usize) -> Position {
    let (c, r) = STARS[i];
    Position::new(c as f64 + 0.5, r as f64 + 0.5)
}

fn field_solution() -> FieldSolution {
    let reference = marker_frame(&[0, 1, 2, 3], 0, 0);
    let catalog = brightest_catalog(&PixelFinder, &reference.view(), &TrackerConfig::default());
    FieldSolution::new(
        center(0),
        vec![center(1), center(2), center(3)],
        catalog,
        Arc::new(reference.data),
    )
    .unwrap()
}

fn tracker() -> FieldTracker<PixelCentroider, PixelFinder> {
    let mut config = TrackerConfig::default();
    config.photometry_workers = 2;
    FieldTracker::new(config, field_solution(), PixelCentroider, PixelFinder).unwrap()
}

fn tracked(outcome: FrameOutcome) -> FrameSolution {
    match outcome {
        FrameOutcome::Tracked(solution) => solution,
        FrameOutcome::Skipped(e) => panic!("frame unexpectedly skipped: {e}"),
    }
}

#[test]
fn test_reference_catalog_is_brightest_first() {
    init_logging();
    let solution = field_solution();
    let catalog = solution.reference_catalog();
    assert_eq!(catalog.len(), 4);
    assert_eq!(catalog.positions()[0], center(1));
    assert_eq!(catalog.positions()[3], center(0));
}

#[test]
fn test_direct_frame_keeps_offset() {
    init_logging();
    let tracker = tracker();
    let state = TrackerState {
        offset: Position::new(-1.0, 0.0),
        frames_seen: 4,
    };
    let (next, outcome) = tracker.track_frame(&marker_frame(&[0, 1, 2, 3], 1, 0), 4, state);
    let solution = tracked(outcome);

    assert_eq!(solution.mode, TrackingMode::Direct);
    assert_eq!(next.offset, state.offset);
    assert_eq!(next.frames_seen, 5);
    assert_eq!(solution.target, center(0) + Position::new(1.0, 0.0));
    assert!(solution.comparisons.iter().all(Option::is_some));
}

#[test]
fn test_missing_comparison_escalates_and_nan_fills() {
    init_logging();
    let tracker = tracker();
    let escalations = Arc::new(AtomicUsize::new(0));
    let lost = Arc::new(Mutex::new(Vec::new()));
    {
        let escalations = escalations.clone();
        let lost = lost.clone();
        tracker.register_callback(move |event| match event {
            TrackerEvent::Escalated { missing, .. } => {
                assert_eq!(*missing, 1);
                escalations.fetch_add(1, Ordering::SeqCst);
            }
            TrackerEvent::ComparisonLost { comparison, .. } => {
                lost.lock().unwrap().push(*comparison);
            }
            _ => {}
        });
    }

    // Comparison 2 (index 3) gone, everything else moved by (2, 2)
    let frame = marker_frame(&[0, 1, 2], 2, 2);
    let (next, outcome) = tracker.track_frame(&frame, 2, TrackerState::initial());
    let solution = tracked(outcome);

    assert_eq!(solution.mode, TrackingMode::Rematched);
    assert_abs_diff_eq!(next.offset.x, -2.0, epsilon = 1e-9);
    assert_abs_diff_eq!(next.offset.y, -2.0, epsilon = 1e-9);
    assert_eq!(solution.comparisons[2], None);
    assert_eq!(solution.comparisons[0], Some(center(1) + Position::new(2.0, 2.0)));
    assert_eq!(escalations.load(Ordering::SeqCst), 1);
    assert_eq!(*lost.lock().unwrap(), vec![2]);

    let measurement = tracker.measure_frame(&frame, solution).unwrap();
    assert_abs_diff_eq!(measurement.differential.target_flux, 50.0, epsilon = 1e-6);
    assert!(measurement.differential.comparison_fluxes[2].is_nan());
    assert!(measurement.differential.differential_ratio.is_nan());
}

#[test]
fn test_failed_match_skips_and_keeps_offset() {
    init_logging();
    let tracker = tracker();
    let state = TrackerState {
        offset: Position::new(0.5, 0.5),
        frames_seen: 0,
    };
    // Two stars cannot form a triangle
    let (next, outcome) = tracker.track_frame(&marker_frame(&[0, 1], 0, 0), 7, state);

    match outcome {
        FrameOutcome::Skipped(TrackError::MatchFailed { frame, .. }) => assert_eq!(frame, 7),
        other => panic!("expected a match failure, got {other:?}"),
    }
    assert_eq!(next.offset, state.offset);
}

#[test]
fn test_lost_target_adopts_new_offset() {
    init_logging();
    let tracker = tracker();
    let skipped = Arc::new(AtomicUsize::new(0));
    {
        let skipped = skipped.clone();
        tracker.register_callback(move |event| {
            if let TrackerEvent::FrameSkipped { .. } = event {
                skipped.fetch_add(1, Ordering::SeqCst);
            }
        });
    }

    let (next, outcome) =
        tracker.track_frame(&marker_frame(&[1, 2, 3], 3, -1), 1, TrackerState::initial());

    match outcome {
        FrameOutcome::Skipped(TrackError::TargetLost { frame, cause }) => {
            assert_eq!(frame, 1);
            assert!(matches!(*cause, TrackError::CentroidNotFound { .. }));
        }
        other => panic!("expected target loss, got {other:?}"),
    }
    assert_abs_diff_eq!(next.offset.x, -3.0, epsilon = 1e-9);
    assert_abs_diff_eq!(next.offset.y, 1.0, epsilon = 1e-9);
    assert_eq!(skipped.load(Ordering::SeqCst), 1);
}

#[test]
fn test_region_out_of_bounds_counts_as_missing() {
    init_logging();
    let tracker = tracker();
    // Target lands within the photometry half-size of the left edge
    let frame = marker_frame(&[0, 1, 2, 3], -14, 0);
    let state = TrackerState {
        offset: Position::new(14.0, 0.0),
        frames_seen: 0,
    };
    let (_, outcome) = tracker.track_frame(&frame, 0, state);

    match outcome {
        FrameOutcome::Skipped(TrackError::TargetLost { cause, .. }) => {
            assert!(matches!(*cause, TrackError::RegionOutOfBounds { .. }));
        }
        other => panic!("expected out-of-bounds target, got {other:?}"),
    }
}

#[test]
fn test_callback_registry() {
    init_logging();
    let tracker = tracker();
    let a = tracker.register_callback(|_| {});
    let b = tracker.register_callback(|_| {});
    assert_ne!(a, b);
    assert_eq!(tracker.callback_count(), 2);
    assert!(tracker.deregister_callback(a));
    assert!(!tracker.deregister_callback(a));
    assert_eq!(tracker.callback_count(), 1);
}

#[test]
fn test_invalid_config_rejected() {
    init_logging();
    let mut config = TrackerConfig::default();
    config.photometry.sky_inner_radius = 9.0;
    let result = FieldTracker::new(config, field_solution(), PixelCentroider, PixelFinder);
    assert!(matches!(result, Err(TrackError::InvalidConfiguration(_))));
}

#[test]
fn test_run_orders_measurements_and_reports() {
    init_logging();
    let tracker = tracker();
    let frames = vec![
        marker_frame(&[0, 1, 2, 3], 0, 0),
        marker_frame(&[0, 1, 2, 3], 1, 0),
        marker_frame(&[0, 1, 2], 2, 2),
        marker_frame(&[0, 1], 2, 2),
        marker_frame(&[0, 1, 2, 3], 2, 2),
    ];
    let run = tracker.run(frames);

    assert!(!run.cancelled);
    assert_eq!(run.report.frames_seen, 5);
    assert_eq!(run.report.measured, 4);
    assert_eq!(run.report.skipped_frames(), vec![3]);
    assert_eq!(run.report.nan_filled, vec![(2, 2)]);
    assert_eq!(run.report.escalations, 2);

    let indices: Vec<usize> = run
        .measurements
        .iter()
        .map(|m| m.solution.frame_index)
        .collect();
    assert_eq!(indices, vec![0, 1, 2, 4]);
    assert_eq!(run.measurements[3].solution.mode, TrackingMode::Direct);
    assert_abs_diff_eq!(run.final_state.offset.x, -2.0, epsilon = 1e-9);

    // 500 / (1000 + 800 + 600) with all stars present
    assert_abs_diff_eq!(
        run.measurements[0].differential.differential_ratio,
        500.0 / 2400.0,
        epsilon = 1e-9
    );
}

#[test]
fn test_cancel_between_frames() {
    init_logging();
    let tracker = tracker();
    let cancel = AtomicBool::new(false);
    let frames = (0..6).map(|i| {
        if i == 2 {
            cancel.store(true, Ordering::Relaxed);
        }
        marker_frame(&[0, 1, 2, 3], 0, 0)
    });
    let run = tracker.run_with_cancel(frames, &cancel);

    assert!(run.cancelled);
    assert_eq!(run.report.frames_seen, 2);
    assert_eq!(run.measurements.len(), 2);
}

#[test]
fn test_solution_not_mutated_by_runs() {
    init_logging();
    let tracker = tracker();
    let before = tracker.solution().reference_catalog().clone();
    let first = tracker.run(vec![marker_frame(&[0, 1, 2], 2, 2)]);
    let second = tracker.run(vec![marker_frame(&[0, 1, 2], 2, 2)]);

    assert_eq!(tracker.solution().reference_catalog(), &before);
    assert_eq!(
        first.measurements[0].solution,
        second.measurements[0].solution
    );
}

#[test]
fn test_random_shifts_with_dropout_recovered() {
    init_logging();
    let tracker = tracker();
    let mut rng = ChaCha8Rng::seed_from_u64(2012);

    for trial in 0..20 {
        let dx = rng.random_range(-4..=4);
        let dy = rng.random_range(-4..=4);
        let dropped = rng.random_range(1..4);
        let keep: Vec<usize> = (0..4).filter(|&i| i != dropped).collect();

        let (next, outcome) =
            tracker.track_frame(&marker_frame(&keep, dx, dy), trial, TrackerState::initial());
        let solution = tracked(outcome);

        assert_eq!(solution.mode, TrackingMode::Rematched, "trial {trial}");
        assert_abs_diff_eq!(next.offset.x, -dx as f64, epsilon = 1e-9);
        assert_abs_diff_eq!(next.offset.y, -dy as f64, epsilon = 1e-9);
        assert_eq!(solution.target, center(0) + Position::new(dx as f64, dy as f64));
        assert_eq!(solution.lost_comparisons().collect::<Vec<_>>(), vec![dropped - 1]);
    }
}

#[test]
fn test_empty_target_aperture_skips_frame() {
    init_logging();
    let mut config = TrackerConfig::default();
    config.photometry.aperture_radius = 0.2;
    config.photometry.oversample = 1;
    config.photometry_workers = 1;
    // 0.3 px from the pixel center leaves no sample inside a 0.2 px aperture
    let centroider = DisplacedCentroider(Position::new(0.3, 0.3));
    let tracker = FieldTracker::new(config, field_solution(), centroider, PixelFinder).unwrap();

    let skipped = Arc::new(Mutex::new(Vec::new()));
    {
        let skipped = skipped.clone();
        tracker.register_callback(move |event| {
            if let TrackerEvent::FrameSkipped { frame, .. } = event {
                skipped.lock().unwrap().push(*frame);
            }
        });
    }

    let frame = marker_frame(&[0, 1, 2, 3], 0, 0);
    let (_, outcome) = tracker.track_frame(&frame, 0, TrackerState::initial());
    let solution = tracked(outcome);
    match tracker.measure_frame(&frame, solution) {
        Err(TrackError::TargetLost { frame, cause }) => {
            assert_eq!(frame, 0);
            assert!(matches!(
                *cause,
                TrackError::Photometry(PhotometryError::EmptySample("aperture"))
            ));
        }
        other => panic!("expected target loss, got {other:?}"),
    }

    let run = tracker.run(vec![
        marker_frame(&[0, 1, 2, 3], 0, 0),
        marker_frame(&[0, 1, 2, 3], 0, 0),
    ]);
    assert!(run.measurements.is_empty());
    assert_eq!(run.report.measured, 0);
    assert_eq!(run.report.skipped_frames(), vec![0, 1]);
    assert_eq!(*skipped.lock().unwrap(), vec![0, 0, 1]);
}
