//! Differential flux reduction.

use serde::{Deserialize, Serialize};
use shared::image_proc::ApertureMeasurement;

/// Target and comparison fluxes for one frame, in counts per second.
///
/// Missing stars are NaN and propagate through the ratio with ordinary
/// IEEE-754 arithmetic. The ratio is also NaN when the comparisons sum to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifferentialMeasurement {
    pub target_flux: f64,
    pub comparison_fluxes: Vec<f64>,
    /// `target_flux / sum(comparison_fluxes)`
    pub differential_ratio: f64,
}

impl DifferentialMeasurement {
    pub fn comparison_sum(&self) -> f64 {
        self.comparison_fluxes.iter().sum()
    }
}

/// Converts aperture measurements into a differential measurement.
#[derive(Debug, Clone, Copy, Default)]
pub struct DifferentialReducer;

impl DifferentialReducer {
    /// Fluxes are counts per second of `exposure_time`, which callers take
    /// from a validated [`Frame`](crate::Frame) and is therefore positive.
    pub fn reduce(
        target: Option<&ApertureMeasurement>,
        comparisons: &[Option<ApertureMeasurement>],
        exposure_time: f64,
    ) -> DifferentialMeasurement {
        let rate = |m: Option<&ApertureMeasurement>| {
            m.map_or(f64::NAN, |m| m.total_counts / exposure_time)
        };

        let target_flux = rate(target);
        let comparison_fluxes: Vec<f64> = comparisons.iter().map(|c| rate(c.as_ref())).collect();
        let sum: f64 = comparison_fluxes.iter().sum();
        // A zero sum would give an infinite ratio
        let differential_ratio = if sum == 0.0 {
            f64::NAN
        } else {
            target_flux / sum
        };

        DifferentialMeasurement {
            target_flux,
            comparison_fluxes,
            differential_ratio,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use phot_math::Position;
    use shared::image_proc::ApertureRadii;

    fn measurement(counts: f64) -> ApertureMeasurement {
        ApertureMeasurement {
            total_counts: counts,
            sky_level: 0.0,
            oversample: 1,
            center: Position::zeros(),
            radii: ApertureRadii::new(3.0, 6.0, 8.0),
            aperture_points: 29,
            sky_points: 88,
        }
    }

    #[test]
    fn test_reduce_divides_by_exposure() {
        let m = DifferentialReducer::reduce(
            Some(&measurement(600.0)),
            &[Some(measurement(1000.0)), Some(measurement(2000.0))],
            30.0,
        );
        assert_relative_eq!(m.target_flux, 20.0);
        assert_eq!(m.comparison_fluxes.len(), 2);
        assert_relative_eq!(m.comparison_fluxes[1], 2000.0 / 30.0);
        assert_relative_eq!(m.differential_ratio, 0.2);
    }

    #[test]
    fn test_missing_target_is_nan() {
        let m = DifferentialReducer::reduce(
            None,
            &[Some(measurement(1.0)), Some(measurement(2.0))],
            1.0,
        );
        assert!(m.target_flux.is_nan());
        assert!(m.differential_ratio.is_nan());
        assert!(m.comparison_fluxes.iter().all(|f| f.is_finite()));
    }

    #[test]
    fn test_missing_comparison_propagates_nan() {
        let m = DifferentialReducer::reduce(
            Some(&measurement(5.0)),
            &[None, Some(measurement(2.0))],
            1.0,
        );
        assert!(m.comparison_fluxes[0].is_nan());
        assert_relative_eq!(m.comparison_fluxes[1], 2.0);
        assert!(m.differential_ratio.is_nan());
    }

    #[test]
    fn test_zero_comparison_sum() {
        let m = DifferentialReducer::reduce(
            Some(&measurement(4.0)),
            &[Some(measurement(1.0)), Some(measurement(-1.0))],
            1.0,
        );
        assert_eq!(m.comparison_sum(), 0.0);
        assert!(m.differential_ratio.is_nan());
    }
}
