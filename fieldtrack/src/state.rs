//! Field solution and per-frame snapshots.
//!
//! All positions here use the centroid convention.

use std::sync::Arc;

use chrono::NaiveDateTime;
use ndarray::Array2;
use phot_math::{Position, StarCatalog};
use serde::{Deserialize, Serialize};

use crate::error::TrackError;

/// Stars chosen in the reference frame, plus what is needed to find them again.
///
/// Produced once by whatever selects the stars; the tracker keeps its own
/// copy and never mutates it.
#[derive(Debug, Clone)]
pub struct FieldSolution {
    target: Position,
    comparisons: Vec<Position>,
    reference_catalog: StarCatalog,
    reference_image: Arc<Array2<f64>>,
}

impl FieldSolution {
    /// # Errors
    /// * `TrackError::InvalidConfiguration` - No comparison stars, or a
    ///   reference catalog too small to form a triangle
    pub fn new(
        target: Position,
        comparisons: Vec<Position>,
        reference_catalog: StarCatalog,
        reference_image: Arc<Array2<f64>>,
    ) -> Result<Self, TrackError> {
        if comparisons.is_empty() {
            return Err(TrackError::InvalidConfiguration(
                "at least one comparison star is required".to_string(),
            ));
        }
        if reference_catalog.len() < 3 {
            return Err(TrackError::InvalidConfiguration(format!(
                "reference catalog has {} stars, at least 3 are required",
                reference_catalog.len()
            )));
        }
        Ok(Self {
            target,
            comparisons,
            reference_catalog,
            reference_image,
        })
    }

    pub fn target(&self) -> &Position {
        &self.target
    }

    pub fn comparisons(&self) -> &[Position] {
        &self.comparisons
    }

    pub fn reference_catalog(&self) -> &StarCatalog {
        &self.reference_catalog
    }

    pub fn reference_image(&self) -> &Arc<Array2<f64>> {
        &self.reference_image
    }
}

/// How a frame's positions were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackingMode {
    /// Centroided at the carried positions without re-matching
    Direct,
    /// Recovered after triangle matching against the reference catalog
    Rematched,
}

/// Carried tracking state, handed from one frame to the next by value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerState {
    /// `reference - current` translation; stars are sought at `reference - offset`
    pub offset: Position,
    /// Frames examined so far
    pub frames_seen: usize,
}

impl TrackerState {
    pub fn initial() -> Self {
        Self {
            offset: Position::zeros(),
            frames_seen: 0,
        }
    }

    pub(crate) fn advance(&self, offset: Position) -> Self {
        Self {
            offset,
            frames_seen: self.frames_seen + 1,
        }
    }
}

impl Default for TrackerState {
    fn default() -> Self {
        Self::initial()
    }
}

/// Where the stars were found in one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSolution {
    pub frame_index: usize,
    pub timestamp: Option<NaiveDateTime>,
    pub target: Position,
    /// `None` for comparison stars that could not be located
    pub comparisons: Vec<Option<Position>>,
    /// Offset in force when the positions were found
    pub offset: Position,
    pub mode: TrackingMode,
}

impl FrameSolution {
    pub fn lost_comparisons(&self) -> impl Iterator<Item = usize> + '_ {
        self.comparisons
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_none())
            .map(|(i, _)| i)
    }
}

/// Result of tracking one frame.
#[derive(Debug)]
pub enum FrameOutcome {
    /// Target located; ready for photometry
    Tracked(FrameSolution),
    /// Frame dropped from the run
    Skipped(TrackError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(n: usize) -> StarCatalog {
        let pts: Vec<Position> = (0..n)
            .map(|i| Position::new(i as f64 * 10.0, (i * i) as f64))
            .collect();
        StarCatalog::from_positions(&pts, 1.0)
    }

    #[test]
    fn test_field_solution_requires_comparisons() {
        let image = Arc::new(Array2::zeros((4, 4)));
        let err = FieldSolution::new(Position::zeros(), vec![], catalog(4), image).unwrap_err();
        assert!(matches!(err, TrackError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_field_solution_requires_catalog() {
        let image = Arc::new(Array2::zeros((4, 4)));
        let err = FieldSolution::new(
            Position::zeros(),
            vec![Position::new(1.0, 1.0)],
            catalog(2),
            image,
        )
        .unwrap_err();
        assert!(matches!(err, TrackError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_state_advance() {
        let state = TrackerState::initial().advance(Position::new(1.0, -2.0));
        assert_eq!(state.frames_seen, 1);
        assert_eq!(state.offset, Position::new(1.0, -2.0));
        assert_eq!(TrackerState::default().offset, Position::zeros());
    }

    #[test]
    fn test_lost_comparisons() {
        let solution = FrameSolution {
            frame_index: 0,
            timestamp: None,
            target: Position::zeros(),
            comparisons: vec![Some(Position::zeros()), None, Some(Position::zeros()), None],
            offset: Position::zeros(),
            mode: TrackingMode::Rematched,
        };
        assert_eq!(solution.lost_comparisons().collect::<Vec<_>>(), vec![1, 3]);
    }
}
