//! Triangle-invariant matching of star catalogs
//!
//! Recovers the translation between two exposures of the same field without
//! trusting either frame's absolute coordinates. Every 3-star combination in
//! each catalog is reduced to a translation-invariant signature; signatures
//! that agree are checked in pixel space, and the surviving pairs vote on the
//! offset.
//!
//! The signatures are not rotation or scale invariant. Both catalogs must
//! come from frames that differ by a translation only.

mod invariant;
mod verify;

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::locatable::{Locatable2d, Position};
pub use invariant::{build_triangles, Triangle, TriangleInvariant};
use verify::{find_potential_matches, mean_offset, verify_matches};

/// Errors that can occur while matching catalogs
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatchError {
    #[error("Invalid argument: {0}")]
    ArgumentError(String),

    #[error("{catalog} catalog has {count} stars, at least 3 are needed to form a triangle")]
    NotEnoughStars { catalog: &'static str, count: usize },

    #[error("no triangle pair verified ({potential} potential matches examined)")]
    NoVerifiedMatches { potential: usize },

    #[error("matching exceeded its time budget")]
    BudgetExceeded,
}

/// Tuning for [`TriangleMatcher`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Relative agreement required of both invariant components (0.02 = 2%)
    pub relative_tolerance: f64,
    /// Maximum vertex mismatch in pixels once a pair is anchored on vertex A
    pub vertex_tolerance: f64,
    /// Stop collecting candidates after this many
    pub max_potential_matches: usize,
    /// Optional wall-clock bound on a single match
    #[serde(default)]
    pub time_budget: Option<Duration>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            relative_tolerance: 0.02,
            vertex_tolerance: 2.0,
            max_potential_matches: 10,
            time_budget: None,
        }
    }
}

impl MatchConfig {
    pub fn validate(&self) -> Result<(), MatchError> {
        if !(self.relative_tolerance > 0.0 && self.relative_tolerance < 1.0) {
            return Err(MatchError::ArgumentError(format!(
                "relative_tolerance must be in (0, 1), got {}",
                self.relative_tolerance
            )));
        }
        if !(self.vertex_tolerance > 0.0) {
            return Err(MatchError::ArgumentError(format!(
                "vertex_tolerance must be positive, got {}",
                self.vertex_tolerance
            )));
        }
        if self.max_potential_matches == 0 {
            return Err(MatchError::ArgumentError(
                "max_potential_matches must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of a successful match.
#[derive(Debug, Clone)]
pub struct MatchResult {
    /// Translation `reference - current`. Adding it to a current-frame
    /// position gives the reference-frame position.
    pub offset: Position,

    /// Verified (reference, current) triangle pairs that produced the offset
    pub matches: Vec<(Triangle, Triangle)>,

    /// Number of invariant-space candidates examined
    pub potential_matches: usize,

    /// Triangles built from the reference and current catalogs
    pub triangle_counts: (usize, usize),
}

/// Translation-only catalog matcher.
#[derive(Debug, Clone, Default)]
pub struct TriangleMatcher {
    config: MatchConfig,
}

impl TriangleMatcher {
    pub fn new(config: MatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Find the offset between a reference catalog and the current one.
    ///
    /// # Arguments
    /// * `reference` - Positions from the reference frame, brightest first
    /// * `current` - Positions from the frame being registered
    ///
    /// # Returns
    /// * `MatchResult` whose `offset` is `reference - current`
    ///
    /// # Errors
    /// * `MatchError::NotEnoughStars` - Either catalog has fewer than 3 entries
    /// * `MatchError::NoVerifiedMatches` - No triangle survived verification; never reported
    ///   as a zero offset
    /// * `MatchError::BudgetExceeded` - The configured time budget ran out
    pub fn match_catalogs<R1, R2>(
        &self,
        reference: &[R1],
        current: &[R2],
    ) -> Result<MatchResult, MatchError>
    where
        R1: Locatable2d,
        R2: Locatable2d,
    {
        self.config.validate()?;
        let deadline = self.config.time_budget.map(|b| Instant::now() + b);

        if reference.len() < 3 {
            return Err(MatchError::NotEnoughStars {
                catalog: "reference",
                count: reference.len(),
            });
        }
        if current.len() < 3 {
            return Err(MatchError::NotEnoughStars {
                catalog: "current",
                count: current.len(),
            });
        }

        let reference: Vec<Position> = reference.iter().map(Locatable2d::position).collect();
        let current: Vec<Position> = current.iter().map(Locatable2d::position).collect();

        let ref_triangles = build_triangles(&reference);
        let cur_triangles = build_triangles(&current);
        let ref_invariants: Vec<TriangleInvariant> =
            ref_triangles.iter().map(Triangle::invariant).collect();
        let cur_invariants: Vec<TriangleInvariant> =
            cur_triangles.iter().map(Triangle::invariant).collect();

        let potential = find_potential_matches(
            &ref_invariants,
            &cur_invariants,
            self.config.relative_tolerance,
            self.config.max_potential_matches,
            deadline,
        )?;
        let verified = verify_matches(
            &potential,
            &ref_triangles,
            &cur_triangles,
            self.config.vertex_tolerance,
        );

        log::debug!(
            "Triangle match: {} ref / {} cur triangles, {} potential, {} verified",
            ref_triangles.len(),
            cur_triangles.len(),
            potential.len(),
            verified.len()
        );

        let offset = mean_offset(&verified, &ref_triangles, &cur_triangles).ok_or(
            MatchError::NoVerifiedMatches {
                potential: potential.len(),
            },
        )?;

        Ok(MatchResult {
            offset,
            matches: verified
                .iter()
                .map(|&(i, j)| (ref_triangles[i], cur_triangles[j]))
                .collect(),
            potential_matches: potential.len(),
            triangle_counts: (ref_triangles.len(), cur_triangles.len()),
        })
    }
}

/// Match two catalogs with the default configuration.
pub fn match_catalogs<R1, R2>(reference: &[R1], current: &[R2]) -> Result<MatchResult, MatchError>
where
    R1: Locatable2d,
    R2: Locatable2d,
{
    TriangleMatcher::default().match_catalogs(reference, current)
}

#[cfg(test)]
mod tests;
