//! Brightness-ranked star catalogs.
//!
//! A catalog is the set of positions one frame contributes to triangle
//! matching. Matching cost grows with the cube of the catalog size, so
//! catalogs are truncated to the brightest few sources, and sources closer
//! together than a pixel tolerance are collapsed to the brighter one.

use serde::{Deserialize, Serialize};

use crate::locatable::{Locatable2d, Position};

/// Ordered star positions from a single frame, brightest first.
///
/// No two entries are closer than the separation used to build the catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StarCatalog {
    positions: Vec<Position>,
}

impl StarCatalog {
    /// Build a catalog from positions already ordered by priority.
    ///
    /// Positions within `min_separation` of an earlier entry are dropped.
    pub fn from_positions<L: Locatable2d>(positions: &[L], min_separation: f64) -> Self {
        let mut kept: Vec<Position> = Vec::with_capacity(positions.len());
        for candidate in positions.iter().map(Locatable2d::position) {
            let crowded = kept
                .iter()
                .any(|p| (p - candidate).norm() < min_separation);
            if crowded {
                log::debug!(
                    "Dropping duplicate source at ({:.2}, {:.2})",
                    candidate.x,
                    candidate.y
                );
                continue;
            }
            kept.push(candidate);
        }
        Self { positions: kept }
    }

    /// Build a catalog from unordered sources, keeping at most `max_stars`
    /// of the brightest.
    ///
    /// # Arguments
    /// * `sources` - Detected sources in any order
    /// * `flux` - Brightness accessor used for ranking
    /// * `max_stars` - Upper bound on catalog size
    /// * `min_separation` - Sources closer than this (pixels) to a brighter one are discarded
    pub fn from_brightest<L, F>(
        sources: &[L],
        flux: F,
        max_stars: usize,
        min_separation: f64,
    ) -> Self
    where
        L: Locatable2d,
        F: Fn(&L) -> f64,
    {
        let mut ranked: Vec<&L> = sources.iter().collect();
        // Stable sort keeps detection order among equal fluxes
        ranked.sort_by(|a, b| flux(b).total_cmp(&flux(a)));

        let mut kept: Vec<Position> = Vec::with_capacity(max_stars.min(ranked.len()));
        for source in ranked {
            if kept.len() >= max_stars {
                break;
            }
            let candidate = source.position();
            if kept.iter().any(|p| (p - candidate).norm() < min_separation) {
                continue;
            }
            kept.push(candidate);
        }
        Self { positions: kept }
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter()
    }

    /// Copy of this catalog with every position shifted by `delta`.
    pub fn translated(&self, delta: &Position) -> Self {
        Self {
            positions: self.positions.iter().map(|p| p + delta).collect(),
        }
    }
}
