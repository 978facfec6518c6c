//! Canonical vertex ordering and translation-invariant triangle signatures.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::locatable::Position;

/// Three catalog positions in canonical order.
///
/// A and B bound the shortest side, B and C the longest, A and C the
/// intermediate one. `indices` records which catalog entries supplied
/// A, B and C.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Triangle {
    pub a: Position,
    pub b: Position,
    pub c: Position,
    pub indices: [usize; 3],
}

/// Translation-invariant signature of a [`Triangle`].
///
/// `x_t = (C - B) . (C - A)` and `y_t = |C - B| / |B - A|`. Neither is
/// invariant under rotation or scale, so frames compared this way must
/// differ by a translation only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriangleInvariant {
    pub x_t: f64,
    pub y_t: f64,
}

impl TriangleInvariant {
    /// Sort key that front-loads the most distinctive triangles.
    pub fn product(&self) -> f64 {
        self.x_t * self.y_t
    }

    /// Largest relative disagreement `|1 - self/other|` over both components.
    pub fn relative_difference(&self, other: &TriangleInvariant) -> f64 {
        let dx = (1.0 - self.x_t / other.x_t).abs();
        let dy = (1.0 - self.y_t / other.y_t).abs();
        dx.max(dy)
    }

    /// True when both components agree within `tolerance` (relative).
    pub fn agrees_with(&self, other: &TriangleInvariant, tolerance: f64) -> bool {
        // NaN from degenerate triangles compares false here
        self.relative_difference(other) < tolerance
    }
}

impl Triangle {
    /// Arrange three vertices canonically.
    ///
    /// Ordering depends only on the pairwise distances. Sides of equal
    /// length keep catalog order, so the result is deterministic.
    pub fn arrange(vertices: [Position; 3], indices: [usize; 3]) -> Self {
        // Sides listed in catalog index order: (0,1), (0,2), (1,2)
        let mut sides = [(0usize, 1usize), (0, 2), (1, 2)];
        let length = |(i, j): (usize, usize)| (vertices[i] - vertices[j]).norm();
        sides.sort_by(|&s1, &s2| length(s1).total_cmp(&length(s2)));

        let (shortest, middle) = (sides[0], sides[1]);
        // The vertex shared by the two shorter sides is A
        let a = if shortest.0 == middle.0 || shortest.0 == middle.1 {
            shortest.0
        } else {
            shortest.1
        };
        let b = shortest.0 + shortest.1 - a;
        let c = 3 - a - b;

        Self {
            a: vertices[a],
            b: vertices[b],
            c: vertices[c],
            indices: [indices[a], indices[b], indices[c]],
        }
    }

    /// Side lengths as (AB, AC, BC).
    pub fn side_lengths(&self) -> (f64, f64, f64) {
        (
            (self.b - self.a).norm(),
            (self.c - self.a).norm(),
            (self.c - self.b).norm(),
        )
    }

    pub fn invariant(&self) -> TriangleInvariant {
        let ca = self.c - self.a;
        let cb = self.c - self.b;
        let ba = self.b - self.a;
        TriangleInvariant {
            x_t: cb.dot(&ca),
            y_t: cb.norm() / ba.norm(),
        }
    }

    pub fn translated(&self, delta: &Position) -> Self {
        Self {
            a: self.a + delta,
            b: self.b + delta,
            c: self.c + delta,
            indices: self.indices,
        }
    }

    /// Vertices B and C expressed relative to vertex A.
    pub(super) fn anchored(&self) -> [Position; 2] {
        [self.b - self.a, self.c - self.a]
    }

    /// Mean of the per-vertex displacement `self - other`.
    pub(super) fn mean_displacement(&self, other: &Triangle) -> Position {
        ((self.a - other.a) + (self.b - other.b) + (self.c - other.c)) / 3.0
    }
}

/// All 3-combinations of `positions`, canonically arranged.
///
/// Produces C(n, 3) triangles; callers bound `n`.
pub fn build_triangles(positions: &[Position]) -> Vec<Triangle> {
    (0..positions.len())
        .combinations(3)
        .map(|idx| {
            Triangle::arrange(
                [positions[idx[0]], positions[idx[1]], positions[idx[2]]],
                [idx[0], idx[1], idx[2]],
            )
        })
        .collect()
}
