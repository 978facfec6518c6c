//! Candidate search in invariant space and verification in pixel space.

use std::collections::HashSet;
use std::time::Instant;

use super::invariant::{Triangle, TriangleInvariant};
use super::MatchError;
use crate::locatable::Position;

/// Indices of `invariants` sorted by ascending `x_t * y_t`.
pub(super) fn sort_by_product(invariants: &[TriangleInvariant]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..invariants.len()).collect();
    order.sort_by(|&i, &j| invariants[i].product().total_cmp(&invariants[j].product()));
    order
}

/// Pairs (reference_idx, current_idx) whose invariants agree within
/// `tolerance`, visited in product order. Stops once `cap` pairs are found.
///
/// Several triangles may pair with the same partner here; verification
/// decides which pairings survive.
pub(super) fn find_potential_matches(
    reference: &[TriangleInvariant],
    current: &[TriangleInvariant],
    tolerance: f64,
    cap: usize,
    deadline: Option<Instant>,
) -> Result<Vec<(usize, usize)>, MatchError> {
    let ref_order = sort_by_product(reference);
    let cur_order = sort_by_product(current);
    let mut potential = Vec::with_capacity(cap);

    'outer: for &i in &ref_order {
        if let Some(deadline) = deadline {
            if Instant::now() > deadline {
                return Err(MatchError::BudgetExceeded);
            }
        }
        for &j in &cur_order {
            if reference[i].agrees_with(&current[j], tolerance) {
                potential.push((i, j));
                if potential.len() >= cap {
                    break 'outer;
                }
            }
        }
    }

    Ok(potential)
}

/// Keep the candidates whose shapes coincide in pixel space.
///
/// Each pair is anchored on vertex A; B and C must then lie within
/// `vertex_tolerance` pixels of their counterparts. Matching is greedy in
/// candidate order and each triangle may be claimed at most once.
pub(super) fn verify_matches(
    potential: &[(usize, usize)],
    reference: &[Triangle],
    current: &[Triangle],
    vertex_tolerance: f64,
) -> Vec<(usize, usize)> {
    let mut ref_used = HashSet::new();
    let mut cur_used = HashSet::new();
    let mut verified = Vec::new();

    for &(i, j) in potential {
        if ref_used.contains(&i) || cur_used.contains(&j) {
            continue;
        }
        let ref_anchored = reference[i].anchored();
        let cur_anchored = current[j].anchored();
        let coincide = ref_anchored
            .iter()
            .zip(cur_anchored.iter())
            .all(|(r, c)| (r - c).norm() < vertex_tolerance);

        if coincide {
            ref_used.insert(i);
            cur_used.insert(j);
            verified.push((i, j));
        }
    }

    verified
}

/// Mean over verified pairs of the mean vertex displacement (reference - current).
pub(super) fn mean_offset(
    verified: &[(usize, usize)],
    reference: &[Triangle],
    current: &[Triangle],
) -> Option<Position> {
    if verified.is_empty() {
        return None;
    }
    let total = verified
        .iter()
        .fold(Position::zeros(), |acc, &(i, j)| {
            acc + reference[i].mean_displacement(&current[j])
        });
    Some(total / verified.len() as f64)
}
