use super::*;
use approx::assert_relative_eq;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn random_catalog(rng: &mut ChaCha8Rng, n: usize, extent: f64) -> Vec<Position> {
    (0..n)
        .map(|_| Position::new(rng.random_range(0.0..extent), rng.random_range(0.0..extent)))
        .collect()
}

fn shifted(catalog: &[Position], delta: Position) -> Vec<Position> {
    catalog.iter().map(|p| p + delta).collect()
}

#[test]
fn test_arrangement_is_deterministic_and_ordered() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);

    for _ in 0..500 {
        let verts = [
            Position::new(rng.random_range(-50.0..50.0), rng.random_range(-50.0..50.0)),
            Position::new(rng.random_range(-50.0..50.0), rng.random_range(-50.0..50.0)),
            Position::new(rng.random_range(-50.0..50.0), rng.random_range(-50.0..50.0)),
        ];
        let first = Triangle::arrange(verts, [0, 1, 2]);
        let second = Triangle::arrange(verts, [0, 1, 2]);
        assert_eq!(first, second);

        let (ab, ac, bc) = first.side_lengths();
        assert!(ab <= ac + 1e-12, "AB {ab} > AC {ac}");
        assert!(ac <= bc + 1e-12, "AC {ac} > BC {bc}");
    }
}

#[test]
fn test_arrangement_ties_follow_catalog_order() {
    // Isosceles: sides (0,2) and (1,2) tie exactly, (0,2) is taken as shortest
    let verts = [
        Position::new(0.0, 0.0),
        Position::new(4.0, 0.0),
        Position::new(2.0, 3.0),
    ];
    let tri = Triangle::arrange(verts, [10, 11, 12]);
    assert_eq!(tri.indices, [12, 10, 11]);
    assert_eq!(tri, Triangle::arrange(verts, [10, 11, 12]));
}

#[test]
fn test_invariant_translation_equivariance() {
    let mut rng = ChaCha8Rng::seed_from_u64(99);

    for _ in 0..200 {
        let verts = [
            Position::new(rng.random_range(0.0..100.0), rng.random_range(0.0..100.0)),
            Position::new(rng.random_range(0.0..100.0), rng.random_range(0.0..100.0)),
            Position::new(rng.random_range(0.0..100.0), rng.random_range(0.0..100.0)),
        ];
        let tri = Triangle::arrange(verts, [0, 1, 2]);
        let (ab, ac, bc) = tri.side_lengths();
        if ab < 1.0 || (ac - ab) < 1e-6 || (bc - ac) < 1e-6 {
            continue;
        }

        let delta = Position::new(rng.random_range(-500.0..500.0), rng.random_range(-500.0..500.0));
        let moved = Triangle::arrange(
            [verts[0] + delta, verts[1] + delta, verts[2] + delta],
            [0, 1, 2],
        );

        let inv = tri.invariant();
        let inv_moved = moved.invariant();
        assert_relative_eq!(inv.x_t, inv_moved.x_t, max_relative = 1e-9);
        assert_relative_eq!(inv.y_t, inv_moved.y_t, max_relative = 1e-9);
        assert_eq!(tri.translated(&delta).indices, moved.indices);
    }
}

#[test]
fn test_offset_round_trip() {
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    let reference = random_catalog(&mut rng, 8, 200.0);
    let v = Position::new(7.3, -4.1);
    let current = shifted(&reference, v);

    let result = match_catalogs(&reference, &current).unwrap();

    assert!(!result.matches.is_empty());
    assert_relative_eq!(result.offset.x, -v.x, epsilon = 0.1);
    assert_relative_eq!(result.offset.y, -v.y, epsilon = 0.1);
    assert_eq!(result.triangle_counts, (56, 56));
}

#[test]
fn test_offset_with_centroid_jitter() {
    let mut rng = ChaCha8Rng::seed_from_u64(31);
    let reference = random_catalog(&mut rng, 7, 150.0);
    let v = Position::new(-12.0, 3.5);
    let current: Vec<Position> = reference
        .iter()
        .map(|p| {
            p + v + Position::new(rng.random_range(-0.05..0.05), rng.random_range(-0.05..0.05))
        })
        .collect();

    let result = match_catalogs(&reference, &current).unwrap();
    assert_relative_eq!(result.offset.x, -v.x, epsilon = 0.1);
    assert_relative_eq!(result.offset.y, -v.y, epsilon = 0.1);
}

#[test]
fn test_survives_star_dropout() {
    let mut rng = ChaCha8Rng::seed_from_u64(4242);
    let reference = random_catalog(&mut rng, 8, 200.0);
    let v = Position::new(2.0, 2.0);
    let mut current = shifted(&reference, v);
    current.remove(3);

    let result = match_catalogs(&reference, &current).unwrap();
    assert_relative_eq!(result.offset.x, -2.0, epsilon = 0.1);
    assert_relative_eq!(result.offset.y, -2.0, epsilon = 0.1);
    for (r, _) in &result.matches {
        assert!(!r.indices.contains(&3));
    }
}

#[test]
fn test_survives_extra_star() {
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let reference = random_catalog(&mut rng, 6, 120.0);
    let v = Position::new(-1.5, 6.0);
    let mut current = shifted(&reference, v);
    current.insert(0, Position::new(60.0, 61.0));

    let result = match_catalogs(&reference, &current).unwrap();
    assert_relative_eq!(result.offset.x, 1.5, epsilon = 0.1);
    assert_relative_eq!(result.offset.y, -6.0, epsilon = 0.1);
}

#[test]
fn test_scaled_field_does_not_match() {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let reference = random_catalog(&mut rng, 6, 100.0);
    let current: Vec<Position> = reference.iter().map(|p| p * 2.0).collect();

    let err = match_catalogs(&reference, &current).unwrap_err();
    assert!(matches!(err, MatchError::NoVerifiedMatches { .. }));
}

#[test]
fn test_too_few_stars() {
    let two = vec![Position::new(0.0, 0.0), Position::new(5.0, 5.0)];
    let three = vec![
        Position::new(0.0, 0.0),
        Position::new(5.0, 5.0),
        Position::new(9.0, 1.0),
    ];
    assert_eq!(
        match_catalogs(&two, &three).unwrap_err(),
        MatchError::NotEnoughStars {
            catalog: "reference",
            count: 2
        }
    );
    assert!(matches!(
        match_catalogs(&three, &two),
        Err(MatchError::NotEnoughStars {
            catalog: "current",
            ..
        })
    ));
}

#[test]
fn test_potential_matches_respect_cap() {
    let mut rng = ChaCha8Rng::seed_from_u64(77);
    let reference = random_catalog(&mut rng, 10, 300.0);
    let current = shifted(&reference, Position::new(1.0, 1.0));

    let matcher = TriangleMatcher::new(MatchConfig {
        max_potential_matches: 4,
        ..MatchConfig::default()
    });
    let result = matcher.match_catalogs(&reference, &current).unwrap();
    assert!(result.potential_matches <= 4);
    assert!(result.matches.len() <= 4);
}

#[test]
fn test_zero_budget_is_exceeded() {
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let reference = random_catalog(&mut rng, 40, 500.0);
    let current = shifted(&reference, Position::new(1.0, 1.0));

    let matcher = TriangleMatcher::new(MatchConfig {
        time_budget: Some(Duration::ZERO),
        ..MatchConfig::default()
    });
    assert_eq!(
        matcher.match_catalogs(&reference, &current).unwrap_err(),
        MatchError::BudgetExceeded
    );
}

#[test]
fn test_invalid_config_rejected() {
    let matcher = TriangleMatcher::new(MatchConfig {
        relative_tolerance: 0.0,
        ..MatchConfig::default()
    });
    let pts = vec![
        Position::new(0.0, 0.0),
        Position::new(5.0, 5.0),
        Position::new(9.0, 1.0),
    ];
    assert!(matches!(
        matcher.match_catalogs(&pts, &pts),
        Err(MatchError::ArgumentError(_))
    ));
}

#[test]
fn test_default_config() {
    let config = MatchConfig::default();
    assert_eq!(config.relative_tolerance, 0.02);
    assert_eq!(config.vertex_tolerance, 2.0);
    assert_eq!(config.max_potential_matches, 10);
    assert!(config.time_budget.is_none());
}
