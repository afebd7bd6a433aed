//! Integration tests: whole builds and manual connections through the
//! public API.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use gridlink_core::{
    BuildState, Chain, ChainBuilder, Grid, GridConfig, GridError, NonCrossingConstraint, Position,
    Segment, audit, fingerprint, segments_cross,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

const fn pos(x: u32, y: u32) -> Position {
    Position::new(x, y)
}

fn builder(rows: u32, cols: u32, max: u32) -> ChainBuilder {
    gridlink_core::initialize(&GridConfig {
        rows,
        cols,
        max_connection_count: max,
        ..GridConfig::default()
    })
    .unwrap()
}

// --- Full builds ---

#[test]
fn three_by_three_capacity_two_covers_without_crossings() {
    init_tracing();
    let mut b = builder(3, 3, 2);
    let outcome = b.build_all();

    assert!(outcome.is_complete());
    assert!(outcome.chains.iter().all(|c| c.len() <= 3));
    let covered: usize = outcome.chains.iter().map(Chain::len).sum();
    assert_eq!(covered, 9);

    let report = audit(b.grid(), b.chains());
    assert!(report.crossings.is_empty());
    assert!(report.is_clean(), "{report:?}");
}

#[test]
fn single_row_is_one_chain() {
    let mut b = builder(1, 5, 4);
    let outcome = b.build_all();

    assert!(outcome.is_complete());
    assert_eq!(outcome.chains.len(), 1);
    let points: Vec<Position> = outcome.chains[0].points().collect();
    assert_eq!(points, (0..5).map(|x| pos(x, 0)).collect::<Vec<_>>());
}

#[test]
fn two_by_two_capacity_one_is_two_pairs() {
    let mut b = builder(2, 2, 1);
    let outcome = b.build_all();

    assert!(outcome.is_complete());
    assert_eq!(outcome.chains.len(), 2);
    assert!(outcome.chains.iter().all(|c| c.len() == 2));
    assert_eq!(b.diagnostics().steps, 4);
}

#[test]
fn default_grid_build_counts() {
    init_tracing();
    let mut b = gridlink_core::initialize(&GridConfig::default()).unwrap();
    let outcome = b.build_all();

    assert!(outcome.is_complete());
    assert!(b.validate_solution());
    let diagnostics = b.diagnostics();
    assert_eq!(diagnostics.steps, 27);
    assert_eq!(diagnostics.commits, 18);
    assert_eq!(diagnostics.chains_finalized, 7);
    assert_eq!(diagnostics.final_state, Some(BuildState::AllCovered));
    assert!(audit(b.grid(), b.chains()).is_clean());
}

#[test]
fn crossing_allowed_build_is_consistent() {
    let mut b = gridlink_core::initialize(&GridConfig {
        rows: 6,
        cols: 7,
        non_crossing: false,
        ..GridConfig::default()
    })
    .unwrap();
    let outcome = b.build_all();

    assert!(outcome.is_complete());
    let report = audit(b.grid(), b.chains());
    assert!(report.uncovered.is_empty());
    assert!(report.degree_violations.is_empty());
    assert!(report.invalid_chains.is_empty());
    assert!(report.partition_mismatches.is_empty());
}

#[test]
fn diagonal_only_grids_with_crossings_are_covered() {
    init_tracing();
    let cases = [
        (4, 5, 2, 8),
        (4, 5, 4, 5),
        (4, 5, 5, 5),
        (5, 4, 2, 8),
        (5, 4, 5, 6),
    ];
    for (rows, cols, max, chains) in cases {
        let mut b = gridlink_core::initialize(&GridConfig {
            rows,
            cols,
            max_connection_count: max,
            non_crossing: false,
            min_distance: Some(1.2),
            max_distance: None,
        })
        .unwrap();
        let outcome = b.build_all();

        let label = format!("{rows}x{cols} capacity {max}");
        assert!(outcome.is_complete(), "{label}: {:?}", outcome.residual);
        assert_eq!(outcome.chains.len(), chains, "{label}");
        assert!(
            outcome
                .chains
                .iter()
                .flat_map(Chain::segments)
                .all(|s| s.a().x != s.b().x && s.a().y != s.b().y),
            "{label}: orthogonal connection"
        );
        let report = audit(b.grid(), b.chains());
        assert!(report.uncovered.is_empty(), "{label}");
        assert!(report.degree_violations.is_empty(), "{label}");
        assert!(report.invalid_chains.is_empty(), "{label}");
        assert!(report.partition_mismatches.is_empty(), "{label}");
    }
}

// --- Stuck builds ---

#[test]
fn single_point_grid_reports_residual() {
    let mut b = builder(1, 1, 3);
    let outcome = b.build_all();

    assert_eq!(b.state(), BuildState::Stuck);
    assert!(outcome.chains.is_empty());
    assert_eq!(outcome.residual, Some(vec![pos(0, 0)]));
}

#[test]
fn odd_row_with_pair_chains_leaves_one_point() {
    let mut b = builder(1, 3, 1);
    let outcome = b.build_all();

    assert_eq!(outcome.chains.len(), 1);
    assert_eq!(outcome.residual, Some(vec![pos(2, 0)]));
    assert!(!b.validate_solution());

    let stats = b.coverage_stats();
    assert_eq!(stats.connected_points, 2);
    assert_eq!(stats.unconnected_points, 1);

    let report = audit(b.grid(), b.chains());
    assert!(report.is_consistent());
    assert_eq!(report.uncovered, vec![pos(2, 0)]);
}

// --- Step-wise builds ---

#[test]
fn stepwise_matches_build_all() {
    let config = GridConfig {
        rows: 4,
        cols: 6,
        max_connection_count: 4,
        ..GridConfig::default()
    };
    let mut one_shot = gridlink_core::initialize(&config).unwrap();
    let expected = one_shot.build_all();

    let mut stepped = gridlink_core::initialize(&config).unwrap();
    stepped.start_animated_build();
    assert_eq!(stepped.state(), BuildState::SelectingStart);
    let mut steps = 0;
    while stepped.build_step() {
        steps += 1;
        assert!(audit(stepped.grid(), stepped.chains()).is_consistent());
    }

    assert!(stepped.is_animation_complete());
    assert_eq!(steps + 1, stepped.diagnostics().steps);
    assert_eq!(stepped.outcome(), expected);
    assert_eq!(
        fingerprint(stepped.grid(), stepped.chains()),
        fingerprint(one_shot.grid(), one_shot.chains())
    );
}

#[test]
fn rebuild_after_reset_is_identical() {
    let mut b = builder(5, 4, 2);
    let first = b.build_all();
    let first_print = fingerprint(b.grid(), b.chains());

    b.reset();
    assert_eq!(b.state(), BuildState::Idle);
    assert_eq!(b.grid().connected_count(), 0);
    assert!(b.grid().segments().is_empty());

    let second = b.build_all();
    assert_eq!(first, second);
    assert_eq!(first_print, fingerprint(b.grid(), b.chains()));
}

#[test]
fn toggling_non_crossing_between_builds() {
    let mut b = builder(4, 4, 3);
    assert!(b.grid_mut().constraints_mut().disable(NonCrossingConstraint::NAME));
    assert!(b.build_all().is_complete());

    assert!(b.grid_mut().constraints_mut().enable(NonCrossingConstraint::NAME));
    assert!(b.build_all().is_complete());
    assert!(audit(b.grid(), b.chains()).crossings.is_empty());
}

// --- Manual connections ---

#[test]
fn full_degree_points_reject_connection_unchanged() {
    let mut grid = Grid::new(&GridConfig::with_dimensions(3, 3)).unwrap();
    grid.add_connection(pos(0, 0), pos(1, 0)).unwrap();
    grid.add_connection(pos(1, 0), pos(2, 0)).unwrap();
    grid.add_connection(pos(0, 1), pos(1, 1)).unwrap();
    grid.add_connection(pos(1, 1), pos(2, 1)).unwrap();

    let top = grid.point(pos(1, 0)).unwrap().clone();
    let middle = grid.point(pos(1, 1)).unwrap().clone();
    let segments = grid.segments().len();

    let err = grid.add_connection(pos(1, 0), pos(1, 1)).unwrap_err();
    assert_eq!(err, GridError::DegreeExceeded(pos(1, 0)));
    assert_eq!(grid.point(pos(1, 0)).unwrap(), &top);
    assert_eq!(grid.point(pos(1, 1)).unwrap(), &middle);
    assert_eq!(grid.segments().len(), segments);
}

#[test]
fn segments_sharing_an_endpoint_do_not_cross() {
    let straight = [
        Segment::new(pos(0, 0), pos(1, 0)),
        Segment::new(pos(1, 0), pos(2, 0)),
    ];
    let bent = [
        Segment::new(pos(0, 0), pos(1, 1)),
        Segment::new(pos(1, 1), pos(2, 0)),
    ];
    let diagonal = [
        Segment::new(pos(0, 0), pos(1, 1)),
        Segment::new(pos(1, 1), pos(2, 2)),
    ];
    for [s, t] in [straight, bent, diagonal] {
        assert!(!segments_cross(&s, &t), "{s} vs {t}");
    }
}

#[test]
fn chain_extension_through_shared_endpoint_validates() {
    let mut grid = Grid::new(&GridConfig::with_dimensions(3, 3)).unwrap();
    grid.add_connection(pos(0, 0), pos(1, 1)).unwrap();

    let result = grid.validate_connection(pos(1, 1), pos(2, 2)).unwrap();
    assert!(result.is_valid(), "{result}");
    grid.add_connection(pos(1, 1), pos(2, 2)).unwrap();

    let result = grid.validate_connection(pos(0, 1), pos(1, 1));
    assert!(!result.unwrap().is_valid(), "(1,1) is at full degree");
}

#[test]
fn crossing_diagonal_is_rejected() {
    let mut grid = Grid::new(&GridConfig::with_dimensions(2, 2)).unwrap();
    grid.add_connection(pos(0, 0), pos(1, 1)).unwrap();

    let err = grid.add_connection(pos(1, 0), pos(0, 1)).unwrap_err();
    match err {
        GridError::ConstraintViolation(result) => {
            assert_eq!(
                result.failed_constraints().collect::<Vec<_>>(),
                vec![NonCrossingConstraint::NAME]
            );
        }
        other => unreachable!("unexpected error: {other}"),
    }
}
