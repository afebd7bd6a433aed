//! The point grid: owns every [`Point`], computes 8-directional
//! adjacency, and is the only place connection state is mutated.

use crate::chain::ChainId;
use crate::constraint::{ConstraintEngine, ValidationResult};
use crate::point::Point;
use crate::types::{GridConfig, GridError, Position, Segment};

/// Neighbor offsets `(dx, dy)` in row-major order.
///
/// The order is part of the builder's determinism: candidates are always
/// enumerated in this sequence.
pub const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Borrow two distinct points mutably.
fn pair_mut(points: &mut [Point], i: usize, j: usize) -> (&mut Point, &mut Point) {
    debug_assert_ne!(i, j, "pair_mut requires distinct indices");
    if i < j {
        let (left, right) = points.split_at_mut(j);
        (&mut left[i], &mut right[0])
    } else {
        let (left, right) = points.split_at_mut(i);
        (&mut right[0], &mut left[j])
    }
}

/// A rectangular grid of points with a constraint engine.
#[derive(Debug)]
pub struct Grid {
    rows: u32,
    cols: u32,
    points: Vec<Point>,
    engine: ConstraintEngine,
    segments: Vec<Segment>,
    connected_count: usize,
}

impl Grid {
    /// Create a grid and its constraint registry from `config`.
    ///
    /// # Errors
    ///
    /// Returns the error from [`GridConfig::validate`] for malformed
    /// dimensions, capacity, or distance bounds.
    pub fn new(config: &GridConfig) -> Result<Self, GridError> {
        config.validate()?;
        Ok(Self::with_engine(
            config.rows,
            config.cols,
            ConstraintEngine::from_config(config),
        ))
    }

    /// Create a grid with a caller-assembled constraint engine.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::InvalidGridDimensions`] if `rows` or `cols`
    /// is zero.
    pub fn with_constraints(
        rows: u32,
        cols: u32,
        engine: ConstraintEngine,
    ) -> Result<Self, GridError> {
        if rows == 0 || cols == 0 {
            return Err(GridError::InvalidGridDimensions { rows, cols });
        }
        Ok(Self::with_engine(rows, cols, engine))
    }

    fn with_engine(rows: u32, cols: u32, engine: ConstraintEngine) -> Self {
        let points = (0..rows)
            .flat_map(|y| (0..cols).map(move |x| Point::new(Position::new(x, y))))
            .collect();
        Self {
            rows,
            cols,
            points,
            engine,
            segments: Vec::new(),
            connected_count: 0,
        }
    }

    /// Number of rows.
    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Number of columns.
    #[must_use]
    pub const fn cols(&self) -> u32 {
        self.cols
    }

    /// Total number of points.
    #[must_use]
    pub fn total_points(&self) -> usize {
        self.points.len()
    }

    /// Returns `true` if `p` lies on the grid.
    #[must_use]
    pub const fn contains(&self, p: Position) -> bool {
        p.x < self.cols && p.y < self.rows
    }

    fn index(&self, p: Position) -> Option<usize> {
        self.contains(p)
            .then(|| p.y as usize * self.cols as usize + p.x as usize)
    }

    fn index_or_err(&self, p: Position) -> Result<usize, GridError> {
        self.index(p).ok_or(GridError::OutOfBounds(p))
    }

    /// The point at `p`.
    #[must_use]
    pub fn point(&self, p: Position) -> Option<&Point> {
        self.index(p).map(|i| &self.points[i])
    }

    /// All points in row-major order.
    pub fn points(&self) -> impl ExactSizeIterator<Item = &Point> {
        self.points.iter()
    }

    /// Points that belong to a chain, in row-major order.
    pub fn connected_points(&self) -> impl Iterator<Item = &Point> {
        self.points.iter().filter(|p| p.is_connected())
    }

    /// Points that belong to no chain, in row-major order.
    pub fn unconnected_points(&self) -> impl Iterator<Item = &Point> {
        self.points.iter().filter(|p| !p.is_connected())
    }

    /// Number of points that belong to a chain.
    #[must_use]
    pub const fn connected_count(&self) -> usize {
        self.connected_count
    }

    /// Fraction of points that belong to a chain, in `[0, 1]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn connection_progress(&self) -> f64 {
        if self.points.is_empty() {
            return 0.0;
        }
        self.connected_count as f64 / self.points.len() as f64
    }

    /// Committed connections in commit order.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The in-bounds points at Chebyshev distance 1, in
    /// [`NEIGHBOR_OFFSETS`] order.
    pub fn neighbors(&self, p: Position) -> impl Iterator<Item = Position> + '_ {
        NEIGHBOR_OFFSETS
            .iter()
            .filter_map(move |&(dx, dy)| p.offset(dx, dy))
            .filter(|q| self.contains(*q))
    }

    /// Number of neighbors of `p` that belong to no chain.
    #[must_use]
    pub fn unconnected_neighbor_count(&self, p: Position) -> usize {
        self.neighbors(p)
            .filter(|q| self.point(*q).is_some_and(|point| !point.is_connected()))
            .count()
    }

    /// The constraint registry.
    #[must_use]
    pub const fn constraints(&self) -> &ConstraintEngine {
        &self.engine
    }

    /// Mutable access to the constraint registry (add, remove, toggle).
    pub const fn constraints_mut(&mut self) -> &mut ConstraintEngine {
        &mut self.engine
    }

    /// Fast check: `true` iff every enabled constraint accepts the
    /// connection. Out-of-bounds positions are never allowed.
    #[must_use]
    pub fn allows_connection(&self, p1: Position, p2: Position) -> bool {
        match (self.point(p1), self.point(p2)) {
            (Some(a), Some(b)) => self.engine.allows(self, a, b),
            _ => false,
        }
    }

    /// Full evaluation of a candidate connection. Mutates nothing.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::OutOfBounds`] if either position is off the
    /// grid.
    pub fn validate_connection(
        &self,
        p1: Position,
        p2: Position,
    ) -> Result<ValidationResult, GridError> {
        let a = &self.points[self.index_or_err(p1)?];
        let b = &self.points[self.index_or_err(p2)?];
        Ok(self.engine.evaluate(self, a, b))
    }

    /// Validate and commit a connection.
    ///
    /// Point-level invariants are checked first, then every enabled
    /// constraint. Only when all pass are both points linked, the segment
    /// recorded with every constraint, and the segment list extended.
    /// On error nothing is mutated.
    ///
    /// # Errors
    ///
    /// - [`GridError::OutOfBounds`] if either position is off the grid.
    /// - [`GridError::NotAdjacent`] if the points are equal or not
    ///   8-directionally adjacent.
    /// - [`GridError::DuplicateConnection`] if they are already linked.
    ///   This is checked before the degree bound, so two linked points
    ///   that are both at degree 2 report the duplicate.
    /// - [`GridError::DegreeExceeded`] if either already has two links.
    /// - [`GridError::ConstraintViolation`] if an enabled constraint
    ///   rejects the connection.
    pub fn add_connection(&mut self, p1: Position, p2: Position) -> Result<Segment, GridError> {
        let i = self.index_or_err(p1)?;
        let j = self.index_or_err(p2)?;
        if !p1.is_adjacent_to(p2) {
            return Err(GridError::NotAdjacent(p1, p2));
        }
        let segment = Segment::new(p1, p2);
        let (a, b) = (&self.points[i], &self.points[j]);
        if a.is_linked_to(p2) {
            return Err(GridError::DuplicateConnection(segment));
        }
        for point in [a, b] {
            if !point.can_accept_connection() {
                return Err(GridError::DegreeExceeded(point.position()));
            }
        }
        let result = self.engine.evaluate(self, a, b);
        if !result.is_valid() {
            return Err(GridError::ConstraintViolation(result));
        }

        let (a, b) = pair_mut(&mut self.points, i, j);
        a.add_connection(b)?;
        self.engine.record_connection(segment);
        self.segments.push(segment);
        Ok(segment)
    }

    /// Record that the point at `p` belongs to `chain`.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::OutOfBounds`] for an off-grid position or
    /// [`GridError::AlreadyInChain`] if the point already has a chain.
    pub fn assign_chain(&mut self, p: Position, chain: ChainId) -> Result<(), GridError> {
        let i = self.index_or_err(p)?;
        let point = &mut self.points[i];
        if point.is_connected() {
            return Err(GridError::AlreadyInChain(p));
        }
        point.set_chain(chain);
        self.connected_count += 1;
        Ok(())
    }

    /// Clear every point and the constraints' tracked state.
    ///
    /// Constraint registrations and enabled flags are kept.
    pub fn reset(&mut self) {
        for point in &mut self.points {
            point.reset();
        }
        self.segments.clear();
        self.connected_count = 0;
        self.engine.clear_tracking();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn pos(x: u32, y: u32) -> Position {
        Position::new(x, y)
    }

    fn grid(rows: u32, cols: u32) -> Grid {
        Grid::new(&GridConfig::with_dimensions(rows, cols)).unwrap()
    }

    #[test]
    fn new_grid_has_row_major_points() {
        let grid = grid(2, 3);
        let positions: Vec<_> = grid.points().map(Point::position).collect();
        assert_eq!(
            positions,
            vec![pos(0, 0), pos(1, 0), pos(2, 0), pos(0, 1), pos(1, 1), pos(2, 1)]
        );
        assert_eq!(grid.total_points(), 6);
        assert_eq!(grid.rows(), 2);
        assert_eq!(grid.cols(), 3);
    }

    #[test]
    fn new_rejects_zero_dimensions() {
        let err = Grid::new(&GridConfig::with_dimensions(3, 0)).unwrap_err();
        assert_eq!(err, GridError::InvalidGridDimensions { rows: 3, cols: 0 });
        let err = Grid::with_constraints(0, 2, ConstraintEngine::new()).unwrap_err();
        assert_eq!(err, GridError::InvalidGridDimensions { rows: 0, cols: 2 });
    }

    #[test]
    fn neighbors_of_center_in_row_major_order() {
        let grid = grid(3, 3);
        let neighbors: Vec<_> = grid.neighbors(pos(1, 1)).collect();
        assert_eq!(
            neighbors,
            vec![
                pos(0, 0),
                pos(1, 0),
                pos(2, 0),
                pos(0, 1),
                pos(2, 1),
                pos(0, 2),
                pos(1, 2),
                pos(2, 2),
            ]
        );
    }

    #[test]
    fn neighbors_of_corner_are_clipped() {
        let grid = grid(3, 3);
        let neighbors: Vec<_> = grid.neighbors(pos(2, 2)).collect();
        assert_eq!(neighbors, vec![pos(1, 1), pos(2, 1), pos(1, 2)]);
    }

    #[test]
    fn single_row_neighbors() {
        let grid = grid(1, 5);
        let neighbors: Vec<_> = grid.neighbors(pos(0, 0)).collect();
        assert_eq!(neighbors, vec![pos(1, 0)]);
    }

    #[test]
    fn add_connection_links_and_records() {
        let mut grid = grid(3, 3);
        let segment = grid.add_connection(pos(0, 0), pos(1, 1)).unwrap();
        assert_eq!(segment, Segment::new(pos(0, 0), pos(1, 1)));
        assert_eq!(grid.segments(), &[segment]);
        assert!(grid.point(pos(0, 0)).unwrap().is_linked_to(pos(1, 1)));
        assert!(grid.point(pos(1, 1)).unwrap().is_linked_to(pos(0, 0)));
    }

    #[test]
    fn add_connection_rejects_crossing() {
        let mut grid = grid(2, 2);
        grid.add_connection(pos(0, 0), pos(1, 1)).unwrap();
        let err = grid.add_connection(pos(1, 0), pos(0, 1)).unwrap_err();
        let GridError::ConstraintViolation(result) = err else {
            unreachable!("expected a constraint violation, got {err:?}");
        };
        assert_eq!(result.failed_constraints().collect::<Vec<_>>(), vec!["non-crossing"]);
        // Nothing changed.
        assert_eq!(grid.segments().len(), 1);
        assert_eq!(grid.point(pos(1, 0)).unwrap().degree(), 0);
        assert_eq!(grid.point(pos(0, 1)).unwrap().degree(), 0);
    }

    #[test]
    fn crossing_allowed_when_constraint_disabled() {
        let mut grid = grid(3, 3);
        assert!(grid.constraints_mut().disable("non-crossing"));
        grid.add_connection(pos(0, 0), pos(1, 1)).unwrap();
        grid.add_connection(pos(1, 0), pos(0, 1)).unwrap();
        grid.add_connection(pos(1, 2), pos(2, 1)).unwrap();
        assert_eq!(grid.segments().len(), 3);

        // Segments committed while disabled are still tracked.
        assert!(grid.constraints_mut().enable("non-crossing"));
        let result = grid.validate_connection(pos(2, 2), pos(1, 1)).unwrap();
        assert_eq!(
            result.failed_constraints().collect::<Vec<_>>(),
            vec!["non-crossing"]
        );
        assert!(grid.allows_connection(pos(2, 2), pos(2, 1)));
    }

    #[test]
    fn add_connection_rejects_non_adjacent() {
        let mut grid = grid(3, 3);
        assert_eq!(
            grid.add_connection(pos(0, 0), pos(2, 0)).unwrap_err(),
            GridError::NotAdjacent(pos(0, 0), pos(2, 0))
        );
        assert_eq!(
            grid.add_connection(pos(1, 1), pos(1, 1)).unwrap_err(),
            GridError::NotAdjacent(pos(1, 1), pos(1, 1))
        );
    }

    #[test]
    fn add_connection_rejects_out_of_bounds() {
        let mut grid = grid(2, 2);
        assert_eq!(
            grid.add_connection(pos(1, 1), pos(2, 2)).unwrap_err(),
            GridError::OutOfBounds(pos(2, 2))
        );
        assert!(!grid.allows_connection(pos(1, 1), pos(2, 2)));
        assert!(grid.validate_connection(pos(5, 5), pos(0, 0)).is_err());
    }

    #[test]
    fn add_connection_rejects_duplicate() {
        let mut grid = grid(2, 2);
        grid.add_connection(pos(0, 0), pos(1, 0)).unwrap();
        assert_eq!(
            grid.add_connection(pos(1, 0), pos(0, 0)).unwrap_err(),
            GridError::DuplicateConnection(Segment::new(pos(0, 0), pos(1, 0)))
        );
    }

    #[test]
    fn duplicate_reported_before_full_degree() {
        let mut grid = grid(1, 4);
        grid.add_connection(pos(0, 0), pos(1, 0)).unwrap();
        grid.add_connection(pos(1, 0), pos(2, 0)).unwrap();
        grid.add_connection(pos(2, 0), pos(3, 0)).unwrap();
        let before: Vec<Point> = grid.points().cloned().collect();

        assert_eq!(
            grid.add_connection(pos(2, 0), pos(1, 0)).unwrap_err(),
            GridError::DuplicateConnection(Segment::new(pos(1, 0), pos(2, 0)))
        );
        assert_eq!(grid.points().cloned().collect::<Vec<_>>(), before);
        assert_eq!(grid.segments().len(), 3);
    }

    #[test]
    fn validate_connection_reports_all_failures() {
        let mut grid = grid(3, 3);
        grid.add_connection(pos(0, 1), pos(1, 1)).unwrap();
        grid.add_connection(pos(1, 1), pos(2, 1)).unwrap();
        let result = grid.validate_connection(pos(1, 1), pos(1, 3)).unwrap_err();
        assert_eq!(result, GridError::OutOfBounds(pos(1, 3)));

        let result = grid.validate_connection(pos(1, 1), pos(0, 1)).unwrap();
        assert_eq!(
            result.failed_constraints().collect::<Vec<_>>(),
            vec!["degree", "unlinked", "non-crossing"]
        );
    }

    #[test]
    fn assign_chain_counts_points_once() {
        let mut grid = grid(2, 2);
        grid.assign_chain(pos(0, 0), ChainId(0)).unwrap();
        assert_eq!(
            grid.assign_chain(pos(0, 0), ChainId(1)).unwrap_err(),
            GridError::AlreadyInChain(pos(0, 0))
        );
        assert_eq!(grid.connected_count(), 1);
        assert!((grid.connection_progress() - 0.25).abs() < f64::EPSILON);
        assert_eq!(grid.unconnected_points().count(), 3);
        assert_eq!(grid.connected_points().count(), 1);
        assert_eq!(grid.unconnected_neighbor_count(pos(1, 1)), 2);
    }

    #[test]
    fn reset_clears_state_but_keeps_registry() {
        let mut grid = grid(2, 2);
        grid.constraints_mut().disable("non-crossing");
        grid.add_connection(pos(0, 0), pos(1, 1)).unwrap();
        grid.assign_chain(pos(0, 0), ChainId(0)).unwrap();
        grid.reset();

        assert!(grid.segments().is_empty());
        assert_eq!(grid.connected_count(), 0);
        assert!(grid.points().all(|p| p.degree() == 0 && !p.is_connected()));
        assert!(!grid.constraints().is_enabled("non-crossing"));

        // Previously committed diagonal no longer blocks the other one.
        grid.constraints_mut().enable("non-crossing");
        assert!(grid.allows_connection(pos(1, 0), pos(0, 1)));
    }
}
