//! Distance-bound constraints on connection length.

use geo::Euclidean;
use geo::line_measures::Distance;

use crate::constraint::ConnectionConstraint;
use crate::grid::Grid;
use crate::point::Point;

/// Euclidean distance between two grid points.
fn point_distance(p1: &Point, p2: &Point) -> f64 {
    Euclidean.distance(&p1.position().to_geo_point(), &p2.position().to_geo_point())
}

/// Rejects connections longer than a maximum Euclidean length.
///
/// On an 8-connected grid a bound below `√2` forbids diagonal links.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaxDistanceConstraint {
    max_distance: f64,
}

impl MaxDistanceConstraint {
    /// Registry name.
    pub const NAME: &'static str = "max-distance";

    /// Create a constraint with the given upper bound.
    #[must_use]
    pub const fn new(max_distance: f64) -> Self {
        Self { max_distance }
    }

    /// The current upper bound.
    #[must_use]
    pub const fn max_distance(&self) -> f64 {
        self.max_distance
    }
}

impl ConnectionConstraint for MaxDistanceConstraint {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> String {
        format!(
            "limits connections to a maximum distance of {}",
            self.max_distance
        )
    }

    fn validate(&self, _grid: &Grid, p1: &Point, p2: &Point) -> bool {
        point_distance(p1, p2) <= self.max_distance
    }
}

/// Rejects connections shorter than a minimum Euclidean length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinDistanceConstraint {
    min_distance: f64,
}

impl MinDistanceConstraint {
    /// Registry name.
    pub const NAME: &'static str = "min-distance";

    /// Create a constraint with the given lower bound.
    #[must_use]
    pub const fn new(min_distance: f64) -> Self {
        Self { min_distance }
    }

    /// The current lower bound.
    #[must_use]
    pub const fn min_distance(&self) -> f64 {
        self.min_distance
    }
}

impl ConnectionConstraint for MinDistanceConstraint {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> String {
        format!(
            "requires connections to be at least distance {}",
            self.min_distance
        )
    }

    fn validate(&self, _grid: &Grid, p1: &Point, p2: &Point) -> bool {
        point_distance(p1, p2) >= self.min_distance
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{GridConfig, Position};

    fn grid() -> Grid {
        Grid::new(&GridConfig::with_dimensions(3, 3)).unwrap()
    }

    #[test]
    fn max_distance_one_forbids_diagonals() {
        let grid = grid();
        let c = MaxDistanceConstraint::new(1.0);
        let origin = grid.point(Position::new(0, 0)).unwrap();
        let right = grid.point(Position::new(1, 0)).unwrap();
        let diagonal = grid.point(Position::new(1, 1)).unwrap();
        assert!(c.validate(&grid, origin, right));
        assert!(!c.validate(&grid, origin, diagonal));
    }

    #[test]
    fn min_distance_can_require_diagonals() {
        let grid = grid();
        let c = MinDistanceConstraint::new(1.2);
        let origin = grid.point(Position::new(0, 0)).unwrap();
        let below = grid.point(Position::new(0, 1)).unwrap();
        let diagonal = grid.point(Position::new(1, 1)).unwrap();
        assert!(!c.validate(&grid, origin, below));
        assert!(c.validate(&grid, origin, diagonal));
    }

    #[test]
    fn descriptions_mention_bound() {
        assert_eq!(
            MaxDistanceConstraint::new(2.0).description(),
            "limits connections to a maximum distance of 2"
        );
        assert_eq!(MinDistanceConstraint::new(1.0).name(), "min-distance");
        assert!((MinDistanceConstraint::new(1.0).min_distance() - 1.0).abs() < f64::EPSILON);
    }
}
