//! Shared types for the gridlink chain builder.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::chain::{Chain, ChainId};
use crate::constraint::ValidationResult;

/// A cell coordinate on the grid.
///
/// Coordinates are unique per point, so a `Position` doubles as the
/// non-owning reference to the [`Point`](crate::Point) stored at it.
/// Ordering is lexicographic on `(x, y)`, which is the order used to
/// normalize [`Segment`]s.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Position {
    /// Column index (0 at the left edge).
    pub x: u32,
    /// Row index (0 at the top edge).
    pub y: u32,
}

impl Position {
    /// Create a new position.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Chebyshev (chessboard) distance to another position.
    #[must_use]
    pub const fn chebyshev_distance(self, other: Self) -> u32 {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        if dx > dy { dx } else { dy }
    }

    /// Returns `true` if `other` is one of the 8 surrounding cells.
    #[must_use]
    pub const fn is_adjacent_to(self, other: Self) -> bool {
        self.chebyshev_distance(other) == 1
    }

    /// The position shifted by `(dx, dy)`, or `None` on underflow/overflow.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Option<Self> {
        match (self.x.checked_add_signed(dx), self.y.checked_add_signed(dy)) {
            (Some(x), Some(y)) => Some(Self { x, y }),
            _ => None,
        }
    }

    /// Integer `geo` coordinate for exact orientation tests.
    #[must_use]
    pub fn to_coord(self) -> geo::Coord<i64> {
        geo::Coord {
            x: i64::from(self.x),
            y: i64::from(self.y),
        }
    }

    /// Floating-point `geo` point for metric computations.
    #[must_use]
    pub fn to_geo_point(self) -> geo::Point<f64> {
        geo::Point::new(f64::from(self.x), f64::from(self.y))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// An undirected connection between two distinct points.
///
/// Always stored normalized: `a < b`. Two segments compare equal iff they
/// join the same pair of points regardless of construction order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Segment {
    a: Position,
    b: Position,
}

impl Segment {
    /// Create a normalized segment between two positions.
    #[must_use]
    pub fn new(p: Position, q: Position) -> Self {
        if p <= q {
            Self { a: p, b: q }
        } else {
            Self { a: q, b: p }
        }
    }

    /// The smaller endpoint.
    #[must_use]
    pub const fn a(&self) -> Position {
        self.a
    }

    /// The larger endpoint.
    #[must_use]
    pub const fn b(&self) -> Position {
        self.b
    }

    /// Returns `true` if `p` is one of the two endpoints.
    #[must_use]
    pub fn has_endpoint(&self, p: Position) -> bool {
        self.a == p || self.b == p
    }

    /// Number of endpoints shared with `other` (0, 1 or 2).
    #[must_use]
    pub fn shared_endpoints(&self, other: &Self) -> usize {
        usize::from(other.has_endpoint(self.a)) + usize::from(other.has_endpoint(self.b))
    }

    /// The segment as an integer `geo::Line`.
    #[must_use]
    pub fn to_line(&self) -> geo::Line<i64> {
        geo::Line::new(self.a.to_coord(), self.b.to_coord())
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.a, self.b)
    }
}

/// Configuration for a grid and the chains built on it.
///
/// Every option the builder honors is enumerated here; there are no
/// hidden defaults inside [`Grid::new`](crate::Grid::new). Use
/// [`validate`](Self::validate) (called by every constructor) to check
/// the invariants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Number of rows (y extent). Must be at least 1.
    pub rows: u32,

    /// Number of columns (x extent). Must be at least 1.
    pub cols: u32,

    /// Maximum connections per chain. A chain holds at most
    /// `max_connection_count + 1` points. Must be at least 1.
    pub max_connection_count: u32,

    /// Whether the non-crossing constraint starts enabled.
    ///
    /// The constraint is always registered so it can be toggled later.
    pub non_crossing: bool,

    /// Optional lower bound on the Euclidean length of a connection.
    pub min_distance: Option<f64>,

    /// Optional upper bound on the Euclidean length of a connection.
    pub max_distance: Option<f64>,
}

impl GridConfig {
    /// Default number of rows.
    pub const DEFAULT_ROWS: u32 = 5;
    /// Default number of columns.
    pub const DEFAULT_COLS: u32 = 5;
    /// Default chain capacity in connections.
    pub const DEFAULT_MAX_CONNECTION_COUNT: u32 = 3;
    /// Default non-crossing setting.
    pub const DEFAULT_NON_CROSSING: bool = true;

    /// Config for a `rows` x `cols` grid with the remaining defaults.
    #[must_use]
    pub fn with_dimensions(rows: u32, cols: u32) -> Self {
        Self {
            rows,
            cols,
            ..Self::default()
        }
    }

    /// Total number of points on the grid.
    #[must_use]
    pub fn total_points(&self) -> usize {
        self.rows as usize * self.cols as usize
    }

    /// Check construction-time invariants.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::InvalidGridDimensions`] if `rows` or `cols`
    /// is zero, [`GridError::InvalidChainCapacity`] if
    /// `max_connection_count` is zero, and [`GridError::InvalidConfig`]
    /// for non-finite, negative, or inverted distance bounds.
    pub fn validate(&self) -> Result<(), GridError> {
        if self.rows == 0 || self.cols == 0 {
            return Err(GridError::InvalidGridDimensions {
                rows: self.rows,
                cols: self.cols,
            });
        }
        if self.max_connection_count == 0 {
            return Err(GridError::InvalidChainCapacity(self.max_connection_count));
        }
        for (name, bound) in [
            ("min_distance", self.min_distance),
            ("max_distance", self.max_distance),
        ] {
            if let Some(value) = bound
                && !(value.is_finite() && value >= 0.0)
            {
                return Err(GridError::InvalidConfig(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.min_distance, self.max_distance)
            && min > max
        {
            return Err(GridError::InvalidConfig(format!(
                "min_distance ({min}) exceeds max_distance ({max})"
            )));
        }
        Ok(())
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            rows: Self::DEFAULT_ROWS,
            cols: Self::DEFAULT_COLS,
            max_connection_count: Self::DEFAULT_MAX_CONNECTION_COUNT,
            non_crossing: Self::DEFAULT_NON_CROSSING,
            min_distance: None,
            max_distance: None,
        }
    }
}

/// Result of a complete build.
///
/// A build that cannot reach full coverage is not an error: `residual`
/// lists the points left uncovered, and every chain in `chains` is still
/// a valid, invariant-satisfying chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildOutcome {
    /// Finalized chains in creation order.
    pub chains: Vec<Chain>,
    /// Points left uncovered when the build got stuck, in row-major order.
    /// `None` when every point belongs to a chain.
    pub residual: Option<Vec<Position>>,
}

impl BuildOutcome {
    /// Returns `true` if every point was covered.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.residual.is_none()
    }
}

/// Coverage summary for the current grid state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageStats {
    /// Total number of points on the grid.
    pub total_points: usize,
    /// Points that belong to a chain.
    pub connected_points: usize,
    /// Points that belong to no chain.
    pub unconnected_points: usize,
    /// `connected_points / total_points * 100`.
    pub coverage_percentage: f64,
    /// Number of finalized chains.
    pub total_chains: usize,
    /// Mean number of connections per finalized chain (0 when empty).
    pub average_chain_length: f64,
}

/// Errors raised by grid construction and manual connection attempts.
///
/// Search-time rejections inside the builder are consumed by candidate
/// filtering and never surface as errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum GridError {
    /// Rows or columns were zero.
    #[error("grid dimensions must be at least 1x1, got {rows}x{cols}")]
    InvalidGridDimensions {
        /// Requested rows.
        rows: u32,
        /// Requested columns.
        cols: u32,
    },

    /// Chain capacity was below 1.
    #[error("max connection count must be at least 1, got {0}")]
    InvalidChainCapacity(u32),

    /// Some other configuration value is invalid.
    #[error("invalid grid configuration: {0}")]
    InvalidConfig(String),

    /// The coordinate lies outside the grid.
    #[error("position {0} is outside the grid")]
    OutOfBounds(Position),

    /// The point already has two connections.
    #[error("point {0} already has the maximum of two connections")]
    DegreeExceeded(Position),

    /// The two points are already linked.
    #[error("connection {0} already exists")]
    DuplicateConnection(Segment),

    /// The two points are not 8-directionally adjacent.
    #[error("points {0} and {1} are not adjacent")]
    NotAdjacent(Position, Position),

    /// One or more enabled constraints rejected the connection.
    #[error("connection rejected: {0}")]
    ConstraintViolation(ValidationResult),

    /// The chain already holds its maximum number of connections.
    #[error("chain {0} is full")]
    ChainFull(ChainId),

    /// The point is already a member of a chain.
    #[error("point {0} already belongs to a chain")]
    AlreadyInChain(Position),

    /// A constraint with the same name is already registered.
    #[error("constraint '{0}' is already registered")]
    DuplicateConstraint(String),
}
