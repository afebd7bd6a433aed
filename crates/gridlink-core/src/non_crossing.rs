//! Non-crossing constraint: no two committed connections may intersect
//! except at a shared endpoint.
//!
//! # Intersection test
//!
//! 1. **Shared endpoint:** segments sharing exactly one endpoint are a
//!    chain extension, never a crossing (even when collinear).
//! 2. **Bounding boxes:** disjoint axis-aligned boxes cannot intersect.
//! 3. **Orientation:** the four orientation triples are computed exactly
//!    on integer coordinates with `geo`'s kernel. When all four are
//!    collinear the segments overlap iff their projections onto the
//!    dominant axis overlap. Otherwise they intersect iff each segment
//!    straddles the other's supporting line, or an endpoint of one lies
//!    on the other.
//!
//! Committed segments are kept in an R\*-tree so each candidate is only
//! tested against segments near it.

use geo::GeoNum;
use geo::kernels::{Kernel, Orientation};
use rstar::primitives::{GeomWithData, Line};
use rstar::{AABB, Envelope, PointDistance, RTree, RTreeObject};

use crate::constraint::ConnectionConstraint;
use crate::grid::Grid;
use crate::point::Point;
use crate::types::Segment;

/// A committed segment in floating-point space, tagged with its exact
/// integer form.
type IndexedSegment = GeomWithData<Line<[f64; 2]>, Segment>;

/// Slack added to the search radius so touching segments are not lost to
/// rounding.
const SEARCH_EPSILON: f64 = 1e-9;

fn orientation(p: geo::Coord<i64>, q: geo::Coord<i64>, r: geo::Coord<i64>) -> Orientation {
    <i64 as GeoNum>::Ker::orient2d(p, q, r)
}

/// Returns `true` if `r` lies within the bounding box of `p`–`q`.
///
/// Only meaningful when the three points are collinear.
fn within_box(p: geo::Coord<i64>, q: geo::Coord<i64>, r: geo::Coord<i64>) -> bool {
    r.x >= p.x.min(q.x) && r.x <= p.x.max(q.x) && r.y >= p.y.min(q.y) && r.y <= p.y.max(q.y)
}

fn bounding_boxes_overlap(s: &Segment, t: &Segment) -> bool {
    let (s, t) = (s.to_line(), t.to_line());
    let (s_min_x, s_max_x) = (s.start.x.min(s.end.x), s.start.x.max(s.end.x));
    let (s_min_y, s_max_y) = (s.start.y.min(s.end.y), s.start.y.max(s.end.y));
    let (t_min_x, t_max_x) = (t.start.x.min(t.end.x), t.start.x.max(t.end.x));
    let (t_min_y, t_max_y) = (t.start.y.min(t.end.y), t.start.y.max(t.end.y));
    !(s_max_x < t_min_x || t_max_x < s_min_x || s_max_y < t_min_y || t_max_y < s_min_y)
}

/// 1-D overlap of two collinear segments, projected onto the axis along
/// which the first segment has the larger extent.
fn collinear_overlap(s: &geo::Line<i64>, t: &geo::Line<i64>) -> bool {
    let project = |c: geo::Coord<i64>| {
        if (s.end.x - s.start.x).abs() >= (s.end.y - s.start.y).abs() {
            c.x
        } else {
            c.y
        }
    };
    let (a, b) = (project(s.start), project(s.end));
    let (c, d) = (project(t.start), project(t.end));
    a.max(b) >= c.min(d) && c.max(d) >= a.min(b)
}

/// Returns `true` if two segments intersect anywhere other than at a
/// single shared endpoint.
#[must_use]
pub fn segments_cross(s: &Segment, t: &Segment) -> bool {
    match s.shared_endpoints(t) {
        0 => {}
        1 => return false,
        _ => return true,
    }
    if !bounding_boxes_overlap(s, t) {
        return false;
    }

    let (l1, l2) = (s.to_line(), t.to_line());
    let (p1, p2, p3, p4) = (l1.start, l1.end, l2.start, l2.end);
    let o1 = orientation(p1, p2, p3);
    let o2 = orientation(p1, p2, p4);
    let o3 = orientation(p3, p4, p1);
    let o4 = orientation(p3, p4, p2);

    if [o1, o2, o3, o4]
        .iter()
        .all(|o| *o == Orientation::Collinear)
    {
        return collinear_overlap(&l1, &l2);
    }
    if o1 != o2 && o3 != o4 {
        return true;
    }
    (o1 == Orientation::Collinear && within_box(p1, p2, p3))
        || (o2 == Orientation::Collinear && within_box(p1, p2, p4))
        || (o3 == Orientation::Collinear && within_box(p3, p4, p1))
        || (o4 == Orientation::Collinear && within_box(p3, p4, p2))
}

fn to_indexed(segment: Segment) -> IndexedSegment {
    let line = segment.to_line();
    #[allow(clippy::cast_precision_loss)]
    let (from, to) = (
        [line.start.x as f64, line.start.y as f64],
        [line.end.x as f64, line.end.y as f64],
    );
    GeomWithData::new(Line::new(from, to), segment)
}

/// Rejects candidate connections that would cross a committed one.
#[derive(Debug, Default)]
pub struct NonCrossingConstraint {
    committed: RTree<IndexedSegment>,
}

impl NonCrossingConstraint {
    /// Registry name.
    pub const NAME: &'static str = "non-crossing";

    /// Create a constraint with no committed segments.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed segments being tracked.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.committed.size()
    }

    /// The first committed segment that `candidate` would cross, if any.
    ///
    /// Committed segments are visited nearest-first from the candidate's
    /// midpoint; the search stops once they are farther away than half
    /// the candidate's length, since any intersection lies within that
    /// radius.
    #[must_use]
    pub fn first_crossing(&self, candidate: &Segment) -> Option<Segment> {
        let query = to_indexed(*candidate);
        let [x1, y1] = query.geom().from;
        let [x2, y2] = query.geom().to;
        let midpoint = [(x1 + x2) / 2.0, (y1 + y2) / 2.0];
        let (dx, dy) = (x2 - x1, y2 - y1);
        let max_distance_2 = dx.mul_add(dx, dy * dy) / 4.0 + SEARCH_EPSILON;
        let envelope: AABB<[f64; 2]> = query.envelope();

        self.committed
            .nearest_neighbor_iter(&midpoint)
            .take_while(|existing| existing.distance_2(&midpoint) <= max_distance_2)
            .filter(|existing| existing.envelope().intersects(&envelope))
            .map(|existing| existing.data)
            .find(|existing| segments_cross(candidate, existing))
    }
}

impl ConnectionConstraint for NonCrossingConstraint {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> String {
        "prevents chains from crossing each other geometrically".to_owned()
    }

    fn validate(&self, _grid: &Grid, p1: &Point, p2: &Point) -> bool {
        self.first_crossing(&Segment::new(p1.position(), p2.position()))
            .is_none()
    }

    fn record_connection(&mut self, segment: Segment) {
        self.committed.insert(to_indexed(segment));
    }

    fn clear(&mut self) {
        self.committed = RTree::new();
    }
}
