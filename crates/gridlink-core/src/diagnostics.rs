//! Build diagnostics: step counters, timing, solution audits, and
//! determinism fingerprints.
//!
//! Every [`ChainBuilder`](crate::ChainBuilder) collects
//! [`BuildDiagnostics`] as it steps. [`audit`] re-checks a finished (or
//! partial) build against the global invariants independently of the
//! builder's own bookkeeping, and [`fingerprint`] reduces a build to a
//! single hash for comparing runs.
//!
//! Timestamps are captured via the `web-time` crate, which uses
//! `performance.now()` on WASM and `std::time::Instant` on native.
//! Durations are serialized as fractional seconds (`f64`).

use std::collections::HashMap;
use std::hash::Hasher;
use std::time::Duration;

use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};
use siphasher::sip::SipHasher13;

use crate::builder::BuildState;
use crate::chain::{Chain, ChainId};
use crate::constraint::ConnectionConstraint;
use crate::grid::Grid;
use crate::non_crossing::NonCrossingConstraint;
use crate::point::{MAX_DEGREE, Point};
use crate::types::{Position, Segment};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Counters and timing collected while a builder steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildDiagnostics {
    /// State-machine transitions performed.
    pub steps: usize,
    /// Chains started.
    pub start_selections: usize,
    /// Connections committed.
    pub commits: usize,
    /// Candidates rejected by constraints during extension.
    pub rejected_candidates: usize,
    /// Candidates passed over because committing them would strand a
    /// neighboring point.
    pub stranding_skips: usize,
    /// Chains finalized.
    pub chains_finalized: usize,
    /// Terminal state, once reached.
    pub final_state: Option<BuildState>,
    /// Wall-clock time spent inside `build_step` (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
}

impl BuildDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();
        lines.push(format!("Build Diagnostics Report\n{}", "=".repeat(40)));
        lines.push(format!(
            "Final state: {}",
            self.final_state
                .map_or_else(|| "in progress".to_owned(), |s| format!("{s:?}"))
        ));
        lines.push(format!("Duration: {:.3}ms", duration_ms(self.duration)));
        lines.push(format!("Steps: {}", self.steps));
        lines.push(format!(
            "Chains: {} started, {} finalized",
            self.start_selections, self.chains_finalized
        ));
        lines.push(format!(
            "Candidates: {} committed, {} rejected, {} skipped to avoid stranding",
            self.commits, self.rejected_candidates, self.stranding_skips
        ));
        lines.join("\n")
    }
}

/// Convert a `Duration` to fractional milliseconds.
#[must_use]
pub fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Invariant violations found by [`audit`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    /// Points that belong to no chain, in row-major order.
    pub uncovered: Vec<Position>,
    /// Points with more than two links.
    pub degree_violations: Vec<Position>,
    /// Chains that are structurally invalid or over capacity.
    pub invalid_chains: Vec<ChainId>,
    /// Pairs of committed segments that intersect.
    pub crossings: Vec<(Segment, Segment)>,
    /// Chains whose points do not form exactly one connected component of
    /// the committed edge set, or that share a component with another chain.
    pub partition_mismatches: Vec<ChainId>,
}

impl AuditReport {
    /// Returns `true` if nothing beyond uncovered points was found.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.degree_violations.is_empty()
            && self.invalid_chains.is_empty()
            && self.crossings.is_empty()
            && self.partition_mismatches.is_empty()
    }

    /// Returns `true` if the build is consistent and covers every point.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.uncovered.is_empty() && self.is_consistent()
    }
}

/// Check a build against the global invariants.
///
/// Crossings are always checked, whether or not the grid's non-crossing
/// constraint is enabled. Builds that allowed crossings should inspect
/// the individual fields rather than [`AuditReport::is_consistent`].
#[must_use]
pub fn audit(grid: &Grid, chains: &[Chain]) -> AuditReport {
    let uncovered = grid
        .unconnected_points()
        .map(Point::position)
        .collect();
    let degree_violations = grid
        .points()
        .filter(|p| p.degree() > MAX_DEGREE)
        .map(Point::position)
        .collect();
    let invalid_chains = chains
        .iter()
        .filter(|c| !c.is_valid_chain())
        .map(Chain::id)
        .collect();

    let mut crossings = Vec::new();
    let mut seen = NonCrossingConstraint::new();
    for &segment in grid.segments() {
        if let Some(other) = seen.first_crossing(&segment) {
            crossings.push((other, segment));
        }
        seen.record_connection(segment);
    }

    AuditReport {
        uncovered,
        degree_violations,
        invalid_chains,
        crossings,
        partition_mismatches: partition_mismatches(grid, chains),
    }
}

/// Chains that disagree with the connected components of the edge set.
fn partition_mismatches(grid: &Grid, chains: &[Chain]) -> Vec<ChainId> {
    let cols = grid.cols() as usize;
    let index = |p: Position| p.y as usize * cols + p.x as usize;

    let mut uf = UnionFind::<usize>::new(grid.total_points());
    for segment in grid.segments() {
        uf.union(index(segment.a()), index(segment.b()));
    }

    let mut edges_per_component: HashMap<usize, usize> = HashMap::new();
    for segment in grid.segments() {
        *edges_per_component
            .entry(uf.find_mut(index(segment.a())))
            .or_default() += 1;
    }

    let mut owner: HashMap<usize, ChainId> = HashMap::new();
    let mut mismatches = Vec::new();
    for chain in chains {
        let mut roots = chain.points().map(|p| uf.find_mut(index(p)));
        let Some(root) = roots.next() else {
            continue;
        };
        let single_component = roots.all(|r| r == root);
        let shared = owner.insert(root, chain.id()).is_some();
        // A path component has one more point than it has edges.
        let component_points = edges_per_component.get(&root).copied().unwrap_or(0) + 1;
        if !single_component || shared || component_points != chain.len() {
            mismatches.push(chain.id());
        }
    }
    mismatches
}

/// A stable 64-bit hash of the committed edge set and chain partition.
///
/// Two builds with the same fingerprint committed the same segments and
/// grouped the same points into the same chains in the same order. Every
/// value is fed as fixed-width little-endian bytes, so the hash does not
/// depend on the target's pointer width or byte order.
#[must_use]
pub fn fingerprint(grid: &Grid, chains: &[Chain]) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(0, 0);
    let mut segments = grid.segments().to_vec();
    segments.sort_unstable();
    write_len(&mut hasher, segments.len());
    for segment in &segments {
        write_position(&mut hasher, segment.a());
        write_position(&mut hasher, segment.b());
    }
    write_len(&mut hasher, chains.len());
    for chain in chains {
        hasher.write(&chain.id().0.to_le_bytes());
        write_len(&mut hasher, chain.len());
        for p in chain.points() {
            write_position(&mut hasher, p);
        }
    }
    hasher.finish()
}

fn write_len(hasher: &mut SipHasher13, len: usize) {
    let len = u64::try_from(len).unwrap_or(u64::MAX);
    hasher.write(&len.to_le_bytes());
}

fn write_position(hasher: &mut SipHasher13, p: Position) {
    hasher.write(&p.x.to_le_bytes());
    hasher.write(&p.y.to_le_bytes());
}
