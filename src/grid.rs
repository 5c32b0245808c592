//! Evenly spaced asset grids with an exact zero node.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::{HuggettError, Result};

/// Relative slack allowed when checking that zero falls on a node of the even spacing.
const ZERO_NODE_SLACK: f64 = 1e-9;

/// An immutable, strictly increasing, evenly spaced grid of end-of-period
/// asset positions. The lowest node is the effective borrowing limit, and the
/// grid always contains the value `0.0` exactly at [`zero_index`](Self::zero_index).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(into = "GridSpec", try_from = "GridSpec")]
pub struct AssetGrid {
    nodes: DVector<f64>,
    step: f64,
    zero_index: usize,
}

/// Builds an evenly spaced asset grid over `[lo, hi]` with `points` nodes.
///
/// Requires `lo < 0 < hi` and `points >= 2`, and zero must be a node of the
/// implied spacing. Nodes are anchored at zero and laid out by integer step
/// counts, `a[i] = (i - zero_index) * step`, so the zero node is exact rather
/// than the result of accumulated floating-point interpolation.
pub fn make_grid(lo: f64, hi: f64, points: usize) -> Result<AssetGrid> {
    if !lo.is_finite() || !hi.is_finite() {
        return Err(HuggettError::invalid_grid("bounds must be finite", lo, hi, points));
    }
    if points < 2 {
        return Err(HuggettError::invalid_grid("at least two nodes required", lo, hi, points));
    }
    if lo >= hi {
        return Err(HuggettError::invalid_grid("lower bound must be below upper bound", lo, hi, points));
    }
    if lo >= 0.0 || hi <= 0.0 {
        return Err(HuggettError::invalid_grid("bounds must straddle zero", lo, hi, points));
    }

    let step = (hi - lo) / (points - 1) as f64;
    let exact_index = -lo / step;
    let zero_index = exact_index.round();
    let slack = (exact_index - zero_index).abs();
    if slack > ZERO_NODE_SLACK * exact_index.max(1.0) {
        return Err(HuggettError::invalid_grid(
            "zero is not a node of the even spacing",
            lo,
            hi,
            points,
        ));
    }
    let zero_index = zero_index as usize;
    // A bound tiny enough to round the zero node onto an endpoint would
    // silently displace the requested borrowing limit or upper bound.
    if zero_index == 0 || zero_index >= points - 1 {
        return Err(HuggettError::invalid_grid(
            "zero node falls on a grid endpoint",
            lo,
            hi,
            points,
        ));
    }

    let nodes = DVector::from_fn(points, |i, _| (i as f64 - zero_index as f64) * step);

    Ok(AssetGrid {
        nodes,
        step,
        zero_index,
    })
}

impl AssetGrid {
    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always `false`; grids carry at least two nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Asset value at node `i`.
    pub fn node(&self, i: usize) -> f64 {
        self.nodes[i]
    }

    /// Read-only view of the node vector.
    pub fn values(&self) -> &DVector<f64> {
        &self.nodes
    }

    /// Index of the node holding exactly zero assets.
    pub fn zero_index(&self) -> usize {
        self.zero_index
    }

    /// Spacing between adjacent nodes.
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Lowest admissible asset holding.
    pub fn borrowing_limit(&self) -> f64 {
        self.nodes[0]
    }

    /// Highest admissible asset holding.
    pub fn upper_bound(&self) -> f64 {
        self.nodes[self.nodes.len() - 1]
    }
}

/// Serialized form of [`AssetGrid`]. Deserialization rebuilds the grid through
/// [`make_grid`], so the construction-time invariants (ascending nodes, exact
/// interior zero node) cannot be bypassed by a hand-written payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct GridSpec {
    lo: f64,
    hi: f64,
    points: usize,
}

impl From<AssetGrid> for GridSpec {
    fn from(grid: AssetGrid) -> Self {
        Self {
            lo: grid.borrowing_limit(),
            hi: grid.upper_bound(),
            points: grid.len(),
        }
    }
}

impl TryFrom<GridSpec> for AssetGrid {
    type Error = HuggettError;

    fn try_from(spec: GridSpec) -> Result<Self> {
        make_grid(spec.lo, spec.hi, spec.points)
    }
}
