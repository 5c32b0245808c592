use thiserror::Error;

/// Unified error type for `huggettrs` operations.
#[derive(Debug, Error)]
pub enum HuggettError {
    /// Raised when asset grid construction parameters are inadmissible.
    #[error("invalid asset grid ({reason}): lo {lo}, hi {hi}, {points} points")]
    InvalidGrid {
        /// Human-readable description of the violated requirement.
        reason: &'static str,
        /// Requested lower bound (the borrowing limit).
        lo: f64,
        /// Requested upper bound.
        hi: f64,
        /// Requested number of nodes.
        points: usize,
    },

    /// Raised when a preference or income parameter is outside its admissible range.
    #[error("parameter `{name}` is outside its admissible range, found {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    /// Raised when no positive-consumption asset choice exists at some state.
    #[error(
        "no positive-consumption choice at grid index {state_index} \
         (assets {assets}, cash on hand {resources}); widen the grid or adjust parameters"
    )]
    InfeasibleState {
        /// Index of the offending current-asset state.
        state_index: usize,
        /// Asset holding at that state.
        assets: f64,
        /// Cash on hand `y + a*(1+r)` at that state.
        resources: f64,
    },

    /// Raised when an iterative solver exhausts its iteration cap.
    #[error("did not converge after {iterations} iterations; last max gap {max_gap}")]
    NonConvergence {
        /// Number of iterations performed before termination.
        iterations: usize,
        /// Maximum absolute change (or residual) in the last iteration.
        max_gap: f64,
    },

    /// Raised when the root-finding bracket does not produce a sign change in excess demand.
    #[error(
        "excess demand does not change sign over [{lo}, {hi}] \
         (z(lo) = {excess_lo}, z(hi) = {excess_hi})"
    )]
    Bracketing {
        lo: f64,
        hi: f64,
        excess_lo: f64,
        excess_hi: f64,
    },

    /// Raised when a caller-supplied grid index is out of range.
    #[error("grid index {index} is out of range for a grid of {len} nodes")]
    IndexOutOfRange { index: usize, len: usize },
}

impl HuggettError {
    /// Helper to format an [`InvalidGrid`](HuggettError::InvalidGrid) error.
    pub fn invalid_grid(reason: &'static str, lo: f64, hi: f64, points: usize) -> Self {
        Self::InvalidGrid {
            reason,
            lo,
            hi,
            points,
        }
    }

    /// Helper for rejecting an out-of-range scalar parameter.
    pub fn invalid_parameter(name: &'static str, value: f64) -> Self {
        Self::InvalidParameter { name, value }
    }
}

/// Type alias for results returned by this crate.
pub type Result<T> = std::result::Result<T, HuggettError>;
