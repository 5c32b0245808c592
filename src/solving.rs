//! Value-iteration configuration and diagnostics.

use serde::{Deserialize, Serialize};

use crate::error::{HuggettError, Result};

/// Configuration for the fixed-point value iteration that solves the
/// household Bellman equation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValueIterationOptions {
    /// Supremum norm tolerance for convergence.
    pub tolerance: f64,
    /// Maximum number of Bellman sweeps allowed before aborting.
    pub max_iterations: usize,
    /// Record every value-function iterate in the returned trace.
    pub keep_trace: bool,
}

impl Default for ValueIterationOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 5_000,
            keep_trace: false,
        }
    }
}

impl ValueIterationOptions {
    /// Override the convergence tolerance while preserving other defaults.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the maximum number of Bellman sweeps that should be attempted.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Enable or disable recording of the per-iteration value-function trace.
    pub fn with_trace(mut self, keep_trace: bool) -> Self {
        self.keep_trace = keep_trace;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !(self.tolerance > 0.0) {
            return Err(HuggettError::invalid_parameter("tolerance", self.tolerance));
        }
        if self.max_iterations == 0 {
            return Err(HuggettError::invalid_parameter("max_iterations", 0.0));
        }
        Ok(())
    }
}

/// Diagnostics returned alongside a converged policy.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValueIterationSummary {
    /// Number of Bellman sweeps performed.
    pub iterations: usize,
    /// Maximum absolute change observed in the final sweep.
    pub max_gap: f64,
}
