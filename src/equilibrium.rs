//! General-equilibrium interest-rate search over the household excess-demand function.

use serde::{Deserialize, Serialize};

use crate::error::{HuggettError, Result};
use crate::household::{HouseholdSolver, PolicyResult};
use crate::solving::ValueIterationOptions;

/// Evaluates the excess-demand function `z(r)`: the next-period asset position
/// chosen by the household currently holding the assets at `index_zero`
/// (conventionally the grid's zero node).
pub fn excess_demand(
    solver: &HouseholdSolver,
    r: f64,
    index_zero: usize,
    options: &ValueIterationOptions,
) -> Result<f64> {
    let len = solver.grid().len();
    if index_zero >= len {
        return Err(HuggettError::IndexOutOfRange {
            index: index_zero,
            len,
        });
    }
    let result = solver.solve_with_options(r, options)?;
    let z = result.next_assets[index_zero];
    log::debug!("excess demand at r = {r:.6}: {z:.6}");
    Ok(z)
}

/// Configuration for the equilibrium-rate search.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EquilibriumOptions {
    /// Tolerance on the excess-demand residual and on the bracket width.
    pub root_tolerance: f64,
    /// Maximum number of root-finder iterations before aborting.
    pub max_iterations: usize,
    /// Options forwarded to every inner value-iteration solve.
    pub value_iteration: ValueIterationOptions,
}

impl Default for EquilibriumOptions {
    fn default() -> Self {
        Self {
            root_tolerance: 1e-8,
            max_iterations: 100,
            value_iteration: ValueIterationOptions::default(),
        }
    }
}

impl EquilibriumOptions {
    /// Override the root tolerance while preserving other defaults.
    pub fn with_root_tolerance(mut self, root_tolerance: f64) -> Self {
        self.root_tolerance = root_tolerance;
        self
    }

    /// Override the inner value-iteration options.
    pub fn with_value_iteration(mut self, value_iteration: ValueIterationOptions) -> Self {
        self.value_iteration = value_iteration;
        self
    }
}

/// Equilibrium rate together with the diagnostics of the search and the
/// allocation the household chooses at that rate.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EquilibriumResult {
    /// Market-clearing interest rate.
    pub rate: f64,
    /// Excess demand at the returned rate.
    pub excess_demand: f64,
    /// Number of excess-demand evaluations (inner solves) performed.
    pub evaluations: usize,
    /// Household policy at the equilibrium rate.
    pub allocation: PolicyResult,
}

/// Finds the interest rate at which the zero-asset household chooses to hold
/// exactly zero assets next period. Thin wrapper over [`solve_equilibrium`]
/// with default options.
pub fn find_equilibrium_rate(
    solver: &HouseholdSolver,
    lo: f64,
    hi: f64,
    index_zero: usize,
    root_tolerance: f64,
) -> Result<f64> {
    let options = EquilibriumOptions::default().with_root_tolerance(root_tolerance);
    solve_equilibrium(solver, lo, hi, index_zero, &options).map(|result| result.rate)
}

/// Searches `[lo, hi]` for a market-clearing interest rate with Brent's
/// method, treating each inner solve as a black-box evaluation of excess
/// demand.
///
/// Requires a sign change of excess demand over the bracket (an exact zero at
/// an endpoint already clears the market); fails with
/// [`HuggettError::Bracketing`] otherwise. On a discrete asset grid the
/// excess-demand function is a step function of `r`, so the search terminates
/// either on the residual criterion or when the bracket collapses.
///
/// The search assumes excess demand is non-decreasing in `r` over the bracket;
/// this is not verified, and with a sign change Brent's method locates a root
/// regardless, but a non-monotone `z` may admit several.
pub fn solve_equilibrium(
    solver: &HouseholdSolver,
    lo: f64,
    hi: f64,
    index_zero: usize,
    options: &EquilibriumOptions,
) -> Result<EquilibriumResult> {
    if !(options.root_tolerance > 0.0) {
        return Err(HuggettError::invalid_parameter(
            "root_tolerance",
            options.root_tolerance,
        ));
    }
    if options.max_iterations == 0 {
        return Err(HuggettError::invalid_parameter("max_iterations", 0.0));
    }
    if !(lo < hi) || !lo.is_finite() || !hi.is_finite() {
        return Err(HuggettError::invalid_parameter("bracket_width", hi - lo));
    }

    let z_lo = excess_demand(solver, lo, index_zero, &options.value_iteration)?;
    if z_lo.abs() <= options.root_tolerance {
        return finish(solver, lo, z_lo, 1, options);
    }
    let z_hi = excess_demand(solver, hi, index_zero, &options.value_iteration)?;
    if z_hi.abs() <= options.root_tolerance {
        return finish(solver, hi, z_hi, 2, options);
    }
    if z_lo * z_hi > 0.0 {
        return Err(HuggettError::Bracketing {
            lo,
            hi,
            excess_lo: z_lo,
            excess_hi: z_hi,
        });
    }

    let mut evaluations = 2usize;
    let (rate, residual) = brent(
        |r| {
            evaluations += 1;
            excess_demand(solver, r, index_zero, &options.value_iteration)
        },
        lo,
        z_lo,
        hi,
        z_hi,
        options.root_tolerance,
        options.max_iterations,
    )?;

    log::debug!(
        "equilibrium rate {rate:.6} found after {evaluations} excess-demand evaluations \
         (residual {residual:.3e})"
    );
    finish(solver, rate, residual, evaluations, options)
}

fn finish(
    solver: &HouseholdSolver,
    rate: f64,
    excess: f64,
    evaluations: usize,
    options: &EquilibriumOptions,
) -> Result<EquilibriumResult> {
    let allocation = solver.solve_with_options(rate, &options.value_iteration)?;
    Ok(EquilibriumResult {
        rate,
        excess_demand: excess,
        evaluations,
        allocation,
    })
}

/// Brent's method: bisection combined with secant and inverse quadratic
/// interpolation. Derivative-free and guaranteed to converge inside the
/// bracket. Expects `f(a)` and `f(b)` of opposite sign.
fn brent(
    mut f: impl FnMut(f64) -> Result<f64>,
    mut a: f64,
    mut fa: f64,
    mut b: f64,
    mut fb: f64,
    tolerance: f64,
    max_iterations: usize,
) -> Result<(f64, f64)> {
    let mut c = a;
    let mut fc = fa;
    let mut d = b - a;
    let mut e = d;

    for _ in 0..max_iterations {
        // Keep the root bracketed between b and c, with b the best estimate.
        if (fb > 0.0) == (fc > 0.0) {
            c = a;
            fc = fa;
            d = b - a;
            e = d;
        }
        if fc.abs() < fb.abs() {
            a = b;
            b = c;
            c = a;
            fa = fb;
            fb = fc;
            fc = fa;
        }

        let tol1 = 2.0 * f64::EPSILON * b.abs() + 0.5 * tolerance;
        let xm = 0.5 * (c - b);
        if xm.abs() <= tol1 || fb.abs() <= tolerance {
            return Ok((b, fb));
        }

        if e.abs() >= tol1 && fa.abs() > fb.abs() {
            // Attempt secant (a == c) or inverse quadratic interpolation.
            let s = fb / fa;
            let mut p;
            let mut q;
            if a == c {
                p = 2.0 * xm * s;
                q = 1.0 - s;
            } else {
                let q0 = fa / fc;
                let r0 = fb / fc;
                p = s * (2.0 * xm * q0 * (q0 - r0) - (b - a) * (r0 - 1.0));
                q = (q0 - 1.0) * (r0 - 1.0) * (s - 1.0);
            }
            if p > 0.0 {
                q = -q;
            }
            p = p.abs();
            let min1 = 3.0 * xm * q - (tol1 * q).abs();
            let min2 = (e * q).abs();
            if 2.0 * p < min1.min(min2) {
                // Interpolation accepted.
                e = d;
                d = p / q;
            } else {
                d = xm;
                e = d;
            }
        } else {
            d = xm;
            e = d;
        }

        a = b;
        fa = fb;
        if d.abs() > tol1 {
            b += d;
        } else {
            b += if xm > 0.0 { tol1 } else { -tol1 };
        }
        fb = f(b)?;
    }

    Err(HuggettError::NonConvergence {
        iterations: max_iterations,
        max_gap: fb.abs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::make_grid;
    use crate::household::HouseholdParams;

    fn solver(beta: f64) -> HouseholdSolver {
        let grid = make_grid(-1.0, 1.0, 21).unwrap();
        let params = HouseholdParams::new(beta, 2.0, 1.0).unwrap();
        HouseholdSolver::new(params, grid)
    }

    #[test]
    fn bracket_without_sign_change_fails() {
        // 1/beta - 1 is about 0.111; both candidate rates sit above it, so the
        // zero-asset household saves at both and excess demand stays positive.
        let solver = solver(0.9);
        let index_zero = solver.grid().zero_index();
        let result = find_equilibrium_rate(&solver, 0.15, 0.18, index_zero, 1e-8);
        assert!(matches!(
            result,
            Err(HuggettError::Bracketing { excess_lo, excess_hi, .. })
                if excess_lo > 0.0 && excess_hi > 0.0
        ));
    }

    #[test]
    fn out_of_range_state_index_fails() {
        let solver = solver(0.9);
        let options = ValueIterationOptions::default();
        let result = excess_demand(&solver, 0.02, 999, &options);
        assert!(matches!(
            result,
            Err(HuggettError::IndexOutOfRange { index: 999, len: 21 })
        ));
    }

    #[test]
    fn degenerate_bracket_or_tolerance_is_rejected() {
        let solver = solver(0.9);
        let index_zero = solver.grid().zero_index();
        assert!(matches!(
            find_equilibrium_rate(&solver, 0.1, 0.1, index_zero, 1e-8),
            Err(HuggettError::InvalidParameter { name: "bracket_width", .. })
        ));
        assert!(matches!(
            find_equilibrium_rate(&solver, 0.0, 0.2, index_zero, -1.0),
            Err(HuggettError::InvalidParameter { name: "root_tolerance", .. })
        ));
    }

    #[test]
    fn brent_finds_root_of_smooth_function() {
        // x^3 - 2x - 5 has a root near 2.0945514815.
        let f = |x: f64| Ok(x * x * x - 2.0 * x - 5.0);
        let fa = 2.0f64.powi(3) - 2.0 * 2.0 - 5.0;
        let fb = 3.0f64.powi(3) - 2.0 * 3.0 - 5.0;
        let (root, residual) = brent(f, 2.0, fa, 3.0, fb, 1e-12, 100).unwrap();
        assert!((root - 2.094_551_481_5).abs() < 1e-9);
        assert!(residual.abs() < 1e-9);
    }

    #[test]
    fn brent_exhausting_its_cap_fails() {
        let f = |x: f64| Ok(x * x * x - 2.0 * x - 5.0);
        let result = brent(f, 2.0, -1.0, 3.0, 16.0, 1e-15, 2);
        assert!(matches!(result, Err(HuggettError::NonConvergence { .. })));
    }
}
