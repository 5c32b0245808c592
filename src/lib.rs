//! Value function iteration and general-equilibrium interest rates for
//! Huggett-style endowment economies.
//!
//! This crate solves a single-agent consumption-savings problem by value
//! function iteration on a discretized asset grid and embeds that solver in a
//! fixed-point search over the interest rate. It offers tools to
//!
//! - build evenly spaced asset grids with an exact zero node (`grid` module),
//! - solve the household Bellman equation under CRRA preferences
//!   (`household` module),
//! - configure and inspect the value iteration (`solving` module), and
//! - locate the market-clearing interest rate with a bracketed root finder
//!   (`equilibrium` module).
//!
//! The household faces a constant endowment income, a borrowing limit at the
//! bottom of the grid, and a candidate interest rate `r`. The equilibrium
//! solver treats the household problem as a black-box excess-demand function
//! of `r` — the asset position chosen by the household currently holding zero
//! assets — and drives Brent's method over a sign-changing bracket.
//!
//! # Quick start
//!
//! ```
//! use huggettrs::{find_equilibrium_rate, make_grid, HouseholdParams, HouseholdSolver};
//!
//! let grid = make_grid(-2.0, 2.0, 81)?;
//! let params = HouseholdParams::new(0.96, 2.0, 1.0)?;
//! let solver = HouseholdSolver::new(params, grid);
//!
//! // Optimal policy at a 2% interest rate: below the market-clearing rate,
//! // the zero-asset household borrows.
//! let policy = solver.solve(0.02, 1e-6)?;
//! let index_zero = solver.grid().zero_index();
//! assert!(policy.next_assets[index_zero] <= 0.0);
//!
//! // Market-clearing rate: the zero-asset household holds zero next period.
//! let rate = find_equilibrium_rate(&solver, 0.0, 0.1, index_zero, 1e-8)?;
//! assert!(rate > 0.0 && rate < 0.1);
//! # Ok::<(), huggettrs::HuggettError>(())
//! ```
//!
//! Excess demand is assumed non-decreasing in `r` over the search bracket.
//! That holds by construction for the riskless endowment economy; extensions
//! with idiosyncratic income risk (and the stationary asset distribution they
//! require) are out of scope.

pub mod equilibrium;
pub mod error;
pub mod grid;
pub mod household;
pub mod solving;

pub use equilibrium::{
    excess_demand, find_equilibrium_rate, solve_equilibrium, EquilibriumOptions, EquilibriumResult,
};
pub use error::{HuggettError, Result};
pub use grid::{make_grid, AssetGrid};
pub use household::{HouseholdParams, HouseholdSolver, PolicyResult, ValueFunctionTrace};
pub use solving::{ValueIterationOptions, ValueIterationSummary};
