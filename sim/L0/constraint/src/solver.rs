//! Solver dispatch for local frictional contact problems.
//!
//! # Selection
//!
//! [`solve`] picks a family by the exact, case-sensitive name in
//! [`SolverOptions::solver`]:
//!
//! | Name | Family |
//! |------|--------|
//! | `NSGS` | [`nsgs`](crate::nsgs::nsgs) |
//! | `ADMM` | [`admm`](crate::admm::admm) |
//! | `NSN-FischerBurmeister` | [`fischer_burmeister_newton`](crate::newton::fischer_burmeister_newton) |
//! | `DSFP` | [`de_saxce_fixed_point`](crate::fixed_point::de_saxce_fixed_point) |
//! | `TFP` | [`tresca_fixed_point`](crate::fixed_point::tresca_fixed_point) |
//! | `PROX` | [`proximal`](crate::prox::proximal) |
//!
//! An unknown name is not an error: it logs a warning and returns
//! [`SolveStatus::UnsupportedSolver`] (`info = -1`) without touching the
//! reaction or velocity.
//!
//! # Zero contacts
//!
//! Every family returns [`SolveStatus::Converged`] immediately when the
//! problem has no contacts, with a report of zero iterations and zero residual.

use nalgebra::DVector;
use sim_core::FrictionContactProblem;
use sim_types::{NumericsError, Result, SolveStatus, SolverId, SolverOptions, SolverReport};
use tracing::{debug, warn};

/// Signature shared by every solver family.
pub type SolverFn = fn(
    &FrictionContactProblem,
    &mut DVector<f64>,
    &mut DVector<f64>,
    &mut SolverOptions,
) -> Result<SolveStatus>;

/// Entry point of a solver family.
#[must_use]
pub fn family(id: SolverId) -> SolverFn {
    match id {
        SolverId::Nsgs => crate::nsgs::nsgs,
        SolverId::Admm => crate::admm::admm,
        SolverId::NewtonFischerBurmeister => crate::newton::fischer_burmeister_newton,
        SolverId::DeSaxceFixedPoint => crate::fixed_point::de_saxce_fixed_point,
        SolverId::TrescaFixedPoint => crate::fixed_point::tresca_fixed_point,
        SolverId::Proximal => crate::prox::proximal,
    }
}

/// Resolve the solver name of `options`, warning if it is unknown.
pub(crate) fn resolve(options: &mut SolverOptions) -> Option<SolverId> {
    let id = options.solver_id();
    if id.is_none() {
        warn!(solver = %options.solver, "unsupported solver name, nothing computed");
        options.report = SolverReport::default();
    }
    id
}

/// Solve a local problem with the family named in `options`.
///
/// `reaction` is the initial guess and receives the solution; `velocity`
/// receives `W r + q`. The family writes its statistics to `options.report`.
///
/// # Errors
///
/// Fails on invalid options or on vectors whose length is not `d·nc`.
/// Non-convergence and unknown names are statuses, not errors.
///
/// # Example
///
/// ```ignore
/// use sim_constraint::solve;
/// use sim_types::{SolverId, SolverOptions};
///
/// let mut options = SolverOptions::new(SolverId::Nsgs).with_tolerance(1e-10);
/// let status = solve(&problem, &mut reaction, &mut velocity, &mut options)?;
/// println!("info = {}, residual = {}", status.info(), options.report.residual);
/// ```
pub fn solve(
    problem: &FrictionContactProblem,
    reaction: &mut DVector<f64>,
    velocity: &mut DVector<f64>,
    options: &mut SolverOptions,
) -> Result<SolveStatus> {
    let Some(id) = resolve(options) else {
        return Ok(SolveStatus::UnsupportedSolver);
    };
    family(id)(problem, reaction, velocity, options)
}

/// Shared preamble of every family.
///
/// Returns `Ok(false)` when there is nothing to solve; the report is then
/// already written.
pub(crate) fn begin(
    problem: &FrictionContactProblem,
    reaction: &DVector<f64>,
    velocity: &DVector<f64>,
    options: &mut SolverOptions,
) -> Result<bool> {
    options.validate()?;
    let m = problem.contact_dim();
    if reaction.len() != m {
        return Err(NumericsError::dimension("reaction", m, reaction.len()));
    }
    if velocity.len() != m {
        return Err(NumericsError::dimension("velocity", m, velocity.len()));
    }

    if problem.number_of_contacts == 0 {
        debug!(solver = %options.solver, "no contacts, skipping solve");
        options.report = SolverReport::trivial();
        return Ok(false);
    }

    debug!(
        solver = %options.solver,
        nc = problem.number_of_contacts,
        storage = %problem.w.storage(),
        "local solve started"
    );
    Ok(true)
}

/// Store `report` in `options` and turn it into a status.
pub(crate) fn finish(options: &mut SolverOptions, report: SolverReport, family: &'static str) -> SolveStatus {
    debug!(
        family,
        iterations = report.iterations,
        residual = report.residual,
        converged = report.converged,
        "local solve finished"
    );
    options.report = report;
    report.status()
}
