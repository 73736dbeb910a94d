//! Fixed-point solvers: De Saxcé projection and Tresca thresholds.
//!
//! # De Saxcé fixed point (`DSFP`)
//!
//! ```text
//! r ← proj_K(r − ρ (W r + q + μ‖u_t‖ e_n))
//! ```
//!
//! All contacts are updated from the same velocity, so the projection runs
//! over contacts independently (in parallel with the `parallel` feature).
//! The step is `options.rho`, or `1/‖W‖∞` when that is not positive.
//!
//! # Tresca fixed point (`TFP`)
//!
//! The outer loop freezes the thresholds `g_i = μ_i r_{i,n}` and solves the
//! resulting Tresca problem with Gauss-Seidel sweeps over cylinder
//! projections; the thresholds are then refreshed from the new normal
//! reactions.

use nalgebra::DVector;
use sim_core::FrictionContactProblem;
use sim_core::cone::tresca_residual_squared;
use sim_core::residual::local_error;
use sim_types::{Result, SolveStatus, SolverOptions, SolverReport};
use tracing::trace;

use crate::admm::{project_all, shift_vector};
use crate::local::LocalLaw;
use crate::nsgs::Sweeper;
use crate::operator::ContactOperator;
use crate::solver::{begin, finish};

/// Fixed-point step: `options.rho` if positive, else `1/‖W‖∞`.
pub(crate) fn automatic_step(op: &ContactOperator<'_>, options: &SolverOptions) -> f64 {
    if options.rho > 0.0 {
        return options.rho;
    }
    let norm = op.norm_inf();
    if norm > 0.0 { 1.0 / norm } else { 1.0 }
}

/// Solve `problem` with the projected De Saxcé fixed point.
///
/// `reaction` is the initial guess and receives the solution; `velocity`
/// receives `W r + q`. Statistics are written to `options.report`.
///
/// # Errors
///
/// Fails on invalid options or vectors of the wrong size.
pub fn de_saxce_fixed_point(
    problem: &FrictionContactProblem,
    reaction: &mut DVector<f64>,
    velocity: &mut DVector<f64>,
    options: &mut SolverOptions,
) -> Result<SolveStatus> {
    if !begin(problem, reaction, velocity, options)? {
        return Ok(SolveStatus::Converged);
    }

    let d = problem.dimension;
    let op = ContactOperator::new(&problem.w, d);
    let rho = automatic_step(&op, options);

    op.apply_into(reaction, velocity);
    *velocity += &problem.q;

    let mut report = SolverReport::default();
    for iteration in 1..=options.max_iterations {
        report.iterations = iteration;

        let shift = shift_vector(velocity, &problem.mu, d);
        reaction.axpy(-rho, velocity, 1.0);
        reaction.axpy(-rho, &shift, 1.0);
        project_all(reaction, &problem.mu, d);

        op.apply_into(reaction, velocity);
        *velocity += &problem.q;

        if iteration % options.error_evaluation_frequency == 0 || iteration == options.max_iterations {
            report.residual = local_error(problem, reaction, velocity);
            if options.verbose {
                trace!(iteration, residual = report.residual, rho, "de saxce iteration");
            }
            if report.residual < options.tolerance {
                report.converged = true;
                break;
            }
        }
    }

    Ok(finish(options, report, "DSFP"))
}

fn tresca_error(problem: &FrictionContactProblem, thresholds: &[f64], reaction: &DVector<f64>, velocity: &DVector<f64>) -> f64 {
    let d = problem.dimension;
    let error: f64 = thresholds
        .iter()
        .enumerate()
        .map(|(i, &radius)| {
            let rows = i * d..(i + 1) * d;
            tresca_residual_squared(&reaction.as_slice()[rows.clone()], &velocity.as_slice()[rows], radius)
        })
        .sum();
    let norm_q = problem.q.norm();
    if norm_q > f64::EPSILON { error.sqrt() / norm_q } else { error.sqrt() }
}

/// Solve `problem` with the Tresca fixed point.
///
/// Each outer iteration runs at most `inner_max_iterations` sweeps on the
/// Tresca problem with frozen thresholds.
///
/// # Errors
///
/// Fails on invalid options or vectors of the wrong size.
pub fn tresca_fixed_point(
    problem: &FrictionContactProblem,
    reaction: &mut DVector<f64>,
    velocity: &mut DVector<f64>,
    options: &mut SolverOptions,
) -> Result<SolveStatus> {
    if !begin(problem, reaction, velocity, options)? {
        return Ok(SolveStatus::Converged);
    }

    let d = problem.dimension;
    let op = ContactOperator::new(&problem.w, d);
    let sweeper = Sweeper::new(&op, d, 0.0, options);
    let inner_tolerance = 0.1 * options.tolerance;

    let mut report = SolverReport::default();
    for iteration in 1..=options.max_iterations {
        report.iterations = iteration;

        let thresholds: Vec<f64> = problem
            .mu
            .iter()
            .enumerate()
            .map(|(i, &mu)| mu * reaction[i * d].max(0.0))
            .collect();
        let laws: Vec<LocalLaw> = thresholds.iter().map(|&g| LocalLaw::Tresca(g)).collect();

        for sweep in 1..=options.inner_max_iterations {
            sweeper.sweep(&problem.q, &laws, reaction);
            op.apply_into(reaction, velocity);
            *velocity += &problem.q;
            let inner = tresca_error(problem, &thresholds, reaction, velocity);
            if options.verbose {
                trace!(iteration, sweep, residual = inner, "tresca sweep");
            }
            if inner < inner_tolerance {
                break;
            }
        }

        if iteration % options.error_evaluation_frequency == 0 || iteration == options.max_iterations {
            report.residual = local_error(problem, reaction, velocity);
            if options.verbose {
                trace!(iteration, residual = report.residual, "tresca outer iteration");
            }
            if report.residual < options.tolerance {
                report.converged = true;
                break;
            }
        }
    }

    Ok(finish(options, report, "TFP"))
}
