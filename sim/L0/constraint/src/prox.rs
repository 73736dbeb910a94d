//! Proximal point outer loop.
//!
//! Each outer iteration solves the regularized problem
//!
//! ```text
//! u = (W + σI) r + (q − σ r_k),   r ∈ K_μ ⟂ û
//! ```
//!
//! with Gauss-Seidel sweeps, starting from and anchored at the previous
//! iterate `r_k`. A fixed point `r = r_k` solves the original problem. The
//! shift makes every diagonal block positive definite, which helps when `W`
//! is only semidefinite (redundant contacts).

use nalgebra::DVector;
use sim_core::FrictionContactProblem;
use sim_core::residual::local_error;
use sim_types::{Result, SolveStatus, SolverOptions, SolverReport};
use tracing::trace;

use crate::nsgs::{Sweeper, coulomb_laws};
use crate::operator::ContactOperator;
use crate::solver::{begin, finish};

/// Solve `problem` with the proximal point method.
///
/// Each outer iteration runs at most `inner_max_iterations` sweeps with
/// regularization `proximal_sigma`.
///
/// # Errors
///
/// Fails on invalid options or vectors of the wrong size.
pub fn proximal(
    problem: &FrictionContactProblem,
    reaction: &mut DVector<f64>,
    velocity: &mut DVector<f64>,
    options: &mut SolverOptions,
) -> Result<SolveStatus> {
    if !begin(problem, reaction, velocity, options)? {
        return Ok(SolveStatus::Converged);
    }

    let d = problem.dimension;
    let sigma = options.proximal_sigma;
    let op = ContactOperator::new(&problem.w, d);
    let sweeper = Sweeper::new(&op, d, sigma, options);
    let laws = coulomb_laws(problem);
    let inner_tolerance = 0.1 * options.tolerance;

    let mut report = SolverReport::default();
    for iteration in 1..=options.max_iterations {
        report.iterations = iteration;

        let anchor = reaction.clone();
        let mut shifted_q = problem.q.clone();
        shifted_q.axpy(-sigma, &anchor, 1.0);

        let mut previous = reaction.clone();
        for _ in 0..options.inner_max_iterations {
            sweeper.sweep(&shifted_q, &laws, reaction);
            let change = (&*reaction - &previous).norm();
            if change <= inner_tolerance * (1.0 + reaction.norm()) {
                break;
            }
            previous.copy_from(reaction);
        }

        op.apply_into(reaction, velocity);
        *velocity += &problem.q;

        if iteration % options.error_evaluation_frequency == 0 || iteration == options.max_iterations {
            report.residual = local_error(problem, reaction, velocity);
            if options.verbose {
                trace!(iteration, residual = report.residual, sigma, "proximal iteration");
            }
            if report.residual < options.tolerance {
                report.converged = true;
                break;
            }
        }
    }

    Ok(finish(options, report, "PROX"))
}
