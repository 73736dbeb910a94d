//! Alternating direction method of multipliers.
//!
//! # Formulation
//!
//! The local problem is split into a quadratic part and a cone constraint,
//! `r = z` with `z ∈ K_μ`. With the De Saxcé shift `s = μ‖u_t‖ e_n` frozen
//! at the current velocity, one iteration reads
//!
//! ```text
//! (W + ρI) r = −(q + s) + ρ (z − ξ)
//! z          = proj_K(r + ξ)
//! ξ          = ξ + r − z
//! ```
//!
//! where `ξ` is the scaled dual variable. The reported reaction is `z`, which
//! always lies in the cone.
//!
//! # Penalty balancing
//!
//! With `admm_adaptive_rho`, the penalty is doubled when the primal residual
//! `‖r − z‖` dominates the dual residual `ρ‖z − z_prev‖` by more than a factor
//! of ten, and halved in the opposite case. `ξ` is rescaled to keep the
//! unscaled multiplier unchanged, and `W + ρI` is refactored.

use nalgebra::DVector;
use sim_core::FrictionContactProblem;
use sim_core::cone::{de_saxce_shift, project_on_cone};
use sim_core::residual::local_error;
use sim_types::{Result, SolveStatus, SolverOptions, SolverReport};
use tracing::trace;

use crate::operator::ContactOperator;
use crate::solver::{begin, finish};

const BALANCE_RATIO: f64 = 10.0;
const BALANCE_FACTOR: f64 = 2.0;

/// Project every contact of `x` onto its friction cone.
#[cfg(feature = "parallel")]
pub(crate) fn project_all(x: &mut DVector<f64>, mu: &DVector<f64>, dimension: usize) {
    use rayon::prelude::*;
    x.as_mut_slice()
        .par_chunks_mut(dimension)
        .zip(mu.as_slice().par_iter())
        .for_each(|(contact, &m)| {
            project_on_cone(contact, m);
        });
}

/// Project every contact of `x` onto its friction cone.
#[cfg(not(feature = "parallel"))]
pub(crate) fn project_all(x: &mut DVector<f64>, mu: &DVector<f64>, dimension: usize) {
    for (contact, &m) in x.as_mut_slice().chunks_mut(dimension).zip(mu.iter()) {
        project_on_cone(contact, m);
    }
}

/// De Saxcé shift of every contact, placed on the normal components.
pub(crate) fn shift_vector(velocity: &DVector<f64>, mu: &DVector<f64>, dimension: usize) -> DVector<f64> {
    let mut shift = DVector::zeros(velocity.len());
    for (i, (u, &m)) in velocity.as_slice().chunks(dimension).zip(mu.iter()).enumerate() {
        shift[i * dimension] = de_saxce_shift(u, m);
    }
    shift
}

/// Solve `problem` with ADMM.
///
/// `reaction` is the initial guess and receives the solution; `velocity`
/// receives `W r + q`. Statistics are written to `options.report`.
///
/// # Errors
///
/// Fails on invalid options, vectors of the wrong size, or a singular
/// `W + ρI`.
pub fn admm(
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
    let mut rho = options.admm_rho;
    let mut factor = op.shifted_factor(rho)?;

    let mut z = reaction.clone();
    project_all(&mut z, &problem.mu, d);
    let mut xi = DVector::zeros(z.len());
    let mut r = z.clone();

    op.apply_into(&z, velocity);
    *velocity += &problem.q;

    let mut report = SolverReport::default();
    for iteration in 1..=options.max_iterations {
        report.iterations = iteration;

        let shift = shift_vector(velocity, &problem.mu, d);
        r.copy_from(&z);
        r -= &xi;
        r *= rho;
        r -= &problem.q;
        r -= &shift;
        factor.solve_in_place(&mut r);

        let z_prev = z.clone();
        z.copy_from(&r);
        z += &xi;
        project_all(&mut z, &problem.mu, d);

        xi += &r;
        xi -= &z;

        op.apply_into(&z, velocity);
        *velocity += &problem.q;

        let primal = (&r - &z).norm();
        let dual = rho * (&z - &z_prev).norm();

        if iteration % options.error_evaluation_frequency == 0 || iteration == options.max_iterations {
            report.residual = local_error(problem, &z, velocity);
            if options.verbose {
                trace!(iteration, residual = report.residual, rho, primal, dual, "admm iteration");
            }
            if report.residual < options.tolerance {
                report.converged = true;
                break;
            }
        }

        if options.admm_adaptive_rho {
            let scale = if primal > BALANCE_RATIO * dual {
                Some(BALANCE_FACTOR)
            } else if dual > BALANCE_RATIO * primal {
                Some(1.0 / BALANCE_FACTOR)
            } else {
                None
            };
            if let Some(scale) = scale {
                rho *= scale;
                xi /= scale;
                factor = op.shifted_factor(rho)?;
            }
        }
    }

    reaction.copy_from(&z);
    Ok(finish(options, report, "ADMM"))
}
