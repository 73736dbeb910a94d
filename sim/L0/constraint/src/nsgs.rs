//! Nonsmooth Gauss-Seidel.
//!
//! # Algorithm
//!
//! Contacts are visited in order `0..nc`. For contact `i` the reactions of
//! all other contacts are held fixed, which leaves the local law
//!
//! ```text
//! u_i = W_ii r_i + q_i',   q_i' = q_i + Σ_{j≠i} W_ij r_j
//! ```
//!
//! solved by [`solve_contact`](crate::local::solve_contact). The new reaction
//! replaces the old one immediately, so later contacts in the same sweep see
//! it. An over-relaxation factor `ω` blends the new and old reactions.
//!
//! The global error is evaluated every `error_evaluation_frequency` sweeps
//! and after the last sweep.

use nalgebra::{DMatrix, DVector};
use sim_core::FrictionContactProblem;
use sim_core::residual::local_error;
use sim_types::{Result, SolveStatus, SolverOptions, SolverReport};
use tracing::trace;

use crate::local::{LocalLaw, LocalSettings, solve_contact};
use crate::operator::ContactOperator;
use crate::solver::{begin, finish};

/// One Gauss-Seidel pass over all contacts of a fixed operator.
///
/// A diagonal shift `σ` makes the sweep act on `W + σI`; the proximal
/// solver uses it.
pub(crate) struct Sweeper<'a> {
    op: &'a ContactOperator<'a>,
    dimension: usize,
    diagonal: Vec<DMatrix<f64>>,
    shifted: Vec<DMatrix<f64>>,
    relaxation: f64,
    local: LocalSettings,
}

impl<'a> Sweeper<'a> {
    pub(crate) fn new(op: &'a ContactOperator<'a>, dimension: usize, shift: f64, options: &SolverOptions) -> Self {
        let contacts = op.size() / dimension;
        let diagonal: Vec<_> = (0..contacts)
            .map(|i| op.diagonal_block(i * dimension, dimension))
            .collect();
        let shifted = diagonal
            .iter()
            .map(|block| block + DMatrix::identity(dimension, dimension) * shift)
            .collect();
        Self {
            op,
            dimension,
            diagonal,
            shifted,
            relaxation: options.relaxation,
            local: LocalSettings {
                max_iterations: options.local_max_iterations,
                tolerance: options.local_tolerance,
            },
        }
    }

    /// Sweep once. `laws[i]` is the law of contact `i`.
    pub(crate) fn sweep(&self, q: &DVector<f64>, laws: &[LocalLaw], reaction: &mut DVector<f64>) {
        let d = self.dimension;
        let mut row = [0.0_f64; 3];
        let mut rhs = [0.0_f64; 3];
        let mut local = [0.0_f64; 3];

        for (i, &law) in laws.iter().enumerate() {
            let row0 = i * d;
            let (row, rhs, local) = (&mut row[..d], &mut rhs[..d], &mut local[..d]);

            self.op.row_product(row0, reaction, row);
            let block = &self.diagonal[i];
            for k in 0..d {
                let own: f64 = (0..d).map(|c| block[(k, c)] * reaction[row0 + c]).sum();
                rhs[k] = q[row0 + k] + row[k] - own;
                local[k] = reaction[row0 + k];
            }

            solve_contact(&self.shifted[i], rhs, law, local, self.local);

            let omega = self.relaxation;
            for k in 0..d {
                let old = reaction[row0 + k];
                reaction[row0 + k] = omega * local[k] + (1.0 - omega) * old;
            }
        }
    }
}

/// Coulomb laws of every contact of `problem`.
pub(crate) fn coulomb_laws(problem: &FrictionContactProblem) -> Vec<LocalLaw> {
    problem.mu.iter().map(|&mu| LocalLaw::Coulomb(mu)).collect()
}

/// Solve `problem` with nonsmooth Gauss-Seidel.
///
/// `reaction` is the initial guess and receives the solution; `velocity`
/// receives `W r + q`. Statistics are written to `options.report`.
///
/// # Errors
///
/// Fails on invalid options or vectors of the wrong size.
pub fn nsgs(
    problem: &FrictionContactProblem,
    reaction: &mut DVector<f64>,
    velocity: &mut DVector<f64>,
    options: &mut SolverOptions,
) -> Result<SolveStatus> {
    if !begin(problem, reaction, velocity, options)? {
        return Ok(SolveStatus::Converged);
    }

    let op = ContactOperator::new(&problem.w, problem.dimension);
    let sweeper = Sweeper::new(&op, problem.dimension, 0.0, options);
    let laws = coulomb_laws(problem);

    let mut report = SolverReport::default();
    for iteration in 1..=options.max_iterations {
        sweeper.sweep(&problem.q, &laws, reaction);
        report.iterations = iteration;

        if iteration % options.error_evaluation_frequency == 0 || iteration == options.max_iterations {
            op.apply_into(reaction, velocity);
            *velocity += &problem.q;
            report.residual = local_error(problem, reaction, velocity);
            if options.verbose {
                trace!(iteration, residual = report.residual, "nsgs sweep");
            }
            if report.residual < options.tolerance {
                report.converged = true;
                break;
            }
        }
    }

    Ok(finish(options, report, "NSGS"))
}
