//! Global pipeline: reformulate, solve, reconstruct.
//!
//! ```text
//! GlobalFrictionContactProblem
//!         │ reformulate (factors M once)
//!         ▼
//! FrictionContactProblem ──solve──► (r, u)
//!         │ compute_global_velocity (reuses the factors)
//!         ▼
//!    v = M⁻¹ (H r + q)
//! ```
//!
//! The first fatal error stops the pipeline; nothing is partially written to
//! the caller's vectors on a failed reformulation.

use nalgebra::DVector;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use sim_core::{
    FactorizedMass, GlobalFrictionContactProblem, GlobalResidual, check_storage, compute_global_velocity,
    global_error, reformulate,
};
use sim_types::{NumericsError, Result, SolveStatus, SolverOptions, SolverReport};
use tracing::debug;

use crate::solver::{family, resolve};

/// Result of [`solve_global`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GlobalSolveOutcome {
    /// Status of the local solve.
    pub status: SolveStatus,
    /// Acceptance error of the returned `(reaction, global_velocity)`.
    ///
    /// `None` when nothing was computed (unsupported solver name).
    pub residual: Option<GlobalResidual>,
    /// The problem had no contacts and the local solve was skipped.
    pub fast_path: bool,
}

impl GlobalSolveOutcome {
    /// Integer status: `0` converged, `1` not converged, `-1` unsupported solver.
    #[must_use]
    pub const fn info(&self) -> i32 {
        self.status.info()
    }

    const fn unsupported() -> Self {
        Self {
            status: SolveStatus::UnsupportedSolver,
            residual: None,
            fast_path: false,
        }
    }
}

fn check_len(what: &'static str, expected: usize, vector: &DVector<f64>) -> Result<()> {
    if vector.len() == expected {
        Ok(())
    } else {
        Err(NumericsError::dimension(what, expected, vector.len()))
    }
}

/// Solve a global problem with the family named in `options`.
///
/// `reaction` and `velocity` (length `d·nc`) hold the initial guess and
/// receive the local solution; `global_velocity` (length `n`) receives
/// `M⁻¹ (H r + q)`.
///
/// With no contacts the local solve is skipped: the report is trivial,
/// `global_velocity = M⁻¹ q` and [`GlobalSolveOutcome::fast_path`] is set.
///
/// # Errors
///
/// - [`NumericsError::StorageMismatch`] if `M` and `H` use different storage.
/// - Factorization and dimension errors from the reformulation.
/// - Option validation errors from the solver family.
///
/// An unknown solver name is not an error; see [`solve`](crate::solve).
pub fn solve_global(
    problem: &GlobalFrictionContactProblem,
    reaction: &mut DVector<f64>,
    velocity: &mut DVector<f64>,
    global_velocity: &mut DVector<f64>,
    options: &mut SolverOptions,
) -> Result<GlobalSolveOutcome> {
    let Some(id) = resolve(options) else {
        return Ok(GlobalSolveOutcome::unsupported());
    };

    problem.validate()?;
    check_storage(problem)?;
    check_len("reaction", problem.contact_dim(), reaction)?;
    check_len("velocity", problem.contact_dim(), velocity)?;
    check_len("global velocity", problem.velocity_dim(), global_velocity)?;

    if problem.number_of_contacts == 0 {
        options.validate()?;
        debug!(solver = %id, "no contacts, reconstructing free velocity");
        let mass = FactorizedMass::factorize(&problem.m)?;
        *global_velocity = compute_global_velocity(problem, &mass, reaction)?;
        options.report = SolverReport::trivial();
        return Ok(GlobalSolveOutcome {
            status: SolveStatus::Converged,
            residual: Some(global_error(problem, reaction, global_velocity)?),
            fast_path: true,
        });
    }

    let reformulation = reformulate(problem)?;
    let status = family(id)(&reformulation.local, reaction, velocity, options)?;
    *global_velocity = compute_global_velocity(problem, &reformulation.mass, reaction)?;
    let residual = global_error(problem, reaction, global_velocity)?;

    debug!(
        solver = %id,
        info = status.info(),
        dynamics = residual.dynamics,
        complementarity = residual.complementarity,
        "global solve finished"
    );

    Ok(GlobalSolveOutcome {
        status,
        residual: Some(residual),
        fast_path: false,
    })
}
