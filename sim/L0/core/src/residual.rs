//! Error evaluators for local and global solutions.

use nalgebra::DVector;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use sim_types::{NumericsError, Result};

use crate::cone::complementarity_error;
use crate::problem::{FrictionContactProblem, GlobalFrictionContactProblem};

/// Relative complementarity error of a local solution.
///
/// `velocity` must equal `W r + q`. The summed natural-map residual is
/// divided by `‖q‖` when `‖q‖` is not negligible.
#[must_use]
pub fn local_error(problem: &FrictionContactProblem, reaction: &DVector<f64>, velocity: &DVector<f64>) -> f64 {
    let error = complementarity_error(
        reaction.as_slice(),
        velocity.as_slice(),
        problem.mu.as_slice(),
        problem.dimension,
    );
    let norm_q = problem.q.norm();
    if norm_q > f64::EPSILON { error / norm_q } else { error }
}

/// Both parts of the acceptance error of a global solution.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GlobalResidual {
    /// `‖M v − H r − q‖ / (1 + ‖q‖)`.
    pub dynamics: f64,
    /// Natural-map residual of `(r, Hᵀ v + b)` over `1 + ‖b‖`.
    pub complementarity: f64,
    /// The larger of the two.
    pub total: f64,
}

/// Evaluate a global solution `(reaction, global_velocity)`.
///
/// # Errors
///
/// Fails if the vectors do not match the problem sizes.
pub fn global_error(
    problem: &GlobalFrictionContactProblem,
    reaction: &DVector<f64>,
    global_velocity: &DVector<f64>,
) -> Result<GlobalResidual> {
    let m = problem.contact_dim();
    if reaction.len() != m {
        return Err(NumericsError::dimension("reaction", m, reaction.len()));
    }

    let mut dynamics = problem.m.mul_vec(global_velocity)?;
    dynamics -= &problem.q;
    if m > 0 {
        problem.h.gemv(-1.0, reaction, 1.0, &mut dynamics)?;
    }
    let dynamics = dynamics.norm() / (1.0 + problem.q.norm());

    let mut velocity = problem.b.clone();
    problem.h.gemv_transpose(1.0, global_velocity, 1.0, &mut velocity)?;
    let complementarity = complementarity_error(
        reaction.as_slice(),
        velocity.as_slice(),
        problem.mu.as_slice(),
        problem.dimension,
    ) / (1.0 + problem.b.norm());

    Ok(GlobalResidual {
        dynamics,
        complementarity,
        total: dynamics.max(complementarity),
    })
}
