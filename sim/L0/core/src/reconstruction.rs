//! Global velocity reconstruction.

use nalgebra::DVector;
use sim_types::{NumericsError, Result};

use crate::factorized::FactorizedMass;
use crate::problem::GlobalFrictionContactProblem;

/// Recover `v = M⁻¹ (H r + q)` from a local reaction.
///
/// `mass` must be the factorization of `problem.m` produced by the
/// reformulation. Nothing is mutated, so calling this twice gives the same
/// velocity. With no contacts the result is `M⁻¹ q`.
///
/// # Errors
///
/// Fails if `reaction` or the factors do not match the problem sizes.
pub fn compute_global_velocity(
    problem: &GlobalFrictionContactProblem,
    mass: &FactorizedMass,
    reaction: &DVector<f64>,
) -> Result<DVector<f64>> {
    if mass.dim() != problem.velocity_dim() {
        return Err(NumericsError::dimension("factored mass", problem.velocity_dim(), mass.dim()));
    }
    let m = problem.contact_dim();
    if reaction.len() != m {
        return Err(NumericsError::dimension("reaction", m, reaction.len()));
    }

    let mut rhs = problem.q.clone();
    if m > 0 {
        problem.h.gemv(1.0, reaction, 1.0, &mut rhs)?;
    }
    mass.solve(&rhs)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::matrix::NumericsMatrix;
    use crate::reformulation::reformulate;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    fn problem() -> GlobalFrictionContactProblem {
        let mut h = DMatrix::zeros(3, 3);
        h[(0, 0)] = 1.0;
        h[(1, 1)] = 1.0;
        h[(2, 2)] = 1.0;
        GlobalFrictionContactProblem::new(
            3,
            NumericsMatrix::Dense(DMatrix::from_diagonal(&DVector::from_vec(vec![2.0, 2.0, 2.0]))),
            NumericsMatrix::Dense(h),
            DVector::from_vec(vec![-4.0, 1.0, 0.0]),
            DVector::zeros(3),
            DVector::from_element(1, 0.5),
        )
        .unwrap()
    }

    #[test]
    fn velocity_satisfies_the_dynamics() {
        let problem = problem();
        let reformulation = reformulate(&problem).unwrap();
        let reaction = DVector::from_vec(vec![4.0, -1.0, 0.0]);

        let v = compute_global_velocity(&problem, &reformulation.mass, &reaction).unwrap();
        let residual = problem.m.mul_vec(&v).unwrap() - problem.h.mul_vec(&reaction).unwrap() - &problem.q;
        assert_relative_eq!(residual.norm(), 0.0, epsilon = 1e-14);
        assert_relative_eq!(v.norm(), 0.0, epsilon = 1e-14);
    }

    #[test]
    fn reconstruction_is_repeatable() {
        let problem = problem();
        let reformulation = reformulate(&problem).unwrap();
        let reaction = DVector::from_vec(vec![1.0, 0.5, 0.0]);

        let first = compute_global_velocity(&problem, &reformulation.mass, &reaction).unwrap();
        let second = compute_global_velocity(&problem, &reformulation.mass, &reaction).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn reaction_size_is_checked() {
        let problem = problem();
        let reformulation = reformulate(&problem).unwrap();
        let err = compute_global_velocity(&problem, &reformulation.mass, &DVector::zeros(2)).unwrap_err();
        assert!(matches!(err, NumericsError::DimensionMismatch { what: "reaction", .. }));
    }
}
