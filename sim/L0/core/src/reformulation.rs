//! Global-to-local reformulation.
//!
//! Eliminates the body velocities from a [`GlobalFrictionContactProblem`]:
//!
//! ```text
//! W       = Hᵀ M⁻¹ H
//! q_local = Hᵀ M⁻¹ q + b
//! ```
//!
//! Each storage format keeps its own branch. `M` is factored once and the
//! factors travel with the local problem so the reconstruction can reuse them.

use nalgebra::DVector;
use sim_types::{NumericsError, Result};
use tracing::{debug, warn};

use crate::factorized::FactorizedMass;
use crate::problem::{FrictionContactProblem, GlobalFrictionContactProblem};

/// A local problem together with the factored mass operator it came from.
#[derive(Debug)]
pub struct Reformulation {
    /// Problem in contact space.
    pub local: FrictionContactProblem,
    /// Factors of `M`, consumed by the reconstruction.
    pub mass: FactorizedMass,
}

/// Check that `M` and `H` share a storage format.
///
/// # Errors
///
/// Returns [`NumericsError::StorageMismatch`] (logged at warn level) if they differ.
pub fn check_storage(problem: &GlobalFrictionContactProblem) -> Result<()> {
    let mass = problem.m.storage();
    let contact_map = problem.h.storage();
    if mass == contact_map {
        return Ok(());
    }
    warn!(%mass, %contact_map, "mass operator and contact map use different storage");
    Err(NumericsError::StorageMismatch { mass, contact_map })
}

/// Build the local problem of `problem`.
///
/// `W` is stored like `M` and `H`. The mass operator is factored exactly
/// once; the factors are returned alongside the local problem.
///
/// # Errors
///
/// - [`NumericsError::StorageMismatch`] if `M` and `H` use different storage.
/// - Factorization errors from [`FactorizedMass::factorize`].
/// - Validation errors if the problem sizes disagree.
pub fn reformulate(problem: &GlobalFrictionContactProblem) -> Result<Reformulation> {
    problem.validate()?;
    check_storage(problem)?;

    let storage = problem.m.storage();
    debug!(
        %storage,
        n = problem.velocity_dim(),
        nc = problem.number_of_contacts,
        "reformulating global problem"
    );

    let mass = FactorizedMass::factorize(&problem.m)?;

    let minv_h = mass.solve_matrix(&problem.h)?;
    let w = problem.h.transpose().multiply(&minv_h)?;

    let minv_q = mass.solve(&problem.q)?;
    let mut q_local: DVector<f64> = problem.b.clone();
    problem.h.gemv_transpose(1.0, &minv_q, 1.0, &mut q_local)?;

    let local = FrictionContactProblem::new(problem.dimension, w, q_local, problem.mu.clone())?;
    Ok(Reformulation { local, mass })
}
