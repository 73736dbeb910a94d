//! Shared fixtures for the contact pipeline integration tests.
//!
//! The reference scenario is a single 3D contact between two 9-DOF halves:
//!
//! ```text
//! M = I₉,   H = [e0 − e6 | e1 − e7 | e2 − e8],   q = [-3,-3,-3,-1,1,3,-1,1,3]
//! ```
//!
//! which reduces to `W = 2I`, `q_local = (-2, -4, -6)`. With `μ = 0.1` the
//! contact slides: `r = (1, 0.1·4/√52, 0.1·6/√52)`, `u_n = 0`.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CscMatrix;
use sim_core::{GlobalFrictionContactProblem, NumericsMatrix, Result, SparseBlockMatrix, StorageType};

/// Body degrees of freedom of the reference scenario.
pub const DOFS: usize = 9;

/// Friction coefficient of the reference contact.
pub const MU: f64 = 0.1;

/// Storage formats exercised by the cross-format tests.
pub const STORAGES: [StorageType; 3] = [StorageType::Dense, StorageType::SparseBlock, StorageType::Sparse];

#[must_use]
pub fn mass() -> DMatrix<f64> {
    DMatrix::identity(DOFS, DOFS)
}

#[must_use]
pub fn contact_map() -> DMatrix<f64> {
    let mut h = DMatrix::zeros(DOFS, 3);
    for k in 0..3 {
        h[(k, k)] = 1.0;
        h[(k + 6, k)] = -1.0;
    }
    h
}

#[must_use]
pub fn free_velocity() -> DVector<f64> {
    DVector::from_vec(vec![-3.0, -3.0, -3.0, -1.0, 1.0, 3.0, -1.0, 1.0, 3.0])
}

/// Exact reaction of the reference contact.
#[must_use]
pub fn expected_reaction() -> DVector<f64> {
    let norm = 52.0_f64.sqrt();
    DVector::from_vec(vec![1.0, MU * 4.0 / norm, MU * 6.0 / norm])
}

/// Store `dense` in `storage`, with block rows of 3 for the block-sparse format.
///
/// # Errors
///
/// Fails if the dimensions are not multiples of 3.
pub fn stored(dense: &DMatrix<f64>, storage: StorageType) -> Result<NumericsMatrix> {
    Ok(match storage {
        StorageType::Dense => NumericsMatrix::Dense(dense.clone()),
        StorageType::SparseBlock => {
            let rows = vec![3; dense.nrows() / 3];
            let cols = vec![3; dense.ncols() / 3];
            NumericsMatrix::SparseBlock(SparseBlockMatrix::from_dense(dense, &rows, &cols)?)
        }
        StorageType::Sparse => NumericsMatrix::Sparse(CscMatrix::from(dense)),
    })
}

/// The reference scenario with `M` and `H` in `storage`.
///
/// # Errors
///
/// Propagates storage and validation errors.
pub fn single_contact(storage: StorageType) -> Result<GlobalFrictionContactProblem> {
    GlobalFrictionContactProblem::new(
        3,
        stored(&mass(), storage)?,
        stored(&contact_map(), storage)?,
        free_velocity(),
        DVector::zeros(3),
        DVector::from_element(1, MU),
    )
}

/// The reference bodies with no contact at all.
///
/// # Errors
///
/// Propagates storage and validation errors.
pub fn no_contacts(storage: StorageType) -> Result<GlobalFrictionContactProblem> {
    let m = stored(&mass(), storage)?;
    let h = match storage {
        StorageType::Dense => NumericsMatrix::Dense(DMatrix::zeros(DOFS, 0)),
        StorageType::SparseBlock => {
            NumericsMatrix::SparseBlock(SparseBlockMatrix::new(&[3, 3, 3], &[], std::iter::empty())?)
        }
        StorageType::Sparse => NumericsMatrix::Sparse(CscMatrix::zeros(DOFS, 0)),
    };
    GlobalFrictionContactProblem::new(3, m, h, free_velocity(), DVector::zeros(0), DVector::zeros(0))
}

/// Normal and cone conditions of a contact solution, within `tol`.
#[must_use]
pub fn satisfies_coulomb(reaction: &DVector<f64>, velocity: &DVector<f64>, mu: &DVector<f64>, tol: f64) -> bool {
    reaction
        .as_slice()
        .chunks(3)
        .zip(velocity.as_slice().chunks(3))
        .zip(mu.iter())
        .all(|((r, u), &mu)| {
            let tangential = r[1].hypot(r[2]);
            r[0] >= -tol && u[0] >= -tol && (r[0] * u[0]).abs() <= tol && tangential <= mu * r[0] + tol
        })
}
