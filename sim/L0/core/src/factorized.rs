//! Factorized mass operator.
//!
//! The reformulation factors `M` exactly once and returns the factors as a
//! [`FactorizedMass`]. Holding one proves the factorization happened, so the
//! reconstruction step cannot be called on an unfactored operator.

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CscMatrix;
use nalgebra_sparse::factorization::CscCholesky;
use sim_types::{NumericsError, Result, StorageType};
use tracing::debug;

use crate::linalg::DenseLu;
use crate::matrix::{NumericsMatrix, SparseBlockMatrix};

/// Factorization backing the general-sparse branch.
pub enum SparseFactor {
    /// Sparse Cholesky, used when `M` is symmetric positive definite.
    Cholesky(CscCholesky<f64>),
    /// Dense pivoted LU fallback for operators Cholesky rejects.
    Lu(DenseLu),
}

impl SparseFactor {
    fn solve(&self, b: &DMatrix<f64>) -> DMatrix<f64> {
        match self {
            Self::Cholesky(chol) => chol.solve(b),
            Self::Lu(lu) => {
                let mut x = b.clone();
                lu.solve_matrix_in_place(&mut x);
                x
            }
        }
    }
}

/// Mass operator factors, one variant per storage format.
pub enum FactorizedMass {
    /// Pivoted LU of a dense `M`.
    Dense(DenseLu),
    /// `M⁻¹` with every diagonal block inverted in place.
    SparseBlock(SparseBlockMatrix),
    /// Sparse factor of `M` plus the explicit sparse inverse it produced.
    Sparse {
        /// Factor of `M`.
        factor: SparseFactor,
        /// `M⁻¹` in compressed sparse column storage.
        inverse: CscMatrix<f64>,
    },
}

impl std::fmt::Debug for FactorizedMass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactorizedMass")
            .field("storage", &self.storage())
            .field("dim", &self.dim())
            .finish_non_exhaustive()
    }
}

impl FactorizedMass {
    /// Factor `m` according to its storage format.
    ///
    /// # Errors
    ///
    /// Dense: fails if `m` is singular. Block-sparse: fails if `m` is not
    /// block-diagonal or a block is singular. Sparse: fails only if both the
    /// Cholesky and the LU fallback fail.
    pub fn factorize(m: &NumericsMatrix) -> Result<Self> {
        if m.nrows() != m.ncols() {
            return Err(NumericsError::dimension("mass operator columns", m.nrows(), m.ncols()));
        }

        match m {
            NumericsMatrix::Dense(dense) => Ok(Self::Dense(DenseLu::factor(dense.clone())?)),
            NumericsMatrix::SparseBlock(sbm) => {
                let mut inverse = sbm.clone();
                inverse.invert_diagonal_blocks_in_place()?;
                Ok(Self::SparseBlock(inverse))
            }
            NumericsMatrix::Sparse(csc) => {
                // Cholesky reads one triangle only, so it needs exact symmetry.
                let cholesky = if csc.transpose() == *csc {
                    CscCholesky::factor(csc).map_err(|err| format!("{err:?}"))
                } else {
                    Err("operator is not symmetric".to_owned())
                };
                let factor = match cholesky {
                    Ok(chol) => SparseFactor::Cholesky(chol),
                    Err(reason) => {
                        debug!(%reason, "sparse Cholesky unavailable, falling back to LU");
                        SparseFactor::Lu(DenseLu::factor(DMatrix::from(csc))?)
                    }
                };
                let n = csc.nrows();
                let inverse = CscMatrix::from(&factor.solve(&DMatrix::identity(n, n)));
                Ok(Self::Sparse { factor, inverse })
            }
        }
    }

    /// Storage format of the operator that was factored.
    #[must_use]
    pub const fn storage(&self) -> StorageType {
        match self {
            Self::Dense(_) => StorageType::Dense,
            Self::SparseBlock(_) => StorageType::SparseBlock,
            Self::Sparse { .. } => StorageType::Sparse,
        }
    }

    /// Order of `M`.
    #[must_use]
    pub fn dim(&self) -> usize {
        match self {
            Self::Dense(lu) => lu.dim(),
            Self::SparseBlock(inv) => inv.nrows(),
            Self::Sparse { inverse, .. } => inverse.nrows(),
        }
    }

    /// `M⁻¹ x` as a new vector.
    ///
    /// # Errors
    ///
    /// Fails if `x` has the wrong length.
    pub fn solve(&self, x: &DVector<f64>) -> Result<DVector<f64>> {
        if x.len() != self.dim() {
            return Err(NumericsError::dimension("M⁻¹ operand", self.dim(), x.len()));
        }

        match self {
            Self::Dense(lu) => {
                let mut y = x.clone();
                lu.solve_in_place(&mut y);
                Ok(y)
            }
            Self::SparseBlock(inv) => {
                let mut y = DVector::zeros(x.len());
                inv.view().gemv(1.0, x, 0.0, &mut y)?;
                Ok(y)
            }
            Self::Sparse { factor, .. } => {
                let b = DMatrix::from_column_slice(x.len(), 1, x.as_slice());
                Ok(factor.solve(&b).column(0).into_owned())
            }
        }
    }

    /// `M⁻¹ H` in the storage format of `h`.
    ///
    /// # Errors
    ///
    /// Fails with [`NumericsError::StorageMismatch`] if `h` is not stored
    /// like the factored `M`, or on a row count mismatch.
    pub fn solve_matrix(&self, h: &NumericsMatrix) -> Result<NumericsMatrix> {
        if h.nrows() != self.dim() {
            return Err(NumericsError::dimension("H rows", self.dim(), h.nrows()));
        }

        match (self, h) {
            (Self::Dense(lu), NumericsMatrix::Dense(h)) => {
                let mut x = h.clone();
                lu.solve_matrix_in_place(&mut x);
                Ok(NumericsMatrix::Dense(x))
            }
            (Self::SparseBlock(inv), NumericsMatrix::SparseBlock(h)) => {
                Ok(NumericsMatrix::SparseBlock(inv.view().multiply(&h.view())?))
            }
            (Self::Sparse { inverse, .. }, NumericsMatrix::Sparse(h)) => {
                Ok(NumericsMatrix::Sparse(inverse * h))
            }
            _ => Err(NumericsError::StorageMismatch {
                mass: self.storage(),
                contact_map: h.storage(),
            }),
        }
    }
}
