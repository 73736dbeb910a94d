//! Storage-polymorphic matrix operators.
//!
//! [`NumericsMatrix`] is the one operator type the reformulation and the
//! solvers see. Each variant keeps its native storage; operations that need
//! two operands (products) require both to share a storage format.

mod block_sparse;

pub use block_sparse::{SparseBlockMatrix, SparseBlockView};

pub(crate) use block_sparse::cumulative_sizes;

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CscMatrix;
use sim_types::{NumericsError, Result, StorageType};

/// A matrix in one of the supported storage formats.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericsMatrix {
    /// Column-major dense storage.
    Dense(DMatrix<f64>),
    /// Block-CSR storage of dense blocks.
    SparseBlock(SparseBlockMatrix),
    /// Scalar compressed sparse column storage.
    Sparse(CscMatrix<f64>),
}

impl From<DMatrix<f64>> for NumericsMatrix {
    fn from(m: DMatrix<f64>) -> Self {
        Self::Dense(m)
    }
}

impl From<SparseBlockMatrix> for NumericsMatrix {
    fn from(m: SparseBlockMatrix) -> Self {
        Self::SparseBlock(m)
    }
}

impl From<CscMatrix<f64>> for NumericsMatrix {
    fn from(m: CscMatrix<f64>) -> Self {
        Self::Sparse(m)
    }
}

impl NumericsMatrix {
    /// Storage tag of this operator.
    #[must_use]
    pub const fn storage(&self) -> StorageType {
        match self {
            Self::Dense(_) => StorageType::Dense,
            Self::SparseBlock(_) => StorageType::SparseBlock,
            Self::Sparse(_) => StorageType::Sparse,
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn nrows(&self) -> usize {
        match self {
            Self::Dense(m) => m.nrows(),
            Self::SparseBlock(m) => m.nrows(),
            Self::Sparse(m) => m.nrows(),
        }
    }

    /// Number of columns.
    #[must_use]
    pub fn ncols(&self) -> usize {
        match self {
            Self::Dense(m) => m.ncols(),
            Self::SparseBlock(m) => m.ncols(),
            Self::Sparse(m) => m.ncols(),
        }
    }

    /// `y = alpha * A * x + beta * y`.
    ///
    /// # Errors
    ///
    /// Fails if `x` or `y` has the wrong length.
    pub fn gemv(&self, alpha: f64, x: &DVector<f64>, beta: f64, y: &mut DVector<f64>) -> Result<()> {
        if x.len() != self.ncols() {
            return Err(NumericsError::dimension("gemv input", self.ncols(), x.len()));
        }
        if y.len() != self.nrows() {
            return Err(NumericsError::dimension("gemv output", self.nrows(), y.len()));
        }

        match self {
            Self::Dense(m) => y.gemv(alpha, m, x, beta),
            Self::SparseBlock(m) => m.view().gemv(alpha, x, beta, y)?,
            Self::Sparse(m) => {
                let ax: DVector<f64> = m * x;
                y.axpy(alpha, &ax, beta);
            }
        }
        Ok(())
    }

    /// `y = alpha * Aᵀ * x + beta * y`.
    ///
    /// # Errors
    ///
    /// Fails if `x` or `y` has the wrong length.
    pub fn gemv_transpose(
        &self,
        alpha: f64,
        x: &DVector<f64>,
        beta: f64,
        y: &mut DVector<f64>,
    ) -> Result<()> {
        if x.len() != self.nrows() {
            return Err(NumericsError::dimension("gemv_transpose input", self.nrows(), x.len()));
        }
        if y.len() != self.ncols() {
            return Err(NumericsError::dimension("gemv_transpose output", self.ncols(), y.len()));
        }

        match self {
            Self::Dense(m) => y.gemv_tr(alpha, m, x, beta),
            Self::SparseBlock(m) => m.view().gemv_transpose(alpha, x, beta, y)?,
            Self::Sparse(m) => {
                for (j, col) in m.col_iter().enumerate() {
                    let dot: f64 = col
                        .row_indices()
                        .iter()
                        .zip(col.values())
                        .map(|(&i, &v)| v * x[i])
                        .sum();
                    y[j] = beta.mul_add(y[j], alpha * dot);
                }
            }
        }
        Ok(())
    }

    /// `A * x` as a new vector.
    ///
    /// # Errors
    ///
    /// Fails if `x` has the wrong length.
    pub fn mul_vec(&self, x: &DVector<f64>) -> Result<DVector<f64>> {
        let mut y = DVector::zeros(self.nrows());
        self.gemv(1.0, x, 0.0, &mut y)?;
        Ok(y)
    }

    /// Transpose in the same storage format.
    #[must_use]
    pub fn transpose(&self) -> Self {
        match self {
            Self::Dense(m) => Self::Dense(m.transpose()),
            Self::SparseBlock(m) => Self::SparseBlock(m.view().transpose()),
            Self::Sparse(m) => Self::Sparse(m.transpose()),
        }
    }

    /// Product `self * rhs` in the shared storage format.
    ///
    /// # Errors
    ///
    /// Fails with [`NumericsError::StorageMismatch`] if the formats differ,
    /// or with a dimension error if the shapes do not chain.
    pub fn multiply(&self, rhs: &Self) -> Result<Self> {
        if self.ncols() != rhs.nrows() {
            return Err(NumericsError::dimension("product inner size", self.ncols(), rhs.nrows()));
        }

        match (self, rhs) {
            (Self::Dense(a), Self::Dense(b)) => Ok(Self::Dense(a * b)),
            (Self::SparseBlock(a), Self::SparseBlock(b)) => {
                Ok(Self::SparseBlock(a.view().multiply(&b.view())?))
            }
            (Self::Sparse(a), Self::Sparse(b)) => Ok(Self::Sparse(a * b)),
            _ => Err(NumericsError::StorageMismatch {
                mass: self.storage(),
                contact_map: rhs.storage(),
            }),
        }
    }

    /// Dense copy, regardless of storage.
    #[must_use]
    pub fn to_dense(&self) -> DMatrix<f64> {
        match self {
            Self::Dense(m) => m.clone(),
            Self::SparseBlock(m) => m.view().to_dense(),
            Self::Sparse(m) => DMatrix::from(m),
        }
    }

    /// Scalar sparse copy, regardless of storage.
    #[must_use]
    pub fn to_csc(&self) -> CscMatrix<f64> {
        match self {
            Self::Dense(m) => CscMatrix::from(m),
            Self::SparseBlock(m) => m.view().to_csc(),
            Self::Sparse(m) => m.clone(),
        }
    }

    /// Infinity norm (max absolute row sum).
    #[must_use]
    pub fn norm_inf(&self) -> f64 {
        match self {
            Self::Dense(m) => crate::linalg::norm_inf(m),
            Self::SparseBlock(_) | Self::Sparse(_) => {
                let mut sums = vec![0.0_f64; self.nrows()];
                for (i, _, v) in self.to_csc().triplet_iter() {
                    sums[i] += v.abs();
                }
                sums.into_iter().fold(0.0, f64::max)
            }
        }
    }

    /// Borrow the block-sparse view, if this is block-sparse storage.
    #[must_use]
    pub fn as_sparse_block(&self) -> Option<SparseBlockView<'_>> {
        match self {
            Self::SparseBlock(m) => Some(m.view()),
            _ => None,
        }
    }
}
