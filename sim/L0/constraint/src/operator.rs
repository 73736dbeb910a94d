//! Contact-space view of the Delassus operator.
//!
//! The solvers need four things from `W`: the product of one contact's rows
//! with the reaction, the diagonal block of one contact, the full product
//! `W r`, and a factorization of `W + ρI`. [`ContactOperator`] provides them
//! without converting the operator away from its storage format when it can.

use nalgebra::{DMatrix, DVector};
use nalgebra::linalg::Cholesky;
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::{CooMatrix, CscMatrix, CsrMatrix};
use sim_core::NumericsMatrix;
use sim_core::SparseBlockView;
use sim_core::linalg::DenseLu;
use sim_types::Result;
use tracing::debug;

/// Borrowed or row-compressed access to `W`.
#[derive(Debug)]
pub enum ContactOperator<'a> {
    /// Dense `W`.
    Dense(&'a DMatrix<f64>),
    /// Block-sparse `W` whose block rows never split a contact.
    Blocks(SparseBlockView<'a>),
    /// Scalar rows; used for general sparse `W` and for block partitions
    /// that split contacts.
    Rows(CsrMatrix<f64>),
}

impl<'a> ContactOperator<'a> {
    /// Wrap `w` for contacts of size `dimension`.
    #[must_use]
    pub fn new(w: &'a NumericsMatrix, dimension: usize) -> Self {
        match w {
            NumericsMatrix::Dense(dense) => Self::Dense(dense),
            NumericsMatrix::SparseBlock(sbm) => {
                let view = sbm.view();
                if view.row_offsets().iter().all(|offset| offset % dimension == 0) {
                    Self::Blocks(view)
                } else {
                    debug!("block rows split contacts, switching to row storage");
                    Self::Rows(CsrMatrix::from(&view.to_csc()))
                }
            }
            NumericsMatrix::Sparse(csc) => Self::Rows(CsrMatrix::from(csc)),
        }
    }

    /// Order of `W`.
    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            Self::Dense(w) => w.nrows(),
            Self::Blocks(view) => view.nrows(),
            Self::Rows(csr) => csr.nrows(),
        }
    }

    /// `out = W[row0..row0 + out.len(), :] · r`.
    pub fn row_product(&self, row0: usize, r: &DVector<f64>, out: &mut [f64]) {
        out.fill(0.0);
        match self {
            Self::Dense(w) => {
                for (k, o) in out.iter_mut().enumerate() {
                    *o = w.row(row0 + k).iter().zip(r.iter()).map(|(a, b)| a * b).sum();
                }
            }
            Self::Blocks(view) => {
                let bi = view.block_row_of(row0);
                let local0 = row0 - view.row_start(bi);
                for (bj, block) in view.row_blocks(bi) {
                    let c0 = view.col_start(bj);
                    for (k, o) in out.iter_mut().enumerate() {
                        for c in 0..block.ncols() {
                            *o += block[(local0 + k, c)] * r[c0 + c];
                        }
                    }
                }
            }
            Self::Rows(csr) => {
                for (k, o) in out.iter_mut().enumerate() {
                    let row = csr.row(row0 + k);
                    *o = row.col_indices().iter().zip(row.values()).map(|(&j, v)| v * r[j]).sum();
                }
            }
        }
    }

    /// The `d × d` block of `W` starting at `(row0, row0)`.
    #[must_use]
    pub fn diagonal_block(&self, row0: usize, d: usize) -> DMatrix<f64> {
        match self {
            Self::Dense(w) => w.view((row0, row0), (d, d)).into_owned(),
            Self::Blocks(view) => {
                let mut out = DMatrix::zeros(d, d);
                let bi = view.block_row_of(row0);
                let local0 = row0 - view.row_start(bi);
                for (bj, block) in view.row_blocks(bi) {
                    let c0 = view.col_start(bj);
                    for c in 0..block.ncols() {
                        let col = c0 + c;
                        if col >= row0 && col < row0 + d {
                            for k in 0..d {
                                out[(k, col - row0)] = block[(local0 + k, c)];
                            }
                        }
                    }
                }
                out
            }
            Self::Rows(csr) => {
                let mut out = DMatrix::zeros(d, d);
                for k in 0..d {
                    let row = csr.row(row0 + k);
                    for (&j, &v) in row.col_indices().iter().zip(row.values()) {
                        if j >= row0 && j < row0 + d {
                            out[(k, j - row0)] = v;
                        }
                    }
                }
                out
            }
        }
    }

    /// `W r` as a new vector.
    #[must_use]
    pub fn apply(&self, r: &DVector<f64>) -> DVector<f64> {
        let mut out = DVector::zeros(self.size());
        self.apply_into(r, &mut out);
        out
    }

    /// `out = W r`.
    pub fn apply_into(&self, r: &DVector<f64>, out: &mut DVector<f64>) {
        match self {
            Self::Dense(w) => out.gemv(1.0, w, r, 0.0),
            Self::Blocks(view) => {
                out.fill(0.0);
                for (bi, bj, block) in view.iter_blocks() {
                    let r0 = view.row_start(bi);
                    let c0 = view.col_start(bj);
                    for c in 0..block.ncols() {
                        let x = r[c0 + c];
                        if x != 0.0 {
                            for k in 0..block.nrows() {
                                out[r0 + k] += block[(k, c)] * x;
                            }
                        }
                    }
                }
            }
            Self::Rows(csr) => {
                for (i, row) in csr.row_iter().enumerate() {
                    out[i] = row.col_indices().iter().zip(row.values()).map(|(&j, v)| v * r[j]).sum();
                }
            }
        }
    }

    /// Infinity norm of `W`.
    #[must_use]
    pub fn norm_inf(&self) -> f64 {
        match self {
            Self::Dense(w) => sim_core::linalg::norm_inf(w),
            Self::Blocks(view) => {
                let mut sums = vec![0.0_f64; view.nrows()];
                for (bi, _, block) in view.iter_blocks() {
                    let r0 = view.row_start(bi);
                    for (k, row) in block.row_iter().enumerate() {
                        sums[r0 + k] += row.iter().map(|v| v.abs()).sum::<f64>();
                    }
                }
                sums.into_iter().fold(0.0, f64::max)
            }
            Self::Rows(csr) => csr
                .row_iter()
                .map(|row| row.values().iter().map(|v| v.abs()).sum::<f64>())
                .fold(0.0, f64::max),
        }
    }

    /// Dense copy of `W`.
    #[must_use]
    pub fn to_dense(&self) -> DMatrix<f64> {
        match self {
            Self::Dense(w) => (*w).clone(),
            Self::Blocks(view) => view.to_dense(),
            Self::Rows(csr) => DMatrix::from(csr),
        }
    }

    /// Factor `W + rho I`.
    ///
    /// # Errors
    ///
    /// Fails if `W + rho I` is singular.
    pub fn shifted_factor(&self, rho: f64) -> Result<ShiftedFactor> {
        let n = self.size();
        match self {
            Self::Dense(w) => {
                let shifted = *w + DMatrix::identity(n, n) * rho;
                if shifted != shifted.transpose() {
                    debug!(n, "W + rho I is not symmetric, using LU");
                    return Ok(ShiftedFactor::Lu(DenseLu::factor(shifted)?));
                }
                match Cholesky::new(shifted.clone()) {
                    Some(chol) => Ok(ShiftedFactor::Dense(chol)),
                    None => Ok(ShiftedFactor::Lu(DenseLu::factor(shifted)?)),
                }
            }
            Self::Blocks(_) | Self::Rows(_) => {
                let csc = match self {
                    Self::Blocks(view) => view.to_csc(),
                    _ => CscMatrix::from(&self.to_rows()),
                };
                let mut coo = CooMatrix::new(n, n);
                for (i, j, &v) in csc.triplet_iter() {
                    coo.push(i, j, v);
                }
                for i in 0..n {
                    coo.push(i, i, rho);
                }
                let shifted = CscMatrix::from(&coo);
                if shifted.transpose() != shifted {
                    debug!(n, "W + rho I is not symmetric, using LU");
                    return Ok(ShiftedFactor::Lu(DenseLu::factor(DMatrix::from(&shifted))?));
                }
                match CscCholesky::factor(&shifted) {
                    Ok(chol) => Ok(ShiftedFactor::Sparse(chol)),
                    Err(err) => {
                        debug!(?err, "sparse Cholesky of W + rho I failed, using LU");
                        Ok(ShiftedFactor::Lu(DenseLu::factor(DMatrix::from(&shifted))?))
                    }
                }
            }
        }
    }

    fn to_rows(&self) -> CsrMatrix<f64> {
        match self {
            Self::Rows(csr) => csr.clone(),
            Self::Blocks(view) => CsrMatrix::from(&view.to_csc()),
            Self::Dense(w) => CsrMatrix::from(*w),
        }
    }
}

/// Factors of `W + rho I`.
pub enum ShiftedFactor {
    /// Dense Cholesky.
    Dense(Cholesky<f64, nalgebra::Dyn>),
    /// Sparse Cholesky.
    Sparse(CscCholesky<f64>),
    /// Pivoted LU fallback.
    Lu(DenseLu),
}

impl std::fmt::Debug for ShiftedFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::Dense(_) => "dense-cholesky",
            Self::Sparse(_) => "sparse-cholesky",
            Self::Lu(_) => "lu",
        };
        f.debug_tuple("ShiftedFactor").field(&kind).finish()
    }
}

impl ShiftedFactor {
    /// Overwrite `b` with `(W + rho I)⁻¹ b`.
    pub fn solve_in_place(&self, b: &mut DVector<f64>) {
        match self {
            Self::Dense(chol) => chol.solve_mut(b),
            Self::Sparse(chol) => {
                let rhs = DMatrix::from_column_slice(b.len(), 1, b.as_slice());
                let x = chol.solve(&rhs);
                b.copy_from(&x.column(0));
            }
            Self::Lu(lu) => lu.solve_in_place(b),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sim_core::SparseBlockMatrix;

    fn sample() -> DMatrix<f64> {
        DMatrix::from_row_slice(
            4,
            4,
            &[
                4.0, 1.0, 0.5, 0.0, //
                1.0, 3.0, 0.0, 0.2, //
                0.5, 0.0, 5.0, 1.0, //
                0.0, 0.2, 1.0, 2.0,
            ],
        )
    }

    fn all_storages() -> Vec<NumericsMatrix> {
        storages_of(&sample())
    }

    fn storages_of(w: &DMatrix<f64>) -> Vec<NumericsMatrix> {
        vec![
            NumericsMatrix::Dense(w.clone()),
            NumericsMatrix::SparseBlock(SparseBlockMatrix::from_dense(w, &[2, 2], &[2, 2]).unwrap()),
            // Block rows of size 1 and 3 split a 2-contact layout.
            NumericsMatrix::SparseBlock(SparseBlockMatrix::from_dense(w, &[1, 3], &[1, 3]).unwrap()),
            NumericsMatrix::Sparse(CscMatrix::from(w)),
        ]
    }

    #[test]
    fn storages_agree_on_every_query() {
        let w = sample();
        let r = DVector::from_vec(vec![1.0, -2.0, 0.5, 3.0]);
        let expected = &w * &r;

        for storage in all_storages() {
            let op = ContactOperator::new(&storage, 2);
            assert_eq!(op.size(), 4);
            assert_relative_eq!(op.apply(&r), expected, epsilon = 1e-14);

            let mut rows = [0.0; 2];
            op.row_product(2, &r, &mut rows);
            assert_relative_eq!(rows[0], expected[2], epsilon = 1e-14);
            assert_relative_eq!(rows[1], expected[3], epsilon = 1e-14);

            let block = op.diagonal_block(2, 2);
            assert_relative_eq!(block, w.view((2, 2), (2, 2)).into_owned());
            assert_relative_eq!(op.norm_inf(), 6.5, epsilon = 1e-14);
            assert_relative_eq!(op.to_dense(), w);
        }
    }

    #[test]
    fn split_partition_falls_back_to_rows() {
        let storages = all_storages();
        assert!(matches!(ContactOperator::new(&storages[1], 2), ContactOperator::Blocks(_)));
        assert!(matches!(ContactOperator::new(&storages[2], 2), ContactOperator::Rows(_)));
    }

    #[test]
    fn shifted_factor_solves_the_shifted_system() {
        let w = sample();
        let rhs = DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0]);
        let expected = (w + DMatrix::identity(4, 4) * 0.5).lu().solve(&rhs).unwrap();

        for storage in all_storages() {
            let op = ContactOperator::new(&storage, 2);
            let factor = op.shifted_factor(0.5).unwrap();
            let mut x = rhs.clone();
            factor.solve_in_place(&mut x);
            assert_relative_eq!(x, expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn unsymmetric_shift_is_factored_by_lu() {
        let mut w = sample();
        w[(1, 0)] = 1.5;
        w[(2, 3)] = -0.7;
        let rhs = DVector::from_vec(vec![1.0, -2.0, 3.0, 0.5]);
        let expected = (&w + DMatrix::identity(4, 4) * 0.5).lu().solve(&rhs).unwrap();

        for storage in storages_of(&w) {
            let op = ContactOperator::new(&storage, 2);
            let factor = op.shifted_factor(0.5).unwrap();
            assert!(matches!(factor, ShiftedFactor::Lu(_)), "{factor:?}");
            let mut x = rhs.clone();
            factor.solve_in_place(&mut x);
            assert_relative_eq!(x, expected, epsilon = 1e-12);
        }
    }
}
