//! Dense linear algebra: pivoted LU factorization and small-matrix helpers.
//!
//! The dense branch of the reformulation factors the mass operator once and
//! keeps the factors inside a [`DenseLu`] handle. Every later solve against
//! `M` (building `M⁻¹H`, `M⁻¹q`, and reconstructing the global velocity)
//! reuses those factors.

use nalgebra::{DMatrix, DVector};
use sim_types::{NumericsError, Result};

// ============================================================================
// LU Factorization
// ============================================================================

/// Relative pivot threshold: a pivot smaller than this times `‖A‖∞` is zero.
const PIVOT_RELATIVE_TOLERANCE: f64 = 1e-14;

/// Owned LU factors `P·A = L·U` of a square matrix.
///
/// Created once from the mass operator and then shared read-only by every
/// solve that needs `M⁻¹`. `L` (unit lower) and `U` share one buffer.
#[derive(Debug, Clone)]
pub struct DenseLu {
    factors: DMatrix<f64>,
    pivots: Vec<usize>,
}

impl DenseLu {
    /// Factor `a` with partial pivoting, taking ownership of its buffer.
    ///
    /// # Errors
    ///
    /// Returns [`NumericsError::DimensionMismatch`] if `a` is not square, or
    /// [`NumericsError::Singular`] if a pivot falls below the relative
    /// threshold.
    pub fn factor(a: DMatrix<f64>) -> Result<Self> {
        let n = a.nrows();
        if a.ncols() != n {
            return Err(NumericsError::dimension("LU operand columns", n, a.ncols()));
        }
        let mut lu = Self {
            factors: a,
            pivots: vec![0; n],
        };
        lu.eliminate()?;
        Ok(lu)
    }

    fn eliminate(&mut self) -> Result<()> {
        let n = self.dim();
        let a = &mut self.factors;
        let threshold = PIVOT_RELATIVE_TOLERANCE * norm_inf(a).max(f64::MIN_POSITIVE);

        for k in 0..n {
            let (offset, largest) = a
                .view((k, k), (n - k, 1))
                .iter()
                .map(|v| v.abs())
                .enumerate()
                .fold((0, -1.0), |best, (i, v)| if v > best.1 { (i, v) } else { best });
            if largest <= threshold {
                return Err(NumericsError::Singular { pivot: k });
            }
            self.pivots[k] = k + offset;
            if offset != 0 {
                a.swap_rows(k, k + offset);
            }

            let pivot = a[(k, k)];
            for i in (k + 1)..n {
                let l = a[(i, k)] / pivot;
                a[(i, k)] = l;
                for j in (k + 1)..n {
                    a[(i, j)] -= l * a[(k, j)];
                }
            }
        }
        Ok(())
    }

    /// Order of the factored matrix.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.factors.nrows()
    }

    /// Overwrite `x` with `A⁻¹x`.
    pub fn solve_in_place(&self, x: &mut DVector<f64>) {
        self.substitute(x.as_mut_slice());
    }

    /// Overwrite every column of `x` with `A⁻¹x`.
    pub fn solve_matrix_in_place(&self, x: &mut DMatrix<f64>) {
        let n = self.dim();
        if n == 0 {
            return;
        }
        // Column-major: each chunk is one right-hand side.
        for column in x.as_mut_slice().chunks_exact_mut(n) {
            self.substitute(column);
        }
    }

    /// Explicit inverse. Used only where a sparse inverse must be stored.
    #[must_use]
    pub fn inverse(&self) -> DMatrix<f64> {
        let n = self.dim();
        let mut inv = DMatrix::identity(n, n);
        self.solve_matrix_in_place(&mut inv);
        inv
    }

    /// Row swaps, then `L` forward and `U` back substitution on one column.
    fn substitute(&self, column: &mut [f64]) {
        let a = &self.factors;
        let n = self.dim();
        for (k, &p) in self.pivots.iter().enumerate() {
            column.swap(k, p);
        }
        for i in 1..n {
            let acc: f64 = (0..i).map(|k| a[(i, k)] * column[k]).sum();
            column[i] -= acc;
        }
        for i in (0..n).rev() {
            let acc: f64 = ((i + 1)..n).map(|k| a[(i, k)] * column[k]).sum();
            column[i] = (column[i] - acc) / a[(i, i)];
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Infinity norm (max absolute row sum).
#[must_use]
pub fn norm_inf(a: &DMatrix<f64>) -> f64 {
    a.row_iter()
        .map(|row| row.iter().map(|v| v.abs()).sum::<f64>())
        .fold(0.0, f64::max)
}

/// Invert a small dense block.
///
/// # Errors
///
/// Returns [`NumericsError::SingularBlock`] tagged with `block` on failure.
pub fn invert_block(a: &DMatrix<f64>, block: usize) -> Result<DMatrix<f64>> {
    DenseLu::factor(a.clone())
        .map(|lu| lu.inverse())
        .map_err(|_| NumericsError::SingularBlock { block })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::cast_precision_loss)]
mod lu_tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Generate a random well-conditioned (non-symmetric) matrix of size n×n.
    fn random_matrix(n: usize, seed: u64) -> DMatrix<f64> {
        // Deterministic pseudo-random via simple LCG
        let mut state = seed;
        let mut next = || -> f64 {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1);
            ((state >> 33) as f64) / f64::from(u32::MAX) - 0.5
        };

        DMatrix::from_fn(n, n, |_, _| next()) + DMatrix::identity(n, n) * (n as f64)
    }

    #[test]
    fn lu_matches_nalgebra() {
        for &n in &[1, 2, 3, 6, 9, 20] {
            let a = random_matrix(n, 7 + n as u64);
            let rhs = DVector::from_fn(n, |i, _| (i as f64 + 1.0) * 0.3);

            let x_ref = a.clone().lu().solve(&rhs).expect("nalgebra LU failed");

            let lu = DenseLu::factor(a.clone()).expect("LU failed");
            let mut x = rhs.clone();
            lu.solve_in_place(&mut x);

            for i in 0..n {
                assert_relative_eq!(x[i], x_ref[i], epsilon = 1e-12, max_relative = 1e-12);
            }
        }
    }

    #[test]
    fn multi_rhs_matches_columnwise_solve() {
        let a = random_matrix(6, 99);
        let lu = DenseLu::factor(a.clone()).unwrap();
        let b = DMatrix::from_fn(6, 3, |i, j| (i * 3 + j) as f64 - 4.0);

        let mut x = b.clone();
        lu.solve_matrix_in_place(&mut x);

        for j in 0..3 {
            let mut col = b.column(j).into_owned();
            lu.solve_in_place(&mut col);
            for i in 0..6 {
                assert_relative_eq!(x[(i, j)], col[i], epsilon = 1e-13);
            }
        }
        assert_relative_eq!(&a * &x, b, epsilon = 1e-12);
    }

    #[test]
    fn zero_leading_pivot_is_swapped() {
        let a = DMatrix::from_row_slice(3, 3, &[0.0, 2.0, 1.0, 1.0, 0.0, 0.0, 0.0, 1.0, 3.0]);
        let lu = DenseLu::factor(a.clone()).unwrap();
        let b = DMatrix::from_row_slice(3, 2, &[3.0, 1.0, 1.0, 0.0, 4.0, -2.0]);

        let mut x = b.clone();
        lu.solve_matrix_in_place(&mut x);
        assert_relative_eq!(&a * &x, b, epsilon = 1e-14);
    }

    #[test]
    fn empty_operator_solves_trivially() {
        let lu = DenseLu::factor(DMatrix::zeros(0, 0)).unwrap();
        assert_eq!(lu.dim(), 0);
        let mut x = DMatrix::zeros(0, 2);
        lu.solve_matrix_in_place(&mut x);
        assert_eq!(lu.inverse().shape(), (0, 0));
    }

    #[test]
    fn inverse_times_matrix_is_identity() {
        let a = random_matrix(5, 3);
        let inv = DenseLu::factor(a.clone()).unwrap().inverse();
        assert_relative_eq!(&a * inv, DMatrix::identity(5, 5), epsilon = 1e-12);
    }

    #[test]
    fn lu_rejects_singular() {
        let mut a = DMatrix::identity(3, 3);
        a[(2, 2)] = 0.0;
        assert_eq!(
            DenseLu::factor(a).unwrap_err(),
            NumericsError::Singular { pivot: 2 }
        );

        let rank_one = DMatrix::from_fn(4, 4, |i, j| ((i + 1) * (j + 1)) as f64);
        assert!(DenseLu::factor(rank_one).is_err());
    }

    #[test]
    fn lu_rejects_non_square() {
        let a = DMatrix::zeros(2, 3);
        assert!(matches!(
            DenseLu::factor(a),
            Err(NumericsError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn invert_block_tags_failure() {
        let zero = DMatrix::zeros(2, 2);
        assert_eq!(
            invert_block(&zero, 4).unwrap_err(),
            NumericsError::SingularBlock { block: 4 }
        );

        let diag = DMatrix::from_diagonal(&DVector::from_vec(vec![2.0, 4.0]));
        let inv = invert_block(&diag, 0).unwrap();
        assert_relative_eq!(inv[(0, 0)], 0.5);
        assert_relative_eq!(inv[(1, 1)], 0.25);
    }

    #[test]
    fn norm_inf_is_max_row_sum() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, -2.0, 0.5, 0.25]);
        assert_relative_eq!(norm_inf(&a), 3.0);
    }
}
