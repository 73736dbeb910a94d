//! Block-CSR sparse matrix of dense blocks.
//!
//! Rows and columns are partitioned into consecutive blocks. The partition is
//! stored as cumulative sizes (`blocksize0` for rows, `blocksize1` for
//! columns): entry `i` is the index one past the last scalar row of block row
//! `i`, so both arrays are strictly increasing. Nonzero blocks are stored row
//! by row (`row_ptr`, `col_idx`) with column indices sorted inside each row.
//!
//! All arithmetic lives on [`SparseBlockView`], a borrowed view that the
//! assembler and the owned [`SparseBlockMatrix`] both hand out. Holding a view
//! keeps the storage borrowed, so it cannot be mutated underneath.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CscMatrix};
use sim_types::{NumericsError, Result};

use crate::linalg::invert_block;

/// Owned block-CSR matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseBlockMatrix {
    blocksize0: Vec<usize>,
    blocksize1: Vec<usize>,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    blocks: Vec<DMatrix<f64>>,
}

/// Borrowed view of block-CSR storage.
#[derive(Debug, Clone, Copy)]
pub struct SparseBlockView<'a> {
    blocksize0: &'a [usize],
    blocksize1: &'a [usize],
    row_ptr: &'a [usize],
    col_idx: &'a [usize],
    blocks: &'a [DMatrix<f64>],
}

/// Turn block sizes into cumulative offsets, rejecting empty blocks.
pub(crate) fn cumulative_sizes(sizes: &[usize], what: &'static str) -> Result<Vec<usize>> {
    let mut offsets = Vec::with_capacity(sizes.len());
    let mut end = 0;
    for &size in sizes {
        if size == 0 {
            return Err(NumericsError::dimension(what, 1, 0));
        }
        end += size;
        offsets.push(end);
    }
    Ok(offsets)
}

fn start_of(offsets: &[usize], i: usize) -> usize {
    if i == 0 { 0 } else { offsets[i - 1] }
}

impl SparseBlockMatrix {
    /// Build from block sizes and `(block_row, block_col, block)` entries.
    ///
    /// A later entry at the same position replaces an earlier one.
    ///
    /// # Errors
    ///
    /// Fails on zero-sized blocks, out-of-range block indices, or blocks
    /// whose shape disagrees with the partition.
    pub fn new(
        row_sizes: &[usize],
        col_sizes: &[usize],
        entries: impl IntoIterator<Item = (usize, usize, DMatrix<f64>)>,
    ) -> Result<Self> {
        let blocksize0 = cumulative_sizes(row_sizes, "block row size")?;
        let blocksize1 = cumulative_sizes(col_sizes, "block column size")?;

        let mut rows: Vec<BTreeMap<usize, DMatrix<f64>>> = vec![BTreeMap::new(); row_sizes.len()];
        for (i, j, block) in entries {
            if i >= row_sizes.len() {
                return Err(NumericsError::dimension("block row index", row_sizes.len(), i));
            }
            if j >= col_sizes.len() {
                return Err(NumericsError::dimension("block column index", col_sizes.len(), j));
            }
            if block.nrows() != row_sizes[i] {
                return Err(NumericsError::dimension("block rows", row_sizes[i], block.nrows()));
            }
            if block.ncols() != col_sizes[j] {
                return Err(NumericsError::dimension("block columns", col_sizes[j], block.ncols()));
            }
            rows[i].insert(j, block);
        }

        Ok(Self::from_rows(blocksize0, blocksize1, rows))
    }

    /// Compress per-row maps into CSR arrays. Inputs are trusted.
    pub(crate) fn from_rows(
        blocksize0: Vec<usize>,
        blocksize1: Vec<usize>,
        rows: Vec<BTreeMap<usize, DMatrix<f64>>>,
    ) -> Self {
        let nnz = rows.iter().map(BTreeMap::len).sum();
        let mut row_ptr = Vec::with_capacity(rows.len() + 1);
        let mut col_idx = Vec::with_capacity(nnz);
        let mut blocks = Vec::with_capacity(nnz);

        row_ptr.push(0);
        for row in rows {
            for (j, block) in row {
                col_idx.push(j);
                blocks.push(block);
            }
            row_ptr.push(col_idx.len());
        }

        Self {
            blocksize0,
            blocksize1,
            row_ptr,
            col_idx,
            blocks,
        }
    }

    /// Block-diagonal matrix from square diagonal blocks.
    ///
    /// # Errors
    ///
    /// Fails if a block is empty or not square.
    pub fn block_diagonal(blocks: Vec<DMatrix<f64>>) -> Result<Self> {
        let sizes: Vec<usize> = blocks.iter().map(DMatrix::nrows).collect();
        Self::new(
            &sizes,
            &sizes,
            blocks.into_iter().enumerate().map(|(i, b)| (i, i, b)),
        )
    }

    /// Split a dense matrix along the given partitions, keeping nonzero blocks.
    ///
    /// # Errors
    ///
    /// Fails if the partitions do not cover the matrix exactly.
    pub fn from_dense(dense: &DMatrix<f64>, row_sizes: &[usize], col_sizes: &[usize]) -> Result<Self> {
        let blocksize0 = cumulative_sizes(row_sizes, "block row size")?;
        let blocksize1 = cumulative_sizes(col_sizes, "block column size")?;
        let nrows = blocksize0.last().copied().unwrap_or(0);
        let ncols = blocksize1.last().copied().unwrap_or(0);
        if nrows != dense.nrows() {
            return Err(NumericsError::dimension("row partition", dense.nrows(), nrows));
        }
        if ncols != dense.ncols() {
            return Err(NumericsError::dimension("column partition", dense.ncols(), ncols));
        }

        let mut rows = vec![BTreeMap::new(); row_sizes.len()];
        for (i, row) in rows.iter_mut().enumerate() {
            let r0 = start_of(&blocksize0, i);
            for (j, &c_end) in blocksize1.iter().enumerate() {
                let c0 = start_of(&blocksize1, j);
                let block = dense.view((r0, c0), (blocksize0[i] - r0, c_end - c0));
                if block.iter().any(|&v| v != 0.0) {
                    row.insert(j, block.into_owned());
                }
            }
        }

        Ok(Self::from_rows(blocksize0, blocksize1, rows))
    }

    /// Borrow the storage as a view.
    #[must_use]
    pub fn view(&self) -> SparseBlockView<'_> {
        SparseBlockView {
            blocksize0: &self.blocksize0,
            blocksize1: &self.blocksize1,
            row_ptr: &self.row_ptr,
            col_idx: &self.col_idx,
            blocks: &self.blocks,
        }
    }

    /// Number of scalar rows.
    #[must_use]
    pub fn nrows(&self) -> usize {
        self.view().nrows()
    }

    /// Number of scalar columns.
    #[must_use]
    pub fn ncols(&self) -> usize {
        self.view().ncols()
    }

    /// Number of stored blocks.
    #[must_use]
    pub fn nnz_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Replace every diagonal block by its inverse.
    ///
    /// Only valid for block-diagonal matrices with a square partition; the
    /// result is then the exact inverse.
    ///
    /// # Errors
    ///
    /// Fails on off-diagonal blocks, a missing or singular diagonal block,
    /// or a non-square partition.
    pub fn invert_diagonal_blocks_in_place(&mut self) -> Result<()> {
        if self.blocksize0 != self.blocksize1 {
            return Err(NumericsError::dimension(
                "square block partition",
                self.blocksize0.len(),
                self.blocksize1.len(),
            ));
        }

        for i in 0..self.blocksize0.len() {
            let (lo, hi) = (self.row_ptr[i], self.row_ptr[i + 1]);
            if lo == hi {
                return Err(NumericsError::SingularBlock { block: i });
            }
            for k in lo..hi {
                let j = self.col_idx[k];
                if j != i {
                    return Err(NumericsError::NotBlockDiagonal { row: i, col: j });
                }
                self.blocks[k] = invert_block(&self.blocks[k], i)?;
            }
        }
        Ok(())
    }
}

impl<'a> SparseBlockView<'a> {
    /// Number of block rows.
    #[must_use]
    pub fn block_rows(&self) -> usize {
        self.blocksize0.len()
    }

    /// Number of block columns.
    #[must_use]
    pub fn block_cols(&self) -> usize {
        self.blocksize1.len()
    }

    /// Number of scalar rows.
    #[must_use]
    pub fn nrows(&self) -> usize {
        self.blocksize0.last().copied().unwrap_or(0)
    }

    /// Number of scalar columns.
    #[must_use]
    pub fn ncols(&self) -> usize {
        self.blocksize1.last().copied().unwrap_or(0)
    }

    /// Cumulative row block sizes.
    #[must_use]
    pub fn row_offsets(&self) -> &'a [usize] {
        self.blocksize0
    }

    /// Cumulative column block sizes.
    #[must_use]
    pub fn col_offsets(&self) -> &'a [usize] {
        self.blocksize1
    }

    /// First scalar row of block row `i`.
    #[must_use]
    pub fn row_start(&self, i: usize) -> usize {
        start_of(self.blocksize0, i)
    }

    /// Height of block row `i`.
    #[must_use]
    pub fn row_size(&self, i: usize) -> usize {
        self.blocksize0[i] - self.row_start(i)
    }

    /// First scalar column of block column `j`.
    #[must_use]
    pub fn col_start(&self, j: usize) -> usize {
        start_of(self.blocksize1, j)
    }

    /// Width of block column `j`.
    #[must_use]
    pub fn col_size(&self, j: usize) -> usize {
        self.blocksize1[j] - self.col_start(j)
    }

    /// Block row containing scalar row `row`.
    #[must_use]
    pub fn block_row_of(&self, row: usize) -> usize {
        self.blocksize0.partition_point(|&end| end <= row)
    }

    /// Number of stored blocks.
    #[must_use]
    pub fn nnz_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Stored blocks of block row `i`, as `(block_col, block)`.
    pub fn row_blocks(self, i: usize) -> impl Iterator<Item = (usize, &'a DMatrix<f64>)> + 'a {
        let (col_idx, blocks) = (self.col_idx, self.blocks);
        (self.row_ptr[i]..self.row_ptr[i + 1]).map(move |k| (col_idx[k], &blocks[k]))
    }

    /// Every stored block as `(block_row, block_col, block)`.
    pub fn iter_blocks(self) -> impl Iterator<Item = (usize, usize, &'a DMatrix<f64>)> + 'a {
        (0..self.block_rows()).flat_map(move |i| self.row_blocks(i).map(move |(j, b)| (i, j, b)))
    }

    /// Block at `(i, j)`, if stored.
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> Option<&'a DMatrix<f64>> {
        let (lo, hi) = (self.row_ptr[i], self.row_ptr[i + 1]);
        let blocks = self.blocks;
        self.col_idx[lo..hi]
            .binary_search(&j)
            .ok()
            .map(|k| &blocks[lo + k])
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

        *y *= beta;
        for (i, j, block) in self.iter_blocks() {
            let xs = x.rows(self.col_start(j), self.col_size(j));
            y.rows_mut(self.row_start(i), self.row_size(i))
                .gemv(alpha, block, &xs, 1.0);
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

        *y *= beta;
        for (i, j, block) in self.iter_blocks() {
            let xs = x.rows(self.row_start(i), self.row_size(i));
            y.rows_mut(self.col_start(j), self.col_size(j))
                .gemv_tr(alpha, block, &xs, 1.0);
        }
        Ok(())
    }

    /// Owned transpose.
    #[must_use]
    pub fn transpose(&self) -> SparseBlockMatrix {
        let mut rows = vec![BTreeMap::new(); self.block_cols()];
        for (i, j, block) in self.iter_blocks() {
            rows[j].insert(i, block.transpose());
        }
        SparseBlockMatrix::from_rows(self.blocksize1.to_vec(), self.blocksize0.to_vec(), rows)
    }

    /// Block-sparse product `self * rhs`.
    ///
    /// # Errors
    ///
    /// Fails if the column partition of `self` differs from the row partition
    /// of `rhs`.
    pub fn multiply(&self, rhs: &SparseBlockView<'_>) -> Result<SparseBlockMatrix> {
        if self.ncols() != rhs.nrows() {
            return Err(NumericsError::dimension("product inner size", self.ncols(), rhs.nrows()));
        }
        if self.blocksize1 != rhs.blocksize0 {
            return Err(NumericsError::dimension(
                "product inner block partition",
                self.block_cols(),
                rhs.block_rows(),
            ));
        }

        let mut rows = Vec::with_capacity(self.block_rows());
        for i in 0..self.block_rows() {
            let mut acc: BTreeMap<usize, DMatrix<f64>> = BTreeMap::new();
            for (k, a) in self.row_blocks(i) {
                for (j, b) in rhs.row_blocks(k) {
                    match acc.entry(j) {
                        Entry::Occupied(mut e) => e.get_mut().gemm(1.0, a, b, 1.0),
                        Entry::Vacant(e) => {
                            e.insert(a * b);
                        }
                    }
                }
            }
            rows.push(acc);
        }

        Ok(SparseBlockMatrix::from_rows(
            self.blocksize0.to_vec(),
            rhs.blocksize1.to_vec(),
            rows,
        ))
    }

    /// Dense copy.
    #[must_use]
    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(self.nrows(), self.ncols());
        for (i, j, block) in self.iter_blocks() {
            dense
                .view_mut((self.row_start(i), self.col_start(j)), block.shape())
                .copy_from(block);
        }
        dense
    }

    /// Scalar sparse copy. Explicit zeros inside blocks are dropped.
    #[must_use]
    pub fn to_csc(&self) -> CscMatrix<f64> {
        let mut coo = CooMatrix::new(self.nrows(), self.ncols());
        for (i, j, block) in self.iter_blocks() {
            let (r0, c0) = (self.row_start(i), self.col_start(j));
            for c in 0..block.ncols() {
                for r in 0..block.nrows() {
                    let v = block[(r, c)];
                    if v != 0.0 {
                        coo.push(r0 + r, c0 + c, v);
                    }
                }
            }
        }
        CscMatrix::from(&coo)
    }

    /// Owned copy of the viewed storage.
    #[must_use]
    pub fn to_matrix(&self) -> SparseBlockMatrix {
        SparseBlockMatrix {
            blocksize0: self.blocksize0.to_vec(),
            blocksize1: self.blocksize1.to_vec(),
            row_ptr: self.row_ptr.to_vec(),
            col_idx: self.col_idx.to_vec(),
            blocks: self.blocks.to_vec(),
        }
    }
}
