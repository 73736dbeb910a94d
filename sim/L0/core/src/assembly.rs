//! Sparse block assembly from an interaction graph.
//!
//! [`BlockCsrMatrix`] turns the graph into block-CSR storage:
//!
//! - [`fill`](BlockCsrMatrix::fill) builds the square Delassus operator, one
//!   block row per contact, diagonal blocks from vertices and off-diagonal
//!   blocks from edges.
//! - [`fill_mass`](BlockCsrMatrix::fill_mass) builds the block-diagonal mass
//!   operator of the 6-DOF bodies the graph touches.
//! - [`fill_contact_map`](BlockCsrMatrix::fill_contact_map) builds `H`, body
//!   block rows by contact block columns.
//!
//! [`view`](BlockCsrMatrix::view) hands the result to the numerics layer as a
//! borrowed [`SparseBlockView`].

use std::collections::BTreeMap;

use hashbrown::HashMap;
use nalgebra::DMatrix;
use sim_types::{NumericsError, Result};
use tracing::{debug, trace};

use crate::graph::InteractionGraph;
use crate::matrix::{SparseBlockMatrix, SparseBlockView, cumulative_sizes};

/// Block-CSR operator assembled from an interaction graph.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockCsrMatrix {
    matrix: SparseBlockMatrix,
}

impl Default for BlockCsrMatrix {
    fn default() -> Self {
        Self {
            matrix: SparseBlockMatrix::from_rows(Vec::new(), Vec::new(), Vec::new()),
        }
    }
}

/// Row buffers sized once before any block is placed.
struct RowBuffers {
    rows: Vec<Vec<(usize, DMatrix<f64>)>>,
}

impl RowBuffers {
    fn with_capacities(capacities: &[usize]) -> Self {
        Self {
            rows: capacities.iter().map(|&c| Vec::with_capacity(c)).collect(),
        }
    }

    fn place(&mut self, row: usize, col: usize, block: DMatrix<f64>) {
        self.rows[row].push((col, block));
    }

    /// Later placements at the same position win.
    fn into_maps(self) -> Vec<BTreeMap<usize, DMatrix<f64>>> {
        self.rows
            .into_iter()
            .map(|row| row.into_iter().collect())
            .collect()
    }
}

impl BlockCsrMatrix {
    /// Create an empty operator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble the Delassus operator of `graph`.
    ///
    /// # Errors
    ///
    /// See [`fill`](Self::fill).
    pub fn from_graph(graph: &InteractionGraph) -> Result<Self> {
        let mut csr = Self::new();
        csr.fill(graph)?;
        Ok(csr)
    }

    /// Rebuild this operator as the Delassus operator of `graph`.
    ///
    /// Block row and column `i` correspond to contact `i` and have its
    /// dimension. For every edge the upper block lands at `(min, max)` of its
    /// endpoints and the lower block at `(max, min)`.
    ///
    /// # Errors
    ///
    /// - [`NumericsError::InvalidContactDimension`] for a zero dimension or a
    ///   diagonal block of the wrong shape
    /// - [`NumericsError::UnknownVertex`] for an edge endpoint outside the graph
    /// - [`NumericsError::SelfCoupling`] for an edge joining a contact to itself
    /// - [`NumericsError::DimensionMismatch`] for misshapen edge blocks
    ///
    /// On error `self` is left unchanged.
    pub fn fill(&mut self, graph: &InteractionGraph) -> Result<()> {
        let contacts = graph.contacts();
        let nc = contacts.len();

        let mut sizes = Vec::with_capacity(nc);
        for (i, contact) in contacts.iter().enumerate() {
            let d = contact.dimension;
            if d == 0 || contact.block.shape() != (d, d) {
                return Err(NumericsError::InvalidContactDimension {
                    contact: i,
                    dimension: if d == 0 { 0 } else { contact.block.nrows() },
                });
            }
            sizes.push(d);
        }

        let mut degree = vec![1_usize; nc];
        for (e, edge) in graph.couplings().iter().enumerate() {
            for vertex in [edge.source, edge.target] {
                if vertex >= nc {
                    return Err(NumericsError::UnknownVertex {
                        edge: e,
                        vertex,
                        contacts: nc,
                    });
                }
            }
            if edge.source == edge.target {
                return Err(NumericsError::SelfCoupling {
                    edge: e,
                    vertex: edge.source,
                });
            }
            let (lo, hi) = ordered(edge.source, edge.target);
            check_block_shape(
                &edge.upper,
                (sizes[lo], sizes[hi]),
                "upper coupling block rows",
                "upper coupling block columns",
            )?;
            check_block_shape(
                &edge.lower,
                (sizes[hi], sizes[lo]),
                "lower coupling block rows",
                "lower coupling block columns",
            )?;
            degree[lo] += 1;
            degree[hi] += 1;
        }

        let offsets = cumulative_sizes(&sizes, "contact dimension")?;
        let mut buffers = RowBuffers::with_capacities(&degree);
        for (i, contact) in contacts.iter().enumerate() {
            buffers.place(i, i, contact.block.clone());
        }
        for edge in graph.couplings() {
            let (lo, hi) = ordered(edge.source, edge.target);
            trace!(lo, hi, "placing coupling blocks");
            buffers.place(lo, hi, edge.upper.clone());
            buffers.place(hi, lo, edge.lower.clone());
        }

        self.matrix = SparseBlockMatrix::from_rows(offsets.clone(), offsets, buffers.into_maps());
        debug!(
            contacts = nc,
            edges = graph.couplings().len(),
            blocks = self.matrix.nnz_blocks(),
            "assembled block-CSR Delassus operator"
        );
        Ok(())
    }

    /// Rebuild this operator as the mass operator of the graph's rigid bodies.
    ///
    /// One 6×6 diagonal block per distinct body, in the order bodies are
    /// first met walking edges and then contacts.
    ///
    /// # Errors
    ///
    /// Fails with [`NumericsError::UnsupportedBodyKind`] if any body is not a
    /// Newton-Euler body.
    pub fn fill_mass(&mut self, graph: &InteractionGraph) -> Result<()> {
        let order = graph.rigid_body_order("fill_mass")?;
        let blocks = order.iter().map(|&b| graph.bodies()[b].mass.clone()).collect();
        self.matrix = SparseBlockMatrix::block_diagonal(blocks)?;
        debug!(bodies = order.len(), "assembled block-diagonal mass operator");
        Ok(())
    }

    /// Rebuild this operator as the contact map `H` of the graph's rigid bodies.
    ///
    /// Block rows follow the body order of [`fill_mass`](Self::fill_mass),
    /// block columns follow contacts. Several Jacobians of one body on one
    /// contact are summed.
    ///
    /// # Errors
    ///
    /// Fails like [`fill_mass`](Self::fill_mass), or on Jacobians whose shape
    /// disagrees with the body or contact.
    pub fn fill_contact_map(&mut self, graph: &InteractionGraph) -> Result<()> {
        let order = graph.rigid_body_order("fill_contact_map")?;
        let row_of: HashMap<usize, usize> = order.iter().enumerate().map(|(row, &b)| (b, row)).collect();

        let contacts = graph.contacts();
        let col_sizes: Vec<usize> = contacts.iter().map(|c| c.dimension).collect();
        let row_sizes = vec![6; order.len()];

        let mut rows: Vec<BTreeMap<usize, DMatrix<f64>>> = vec![BTreeMap::new(); order.len()];
        for (j, contact) in contacts.iter().enumerate() {
            for (body, jacobian) in &contact.jacobians {
                let row = row_of[body];
                if jacobian.shape() != (6, contact.dimension) {
                    return Err(NumericsError::dimension("jacobian columns", contact.dimension, jacobian.ncols()));
                }
                rows[row]
                    .entry(j)
                    .and_modify(|acc| *acc += jacobian)
                    .or_insert_with(|| jacobian.clone());
            }
        }

        let entries = rows
            .into_iter()
            .enumerate()
            .flat_map(|(i, row)| row.into_iter().map(move |(j, block)| (i, j, block)));
        self.matrix = SparseBlockMatrix::new(&row_sizes, &col_sizes, entries)?;
        debug!(
            bodies = order.len(),
            contacts = contacts.len(),
            "assembled block-CSR contact map"
        );
        Ok(())
    }

    /// Borrowed view for the numerics layer.
    #[must_use]
    pub fn view(&self) -> SparseBlockView<'_> {
        self.matrix.view()
    }

    /// Give up the assembled storage.
    #[must_use]
    pub fn into_matrix(self) -> SparseBlockMatrix {
        self.matrix
    }

    /// Number of block rows.
    #[must_use]
    pub fn block_rows(&self) -> usize {
        self.view().block_rows()
    }

    /// Number of stored (nonzero) blocks.
    #[must_use]
    pub fn nnz_blocks(&self) -> usize {
        self.matrix.nnz_blocks()
    }
}

fn check_block_shape(
    block: &DMatrix<f64>,
    (rows, cols): (usize, usize),
    rows_what: &'static str,
    cols_what: &'static str,
) -> Result<()> {
    if block.nrows() != rows {
        return Err(NumericsError::dimension(rows_what, rows, block.nrows()));
    }
    if block.ncols() != cols {
        return Err(NumericsError::dimension(cols_what, cols, block.ncols()));
    }
    Ok(())
}

const fn ordered(a: usize, b: usize) -> (usize, usize) {
    if a < b { (a, b) } else { (b, a) }
}
