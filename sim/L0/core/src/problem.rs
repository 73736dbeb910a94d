//! Global and local frictional contact problems.
//!
//! The global problem lives in body velocity space:
//!
//! ```text
//! M v = H r + q,   u = Hᵀ v + b,   K_μ ∋ r ⟂ û ∈ K_μ*
//! ```
//!
//! where `û = u + μ‖u_t‖ e_n` is the De Saxcé modified velocity. Eliminating
//! `v` gives the local problem `u = W r + q_local` over contact space.

use nalgebra::DVector;
use sim_types::{NumericsError, Result};

use crate::assembly::BlockCsrMatrix;
use crate::graph::InteractionGraph;
use crate::matrix::NumericsMatrix;

/// Contact dimension used when a graph has no contacts.
const DEFAULT_DIMENSION: usize = 3;

fn check_dimension(dimension: usize) -> Result<()> {
    if dimension == 2 || dimension == 3 {
        Ok(())
    } else {
        Err(NumericsError::InvalidContactDimension {
            contact: 0,
            dimension,
        })
    }
}

fn check_friction(mu: &DVector<f64>) -> Result<()> {
    match mu.iter().position(|&m| !(m.is_finite() && m >= 0.0)) {
        Some(contact) => Err(NumericsError::InvalidFriction {
            contact,
            value: mu[contact],
        }),
        None => Ok(()),
    }
}

/// Frictional contact problem in body velocity space.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalFrictionContactProblem {
    /// Contact dimension `d` (2 or 3).
    pub dimension: usize,
    /// Number of contacts `nc`.
    pub number_of_contacts: usize,
    /// Mass operator, `n × n`.
    pub m: NumericsMatrix,
    /// Contact map, `n × (d·nc)`.
    pub h: NumericsMatrix,
    /// Free-flight term, length `n`.
    pub q: DVector<f64>,
    /// Local velocity offset, length `d·nc`.
    pub b: DVector<f64>,
    /// Friction coefficients, length `nc`.
    pub mu: DVector<f64>,
}

impl GlobalFrictionContactProblem {
    /// Build and validate a problem. `nc` is the length of `mu`.
    ///
    /// # Errors
    ///
    /// See [`validate`](Self::validate).
    pub fn new(
        dimension: usize,
        m: NumericsMatrix,
        h: NumericsMatrix,
        q: DVector<f64>,
        b: DVector<f64>,
        mu: DVector<f64>,
    ) -> Result<Self> {
        let problem = Self {
            dimension,
            number_of_contacts: mu.len(),
            m,
            h,
            q,
            b,
            mu,
        };
        problem.validate()?;
        Ok(problem)
    }

    /// Assemble a block-sparse problem from the rigid bodies of a graph.
    ///
    /// `M` and `H` come from [`BlockCsrMatrix::fill_mass`] and
    /// [`BlockCsrMatrix::fill_contact_map`]; `q` follows the same body order.
    ///
    /// # Errors
    ///
    /// Fails if contacts disagree on their dimension, on non-rigid bodies,
    /// or if `q` and `b` have the wrong lengths.
    pub fn from_graph(graph: &InteractionGraph, q: DVector<f64>, b: DVector<f64>) -> Result<Self> {
        let contacts = graph.contacts();
        let dimension = contacts.first().map_or(DEFAULT_DIMENSION, |c| c.dimension);
        if let Some(contact) = contacts.iter().position(|c| c.dimension != dimension) {
            return Err(NumericsError::InvalidContactDimension {
                contact,
                dimension: contacts[contact].dimension,
            });
        }

        let mut m = BlockCsrMatrix::new();
        m.fill_mass(graph)?;
        let mut h = BlockCsrMatrix::new();
        h.fill_contact_map(graph)?;
        let mu = DVector::from_iterator(contacts.len(), contacts.iter().map(|c| c.mu));

        Self::new(
            dimension,
            NumericsMatrix::SparseBlock(m.into_matrix()),
            NumericsMatrix::SparseBlock(h.into_matrix()),
            q,
            b,
            mu,
        )
    }

    /// Number of body degrees of freedom `n`.
    #[must_use]
    pub fn velocity_dim(&self) -> usize {
        self.m.nrows()
    }

    /// Size of contact space `d·nc`.
    #[must_use]
    pub fn contact_dim(&self) -> usize {
        self.dimension * self.number_of_contacts
    }

    /// Check that every size agrees.
    ///
    /// # Errors
    ///
    /// Fails on an unsupported dimension, negative friction, or any operand
    /// whose size disagrees with `n` and `d·nc`.
    pub fn validate(&self) -> Result<()> {
        check_dimension(self.dimension)?;
        if self.mu.len() != self.number_of_contacts {
            return Err(NumericsError::dimension("mu", self.number_of_contacts, self.mu.len()));
        }
        check_friction(&self.mu)?;

        let n = self.m.nrows();
        let m = self.contact_dim();
        if self.m.ncols() != n {
            return Err(NumericsError::dimension("M columns", n, self.m.ncols()));
        }
        if self.h.nrows() != n {
            return Err(NumericsError::dimension("H rows", n, self.h.nrows()));
        }
        if self.h.ncols() != m {
            return Err(NumericsError::dimension("H columns", m, self.h.ncols()));
        }
        if self.q.len() != n {
            return Err(NumericsError::dimension("q", n, self.q.len()));
        }
        if self.b.len() != m {
            return Err(NumericsError::dimension("b", m, self.b.len()));
        }
        Ok(())
    }
}

/// Frictional contact problem in contact space.
#[derive(Debug, Clone, PartialEq)]
pub struct FrictionContactProblem {
    /// Contact dimension `d` (2 or 3).
    pub dimension: usize,
    /// Number of contacts `nc`.
    pub number_of_contacts: usize,
    /// Delassus operator `W`, `d·nc × d·nc`.
    pub w: NumericsMatrix,
    /// Local free velocity, length `d·nc`.
    pub q: DVector<f64>,
    /// Friction coefficients, length `nc`.
    pub mu: DVector<f64>,
}

impl FrictionContactProblem {
    /// Build and validate a problem. `nc` is the length of `mu`.
    ///
    /// # Errors
    ///
    /// See [`validate`](Self::validate).
    pub fn new(dimension: usize, w: NumericsMatrix, q: DVector<f64>, mu: DVector<f64>) -> Result<Self> {
        let problem = Self {
            dimension,
            number_of_contacts: mu.len(),
            w,
            q,
            mu,
        };
        problem.validate()?;
        Ok(problem)
    }

    /// Size of contact space `d·nc`.
    #[must_use]
    pub fn contact_dim(&self) -> usize {
        self.dimension * self.number_of_contacts
    }

    /// Check that every size agrees.
    ///
    /// # Errors
    ///
    /// Fails on an unsupported dimension, negative friction, or a `W` or `q`
    /// whose size disagrees with `d·nc`.
    pub fn validate(&self) -> Result<()> {
        check_dimension(self.dimension)?;
        if self.mu.len() != self.number_of_contacts {
            return Err(NumericsError::dimension("mu", self.number_of_contacts, self.mu.len()));
        }
        check_friction(&self.mu)?;

        let m = self.contact_dim();
        if self.w.nrows() != m {
            return Err(NumericsError::dimension("W rows", m, self.w.nrows()));
        }
        if self.w.ncols() != m {
            return Err(NumericsError::dimension("W columns", m, self.w.ncols()));
        }
        if self.q.len() != m {
            return Err(NumericsError::dimension("q", m, self.q.len()));
        }
        Ok(())
    }
}
