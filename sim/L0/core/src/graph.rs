//! Interaction graph: contacts as vertices, couplings as edges.
//!
//! Each contact (vertex) carries its local dimension, friction coefficient,
//! its diagonal Delassus block and the Jacobian blocks that map the
//! velocities of the bodies it touches to its local velocity. Each coupling
//! (edge) joins two contacts that share at least one body and carries the two
//! off-diagonal blocks of the Delassus operator.
//!
//! The graph is usually built by the surrounding simulation. For rigid
//! bodies, [`InteractionGraph::compute_contact_blocks`] and
//! [`InteractionGraph::link_shared_bodies`] derive all blocks from the body
//! masses and contact Jacobians.

use hashbrown::HashMap;
use nalgebra::DMatrix;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use sim_types::{NumericsError, Result};

use crate::linalg::invert_block;

/// Dynamical model of a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BodyKind {
    /// 6-DOF rigid body (translation + rotation).
    NewtonEuler,
    /// Generalized-coordinate Lagrangian system.
    Lagrangian,
    /// First-order linear system.
    FirstOrder,
}

impl BodyKind {
    /// Short name used in diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NewtonEuler => "newton-euler",
            Self::Lagrangian => "lagrangian",
            Self::FirstOrder => "first-order",
        }
    }
}

/// A body with its mass operator.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    /// Dynamical model.
    pub kind: BodyKind,
    /// Mass (inertia) matrix in body coordinates.
    pub mass: DMatrix<f64>,
}

impl Body {
    /// Create a body of any kind.
    #[must_use]
    pub const fn new(kind: BodyKind, mass: DMatrix<f64>) -> Self {
        Self { kind, mass }
    }

    /// 6-DOF rigid body from its 6×6 generalized inertia.
    #[must_use]
    pub const fn newton_euler(mass: DMatrix<f64>) -> Self {
        Self::new(BodyKind::NewtonEuler, mass)
    }

    /// 6-DOF rigid body with diagonal inertia `diag(m, m, m, ixx, iyy, izz)`.
    #[must_use]
    pub fn rigid(mass: f64, inertia: [f64; 3]) -> Self {
        let diagonal = nalgebra::DVector::from_vec(vec![
            mass, mass, mass, inertia[0], inertia[1], inertia[2],
        ]);
        Self::newton_euler(DMatrix::from_diagonal(&diagonal))
    }

    /// Degrees of freedom.
    #[must_use]
    pub fn dofs(&self) -> usize {
        self.mass.nrows()
    }
}

/// A contact point (graph vertex).
#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    /// Local dimension (2 or 3): normal plus tangential directions.
    pub dimension: usize,
    /// Coulomb friction coefficient.
    pub mu: f64,
    /// Diagonal Delassus block (`dimension × dimension`).
    pub block: DMatrix<f64>,
    /// `(body, J)` pairs with `J` of shape `body dofs × dimension`.
    pub jacobians: Vec<(usize, DMatrix<f64>)>,
}

impl Contact {
    /// Contact with a zero diagonal block and no Jacobians.
    #[must_use]
    pub fn new(dimension: usize, mu: f64) -> Self {
        Self {
            dimension,
            mu,
            block: DMatrix::zeros(dimension, dimension),
            jacobians: Vec::new(),
        }
    }

    /// Set the diagonal block.
    #[must_use]
    pub fn with_block(mut self, block: DMatrix<f64>) -> Self {
        self.block = block;
        self
    }

    /// Attach the Jacobian block of one body.
    #[must_use]
    pub fn with_jacobian(mut self, body: usize, jacobian: DMatrix<f64>) -> Self {
        self.jacobians.push((body, jacobian));
        self
    }
}

/// A coupling between two contacts (graph edge).
#[derive(Debug, Clone, PartialEq)]
pub struct Coupling {
    /// First contact.
    pub source: usize,
    /// Second contact.
    pub target: usize,
    /// Bodies shared by the two contacts.
    pub bodies: Vec<usize>,
    /// Block at `(min(source, target), max(source, target))`.
    pub upper: DMatrix<f64>,
    /// Block at `(max(source, target), min(source, target))`.
    pub lower: DMatrix<f64>,
}

/// Contacts, the bodies they touch, and the couplings between them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InteractionGraph {
    bodies: Vec<Body>,
    contacts: Vec<Contact>,
    couplings: Vec<Coupling>,
}

impl InteractionGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a body and return its index.
    pub fn add_body(&mut self, body: Body) -> usize {
        self.bodies.push(body);
        self.bodies.len() - 1
    }

    /// Add a contact and return its vertex index.
    pub fn add_contact(&mut self, contact: Contact) -> usize {
        self.contacts.push(contact);
        self.contacts.len() - 1
    }

    /// Add a coupling edge and return its index.
    ///
    /// Endpoints are checked when the graph is assembled, not here, so edges
    /// may be added before their vertices.
    pub fn add_coupling(&mut self, coupling: Coupling) -> usize {
        self.couplings.push(coupling);
        self.couplings.len() - 1
    }

    /// Bodies in insertion order.
    #[must_use]
    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    /// Contacts in vertex-index order.
    #[must_use]
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    /// Coupling edges in insertion order.
    #[must_use]
    pub fn couplings(&self) -> &[Coupling] {
        &self.couplings
    }

    /// Number of contacts.
    #[must_use]
    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }

    fn body(&self, contact: usize, body: usize) -> Result<&Body> {
        self.bodies.get(body).ok_or(NumericsError::UnknownBody {
            contact,
            body,
            bodies: self.bodies.len(),
        })
    }

    fn check_jacobian(&self, contact: usize, body: usize, jacobian: &DMatrix<f64>) -> Result<()> {
        let dofs = self.body(contact, body)?.dofs();
        if jacobian.nrows() != dofs {
            return Err(NumericsError::dimension("jacobian rows", dofs, jacobian.nrows()));
        }
        let dimension = self.contacts[contact].dimension;
        if jacobian.ncols() != dimension {
            return Err(NumericsError::dimension("jacobian columns", dimension, jacobian.ncols()));
        }
        Ok(())
    }

    fn inverse_masses(&self) -> Result<Vec<DMatrix<f64>>> {
        self.bodies
            .iter()
            .enumerate()
            .map(|(i, body)| invert_block(&body.mass, i))
            .collect()
    }

    /// Set every diagonal block to `Σ_b J_bᵀ M_b⁻¹ J_b` over the contact's bodies.
    ///
    /// # Errors
    ///
    /// Fails on unknown bodies, misshapen Jacobians or singular body masses.
    pub fn compute_contact_blocks(&mut self) -> Result<()> {
        let inverses = self.inverse_masses()?;
        for i in 0..self.contacts.len() {
            let d = self.contacts[i].dimension;
            let mut block = DMatrix::zeros(d, d);
            for (body, jacobian) in &self.contacts[i].jacobians {
                self.check_jacobian(i, *body, jacobian)?;
                block += jacobian.transpose() * &inverses[*body] * jacobian;
            }
            self.contacts[i].block = block;
        }
        Ok(())
    }

    /// Replace all couplings by one edge per contact pair sharing a body.
    ///
    /// Edge blocks are `Σ_b J_iᵀ M_b⁻¹ J_j` over the shared bodies `b`.
    /// Returns the number of edges created.
    ///
    /// # Errors
    ///
    /// Fails on unknown bodies, misshapen Jacobians or singular body masses.
    pub fn link_shared_bodies(&mut self) -> Result<usize> {
        let inverses = self.inverse_masses()?;

        let mut incident: HashMap<usize, Vec<usize>> = HashMap::new();
        for (i, contact) in self.contacts.iter().enumerate() {
            for (body, jacobian) in &contact.jacobians {
                self.check_jacobian(i, *body, jacobian)?;
                let list = incident.entry(*body).or_default();
                if list.last() != Some(&i) {
                    list.push(i);
                }
            }
        }

        let mut shared: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
        for (&body, contacts) in &incident {
            for (a, &i) in contacts.iter().enumerate() {
                for &j in &contacts[a + 1..] {
                    shared.entry((i, j)).or_default().push(body);
                }
            }
        }

        let mut pairs: Vec<_> = shared.into_iter().collect();
        pairs.sort_unstable_by_key(|&(pair, _)| pair);

        self.couplings.clear();
        for ((i, j), mut bodies) in pairs {
            bodies.sort_unstable();
            let (di, dj) = (self.contacts[i].dimension, self.contacts[j].dimension);
            let mut upper = DMatrix::zeros(di, dj);
            for &body in &bodies {
                for (bi, ji) in self.contacts[i].jacobians.iter().filter(|(b, _)| *b == body) {
                    for (_, jj) in self.contacts[j].jacobians.iter().filter(|(b, _)| *b == body) {
                        upper += ji.transpose() * &inverses[*bi] * jj;
                    }
                }
            }
            let lower = upper.transpose();
            self.couplings.push(Coupling {
                source: i,
                target: j,
                bodies,
                upper,
                lower,
            });
        }

        Ok(self.couplings.len())
    }

    /// Distinct bodies in first-encounter order: edges first, then contacts.
    ///
    /// Every body must be a 6-DOF Newton-Euler body.
    ///
    /// # Errors
    ///
    /// Fails with [`NumericsError::UnsupportedBodyKind`] for any other kind,
    /// or on unknown body indices and misshapen mass blocks.
    pub fn rigid_body_order(&self, operation: &'static str) -> Result<Vec<usize>> {
        let mut order = Vec::new();
        let mut seen = vec![false; self.bodies.len()];

        let from_edges = self
            .couplings
            .iter()
            .flat_map(|edge| edge.bodies.iter().map(move |&b| (edge.source, b)));
        let from_contacts = self
            .contacts
            .iter()
            .enumerate()
            .flat_map(|(i, c)| c.jacobians.iter().map(move |(b, _)| (i, *b)));

        for (contact, index) in from_edges.chain(from_contacts) {
            let body = self.body(contact, index)?;
            if seen[index] {
                continue;
            }
            if body.kind != BodyKind::NewtonEuler {
                return Err(NumericsError::UnsupportedBodyKind {
                    operation,
                    body: index,
                    kind: body.kind.name(),
                });
            }
            let (rows, cols) = body.mass.shape();
            if (rows, cols) != (6, 6) {
                let actual = if rows == 6 { cols } else { rows };
                return Err(NumericsError::dimension("rigid body mass", 6, actual));
            }
            seen[index] = true;
            order.push(index);
        }

        Ok(order)
    }
}
