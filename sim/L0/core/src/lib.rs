//! Operators, assembly and reformulation for nonsmooth contact dynamics.
//!
//! This crate turns a frictional contact problem stated over body velocities
//! into one stated over contact velocities, and back again:
//!
//! ```text
//! ┌──────────────────────┐  fill / fill_mass    ┌──────────────────────────────┐
//! │   InteractionGraph   │ ──────────────────▶  │ GlobalFrictionContactProblem │
//! │ contacts + couplings │  fill_contact_map    │        M, H, q, b, μ         │
//! └──────────────────────┘                      └──────────────┬───────────────┘
//!                                                              │ reformulate
//!                                                              ▼
//!                                               ┌──────────────────────────────┐
//!                                               │   FrictionContactProblem     │
//!                                               │  W = HᵀM⁻¹H, q = HᵀM⁻¹q + b  │
//!                                               └──────────────┬───────────────┘
//!                                                              │ (local solver)
//!                                                              ▼
//!                                               compute_global_velocity
//!                                               v = M⁻¹(H r + q)
//! ```
//!
//! Every operator is a [`NumericsMatrix`]: dense, block-sparse (block-CSR of
//! dense blocks) or general sparse (CSC). The reformulation keeps `W` in the
//! storage format of `M` and `H`, which must agree.
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with **zero Bevy dependencies**. It can be used in:
//!
//! - Headless simulation drivers
//! - Offline analysis of recorded contact problems
//! - Other engines that bring their own collision detection
//!
//! # Quick Start
//!
//! ```ignore
//! use sim_core::{GlobalFrictionContactProblem, reformulate, compute_global_velocity};
//!
//! let problem = GlobalFrictionContactProblem::new(3, m, h, q, b, mu)?;
//! let reformulation = reformulate(&problem)?;
//! // ... solve reformulation.local for the reaction r ...
//! let v = compute_global_velocity(&problem, &reformulation.mass, &r)?;
//! ```

#![doc(html_root_url = "https://docs.rs/sim-core/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,       // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,           // mul_add style changes aren't always clearer
    clippy::neg_cmp_op_on_partial_ord,  // !(x >= 0.0) is intentional for NaN rejection
    clippy::many_single_char_names,     // m, h, q, b, w follow the usual notation
    clippy::doc_markdown,               // Not all technical terms need backticks
)]

// Dense LU and small-block helpers
pub mod linalg;

// Storage-polymorphic operators (dense, block-CSR, CSC)
pub mod matrix;

// Factored mass operator
pub mod factorized;

// Interaction graph and block-CSR assembly
pub mod assembly;
pub mod graph;

// Problem records
pub mod problem;

// Cone geometry and error evaluation
pub mod cone;
pub mod residual;

// Global ↔ local passes
pub mod reconstruction;
pub mod reformulation;

pub use assembly::BlockCsrMatrix;
pub use cone::{ConeRegion, complementarity_error, project_on_cone, project_on_cylinder};
pub use factorized::FactorizedMass;
pub use graph::{Body, BodyKind, Contact, Coupling, InteractionGraph};
pub use matrix::{NumericsMatrix, SparseBlockMatrix, SparseBlockView};
pub use problem::{FrictionContactProblem, GlobalFrictionContactProblem};
pub use reconstruction::compute_global_velocity;
pub use reformulation::{Reformulation, check_storage, reformulate};
pub use residual::{GlobalResidual, global_error, local_error};

// Re-export key types from sim-types for convenience
pub use sim_types::{NumericsError, Result, SolveStatus, SolverId, SolverOptions, SolverReport, StorageType};
