//! Frictional contact solvers and the global solve pipeline.
//!
//! Local problems `u = W r + q` with `r ∈ K_μ ⟂ û ∈ K_μ*` are solved by one
//! of six families, chosen by name:
//!
//! - **NSGS**: nonsmooth Gauss-Seidel over contacts, with SOR relaxation
//! - **ADMM**: operator splitting with penalty balancing
//! - **NSN-FischerBurmeister**: semismooth Newton with Armijo line search
//! - **DSFP**: projected De Saxcé fixed point
//! - **TFP**: Tresca fixed point with Gauss-Seidel inner sweeps
//! - **PROX**: proximal point around shifted Gauss-Seidel
//!
//! [`solve_global`] chains reformulation, the local solve and
//! reconstruction for a problem stated over body velocities.
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with **zero Bevy dependencies**. It only needs
//! `sim-core` operators and can run in headless drivers or offline tools.
//!
//! # Example
//!
//! ```ignore
//! use sim_constraint::solve_global;
//! use sim_types::{SolverId, SolverOptions};
//!
//! let mut options = SolverOptions::new(SolverId::Nsgs).with_tolerance(1e-10);
//! let outcome = solve_global(&problem, &mut r, &mut u, &mut v, &mut options)?;
//! if outcome.info() != 0 {
//!     // reduce the time step and retry
//! }
//! ```
//!
//! # Feature Flags
//!
//! - `parallel`: project contacts concurrently (rayon) in ADMM and DSFP
//! - `serde`: serialization of [`GlobalSolveOutcome`] and option types

#![doc(html_root_url = "https://docs.rs/sim-constraint/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,       // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,           // mul_add style changes aren't always clearer
    clippy::many_single_char_names,     // r, u, q, w, z follow the usual notation
    clippy::doc_markdown,               // Not all technical terms need backticks
    clippy::cast_precision_loss,        // Iteration counts fit in f64
)]

// Contact-space operator and per-contact solver
pub mod local;
pub mod operator;

// Solver families
pub mod admm;
pub mod fixed_point;
pub mod newton;
pub mod nsgs;
pub mod prox;

// Dispatch and global pipeline
pub mod driver;
pub mod solver;

pub use admm::admm;
pub use driver::{GlobalSolveOutcome, solve_global};
pub use fixed_point::{de_saxce_fixed_point, tresca_fixed_point};
pub use local::{LocalLaw, LocalSettings, solve_contact};
pub use newton::fischer_burmeister_newton;
pub use nsgs::nsgs;
pub use operator::ContactOperator;
pub use prox::proximal;
pub use solver::{SolverFn, family, solve};

pub use sim_types::{NumericsError, Result, SolveStatus, SolverId, SolverOptions, SolverReport};
