//! Shared types for the nonsmooth contact numerics.
//!
//! This crate holds the vocabulary every other `sim-*` numerics crate speaks:
//!
//! - [`NumericsError`] - the single error taxonomy, with integer status codes
//! - [`StorageType`] - the storage tag carried by every operator
//! - [`SolverId`] and [`SolverOptions`] - solver selection and the flat
//!   configuration record, including the [`SolverReport`] output slot
//! - [`SolveStatus`] - the non-fatal outcome of a solve
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with **zero Bevy dependencies** and no linear
//! algebra dependency. It can be shared by headless drivers, tools and
//! higher layers without pulling in the solver stack.

#![doc(html_root_url = "https://docs.rs/sim-types/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,
    clippy::doc_markdown,
    clippy::neg_cmp_op_on_partial_ord, // !(x > 0.0) is intentional for NaN rejection
)]

mod config;
mod error;
mod status;
mod storage;

pub use config::{SolverId, SolverOptions};
pub use error::NumericsError;
pub use status::{SolveStatus, SolverReport};
pub use storage::StorageType;

/// Result type for numerics operations.
pub type Result<T> = std::result::Result<T, NumericsError>;
