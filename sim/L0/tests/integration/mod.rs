//! Integration tests for the contact numerics pipeline.
//!
//! These tests exercise the crates together:
//! - Interaction graph → block-CSR operators → global problem
//! - Global problem → local problem in every storage format
//! - Every solver family on the reference single-contact scenario
//! - Reconstruction and acceptance error of global solutions

pub mod end_to_end;
pub mod graph_assembly;
pub mod reformulation;
pub mod solver_selection;
pub mod zero_contacts;
