//! Full pipeline on the reference single-contact scenario.
//!
//! reformulate → local solve → reconstruct, checked against the closed-form
//! sliding solution and against the original dynamics equation.

use approx::assert_relative_eq;
use nalgebra::DVector;
use sim_constraint::{solve, solve_global};
use sim_conformance_tests::{
    DOFS, STORAGES, contact_map, expected_reaction, free_velocity, mass, satisfies_coulomb, single_contact, stored,
};
use sim_core::{GlobalFrictionContactProblem, StorageType, compute_global_velocity, global_error, reformulate};
use sim_types::{SolverId, SolverOptions};

// ============================================================================
// Gauss-Seidel at tight tolerance
// ============================================================================

#[test]
fn test_nsgs_reaches_tight_tolerance() {
    let problem = single_contact(StorageType::Dense).expect("problem should build");
    let mut reaction = DVector::zeros(3);
    let mut velocity = DVector::zeros(3);
    let mut global_velocity = DVector::zeros(DOFS);
    let mut options = SolverOptions::new(SolverId::Nsgs)
        .with_tolerance(1e-14)
        .with_max_iterations(100_000);

    let outcome = solve_global(&problem, &mut reaction, &mut velocity, &mut global_velocity, &mut options)
        .expect("solve should succeed");

    assert_eq!(outcome.info(), 0, "{:?}", options.report);
    assert!(options.report.residual < 1e-14);
    assert!(options.report.iterations >= 1);
    assert!(satisfies_coulomb(&reaction, &velocity, &problem.mu, 1e-12));
    assert_relative_eq!(reaction, expected_reaction(), epsilon = 1e-10);
    assert!(velocity[0].abs() < 1e-12, "contact is sliding, u_n = {}", velocity[0]);
}

#[test]
fn test_nsgs_agrees_across_storages() {
    for storage in STORAGES {
        let problem = single_contact(storage).expect("problem should build");
        let mut reaction = DVector::zeros(3);
        let mut velocity = DVector::zeros(3);
        let mut global_velocity = DVector::zeros(DOFS);
        let mut options = SolverOptions::new(SolverId::Nsgs).with_tolerance(1e-12);

        let outcome = solve_global(&problem, &mut reaction, &mut velocity, &mut global_velocity, &mut options)
            .expect("solve should succeed");

        assert_eq!(outcome.info(), 0, "{storage}");
        assert_relative_eq!(reaction, expected_reaction(), epsilon = 1e-9);
    }
}

// ============================================================================
// Every family
// ============================================================================

#[test]
fn test_every_family_satisfies_the_coulomb_law() {
    let problem = single_contact(StorageType::Dense).expect("problem should build");
    for id in SolverId::ALL {
        let mut reaction = DVector::zeros(3);
        let mut velocity = DVector::zeros(3);
        let mut global_velocity = DVector::zeros(DOFS);
        let mut options = SolverOptions::new(id).with_tolerance(1e-10);

        let outcome = solve_global(&problem, &mut reaction, &mut velocity, &mut global_velocity, &mut options)
            .expect("solve should succeed");

        assert_eq!(outcome.info(), 0, "{id}: {:?}", options.report);
        assert!(!outcome.fast_path);
        assert!(satisfies_coulomb(&reaction, &velocity, &problem.mu, 1e-7), "{id}: r = {reaction}, u = {velocity}");
        assert_relative_eq!(reaction, expected_reaction(), epsilon = 1e-7);
        let residual = outcome.residual.expect("residual is evaluated");
        assert!(residual.total < 1e-7, "{id}: {residual:?}");
    }
}

#[test]
fn test_every_family_solves_an_unsymmetric_sparse_mass() {
    let mut m = mass();
    m[(1, 0)] = 0.6;
    let problem = GlobalFrictionContactProblem::new(
        3,
        stored(&m, StorageType::Sparse).expect("mass"),
        stored(&contact_map(), StorageType::Sparse).expect("contact map"),
        free_velocity(),
        DVector::zeros(3),
        DVector::from_element(1, 0.5),
    )
    .expect("problem should build");

    for id in SolverId::ALL {
        let mut reaction = DVector::zeros(3);
        let mut velocity = DVector::zeros(3);
        let mut global_velocity = DVector::zeros(DOFS);
        let mut options = SolverOptions::new(id).with_tolerance(1e-10).with_max_iterations(20_000);

        let outcome = solve_global(&problem, &mut reaction, &mut velocity, &mut global_velocity, &mut options)
            .expect("solve should succeed");

        assert_eq!(outcome.info(), 0, "{id}: {:?}", options.report);
        assert!(satisfies_coulomb(&reaction, &velocity, &problem.mu, 1e-6), "{id}: r = {reaction}, u = {velocity}");
        let residual = outcome.residual.expect("residual is evaluated");
        assert!(residual.total < 1e-6, "{id}: {residual:?}");
    }
}

// ============================================================================
// Reconstruction
// ============================================================================

#[test]
fn test_reconstruction_satisfies_the_dynamics() {
    for storage in STORAGES {
        let problem = single_contact(storage).expect("problem should build");
        let reformulation = reformulate(&problem).expect("reformulation should succeed");

        let mut reaction = DVector::zeros(3);
        let mut velocity = DVector::zeros(3);
        let mut options = SolverOptions::new(SolverId::Nsgs).with_tolerance(1e-12);
        let status = solve(&reformulation.local, &mut reaction, &mut velocity, &mut options)
            .expect("solve should succeed");
        assert!(status.is_converged());

        let v = compute_global_velocity(&problem, &reformulation.mass, &reaction)
            .expect("reconstruction should succeed");

        // M v − H r − q, evaluated directly on the global operators.
        let mut dynamics = problem.m.mul_vec(&v).expect("M v");
        dynamics -= &problem.q;
        problem.h.gemv(-1.0, &reaction, 1.0, &mut dynamics).expect("H r");
        assert!(dynamics.norm() < 1e-12, "{storage}: {}", dynamics.norm());

        // The local velocity is the contact-space image of v.
        let mut u = problem.b.clone();
        problem.h.gemv_transpose(1.0, &v, 1.0, &mut u).expect("Hᵀ v");
        assert_relative_eq!(u, velocity, epsilon = 1e-10);

        let residual = global_error(&problem, &reaction, &v).expect("error evaluation");
        assert!(residual.total < 1e-10, "{storage}: {residual:?}");
    }
}

#[test]
fn test_reconstruction_is_idempotent() {
    let problem = single_contact(StorageType::SparseBlock).expect("problem should build");
    let reformulation = reformulate(&problem).expect("reformulation should succeed");
    let reaction = expected_reaction();

    let first = compute_global_velocity(&problem, &reformulation.mass, &reaction).expect("first");
    let second = compute_global_velocity(&problem, &reformulation.mass, &reaction).expect("second");
    assert_eq!(first, second);
}

#[test]
fn test_global_velocity_matches_closed_form() {
    // M = I: v = q + H r.
    let problem = single_contact(StorageType::Sparse).expect("problem should build");
    let reformulation = reformulate(&problem).expect("reformulation should succeed");
    let r = expected_reaction();
    let v = compute_global_velocity(&problem, &reformulation.mass, &r).expect("reconstruction");

    let mut expected = problem.q.clone();
    for k in 0..3 {
        expected[k] += r[k];
        expected[k + 6] -= r[k];
    }
    assert_relative_eq!(v, expected, epsilon = 1e-12);
}
