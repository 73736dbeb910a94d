//! Zero-contact fast path.
//!
//! With no active contacts every family must report `info = 0` without
//! iterating, and the reconstructed velocity must be the free velocity
//! `M⁻¹ q`.

use approx::assert_relative_eq;
use nalgebra::DVector;
use sim_constraint::{SolverReport, solve_global};
use sim_conformance_tests::{DOFS, STORAGES, free_velocity, no_contacts};
use sim_types::{SolverId, SolverOptions};

#[test]
fn test_every_family_and_storage_takes_the_fast_path() {
    for storage in STORAGES {
        let problem = no_contacts(storage).expect("problem should build");
        for id in SolverId::ALL {
            let mut reaction = DVector::zeros(0);
            let mut velocity = DVector::zeros(0);
            let mut global_velocity = DVector::from_element(DOFS, f64::NAN);
            let mut options = SolverOptions::new(id);

            let outcome = solve_global(&problem, &mut reaction, &mut velocity, &mut global_velocity, &mut options)
                .expect("fast path should succeed");

            assert_eq!(outcome.info(), 0, "{id} on {storage}");
            assert!(outcome.fast_path, "{id} on {storage}");
            assert_eq!(options.report, SolverReport::trivial());
            // M = I, so the free velocity comes back unchanged.
            assert_relative_eq!(global_velocity, free_velocity(), epsilon = 1e-15);
        }
    }
}

#[test]
fn test_fast_path_residual_is_zero() {
    let problem = no_contacts(sim_types::StorageType::Dense).expect("problem should build");
    let mut global_velocity = DVector::zeros(DOFS);
    let mut options = SolverOptions::new(SolverId::Admm);
    let outcome = solve_global(
        &problem,
        &mut DVector::zeros(0),
        &mut DVector::zeros(0),
        &mut global_velocity,
        &mut options,
    )
    .expect("fast path should succeed");

    let residual = outcome.residual.expect("fast path still evaluates the error");
    assert!(residual.dynamics < 1e-15);
    assert_relative_eq!(residual.complementarity, 0.0);
}

#[test]
fn test_unknown_solver_wins_over_the_fast_path() {
    let problem = no_contacts(sim_types::StorageType::Dense).expect("problem should build");
    let mut global_velocity = DVector::from_element(DOFS, 5.0);
    let mut options = SolverOptions::named("LEMKE");
    let outcome = solve_global(
        &problem,
        &mut DVector::zeros(0),
        &mut DVector::zeros(0),
        &mut global_velocity,
        &mut options,
    )
    .expect("unknown names are not errors");

    assert_eq!(outcome.info(), -1);
    assert!(!outcome.fast_path);
    assert_eq!(global_velocity, DVector::from_element(DOFS, 5.0));
}
