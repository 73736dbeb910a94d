//! Selection of solver families by name.

use nalgebra::DVector;
use sim_constraint::{SolveStatus, family, solve, solve_global};
use sim_conformance_tests::{DOFS, single_contact};
use sim_core::{StorageType, reformulate};
use sim_types::{SolverId, SolverOptions};

#[test]
fn test_names_round_trip() {
    for id in SolverId::ALL {
        assert_eq!(SolverId::from_name(id.name()), Some(id));
        assert_eq!(SolverOptions::named(id.name()).solver_id(), Some(id));
    }
    assert_eq!(SolverId::NewtonFischerBurmeister.name(), "NSN-FischerBurmeister");
}

#[test]
fn test_names_are_case_sensitive() {
    let problem = single_contact(StorageType::Dense).expect("problem should build");
    let mut global_velocity = DVector::from_element(DOFS, 1.5);

    for name in ["admm", "Prox", "nsn-fischerburmeister", " DSFP"] {
        let mut options = SolverOptions::named(name);
        let outcome = solve_global(
            &problem,
            &mut DVector::zeros(3),
            &mut DVector::zeros(3),
            &mut global_velocity,
            &mut options,
        )
        .expect("unknown names are not errors");
        assert_eq!(outcome.status, SolveStatus::UnsupportedSolver, "{name:?}");
        assert!(outcome.residual.is_none());
    }
    assert_eq!(global_velocity, DVector::from_element(DOFS, 1.5));
}

#[test]
fn test_dispatch_matches_direct_family_call() {
    let problem = single_contact(StorageType::Dense).expect("problem should build");
    let local = reformulate(&problem).expect("reformulation should succeed").local;

    for id in SolverId::ALL {
        let mut by_name = (DVector::zeros(3), DVector::zeros(3));
        let mut options = SolverOptions::new(id).with_tolerance(1e-10);
        let status = solve(&local, &mut by_name.0, &mut by_name.1, &mut options).expect("dispatch");
        let report = options.report;

        let mut direct = (DVector::zeros(3), DVector::zeros(3));
        let mut options = SolverOptions::new(id).with_tolerance(1e-10);
        let direct_status = family(id)(&local, &mut direct.0, &mut direct.1, &mut options).expect("direct");

        assert_eq!(status, direct_status, "{id}");
        assert_eq!(report, options.report, "{id}");
        assert_eq!(by_name, direct, "{id}");
    }
}

#[test]
fn test_iteration_cap_is_not_an_error() {
    let problem = single_contact(StorageType::Dense).expect("problem should build");
    let local = reformulate(&problem).expect("reformulation should succeed").local;

    let mut reaction = DVector::zeros(3);
    let mut velocity = DVector::zeros(3);
    let mut options = SolverOptions::new(SolverId::DeSaxceFixedPoint)
        .with_tolerance(1e-15)
        .with_max_iterations(2);
    let status = solve(&local, &mut reaction, &mut velocity, &mut options).expect("solve");

    assert_eq!(status, SolveStatus::NotConverged);
    assert_eq!(status.info(), 1);
    assert_eq!(options.report.iterations, 2);
    assert!(options.report.residual > 0.0);
}
