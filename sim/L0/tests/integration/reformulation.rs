//! Cross-format reformulation of the reference scenario.

use approx::assert_relative_eq;
use nalgebra::{DMatrix, DVector};
use sim_conformance_tests::{STORAGES, contact_map, free_velocity, mass, single_contact, stored};
use sim_core::{GlobalFrictionContactProblem, NumericsError, StorageType, reformulate};

#[test]
fn test_reduced_operator_agrees_across_storages() {
    for storage in STORAGES {
        let problem = single_contact(storage).expect("problem should build");
        let reformulation = reformulate(&problem).expect("reformulation should succeed");
        let local = &reformulation.local;

        assert_eq!(local.w.storage(), storage);
        assert_eq!(local.number_of_contacts, 1);
        assert_relative_eq!(local.w.to_dense(), DMatrix::identity(3, 3) * 2.0, epsilon = 1e-14);
        assert_relative_eq!(local.q, DVector::from_vec(vec![-2.0, -4.0, -6.0]), epsilon = 1e-14);
        assert_relative_eq!(local.mu[0], 0.1);
    }
}

#[test]
fn test_nonidentity_mass_agrees_across_storages() {
    let m = DMatrix::from_fn(9, 9, |i, j| {
        if i / 3 != j / 3 {
            0.0
        } else if i == j {
            4.0 + i as f64
        } else {
            0.5
        }
    });
    let mut b = DVector::zeros(3);
    b[0] = 0.25;

    let mut results = Vec::new();
    for storage in STORAGES {
        let problem = GlobalFrictionContactProblem::new(
            3,
            stored(&m, storage).expect("mass"),
            stored(&contact_map(), storage).expect("contact map"),
            free_velocity(),
            b.clone(),
            DVector::from_element(1, 0.3),
        )
        .expect("problem should build");
        let local = reformulate(&problem).expect("reformulation should succeed").local;
        results.push((local.w.to_dense(), local.q));
    }

    let minv = m.clone().try_inverse().expect("mass is invertible");
    let h = contact_map();
    let w = h.transpose() * &minv * &h;
    let q = h.transpose() * &minv * free_velocity() + &b;
    for (w_local, q_local) in results {
        assert_relative_eq!(w_local, w, epsilon = 1e-12);
        assert_relative_eq!(q_local, q, epsilon = 1e-12);
    }
}

#[test]
fn test_storage_mismatch_is_rejected() {
    let problem = GlobalFrictionContactProblem::new(
        3,
        stored(&mass(), StorageType::Dense).expect("mass"),
        stored(&contact_map(), StorageType::Sparse).expect("contact map"),
        free_velocity(),
        DVector::zeros(3),
        DVector::from_element(1, 0.1),
    )
    .expect("sizes agree, only storage differs");

    let err = reformulate(&problem).expect_err("mixed storage must fail");
    assert!(matches!(
        err,
        NumericsError::StorageMismatch {
            mass: StorageType::Dense,
            contact_map: StorageType::Sparse,
        }
    ));
    assert_eq!(err.code(), -1);
    assert!(err.is_storage_error());
}

#[test]
fn test_singular_mass_is_a_numerical_error() {
    let mut m = mass();
    m[(4, 4)] = 0.0;
    let problem = GlobalFrictionContactProblem::new(
        3,
        stored(&m, StorageType::Dense).expect("mass"),
        stored(&contact_map(), StorageType::Dense).expect("contact map"),
        free_velocity(),
        DVector::zeros(3),
        DVector::from_element(1, 0.1),
    )
    .expect("problem should build");

    let err = reformulate(&problem).expect_err("singular mass must fail");
    assert!(err.is_numerical(), "{err}");
}
