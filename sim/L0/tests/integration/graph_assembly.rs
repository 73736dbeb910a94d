//! Interaction graph assembly against the reformulated operator.
//!
//! For rigid bodies the Delassus operator can be assembled two ways: block
//! by block from the graph, or as `Hᵀ M⁻¹ H` from the assembled mass
//! operator and contact map. Both must agree.

use approx::assert_relative_eq;
use nalgebra::{DMatrix, DVector};
use sim_constraint::solve_global;
use sim_core::{
    BlockCsrMatrix, Body, BodyKind, Contact, GlobalFrictionContactProblem, InteractionGraph, NumericsError,
    reformulate,
};
use sim_types::{SolverId, SolverOptions};

fn jacobian(seed: usize) -> DMatrix<f64> {
    DMatrix::from_fn(6, 3, |i, j| ((i * 3 + j + seed) as f64 * 0.37).sin())
}

/// Two rigid bodies and three contacts: `0` on body 0, `1` between both
/// bodies, `2` on body 1.
fn chain() -> InteractionGraph {
    let mut graph = InteractionGraph::new();
    let a = graph.add_body(Body::rigid(2.0, [0.1, 0.2, 0.3]));
    let b = graph.add_body(Body::rigid(3.0, [0.4, 0.4, 0.5]));
    graph.add_contact(Contact::new(3, 0.3).with_jacobian(a, jacobian(0)));
    graph.add_contact(
        Contact::new(3, 0.5)
            .with_jacobian(a, jacobian(7))
            .with_jacobian(b, jacobian(11)),
    );
    graph.add_contact(Contact::new(3, 0.4).with_jacobian(b, jacobian(19)));
    graph
}

#[test]
fn test_graph_delassus_matches_reformulation() {
    let mut graph = chain();
    graph.compute_contact_blocks().expect("contact blocks");
    let edges = graph.link_shared_bodies().expect("couplings");
    assert_eq!(edges, 2, "contact 1 shares a body with each neighbour");

    let assembled = BlockCsrMatrix::from_graph(&graph).expect("assembly");
    assert_eq!(assembled.block_rows(), 3);
    assert_eq!(assembled.nnz_blocks(), 7);

    let problem = GlobalFrictionContactProblem::from_graph(&graph, DVector::zeros(12), DVector::zeros(9))
        .expect("global problem");
    let reformulation = reformulate(&problem).expect("reformulation should succeed");

    assert_relative_eq!(reformulation.local.w.to_dense(), assembled.view().to_dense(), epsilon = 1e-12);
    assert_eq!(reformulation.local.mu, DVector::from_vec(vec![0.3, 0.5, 0.4]));
}

#[test]
fn test_graph_problem_solves_end_to_end() {
    let graph = chain();
    // Push both bodies into their contacts.
    let mut q = DVector::zeros(12);
    q[0] = -1.0;
    q[7] = -0.5;
    let problem = GlobalFrictionContactProblem::from_graph(&graph, q, DVector::zeros(9)).expect("global problem");

    let mut reaction = DVector::zeros(9);
    let mut velocity = DVector::zeros(9);
    let mut global_velocity = DVector::zeros(12);
    let mut options = SolverOptions::new(SolverId::Nsgs)
        .with_tolerance(1e-8)
        .with_max_iterations(100_000);

    let outcome = solve_global(&problem, &mut reaction, &mut velocity, &mut global_velocity, &mut options)
        .expect("solve should succeed");

    assert_eq!(outcome.info(), 0, "{:?}", options.report);
    let residual = outcome.residual.expect("residual is evaluated");
    assert!(residual.dynamics < 1e-10, "{residual:?}");
    assert!(residual.complementarity < 1e-6, "{residual:?}");
}

#[test]
fn test_non_rigid_bodies_are_rejected() {
    let mut graph = InteractionGraph::new();
    let body = graph.add_body(Body::new(BodyKind::Lagrangian, DMatrix::identity(6, 6)));
    graph.add_contact(Contact::new(3, 0.2).with_jacobian(body, jacobian(0)));

    let err = GlobalFrictionContactProblem::from_graph(&graph, DVector::zeros(6), DVector::zeros(3))
        .expect_err("only Newton-Euler bodies can be assembled");
    assert!(matches!(err, NumericsError::UnsupportedBodyKind { .. }), "{err}");
    assert!(err.is_graph_error());
}

#[test]
fn test_empty_graph_gives_an_empty_problem() {
    let graph = InteractionGraph::new();
    let problem =
        GlobalFrictionContactProblem::from_graph(&graph, DVector::zeros(0), DVector::zeros(0)).expect("empty problem");
    assert_eq!(problem.number_of_contacts, 0);
    assert_eq!(problem.velocity_dim(), 0);
}
