//! Semismooth Newton on the Fischer-Burmeister reformulation.
//!
//! # Formulation
//!
//! For a contact with `μ > 0`, the scaled variables
//!
//! ```text
//! x = (μ r_n, r_t),   y = (u_n + μ‖u_t‖, μ u_t)
//! ```
//!
//! both lie in the unit second-order cone exactly when `r ∈ K_μ` and the De
//! Saxcé velocity lies in the dual cone, and `x ⟂ y` exactly when `r ⟂ û`.
//! The Coulomb law is therefore the root of the second-order-cone
//! Fischer-Burmeister function
//!
//! ```text
//! φ(x, y) = x + y − sqrt(x² + y²)
//! ```
//!
//! with the square and square root taken in the Jordan algebra of the cone.
//! A frictionless contact (`μ = 0`) uses the scalar Fischer-Burmeister
//! function on `(r_n, u_n)` and `r_t = 0`.
//!
//! # Iteration
//!
//! Each step solves `J Δ = −Φ(r)` where `J` is the Jacobian of the smoothed
//! function `φ_ε = x + y − sqrt(x² + y² + 2ε² e)` with `ε = smoothing · ‖Φ‖`,
//! then backtracks on `ψ = ½‖Φ‖²` until the Armijo condition
//! `ψ(r + αΔ) ≤ (1 − 2σα) ψ(r)` holds.
//!
//! When `J` is singular or the line search fails, the step falls back to one
//! projected De Saxcé fixed-point step, which keeps the method moving from
//! poor initial guesses.

use nalgebra::{DMatrix, DVector};
use sim_core::FrictionContactProblem;
use sim_core::cone::{de_saxce_shift, project_on_cone};
use sim_core::linalg::DenseLu;
use sim_core::residual::local_error;
use sim_types::{Result, SolveStatus, SolverOptions, SolverReport};
use tracing::trace;

use crate::fixed_point::automatic_step;
use crate::operator::ContactOperator;
use crate::solver::{begin, finish};

fn tangent_norm(v: &[f64]) -> f64 {
    v[1..].iter().map(|t| t * t).sum::<f64>().sqrt()
}

/// Arrow matrix `L_v` of the Jordan product: `L_v w = v ∘ w`.
fn arrow(v: &[f64]) -> DMatrix<f64> {
    let d = v.len();
    let mut l = DMatrix::identity(d, d) * v[0];
    for k in 1..d {
        l[(0, k)] = v[k];
        l[(k, 0)] = v[k];
    }
    l
}

/// `out = v ∘ v`.
fn jordan_square(v: &[f64], out: &mut [f64]) {
    out[0] = v.iter().map(|c| c * c).sum();
    for k in 1..v.len() {
        out[k] = 2.0 * v[0] * v[k];
    }
}

/// Square root of `w` in the cone, by spectral decomposition.
fn cone_sqrt(w: &[f64], out: &mut [f64]) {
    let norm_t = tangent_norm(w);
    let low = (w[0] - norm_t).max(0.0).sqrt();
    let high = (w[0] + norm_t).max(0.0).sqrt();
    out[0] = 0.5 * (low + high);
    for k in 1..w.len() {
        out[k] = if norm_t > 0.0 { 0.5 * (high - low) * w[k] / norm_t } else { 0.0 };
    }
}

/// Fischer-Burmeister residual of one contact and, on request, its
/// derivatives with respect to `r` and `u`.
struct ContactResidual {
    phi: [f64; 3],
    jacobian: Option<(DMatrix<f64>, DMatrix<f64>)>,
}

fn contact_residual(r: &[f64], u: &[f64], mu: f64, epsilon: f64, with_jacobian: bool) -> ContactResidual {
    let d = r.len();
    let mut phi = [0.0_f64; 3];

    if mu <= 0.0 {
        let s = (r[0] * r[0] + u[0] * u[0] + 2.0 * epsilon * epsilon).sqrt();
        phi[0] = r[0] + u[0] - s;
        phi[1..d].copy_from_slice(&r[1..d]);
        let jacobian = with_jacobian.then(|| {
            let (dr, du) = if s > 0.0 {
                (1.0 - r[0] / s, 1.0 - u[0] / s)
            } else {
                (1.0 - std::f64::consts::FRAC_1_SQRT_2, 1.0 - std::f64::consts::FRAC_1_SQRT_2)
            };
            let mut jr = DMatrix::identity(d, d);
            jr[(0, 0)] = dr;
            let mut ju = DMatrix::zeros(d, d);
            ju[(0, 0)] = du;
            (jr, ju)
        });
        return ContactResidual { phi, jacobian };
    }

    let norm_ut = tangent_norm(u);
    let mut x = [0.0_f64; 3];
    let mut y = [0.0_f64; 3];
    x[0] = mu * r[0];
    y[0] = u[0] + mu * norm_ut;
    for k in 1..d {
        x[k] = r[k];
        y[k] = mu * u[k];
    }
    let (x, y) = (&x[..d], &y[..d]);

    let mut x2 = [0.0_f64; 3];
    let mut y2 = [0.0_f64; 3];
    jordan_square(x, &mut x2[..d]);
    jordan_square(y, &mut y2[..d]);

    let mut w = [0.0_f64; 3];
    for k in 0..d {
        w[k] = x2[k] + y2[k];
    }
    w[0] += 2.0 * epsilon * epsilon;

    let mut z = [0.0_f64; 3];
    cone_sqrt(&w[..d], &mut z[..d]);
    for k in 0..d {
        phi[k] = x[k] + y[k] - z[k];
    }

    if !with_jacobian {
        return ContactResidual { phi, jacobian: None };
    }

    // d z = L_z⁻¹ (L_x dx + L_y dy)
    let lz = arrow(&z[..d]).lu();
    let jacobian = lz.solve(&arrow(x)).zip(lz.solve(&arrow(y))).map(|(a, b)| {
        let identity = DMatrix::<f64>::identity(d, d);

        let mut scale_r = DMatrix::identity(d, d);
        scale_r[(0, 0)] = mu;

        let mut scale_u = DMatrix::identity(d, d) * mu;
        scale_u[(0, 0)] = 1.0;
        if norm_ut > 0.0 {
            for k in 1..d {
                scale_u[(0, k)] = mu * u[k] / norm_ut;
            }
        }

        ((&identity - a) * scale_r, (identity - b) * scale_u)
    });
    ContactResidual { phi, jacobian }
}

/// Residual `Φ(r)` of every contact, with `u = W r + q` given.
fn residual(problem: &FrictionContactProblem, reaction: &DVector<f64>, velocity: &DVector<f64>) -> DVector<f64> {
    let d = problem.dimension;
    let mut phi = DVector::zeros(reaction.len());
    for (i, &mu) in problem.mu.iter().enumerate() {
        let rows = i * d..(i + 1) * d;
        let local = contact_residual(&reaction.as_slice()[rows.clone()], &velocity.as_slice()[rows], mu, 0.0, false);
        phi.rows_mut(i * d, d).copy_from_slice(&local.phi[..d]);
    }
    phi
}

/// Smoothed Jacobian `J = ∂Φ/∂r + ∂Φ/∂u · W`, or `None` if some `L_z` is singular.
fn jacobian(
    problem: &FrictionContactProblem,
    w: &DMatrix<f64>,
    reaction: &DVector<f64>,
    velocity: &DVector<f64>,
    epsilon: f64,
) -> Option<DMatrix<f64>> {
    let d = problem.dimension;
    let m = reaction.len();
    let mut j = DMatrix::zeros(m, m);
    for (i, &mu) in problem.mu.iter().enumerate() {
        let rows = i * d..(i + 1) * d;
        let local = contact_residual(&reaction.as_slice()[rows.clone()], &velocity.as_slice()[rows], mu, epsilon, true);
        let (jr, ju) = local.jacobian?;
        let coupling = &ju * w.rows(i * d, d);
        let mut block_rows = j.rows_mut(i * d, d);
        block_rows += &coupling;
        let mut diagonal = j.view_mut((i * d, i * d), (d, d));
        diagonal += &jr;
    }
    Some(j)
}

/// One projected De Saxcé step `r ← proj_K(r − ρ(u + μ‖u_t‖ e_n))`.
fn fixed_point_step(problem: &FrictionContactProblem, rho: f64, reaction: &mut DVector<f64>, velocity: &DVector<f64>) {
    let d = problem.dimension;
    for (i, &mu) in problem.mu.iter().enumerate() {
        let u = &velocity.as_slice()[i * d..(i + 1) * d];
        let shift = de_saxce_shift(u, mu);
        let r = &mut reaction.as_mut_slice()[i * d..(i + 1) * d];
        for k in 0..d {
            r[k] -= rho * u[k];
        }
        r[0] -= rho * shift;
        project_on_cone(r, mu);
    }
}

/// Solve `problem` with the Fischer-Burmeister semismooth Newton method.
///
/// `reaction` is the initial guess and receives the solution; `velocity`
/// receives `W r + q`. Statistics are written to `options.report`.
///
/// # Errors
///
/// Fails on invalid options or vectors of the wrong size. A singular Newton
/// system is not an error; the iteration falls back to a fixed-point step.
pub fn fischer_burmeister_newton(
    problem: &FrictionContactProblem,
    reaction: &mut DVector<f64>,
    velocity: &mut DVector<f64>,
    options: &mut SolverOptions,
) -> Result<SolveStatus> {
    if !begin(problem, reaction, velocity, options)? {
        return Ok(SolveStatus::Converged);
    }

    let op = ContactOperator::new(&problem.w, problem.dimension);
    let w = op.to_dense();
    let rho = automatic_step(&op, options);

    op.apply_into(reaction, velocity);
    *velocity += &problem.q;
    let mut phi = residual(problem, reaction, velocity);

    let mut report = SolverReport::default();
    for iteration in 1..=options.max_iterations {
        report.iterations = iteration;

        let merit = 0.5 * phi.norm_squared();
        let epsilon = options.smoothing * phi.norm();

        let direction = jacobian(problem, &w, reaction, velocity, epsilon)
            .and_then(|j| DenseLu::factor(j).ok())
            .map(|lu| {
                let mut step = -&phi;
                lu.solve_in_place(&mut step);
                step
            });

        let mut accepted = false;
        if let Some(direction) = direction {
            let mut alpha = 1.0;
            for _ in 0..options.line_search_max_iterations {
                let trial = &*reaction + &direction * alpha;
                let mut trial_velocity = op.apply(&trial);
                trial_velocity += &problem.q;
                let trial_phi = residual(problem, &trial, &trial_velocity);

                if 0.5 * trial_phi.norm_squared() <= (1.0 - 2.0 * options.line_search_sigma * alpha) * merit {
                    reaction.copy_from(&trial);
                    velocity.copy_from(&trial_velocity);
                    phi = trial_phi;
                    accepted = true;
                    break;
                }
                alpha *= options.line_search_factor;
            }
        }

        if !accepted {
            if options.verbose {
                trace!(iteration, "newton step rejected, taking a fixed-point step");
            }
            fixed_point_step(problem, rho, reaction, velocity);
            op.apply_into(reaction, velocity);
            *velocity += &problem.q;
            phi = residual(problem, reaction, velocity);
        }

        if iteration % options.error_evaluation_frequency == 0 || iteration == options.max_iterations {
            report.residual = local_error(problem, reaction, velocity);
            if options.verbose {
                trace!(iteration, residual = report.residual, merit, accepted, "newton iteration");
            }
            if report.residual < options.tolerance {
                report.converged = true;
                break;
            }
        }
    }

    Ok(finish(options, report, "NSN-FischerBurmeister"))
}
