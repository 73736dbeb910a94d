//! Single-contact subproblem shared by the sweeping solvers.
//!
//! With every other reaction frozen, contact `i` sees the affine law
//! `u = A r + b` with `A = W_ii` (possibly shifted) and solves for `r` in the
//! Coulomb cone, or in a Tresca cylinder for the threshold-based solvers.
//!
//! The subproblem is solved by a projected fixed point
//! `r ← proj(r − ρ(A r + b + s))` whose step `ρ` adapts: a step is accepted
//! when `ρ‖A Δr‖ ≤ L‖Δr‖`, otherwise it shrinks by `TAU`; a step that was
//! comfortably accepted grows by `1/TAU`.

use nalgebra::DMatrix;
use sim_core::cone::{de_saxce_shift, project_on_cone, project_on_cylinder};

const TAU: f64 = 2.0 / 3.0;
const TAU_INV: f64 = 1.5;
const ACCEPT: f64 = 0.9;
const GROW: f64 = 0.3;
const MAX_BACKTRACKS: usize = 60;

/// Friction law applied to one contact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocalLaw {
    /// Coulomb cone with the given coefficient, with the De Saxcé shift.
    Coulomb(f64),
    /// Tresca cylinder with the given tangential threshold.
    Tresca(f64),
}

impl LocalLaw {
    fn shift(self, u: &[f64]) -> f64 {
        match self {
            Self::Coulomb(mu) => de_saxce_shift(u, mu),
            Self::Tresca(_) => 0.0,
        }
    }

    fn project(self, r: &mut [f64]) {
        match self {
            Self::Coulomb(mu) => {
                project_on_cone(r, mu);
            }
            Self::Tresca(radius) => project_on_cylinder(r, radius),
        }
    }
}

/// Stopping rule of the local iteration.
#[derive(Debug, Clone, Copy)]
pub struct LocalSettings {
    /// Iteration cap.
    pub max_iterations: usize,
    /// Stop once `‖Δr‖ ≤ tolerance · (1 + ‖r‖)`.
    pub tolerance: f64,
}

fn affine(a: &DMatrix<f64>, r: &[f64], b: &[f64], u: &mut [f64]) {
    for (k, uk) in u.iter_mut().enumerate() {
        *uk = b[k] + (0..r.len()).map(|c| a[(k, c)] * r[c]).sum::<f64>();
    }
}

fn distance(x: &[f64], y: &[f64]) -> f64 {
    x.iter().zip(y).map(|(a, b)| (a - b) * (a - b)).sum::<f64>().sqrt()
}

/// Solve one contact in place. Returns the number of iterations used.
pub fn solve_contact(
    a: &DMatrix<f64>,
    b: &[f64],
    law: LocalLaw,
    r: &mut [f64],
    settings: LocalSettings,
) -> usize {
    let d = r.len();
    let max_diagonal = (0..d).map(|k| a[(k, k)]).fold(0.0, f64::max);
    let mut rho = if max_diagonal > 0.0 { 1.0 / max_diagonal } else { 1.0 };

    let mut u = [0.0_f64; 3];
    let mut r_prev = [0.0_f64; 3];
    let mut u_prev = [0.0_f64; 3];
    let (u, r_prev, u_prev) = (&mut u[..d], &mut r_prev[..d], &mut u_prev[..d]);

    law.project(r);
    affine(a, r, b, u);

    for iteration in 0..settings.max_iterations {
        r_prev.copy_from_slice(r);
        u_prev.copy_from_slice(u);
        let shift = law.shift(u_prev);

        let mut step = 0.0;
        let mut response = 0.0;
        for _ in 0..MAX_BACKTRACKS {
            for k in 0..d {
                r[k] = r_prev[k] - rho * u_prev[k];
            }
            r[0] -= rho * shift;
            law.project(r);
            affine(a, r, b, u);

            step = distance(r, r_prev);
            response = distance(u, u_prev);
            if rho * response <= ACCEPT * step {
                break;
            }
            rho *= TAU;
        }

        if rho * response < GROW * step {
            rho *= TAU_INV;
        }

        let norm_r = r.iter().map(|v| v * v).sum::<f64>().sqrt();
        if step <= settings.tolerance * (1.0 + norm_r) {
            return iteration + 1;
        }
    }
    settings.max_iterations
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sim_core::cone::{natural_map_residual_squared, tresca_residual_squared};

    const SETTINGS: LocalSettings = LocalSettings {
        max_iterations: 500,
        tolerance: 1e-16,
    };

    #[test]
    fn sliding_contact_reaches_the_cone_boundary() {
        let a = DMatrix::identity(3, 3) * 2.0;
        let b = [-2.0, -4.0, -6.0];
        let mut r = [0.0; 3];
        solve_contact(&a, &b, LocalLaw::Coulomb(0.1), &mut r, SETTINGS);

        let mut u = [0.0; 3];
        affine(&a, &r, &b, &mut u);
        assert_relative_eq!(r[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(u[0], 0.0, epsilon = 1e-12);
        let norm_t = (r[1] * r[1] + r[2] * r[2]).sqrt();
        assert_relative_eq!(norm_t, 0.1, epsilon = 1e-12);
        assert!(natural_map_residual_squared(&r, &u, 0.1) < 1e-24);
    }

    #[test]
    fn separating_contact_has_no_reaction() {
        let a = DMatrix::from_row_slice(2, 2, &[3.0, 0.5, 0.5, 1.0]);
        let b = [1.0, 0.3];
        let mut r = [5.0, 1.0];
        solve_contact(&a, &b, LocalLaw::Coulomb(0.4), &mut r, SETTINGS);
        assert_relative_eq!(r[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(r[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn sticking_contact_cancels_the_velocity() {
        let a = DMatrix::from_row_slice(3, 3, &[2.0, 0.1, 0.0, 0.1, 1.5, 0.2, 0.0, 0.2, 1.0]);
        let b = [-4.0, 0.1, -0.1];
        let mut r = [0.0; 3];
        solve_contact(&a, &b, LocalLaw::Coulomb(1.0), &mut r, SETTINGS);

        let mut u = [0.0; 3];
        affine(&a, &r, &b, &mut u);
        for uk in u {
            assert_relative_eq!(uk, 0.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn tresca_law_caps_the_tangential_reaction() {
        let a = DMatrix::identity(3, 3);
        let b = [-1.0, 3.0, -4.0];
        let mut r = [0.0; 3];
        solve_contact(&a, &b, LocalLaw::Tresca(0.5), &mut r, SETTINGS);

        let mut u = [0.0; 3];
        affine(&a, &r, &b, &mut u);
        assert_relative_eq!(r[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!((r[1] * r[1] + r[2] * r[2]).sqrt(), 0.5, epsilon = 1e-12);
        assert!(tresca_residual_squared(&r, &u, 0.5) < 1e-24);
    }
}
