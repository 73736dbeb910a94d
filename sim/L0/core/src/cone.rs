//! Friction cone geometry.
//!
//! Per-contact vectors are ordered normal first: `r = (r_n, r_t)` with
//! `r_t` of length 1 (2D contacts) or 2 (3D contacts). The Coulomb cone is
//! `K_μ = { r : ‖r_t‖ ≤ μ r_n }`.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Where a point landed relative to the cone before projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConeRegion {
    /// Already inside the cone; unchanged.
    Interior,
    /// Inside the polar cone; projected to the origin.
    Polar,
    /// Projected onto the cone boundary.
    Boundary,
}

fn tangent_norm(v: &[f64]) -> f64 {
    v[1..].iter().map(|t| t * t).sum::<f64>().sqrt()
}

/// Project `r` onto `K_μ` in place.
pub fn project_on_cone(r: &mut [f64], mu: f64) -> ConeRegion {
    let normal = r[0];
    let norm_t = tangent_norm(r);

    if mu * norm_t <= -normal {
        r.fill(0.0);
        ConeRegion::Polar
    } else if norm_t <= mu * normal {
        ConeRegion::Interior
    } else {
        let projected = mu.mul_add(norm_t, normal) / mu.mul_add(mu, 1.0);
        r[0] = projected;
        let scale = mu * projected / norm_t;
        for t in &mut r[1..] {
            *t *= scale;
        }
        ConeRegion::Boundary
    }
}

/// Project `r` onto the Tresca cylinder `{ r_n ≥ 0, ‖r_t‖ ≤ radius }` in place.
pub fn project_on_cylinder(r: &mut [f64], radius: f64) {
    r[0] = r[0].max(0.0);
    let norm_t = tangent_norm(r);
    if norm_t > radius {
        let scale = radius.max(0.0) / norm_t;
        for t in &mut r[1..] {
            *t *= scale;
        }
    }
}

/// De Saxcé shift `μ‖u_t‖` added to the normal velocity.
#[must_use]
pub fn de_saxce_shift(u: &[f64], mu: f64) -> f64 {
    mu * tangent_norm(u)
}

/// Squared natural-map residual of one contact:
/// `‖r − proj_K(r − û)‖²` with `û` the De Saxcé modified velocity.
///
/// Zero exactly when `(r, u)` satisfies the Coulomb law.
#[must_use]
pub fn natural_map_residual_squared(r: &[f64], u: &[f64], mu: f64) -> f64 {
    let mut work = [0.0_f64; 3];
    let work = &mut work[..r.len()];
    work[0] = r[0] - u[0] - de_saxce_shift(u, mu);
    for k in 1..r.len() {
        work[k] = r[k] - u[k];
    }
    project_on_cone(work, mu);
    r.iter().zip(work.iter()).map(|(a, b)| (a - b) * (a - b)).sum()
}

/// Squared natural-map residual of one contact under a Tresca threshold:
/// `‖r − proj_C(r − u)‖²` with `C` the cylinder of the given radius.
#[must_use]
pub fn tresca_residual_squared(r: &[f64], u: &[f64], radius: f64) -> f64 {
    let mut work = [0.0_f64; 3];
    let work = &mut work[..r.len()];
    for k in 0..r.len() {
        work[k] = r[k] - u[k];
    }
    project_on_cylinder(work, radius);
    r.iter().zip(work.iter()).map(|(a, b)| (a - b) * (a - b)).sum()
}

/// Unnormalized complementarity error over all contacts:
/// the square root of the summed natural-map residuals.
#[must_use]
pub fn complementarity_error(reaction: &[f64], velocity: &[f64], mu: &[f64], dimension: usize) -> f64 {
    reaction
        .chunks_exact(dimension)
        .zip(velocity.chunks_exact(dimension))
        .zip(mu)
        .map(|((r, u), &m)| natural_map_residual_squared(r, u, m))
        .sum::<f64>()
        .sqrt()
}
