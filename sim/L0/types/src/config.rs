//! Solver selection and configuration.
//!
//! [`SolverOptions`] is a flat record: the solver name, the stopping criteria
//! shared by all families, and the knobs each family reads. It also carries
//! the [`SolverReport`] slot that solvers write their statistics into, so a
//! caller holding `&mut SolverOptions` sees iteration count and residual
//! after the call.

use crate::{NumericsError, SolverReport};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifier of a local solver family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SolverId {
    /// Nonsmooth Gauss-Seidel sweeping contacts one at a time.
    Nsgs,
    /// Alternating direction method of multipliers on the cone splitting.
    Admm,
    /// Semismooth Newton on the smoothed Fischer-Burmeister reformulation.
    NewtonFischerBurmeister,
    /// Projected fixed point on the De Saxcé modified velocity.
    DeSaxceFixedPoint,
    /// Outer fixed point on Tresca thresholds with an inner projected sweep.
    TrescaFixedPoint,
    /// Proximal point outer loop around a shifted NSGS.
    Proximal,
}

impl SolverId {
    /// Every solver family, in registration order.
    pub const ALL: [Self; 6] = [
        Self::Nsgs,
        Self::Admm,
        Self::NewtonFischerBurmeister,
        Self::DeSaxceFixedPoint,
        Self::TrescaFixedPoint,
        Self::Proximal,
    ];

    /// The exact name used to select this family.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Nsgs => "NSGS",
            Self::Admm => "ADMM",
            Self::NewtonFischerBurmeister => "NSN-FischerBurmeister",
            Self::DeSaxceFixedPoint => "DSFP",
            Self::TrescaFixedPoint => "TFP",
            Self::Proximal => "PROX",
        }
    }

    /// Look up a family by name. Matching is exact and case-sensitive.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.name() == name)
    }
}

impl std::fmt::Display for SolverId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Configuration for a frictional contact solve.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SolverOptions {
    /// Name of the solver family (see [`SolverId::name`]).
    pub solver: String,
    /// Maximum number of outer iterations.
    pub max_iterations: usize,
    /// Convergence tolerance on the normalized residual.
    pub tolerance: f64,
    /// Over-relaxation factor for Gauss-Seidel updates (1.0 = none).
    pub relaxation: f64,
    /// Evaluate the global error every this many NSGS sweeps.
    pub error_evaluation_frequency: usize,
    /// Iteration cap of the per-contact solver.
    pub local_max_iterations: usize,
    /// Tolerance of the per-contact solver.
    pub local_tolerance: f64,
    /// Fixed-point step size. Non-positive selects `1 / ‖W‖∞`.
    pub rho: f64,
    /// Initial ADMM penalty.
    pub admm_rho: f64,
    /// Rebalance the ADMM penalty from primal and dual residuals.
    pub admm_adaptive_rho: bool,
    /// Initial smoothing of the Fischer-Burmeister function.
    pub smoothing: f64,
    /// Maximum backtracking steps per Newton line search.
    pub line_search_max_iterations: usize,
    /// Step reduction factor per backtracking step.
    pub line_search_factor: f64,
    /// Armijo sufficient-decrease constant.
    pub line_search_sigma: f64,
    /// Inner iteration cap for two-level methods (TFP, PROX).
    pub inner_max_iterations: usize,
    /// Proximal regularization added to the diagonal.
    pub proximal_sigma: f64,
    /// Emit per-iteration trace events.
    pub verbose: bool,
    /// Statistics written by the last solve.
    pub report: SolverReport,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self::new(SolverId::Nsgs)
    }
}

impl SolverOptions {
    /// Create options selecting the given family with default settings.
    #[must_use]
    pub fn new(solver: SolverId) -> Self {
        Self::named(solver.name())
    }

    /// Create options selecting a family by name.
    ///
    /// The name is not checked here; an unknown name is reported by the
    /// dispatcher as [`SolveStatus::UnsupportedSolver`](crate::SolveStatus).
    #[must_use]
    pub fn named(solver: impl Into<String>) -> Self {
        Self {
            solver: solver.into(),
            max_iterations: 1000,
            tolerance: 1e-4,
            relaxation: 1.0,
            error_evaluation_frequency: 1,
            local_max_iterations: 100,
            local_tolerance: 1e-16,
            rho: 0.0,
            admm_rho: 1.0,
            admm_adaptive_rho: true,
            smoothing: 1e-2,
            line_search_max_iterations: 30,
            line_search_factor: 0.5,
            line_search_sigma: 1e-4,
            inner_max_iterations: 100,
            proximal_sigma: 1.0,
            verbose: false,
            report: SolverReport::default(),
        }
    }

    /// Create a high-accuracy configuration for the given family.
    #[must_use]
    pub fn high_accuracy(solver: SolverId) -> Self {
        Self {
            max_iterations: 100_000,
            tolerance: 1e-14,
            inner_max_iterations: 1000,
            ..Self::new(solver)
        }
    }

    /// Create a configuration for interactive rates: few iterations, loose tolerance.
    #[must_use]
    pub fn realtime(solver: SolverId) -> Self {
        Self {
            max_iterations: 50,
            tolerance: 1e-3,
            local_max_iterations: 20,
            local_tolerance: 1e-10,
            inner_max_iterations: 10,
            ..Self::new(solver)
        }
    }

    /// The selected family, if the name is known.
    #[must_use]
    pub fn solver_id(&self) -> Option<SolverId> {
        SolverId::from_name(&self.solver)
    }

    /// Set the convergence tolerance.
    #[must_use]
    pub const fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the outer iteration cap.
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the Gauss-Seidel relaxation factor.
    #[must_use]
    pub const fn with_relaxation(mut self, relaxation: f64) -> Self {
        self.relaxation = relaxation;
        self
    }

    /// Set the fixed-point step size.
    #[must_use]
    pub const fn with_rho(mut self, rho: f64) -> Self {
        self.rho = rho;
        self
    }

    /// Enable per-iteration tracing.
    #[must_use]
    pub const fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_iterations == 0 {
            return Err(NumericsError::invalid_config(
                "max_iterations must be at least 1",
            ));
        }

        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(NumericsError::invalid_config(
                "tolerance must be positive and finite",
            ));
        }

        if !(self.relaxation > 0.0 && self.relaxation < 2.0) {
            return Err(NumericsError::invalid_config(
                "relaxation must be in (0, 2)",
            ));
        }

        if self.error_evaluation_frequency == 0 || self.local_max_iterations == 0 {
            return Err(NumericsError::invalid_config(
                "error_evaluation_frequency and local_max_iterations must be at least 1",
            ));
        }

        if !self.rho.is_finite() {
            return Err(NumericsError::invalid_config("rho must be finite"));
        }

        if !(self.admm_rho > 0.0) || !(self.proximal_sigma > 0.0) {
            return Err(NumericsError::invalid_config(
                "admm_rho and proximal_sigma must be positive",
            ));
        }

        if !(self.line_search_factor > 0.0 && self.line_search_factor < 1.0) {
            return Err(NumericsError::invalid_config(
                "line_search_factor must be in (0, 1)",
            ));
        }

        if !(self.line_search_sigma > 0.0 && self.line_search_sigma < 0.5) {
            return Err(NumericsError::invalid_config(
                "line_search_sigma must be in (0, 0.5)",
            ));
        }

        if self.smoothing < 0.0 {
            return Err(NumericsError::invalid_config(
                "smoothing cannot be negative",
            ));
        }

        Ok(())
    }
}
