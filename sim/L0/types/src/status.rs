//! Solve outcome and per-solve report.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Non-fatal outcome of a solve.
///
/// Fatal conditions are [`NumericsError`](crate::NumericsError)s; this type
/// covers the three outcomes a caller must branch on after a successful call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SolveStatus {
    /// The residual dropped below tolerance.
    Converged,
    /// The iteration cap was reached first.
    NotConverged,
    /// No solver family matches the requested name; nothing was computed.
    UnsupportedSolver,
}

impl SolveStatus {
    /// Integer `info` code: `0` converged, `1` not converged, `-1` unsupported.
    #[must_use]
    pub const fn info(self) -> i32 {
        match self {
            Self::Converged => 0,
            Self::NotConverged => 1,
            Self::UnsupportedSolver => -1,
        }
    }

    /// Whether the solve converged.
    #[must_use]
    pub const fn is_converged(self) -> bool {
        matches!(self, Self::Converged)
    }

    /// Build a status from a convergence flag.
    #[must_use]
    pub const fn from_converged(converged: bool) -> Self {
        if converged {
            Self::Converged
        } else {
            Self::NotConverged
        }
    }
}

/// Statistics written back by every solver family.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SolverReport {
    /// Outer iterations performed.
    pub iterations: usize,
    /// Final residual as measured by the solver's error evaluator.
    pub residual: f64,
    /// Whether the residual met the tolerance.
    pub converged: bool,
}

impl SolverReport {
    /// Report for a solve that needed no work.
    #[must_use]
    pub const fn trivial() -> Self {
        Self {
            iterations: 0,
            residual: 0.0,
            converged: true,
        }
    }

    /// Status implied by this report.
    #[must_use]
    pub const fn status(&self) -> SolveStatus {
        SolveStatus::from_converged(self.converged)
    }
}
