//! Error types for contact numerics operations.

use thiserror::Error;

use crate::StorageType;

/// Errors that can occur while assembling, reformulating or solving a
/// frictional contact problem.
///
/// Non-convergence is *not* an error: it is reported through
/// [`SolveStatus`](crate::SolveStatus). Everything here is either a usage
/// error or a numerical breakdown that makes the result meaningless.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NumericsError {
    /// The mass operator and the contact map use different storage formats.
    #[error("storage mismatch: M is {mass} but H is {contact_map}")]
    StorageMismatch {
        /// Storage of the mass operator.
        mass: StorageType,
        /// Storage of the contact map.
        contact_map: StorageType,
    },

    /// An operation is not available for the given storage format.
    #[error("{operation} is not supported for {storage} storage")]
    UnsupportedStorage {
        /// Name of the operation that was attempted.
        operation: &'static str,
        /// Storage that was encountered.
        storage: StorageType,
    },

    /// Two operands have incompatible sizes.
    #[error("dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Which quantity was being checked.
        what: &'static str,
        /// Expected size.
        expected: usize,
        /// Actual size.
        actual: usize,
    },

    /// A dense factorization met a zero pivot.
    #[error("matrix is singular: pivot {pivot} is below threshold")]
    Singular {
        /// Column at which elimination broke down.
        pivot: usize,
    },

    /// A diagonal block could not be inverted.
    #[error("diagonal block {block} is singular")]
    SingularBlock {
        /// Block row of the offending block.
        block: usize,
    },

    /// A sparse factorization failed.
    #[error("sparse factorization failed: {reason}")]
    FactorizationFailed {
        /// Description from the factorization backend.
        reason: String,
    },

    /// The block-sparse mass operator has off-diagonal blocks.
    #[error("block-sparse inverse requires a block-diagonal matrix, found block ({row}, {col})")]
    NotBlockDiagonal {
        /// Block row of the off-diagonal block.
        row: usize,
        /// Block column of the off-diagonal block.
        col: usize,
    },

    /// A contact reports a dimension that is not 2 or 3, or is inconsistent.
    #[error("contact {contact} has invalid dimension {dimension}")]
    InvalidContactDimension {
        /// Contact (vertex) index.
        contact: usize,
        /// Reported dimension.
        dimension: usize,
    },

    /// A coupling edge references a contact that is not in the graph.
    #[error("edge {edge} references contact {vertex}, graph has {contacts} contacts")]
    UnknownVertex {
        /// Edge index.
        edge: usize,
        /// Missing vertex index.
        vertex: usize,
        /// Number of contacts in the graph.
        contacts: usize,
    },

    /// A coupling edge connects a contact to itself.
    #[error("edge {edge} couples contact {vertex} to itself")]
    SelfCoupling {
        /// Edge index.
        edge: usize,
        /// Vertex index.
        vertex: usize,
    },

    /// A body index is outside the graph's body table.
    #[error("contact {contact} references body {body}, graph has {bodies} bodies")]
    UnknownBody {
        /// Contact index.
        contact: usize,
        /// Missing body index.
        body: usize,
        /// Number of bodies in the graph.
        bodies: usize,
    },

    /// Rigid-body assembly was requested for a body of another kind.
    #[error("{operation} is only supported for Newton-Euler bodies, body {body} is {kind}")]
    UnsupportedBodyKind {
        /// Assembly routine that rejected the body.
        operation: &'static str,
        /// Offending body index.
        body: usize,
        /// Kind of the offending body.
        kind: &'static str,
    },

    /// A friction coefficient is negative or not finite.
    #[error("invalid friction coefficient {value} for contact {contact}")]
    InvalidFriction {
        /// Contact index.
        contact: usize,
        /// Offending coefficient.
        value: f64,
    },

    /// Invalid solver configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },
}

impl NumericsError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create a sparse factorization error.
    #[must_use]
    pub fn factorization(reason: impl Into<String>) -> Self {
        Self::FactorizationFailed {
            reason: reason.into(),
        }
    }

    /// Create a dimension mismatch error.
    #[must_use]
    pub const fn dimension(what: &'static str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            what,
            expected,
            actual,
        }
    }

    /// Integer status code for callers that follow the `info` protocol.
    ///
    /// Storage problems map to `-1`, the same code an unsupported solver name
    /// yields. Numerical breakdowns map to `-2`, malformed input to `-3`.
    #[must_use]
    pub const fn code(&self) -> i32 {
        match self {
            Self::StorageMismatch { .. } | Self::UnsupportedStorage { .. } => -1,
            Self::Singular { .. } | Self::SingularBlock { .. } | Self::FactorizationFailed { .. } => {
                -2
            }
            _ => -3,
        }
    }

    /// Check if this is a storage-format error.
    #[must_use]
    pub const fn is_storage_error(&self) -> bool {
        matches!(
            self,
            Self::StorageMismatch { .. } | Self::UnsupportedStorage { .. }
        )
    }

    /// Check if this is a numerical breakdown (singular or failed factorization).
    #[must_use]
    pub const fn is_numerical(&self) -> bool {
        matches!(
            self,
            Self::Singular { .. }
                | Self::SingularBlock { .. }
                | Self::FactorizationFailed { .. }
                | Self::NotBlockDiagonal { .. }
        )
    }

    /// Check if this error comes from an inconsistent interaction graph.
    #[must_use]
    pub const fn is_graph_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownVertex { .. }
                | Self::SelfCoupling { .. }
                | Self::UnknownBody { .. }
                | Self::UnsupportedBodyKind { .. }
                | Self::InvalidContactDimension { .. }
        )
    }
}
