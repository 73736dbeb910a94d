//! Storage format tag shared by all operators.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How a matrix operator is stored.
///
/// The reformulation pipeline dispatches on this tag; the mass operator and
/// the contact map of one problem must carry the same tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StorageType {
    /// Column-major dense storage.
    Dense,
    /// Block-CSR storage of dense blocks.
    SparseBlock,
    /// Scalar compressed sparse storage.
    Sparse,
}

impl StorageType {
    /// Short name used in diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dense => "dense",
            Self::SparseBlock => "sparse-block",
            Self::Sparse => "sparse",
        }
    }
}

impl std::fmt::Display for StorageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
