//! Revision errors

use thiserror::Error;

/// Result type for revision operations
pub type RevisionResult<T> = Result<T, RevisionError>;

/// Errors raised while parsing or extending revisions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RevisionError {
    #[error("Malformed revision '{0}': expected <height>-<hash>")]
    Malformed(String),

    #[error("Invalid revision height in '{0}': height must be a positive integer")]
    InvalidHeight(String),

    #[error("Invalid revision hash in '{0}': hash must be non-empty alphanumeric")]
    InvalidHash(String),

    #[error("Revision height overflow after {0}")]
    HeightOverflow(u64),

    #[error("Revision {attempted} does not extend history head {head}")]
    NonMonotonic { attempted: String, head: String },
}

impl RevisionError {
    /// Get error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "RX_REVISION_MALFORMED",
            Self::InvalidHeight(_) => "RX_REVISION_INVALID_HEIGHT",
            Self::InvalidHash(_) => "RX_REVISION_INVALID_HASH",
            Self::HeightOverflow(_) => "RX_REVISION_HEIGHT_OVERFLOW",
            Self::NonMonotonic { .. } => "RX_REVISION_NON_MONOTONIC",
        }
    }
}
