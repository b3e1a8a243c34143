//! # Attachment Errors

use thiserror::Error;

/// Result type for attachment operations
pub type AttachmentResult<T> = Result<T, AttachmentError>;

/// Attachment and blob backend errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttachmentError {
    // Blob errors
    #[error("Blob not found: {0}")]
    BlobNotFound(String),

    #[error("Blob digest mismatch at {key}: expected {expected}, got {actual}")]
    DigestMismatch {
        key: String,
        expected: String,
        actual: String,
    },

    // Validation errors
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid attachment stub {attachment_id}: {reason}")]
    InvalidStub {
        attachment_id: String,
        reason: String,
    },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    // Internal
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AttachmentError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            AttachmentError::BlobNotFound(_) => 404,
            AttachmentError::DigestMismatch { .. } => 500,
            AttachmentError::InvalidPath(_) => 400,
            AttachmentError::InvalidStub { .. } => 400,
            AttachmentError::Io(_) => 503,
            AttachmentError::Internal(_) => 500,
        }
    }
}
