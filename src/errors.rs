//! # Storage Errors
//!
//! Call-level error taxonomy for the storage layer.
//!
//! Per-document revision conflicts inside a bulk write are NOT errors at
//! this level: they are reported in the bulk write response. The variants
//! here are raised out of a call entirely (structural failures, attachment
//! operations against a missing document, backend outages).

use thiserror::Error;

use crate::attachment::AttachmentError;
use crate::migration::MigrationStage;
use crate::revision::RevisionError;
use crate::schema::SchemaError;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    // ==================
    // Caller-recoverable
    // ==================
    /// Supplied previous revision does not match the stored current revision
    #[error("Revision conflict on document {document_id}: {reason}")]
    RevisionConflict { document_id: String, reason: String },

    /// Document does not exist (or is tombstoned, for attachment operations)
    #[error("Document not found: {0}")]
    NotFound(String),

    /// Attachment id is not present on the document
    #[error("Attachment not found: {document_id}/{attachment_id}")]
    AttachmentNotFound {
        document_id: String,
        attachment_id: String,
    },

    // ==================
    // Malformed input
    // ==================
    /// Request is structurally invalid
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The same document id appears more than once in one bulk write
    #[error("Duplicate document id in bulk write: {0}")]
    DuplicateDocumentId(String),

    /// Document body violates the collection schema
    #[error("Schema violation on document {document_id}: {source}")]
    Schema {
        document_id: String,
        #[source]
        source: SchemaError,
    },

    // ==================
    // Backend failures
    // ==================
    /// Underlying storage medium failed
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted state failed validation
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// Instance was closed
    #[error("Storage instance closed: {0}")]
    Closed(String),

    // ==================
    // Migration
    // ==================
    /// A pre/post migration hook rejected a document
    #[error("Migration hook {stage} failed for document {document_id}: {reason}")]
    MigrationHookFailure {
        document_id: String,
        stage: MigrationStage,
        reason: String,
    },
}

impl StorageError {
    /// Create a not found error
    pub fn not_found(document_id: impl Into<String>) -> Self {
        Self::NotFound(document_id.into())
    }

    /// Create an invalid request error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a corruption error
    pub fn corruption(msg: impl Into<String>) -> Self {
        Self::Corruption(msg.into())
    }

    /// Create a backend unavailable error
    pub fn backend_unavailable(msg: impl Into<String>) -> Self {
        Self::BackendUnavailable(msg.into())
    }

    /// Get error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::RevisionConflict { .. } => "RX_REVISION_CONFLICT",
            Self::NotFound(_) => "RX_NOT_FOUND",
            Self::AttachmentNotFound { .. } => "RX_ATTACHMENT_NOT_FOUND",
            Self::InvalidRequest(_) => "RX_INVALID_REQUEST",
            Self::DuplicateDocumentId(_) => "RX_DUPLICATE_DOCUMENT_ID",
            Self::Schema { .. } => "RX_SCHEMA_VIOLATION",
            Self::BackendUnavailable(_) => "RX_BACKEND_UNAVAILABLE",
            Self::Io(_) => "RX_IO_FAILURE",
            Self::Corruption(_) => "RX_DATA_CORRUPTION",
            Self::Closed(_) => "RX_INSTANCE_CLOSED",
            Self::MigrationHookFailure { .. } => "RX_MIGRATION_HOOK_FAILURE",
        }
    }

    /// Get HTTP-style status code
    pub fn status_code(&self) -> u16 {
        match self {
            Self::RevisionConflict { .. } => 409,
            Self::NotFound(_) => 404,
            Self::AttachmentNotFound { .. } => 404,
            Self::InvalidRequest(_) => 400,
            Self::DuplicateDocumentId(_) => 400,
            Self::Schema { .. } => 422,
            Self::BackendUnavailable(_) => 503,
            Self::Io(_) => 500,
            Self::Corruption(_) => 500,
            Self::Closed(_) => 410,
            Self::MigrationHookFailure { .. } => 500,
        }
    }

    /// Returns true if the caller can recover by re-reading and retrying
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::RevisionConflict { .. } | Self::NotFound(_) | Self::AttachmentNotFound { .. }
        )
    }
}

impl From<RevisionError> for StorageError {
    fn from(e: RevisionError) -> Self {
        Self::InvalidRequest(e.to_string())
    }
}

impl From<AttachmentError> for StorageError {
    fn from(e: AttachmentError) -> Self {
        match e {
            AttachmentError::InvalidPath(path) => Self::InvalidRequest(format!("Invalid blob path: {}", path)),
            AttachmentError::InvalidStub { attachment_id, reason } => {
                Self::InvalidRequest(format!("Attachment {}: {}", attachment_id, reason))
            }
            AttachmentError::BlobNotFound(key) => {
                Self::Corruption(format!("Attachment blob missing: {}", key))
            }
            AttachmentError::DigestMismatch { key, .. } => {
                Self::Corruption(format!("Attachment blob digest mismatch: {}", key))
            }
            AttachmentError::Io(msg) => Self::BackendUnavailable(msg),
            AttachmentError::Internal(msg) => Self::BackendUnavailable(msg),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        Self::Corruption(format!("Record decode failed: {}", e))
    }
}
