//! Schema errors

use thiserror::Error;

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Schema definition and validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Document body must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Undeclared field: {0}")]
    ExtraField(String),

    #[error("Null value at {0}")]
    NullValue(String),

    #[error("Type mismatch at {path}: expected {expected}, got {actual}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Schema does not allow attachments")]
    AttachmentsNotAllowed,

    #[error("Malformed schema {source_name}: {reason}")]
    Malformed { source_name: String, reason: String },
}

impl SchemaError {
    pub fn malformed(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// Get error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Malformed { .. } => "RX_MALFORMED_SCHEMA",
            Self::AttachmentsNotAllowed => "RX_ATTACHMENTS_NOT_ALLOWED",
            _ => "RX_SCHEMA_VALIDATION_FAILED",
        }
    }

    /// Field path the violation refers to, if any
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::MissingField(p) | Self::ExtraField(p) | Self::NullValue(p) => Some(p),
            Self::TypeMismatch { path, .. } => Some(path),
            _ => None,
        }
    }
}
