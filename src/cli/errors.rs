//! CLI-specific error types
//!
//! Errors that stop the binary. Storage errors of the requested operation
//! are reported on stdout instead.

use std::io;

use thiserror::Error;

use crate::errors::StorageError;
use crate::schema::SchemaError;

/// CLI error
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration file error
    #[error("{0}")]
    Config(String),

    /// Malformed stdin input
    #[error("{0}")]
    Input(String),

    /// I/O error (stdin/stdout)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Storage could not be opened
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl CliError {
    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Input error
    pub fn input_error(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "RX_CLI_CONFIG_ERROR",
            Self::Input(_) => "RX_CLI_INPUT_ERROR",
            Self::Io(_) => "RX_CLI_IO_ERROR",
            Self::Storage(e) => e.code(),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::input_error(format!("JSON error: {}", e))
    }
}

impl From<SchemaError> for CliError {
    fn from(e: SchemaError) -> Self {
        Self::config_error(e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(CliError::config_error("x").code(), "RX_CLI_CONFIG_ERROR");
        assert_eq!(
            CliError::from(StorageError::not_found("a")).code(),
            "RX_NOT_FOUND"
        );
    }
}
