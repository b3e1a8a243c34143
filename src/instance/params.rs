//! Instance creation parameters

use serde::{Deserialize, Serialize};

use crate::errors::{StorageError, StorageResult};
use crate::schema::RxJsonSchema;

fn default_true() -> bool {
    true
}

/// Per-instance behavior switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceOptions {
    /// Skip blob writes whose digest matches the stored attachment
    #[serde(default = "default_true")]
    pub skip_if_same_attachments: bool,
    /// Validate document bodies against the collection schema
    #[serde(default = "default_true")]
    pub validate_schema: bool,
}

impl Default for InstanceOptions {
    fn default() -> Self {
        Self {
            skip_if_same_attachments: default_true(),
            validate_schema: default_true(),
        }
    }
}

/// Everything needed to open one collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageInstanceCreationParams {
    pub database_name: String,
    pub collection_name: String,
    pub schema: RxJsonSchema,
    #[serde(default)]
    pub options: InstanceOptions,
}

impl StorageInstanceCreationParams {
    pub fn new(
        database_name: impl Into<String>,
        collection_name: impl Into<String>,
        schema: RxJsonSchema,
    ) -> Self {
        Self {
            database_name: database_name.into(),
            collection_name: collection_name.into(),
            schema,
            options: InstanceOptions::default(),
        }
    }

    pub fn with_options(mut self, options: InstanceOptions) -> Self {
        self.options = options;
        self
    }

    /// Names double as directory names, so they are restricted to `[A-Za-z0-9_-]`
    pub fn validate(&self) -> StorageResult<()> {
        check_name("database", &self.database_name)?;
        check_name("collection", &self.collection_name)?;
        self.schema
            .validate_structure()
            .map_err(|reason| StorageError::invalid_request(format!("Invalid schema: {}", reason)))
    }
}

fn check_name(kind: &str, name: &str) -> StorageResult<()> {
    let valid = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if !valid {
        return Err(StorageError::invalid_request(format!(
            "Invalid {} name '{}'",
            kind, name
        )));
    }
    Ok(())
}
