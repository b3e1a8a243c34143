//! Configuration file for the CLI
//!
//! ```json
//! {
//!   "data_dir": "./data",
//!   "database": "default",
//!   "collection": "humans",
//!   "schema": "./humans.schema.json",
//!   "options": { "skip_if_same_attachments": true, "validate_schema": true }
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::{CliError, CliResult};
use crate::instance::{InstanceOptions, StorageInstanceCreationParams};
use crate::schema::RxJsonSchema;

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory of the file storage (required)
    pub data_dir: PathBuf,

    /// Database name (optional, default "default")
    #[serde(default = "default_database")]
    pub database: String,

    /// Collection name (required)
    pub collection: String,

    /// Schema file; a permissive schema is used when absent
    #[serde(default)]
    pub schema: Option<PathBuf>,

    #[serde(default)]
    pub options: InstanceOptions,
}

fn default_database() -> String {
    "default".to_string()
}

impl StorageConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        let config: StorageConfig = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(CliError::config_error("data_dir must not be empty"));
        }
        if self.collection.is_empty() {
            return Err(CliError::config_error("collection must not be empty"));
        }
        Ok(())
    }

    pub fn data_path(&self) -> &Path {
        &self.data_dir
    }

    /// Load the configured schema
    pub fn load_schema(&self) -> CliResult<RxJsonSchema> {
        match &self.schema {
            Some(path) => Ok(RxJsonSchema::from_file(path)?),
            None => Ok(RxJsonSchema::permissive()),
        }
    }

    /// Parameters for opening the configured collection
    pub fn creation_params(&self) -> CliResult<StorageInstanceCreationParams> {
        Ok(StorageInstanceCreationParams::new(
            self.database.clone(),
            self.collection.clone(),
            self.load_schema()?,
        )
        .with_options(self.options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let temp = TempDir::new().unwrap();
        let path = write(&temp, "c.json", r#"{"data_dir": "./data", "collection": "humans"}"#);

        let config = StorageConfig::load(&path).unwrap();
        assert_eq!(config.database, "default");
        assert!(config.options.validate_schema);
        assert_eq!(config.load_schema().unwrap(), RxJsonSchema::permissive());
    }

    #[test]
    fn test_schema_file() {
        let temp = TempDir::new().unwrap();
        let schema = write(
            &temp,
            "s.json",
            r#"{"version": 2, "fields": {"name": {"type": "string", "required": true}}}"#,
        );
        let config = StorageConfig {
            data_dir: temp.path().to_path_buf(),
            database: "db".into(),
            collection: "humans".into(),
            schema: Some(schema),
            options: InstanceOptions::default(),
        };

        let params = config.creation_params().unwrap();
        assert_eq!(params.schema.version, 2);
        assert_eq!(params.collection_name, "humans");
    }

    #[test]
    fn test_rejects_missing_collection() {
        let temp = TempDir::new().unwrap();
        let path = write(&temp, "c.json", r#"{"data_dir": "./data", "collection": ""}"#);
        assert!(matches!(StorageConfig::load(&path), Err(CliError::Config(_))));

        let path = write(&temp, "d.json", r#"{"collection": "x"}"#);
        assert!(StorageConfig::load(&path).is_err());
    }
}
