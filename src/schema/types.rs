//! Schema type definitions
//!
//! Supported types:
//! - string: UTF-8 string
//! - int: 64-bit signed integer
//! - bool: Boolean
//! - float: 64-bit floating point
//! - object: Nested object with field schema
//! - array: Homogeneous array with element type

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::errors::{SchemaError, SchemaResult};

/// Supported field types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldType {
    String,
    Int,
    Bool,
    Float,
    Object {
        fields: BTreeMap<String, FieldDef>,
    },
    Array {
        element_type: Box<FieldType>,
    },
}

impl FieldType {
    /// Returns the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Int => "int",
            FieldType::Bool => "bool",
            FieldType::Float => "float",
            FieldType::Object { .. } => "object",
            FieldType::Array { .. } => "array",
        }
    }
}

/// Field definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    #[serde(flatten)]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
}

impl FieldDef {
    pub fn required(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: true,
        }
    }

    pub fn optional(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: false,
        }
    }

    pub fn required_string() -> Self {
        Self::required(FieldType::String)
    }

    pub fn optional_string() -> Self {
        Self::optional(FieldType::String)
    }

    pub fn required_int() -> Self {
        Self::required(FieldType::Int)
    }

    pub fn optional_int() -> Self {
        Self::optional(FieldType::Int)
    }

    pub fn required_bool() -> Self {
        Self::required(FieldType::Bool)
    }

    pub fn optional_float() -> Self {
        Self::optional(FieldType::Float)
    }

    pub fn optional_object(fields: BTreeMap<String, FieldDef>) -> Self {
        Self::optional(FieldType::Object { fields })
    }

    pub fn optional_array(element_type: FieldType) -> Self {
        Self::optional(FieldType::Array {
            element_type: Box::new(element_type),
        })
    }
}

/// Collection schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RxJsonSchema {
    /// Schema version; bumped when documents need migration
    #[serde(default)]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldDef>,
    /// Whether documents may carry attachments
    #[serde(default)]
    pub attachments: bool,
    /// Whether top-level fields not listed in `fields` are accepted
    #[serde(default)]
    pub additional_properties: bool,
}

impl RxJsonSchema {
    pub fn new(version: u32, fields: BTreeMap<String, FieldDef>) -> Self {
        Self {
            version,
            description: None,
            fields,
            attachments: false,
            additional_properties: false,
        }
    }

    /// Accepts any object body and attachments
    pub fn permissive() -> Self {
        Self {
            version: 0,
            description: None,
            fields: BTreeMap::new(),
            attachments: true,
            additional_properties: true,
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, def: FieldDef) -> Self {
        self.fields.insert(name.into(), def);
        self
    }

    pub fn with_attachments(mut self) -> Self {
        self.attachments = true;
        self
    }

    pub fn with_additional_properties(mut self) -> Self {
        self.additional_properties = true;
        self
    }

    /// Load and check a schema from a JSON file
    pub fn from_file(path: &Path) -> SchemaResult<Self> {
        let name = path.display().to_string();
        let content = fs::read_to_string(path)
            .map_err(|e| SchemaError::malformed(&name, format!("Failed to read file: {}", e)))?;
        let schema: Self = serde_json::from_str(&content)
            .map_err(|e| SchemaError::malformed(&name, format!("Invalid JSON: {}", e)))?;
        schema.validate_structure().map_err(|reason| SchemaError::malformed(&name, reason))?;
        Ok(schema)
    }

    /// Validates the schema structure itself (not a document)
    pub fn validate_structure(&self) -> Result<(), String> {
        fn check(fields: &BTreeMap<String, FieldDef>, prefix: &str) -> Result<(), String> {
            for (name, def) in fields {
                if name.is_empty() || name.contains('.') {
                    return Err(format!("Invalid field name '{}{}'", prefix, name));
                }
                if let FieldType::Object { fields } = &def.field_type {
                    check(fields, &format!("{}{}.", prefix, name))?;
                }
            }
            Ok(())
        }
        check(&self.fields, "")
    }
}
