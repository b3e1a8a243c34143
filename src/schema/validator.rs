//! Schema validator
//!
//! Validation semantics:
//! - Document body is an object
//! - All required fields are present
//! - No undeclared top-level fields unless the schema allows them
//! - Nested objects never carry undeclared fields
//! - Field types exactly match, without coercion
//! - Declared fields are never null

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::errors::{SchemaError, SchemaResult};
use super::types::{FieldDef, FieldType, RxJsonSchema};

/// Validates document bodies against one schema.
///
/// Deterministic and non-mutating.
pub struct SchemaValidator<'a> {
    schema: &'a RxJsonSchema,
}

impl<'a> SchemaValidator<'a> {
    pub fn new(schema: &'a RxJsonSchema) -> Self {
        Self { schema }
    }

    /// Validate a document body
    pub fn validate(&self, document: &Value) -> SchemaResult<()> {
        let obj = document
            .as_object()
            .ok_or_else(|| SchemaError::NotAnObject(json_type_name(document)))?;
        self.validate_object(obj, &self.schema.fields, "", self.schema.additional_properties)
    }

    /// Reject attachments when the schema does not allow them
    pub fn validate_attachments(&self, has_attachments: bool) -> SchemaResult<()> {
        if has_attachments && !self.schema.attachments {
            return Err(SchemaError::AttachmentsNotAllowed);
        }
        Ok(())
    }

    fn validate_object(
        &self,
        obj: &Map<String, Value>,
        fields: &BTreeMap<String, FieldDef>,
        path_prefix: &str,
        allow_extra: bool,
    ) -> SchemaResult<()> {
        if !allow_extra {
            if let Some(key) = obj.keys().find(|k| !fields.contains_key(*k)) {
                return Err(SchemaError::ExtraField(make_path(path_prefix, key)));
            }
        }

        for (field_name, field_def) in fields {
            let field_path = make_path(path_prefix, field_name);

            match obj.get(field_name) {
                Some(Value::Null) => return Err(SchemaError::NullValue(field_path)),
                Some(value) => self.validate_value(value, &field_def.field_type, &field_path)?,
                None if field_def.required => return Err(SchemaError::MissingField(field_path)),
                None => {}
            }
        }

        Ok(())
    }

    fn validate_value(&self, value: &Value, expected: &FieldType, field_path: &str) -> SchemaResult<()> {
        match expected {
            FieldType::String => {
                if !value.is_string() {
                    return Err(type_error(field_path, "string", value));
                }
            }
            FieldType::Int => {
                // Must be an integer (not a float)
                if !value.is_i64() && !value.is_u64() {
                    return Err(type_error(field_path, "int", value));
                }
            }
            FieldType::Bool => {
                if !value.is_boolean() {
                    return Err(type_error(field_path, "bool", value));
                }
            }
            FieldType::Float => {
                // Accept both integers and floats as float
                if !value.is_number() {
                    return Err(type_error(field_path, "float", value));
                }
            }
            FieldType::Object { fields } => {
                let obj = value
                    .as_object()
                    .ok_or_else(|| type_error(field_path, "object", value))?;
                self.validate_object(obj, fields, field_path, false)?;
            }
            FieldType::Array { element_type } => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| type_error(field_path, "array", value))?;

                for (i, elem) in arr.iter().enumerate() {
                    let elem_path = format!("{}[{}]", field_path, i);
                    if elem.is_null() {
                        return Err(SchemaError::NullValue(elem_path));
                    }
                    self.validate_value(elem, element_type, &elem_path)?;
                }
            }
        }

        Ok(())
    }
}

/// Returns the JSON type name for error messages.
fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                "int"
            } else {
                "float"
            }
        }
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Creates a field path from prefix and field name.
fn make_path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", prefix, field)
    }
}

fn type_error(field_path: &str, expected: &'static str, actual: &Value) -> SchemaError {
    SchemaError::TypeMismatch {
        path: field_path.to_string(),
        expected,
        actual: json_type_name(actual),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user_schema() -> RxJsonSchema {
        let mut address = BTreeMap::new();
        address.insert("city".to_string(), FieldDef::required_string());

        RxJsonSchema::new(0, BTreeMap::new())
            .with_field("name", FieldDef::required_string())
            .with_field("age", FieldDef::optional_int())
            .with_field("active", FieldDef::required_bool())
            .with_field("score", FieldDef::optional_float())
            .with_field("tags", FieldDef::optional_array(FieldType::String))
            .with_field("address", FieldDef::optional_object(address))
    }

    #[test]
    fn test_valid_document() {
        let schema = user_schema();
        let validator = SchemaValidator::new(&schema);
        let doc = json!({
            "name": "Alice",
            "age": 30,
            "active": true,
            "score": 1,
            "tags": ["a", "b"],
            "address": {"city": "Oslo"}
        });
        assert!(validator.validate(&doc).is_ok());
    }

    #[test]
    fn test_missing_required() {
        let schema = user_schema();
        let err = SchemaValidator::new(&schema)
            .validate(&json!({"name": "Alice"}))
            .unwrap_err();
        assert_eq!(err, SchemaError::MissingField("active".into()));
    }

    #[test]
    fn test_extra_field_rejected_unless_allowed() {
        let schema = user_schema();
        let doc = json!({"name": "A", "active": true, "nickname": "a"});
        assert_eq!(
            SchemaValidator::new(&schema).validate(&doc).unwrap_err(),
            SchemaError::ExtraField("nickname".into())
        );

        let open = user_schema().with_additional_properties();
        assert!(SchemaValidator::new(&open).validate(&doc).is_ok());
    }

    #[test]
    fn test_no_coercion() {
        let schema = user_schema();
        let err = SchemaValidator::new(&schema)
            .validate(&json!({"name": "A", "active": true, "age": 1.5}))
            .unwrap_err();
        assert_eq!(err.path(), Some("age"));

        let err = SchemaValidator::new(&schema)
            .validate(&json!({"name": "A", "active": "true"}))
            .unwrap_err();
        assert!(matches!(err, SchemaError::TypeMismatch { expected: "bool", .. }));
    }

    #[test]
    fn test_nested_paths() {
        let schema = user_schema();
        let validator = SchemaValidator::new(&schema);

        let err = validator
            .validate(&json!({"name": "A", "active": true, "address": {}}))
            .unwrap_err();
        assert_eq!(err, SchemaError::MissingField("address.city".into()));

        let err = validator
            .validate(&json!({"name": "A", "active": true, "tags": ["x", 1]}))
            .unwrap_err();
        assert_eq!(err.path(), Some("tags[1]"));
    }

    #[test]
    fn test_null_and_non_object() {
        let schema = user_schema();
        let validator = SchemaValidator::new(&schema);
        assert_eq!(
            validator.validate(&json!({"name": null, "active": true})).unwrap_err(),
            SchemaError::NullValue("name".into())
        );
        assert_eq!(
            validator.validate(&json!([1])).unwrap_err(),
            SchemaError::NotAnObject("array")
        );
    }

    #[test]
    fn test_attachments_policy() {
        let schema = user_schema();
        assert_eq!(
            SchemaValidator::new(&schema).validate_attachments(true),
            Err(SchemaError::AttachmentsNotAllowed)
        );
        assert!(SchemaValidator::new(&schema).validate_attachments(false).is_ok());

        let with = user_schema().with_attachments();
        assert!(SchemaValidator::new(&with).validate_attachments(true).is_ok());
    }
}
