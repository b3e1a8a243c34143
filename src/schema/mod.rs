//! # Schema
//!
//! Collection schema and document body validation.
//!
//! Validation runs before any write of a batch touches storage. Local
//! documents are never validated.

mod errors;
mod types;
mod validator;

pub use errors::{SchemaError, SchemaResult};
pub use types::{FieldDef, FieldType, RxJsonSchema};
pub use validator::SchemaValidator;
