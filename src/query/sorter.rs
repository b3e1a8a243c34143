//! Result sorting
//!
//! Multi-key, stable, and fully deterministic: ties on every sort key
//! are broken by primary key.

use std::cmp::Ordering;

use serde_json::Value;

use super::ast::{SortDirection, SortSpec};
use super::filters::field_value;
use crate::document::RxDocumentData;

/// Sorts result documents
pub struct ResultSorter;

impl ResultSorter {
    pub fn sort(documents: &mut [RxDocumentData], sort: &[SortSpec]) {
        documents.sort_by(|a, b| {
            sort.iter()
                .map(|spec| {
                    let ordering = compare_values(
                        field_value(a, &spec.field).as_deref(),
                        field_value(b, &spec.field).as_deref(),
                    );
                    match spec.direction {
                        SortDirection::Asc => ordering,
                        SortDirection::Desc => ordering.reverse(),
                    }
                })
                .find(|o| o.is_ne())
                .unwrap_or_else(|| a.id.cmp(&b.id))
        });
    }
}

/// Compares two JSON values for sorting.
///
/// Ordering rules:
/// - missing < null < bool < number < string < array < object
/// - For same scalar types, natural ordering
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a_val), Some(b_val)) => {
            let type_order = |v: &Value| -> u8 {
                match v {
                    Value::Null => 0,
                    Value::Bool(_) => 1,
                    Value::Number(_) => 2,
                    Value::String(_) => 3,
                    Value::Array(_) => 4,
                    Value::Object(_) => 5,
                }
            };

            let a_type = type_order(a_val);
            let b_type = type_order(b_val);
            if a_type != b_type {
                return a_type.cmp(&b_type);
            }

            match (a_val, b_val) {
                (Value::Bool(a_b), Value::Bool(b_b)) => a_b.cmp(b_b),
                (Value::Number(a_n), Value::Number(b_n)) => {
                    let a_f = a_n.as_f64().unwrap_or(0.0);
                    let b_f = b_n.as_f64().unwrap_or(0.0);
                    a_f.partial_cmp(&b_f).unwrap_or(Ordering::Equal)
                }
                (Value::String(a_s), Value::String(b_s)) => a_s.cmp(b_s),
                // Arrays and objects not compared
                _ => Ordering::Equal,
            }
        }
    }
}
