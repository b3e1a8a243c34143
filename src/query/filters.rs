//! Predicate filtering
//!
//! No type coercion. Missing and null fields never match, except for
//! `ne`, which matches anything not equal to its operand.

use std::borrow::Cow;
use std::cmp::Ordering;

use serde_json::Value;

use super::ast::{FilterOp, Predicate, PRIMARY_KEY_FIELD};
use crate::document::RxDocumentData;

/// Resolve a dotted field path against a document
pub(crate) fn field_value<'a>(document: &'a RxDocumentData, path: &str) -> Option<Cow<'a, Value>> {
    if path == PRIMARY_KEY_FIELD {
        return Some(Cow::Owned(Value::String(document.id.clone())));
    }

    let mut current = &document.data;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(Cow::Borrowed(current))
}

/// Evaluates predicates against documents
pub struct PredicateFilter;

impl PredicateFilter {
    /// Checks if a document matches all predicates
    pub fn matches(document: &RxDocumentData, predicates: &[Predicate]) -> bool {
        predicates
            .iter()
            .all(|pred| Self::matches_predicate(document, pred))
    }

    fn matches_predicate(document: &RxDocumentData, predicate: &Predicate) -> bool {
        let field_value = field_value(document, &predicate.field).filter(|v| !v.is_null());

        let actual = match (&predicate.op, field_value) {
            (FilterOp::Ne(_), None) => return true,
            (_, None) => return false,
            (_, Some(v)) => v,
        };
        let actual: &Value = &actual;

        match &predicate.op {
            FilterOp::Eq(expected) => actual == expected,
            FilterOp::Ne(expected) => actual != expected,
            FilterOp::Gt(bound) => compare(actual, bound) == Some(Ordering::Greater),
            FilterOp::Gte(bound) => matches!(
                compare(actual, bound),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOp::Lt(bound) => compare(actual, bound) == Some(Ordering::Less),
            FilterOp::Lte(bound) => matches!(
                compare(actual, bound),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FilterOp::In(values) => values.iter().any(|v| v == actual),
        }
    }
}

/// Range comparison. Numbers with numbers, strings with strings; anything
/// else is incomparable.
fn compare(actual: &Value, bound: &Value) -> Option<Ordering> {
    match (actual, bound) {
        (Value::Number(a), Value::Number(b)) => {
            if let (Some(ai), Some(bi)) = (a.as_i64(), b.as_i64()) {
                return Some(ai.cmp(&bi));
            }
            a.as_f64()?.partial_cmp(&b.as_f64()?)
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
