//! Prepared query structures
//!
//! A query is a conjunction of predicates over dotted field paths, an
//! ordered list of sort keys, and skip/limit. The field `id` addresses
//! the document primary key.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field path that resolves to the primary key
pub const PRIMARY_KEY_FIELD: &str = "id";

/// Filter operation types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    /// Equality: field = value
    Eq(Value),
    /// Inequality: field != value (absent fields match)
    Ne(Value),
    /// Greater than: field > value
    Gt(Value),
    /// Greater than or equal: field >= value
    Gte(Value),
    /// Less than: field < value
    Lt(Value),
    /// Less than or equal: field <= value
    Lte(Value),
    /// Membership: field equals one of the values
    In(Vec<Value>),
}

impl FilterOp {
    /// Returns the operation name
    pub fn op_name(&self) -> &'static str {
        match self {
            FilterOp::Eq(_) => "eq",
            FilterOp::Ne(_) => "ne",
            FilterOp::Gt(_) => "gt",
            FilterOp::Gte(_) => "gte",
            FilterOp::Lt(_) => "lt",
            FilterOp::Lte(_) => "lte",
            FilterOp::In(_) => "in",
        }
    }

    pub fn is_range(&self) -> bool {
        matches!(self, FilterOp::Gt(_) | FilterOp::Gte(_) | FilterOp::Lt(_) | FilterOp::Lte(_))
    }
}

/// A single predicate (field + operation)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    /// Dotted field path
    pub field: String,
    pub op: FilterOp,
}

impl Predicate {
    pub fn new(field: impl Into<String>, op: FilterOp) -> Self {
        Self {
            field: field.into(),
            op,
        }
    }

    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOp::Eq(value))
    }

    pub fn ne(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOp::Ne(value))
    }

    pub fn gt(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOp::Gt(value))
    }

    pub fn gte(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOp::Gte(value))
    }

    pub fn lt(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOp::Lt(value))
    }

    pub fn lte(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOp::Lte(value))
    }

    pub fn is_in(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::new(field, FilterOp::In(values))
    }

    /// Returns true if this is an equality predicate on the primary key
    pub fn is_primary_key(&self) -> bool {
        self.field == PRIMARY_KEY_FIELD && matches!(self.op, FilterOp::Eq(_))
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Sort specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Query ready for execution against one collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreparedQuery {
    /// Predicates, combined with AND
    #[serde(default)]
    pub selector: Vec<Predicate>,
    /// Sort keys in priority order. Ties fall back to the primary key.
    #[serde(default)]
    pub sort: Vec<SortSpec>,
    #[serde(default)]
    pub skip: usize,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl PreparedQuery {
    /// Query matching every live document
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.selector.push(predicate);
        self
    }

    pub fn filter_eq(self, field: impl Into<String>, value: Value) -> Self {
        self.with_predicate(Predicate::eq(field, value))
    }

    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder() {
        let query = PreparedQuery::all()
            .filter_eq("status", json!("open"))
            .with_predicate(Predicate::gte("age", json!(18)))
            .with_sort(SortSpec::desc("age"))
            .with_skip(5)
            .with_limit(10);

        assert_eq!(query.selector.len(), 2);
        assert!(query.selector[1].op.is_range());
        assert_eq!(query.sort[0].direction, SortDirection::Desc);
        assert_eq!(query.limit, Some(10));
    }

    #[test]
    fn test_json_shape() {
        let query: PreparedQuery = serde_json::from_value(json!({
            "selector": [
                {"field": "age", "op": {"gte": 18}},
                {"field": "id", "op": {"eq": "a"}},
                {"field": "tag", "op": {"in": ["x", "y"]}}
            ],
            "sort": [{"field": "age"}],
            "limit": 3
        }))
        .unwrap();

        assert_eq!(query.selector[0], Predicate::gte("age", json!(18)));
        assert!(query.selector[1].is_primary_key());
        assert_eq!(query.selector[2].op.op_name(), "in");
        assert_eq!(query.sort[0], SortSpec::asc("age"));
        assert_eq!(query.skip, 0);
    }
}
