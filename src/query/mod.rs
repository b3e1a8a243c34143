//! # Query
//!
//! Prepared queries over a collection's current, non-deleted documents.

mod ast;
mod executor;
mod filters;
mod sorter;

pub use ast::{FilterOp, PreparedQuery, Predicate, SortDirection, SortSpec, PRIMARY_KEY_FIELD};
pub use executor::{QueryExecutor, QueryResult};
pub use filters::PredicateFilter;
pub use sorter::ResultSorter;
