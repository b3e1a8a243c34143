//! Query executor
//!
//! Filter, sort, skip, limit over a snapshot of current documents.
//! Tombstoned documents never match.

use serde::Serialize;

use super::ast::PreparedQuery;
use super::filters::PredicateFilter;
use super::sorter::ResultSorter;
use crate::document::RxDocumentData;

/// Query result
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub documents: Vec<RxDocumentData>,
    /// Documents that matched before skip/limit
    pub matched: usize,
    /// Documents examined
    pub scanned: usize,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.documents.iter().map(|d| d.id.as_str()).collect()
    }
}

/// Stateless query executor
pub struct QueryExecutor;

impl QueryExecutor {
    pub fn execute(query: &PreparedQuery, documents: Vec<RxDocumentData>) -> QueryResult {
        let scanned = documents.len();
        let mut matched: Vec<RxDocumentData> = documents
            .into_iter()
            .filter(|d| !d.is_deleted() && PredicateFilter::matches(d, &query.selector))
            .collect();
        let matched_count = matched.len();

        ResultSorter::sort(&mut matched, &query.sort);

        let documents = matched
            .into_iter()
            .skip(query.skip)
            .take(query.limit.unwrap_or(usize::MAX))
            .collect();

        QueryResult {
            documents,
            matched: matched_count,
            scanned,
        }
    }

    /// Number of live documents matching the selector. Skip, limit and sort are ignored.
    pub fn count(query: &PreparedQuery, documents: &[RxDocumentData]) -> usize {
        documents
            .iter()
            .filter(|d| !d.is_deleted() && PredicateFilter::matches(d, &query.selector))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentMeta, DocumentState};
    use crate::query::{Predicate, SortSpec};
    use crate::revision::Revision;
    use serde_json::{json, Value};
    use std::collections::BTreeMap;

    fn make_doc(id: &str, data: Value, state: DocumentState) -> RxDocumentData {
        RxDocumentData {
            id: id.to_string(),
            data,
            revision: Revision::parse("1-a").unwrap(),
            state,
            attachments: BTreeMap::new(),
            meta: DocumentMeta::now(),
        }
    }

    fn corpus() -> Vec<RxDocumentData> {
        (1..=6)
            .map(|i| {
                let state = if i == 3 {
                    DocumentState::Tombstoned
                } else {
                    DocumentState::Active
                };
                make_doc(&format!("doc{}", i), json!({"n": i, "even": i % 2 == 0}), state)
            })
            .collect()
    }

    #[test]
    fn test_tombstones_excluded() {
        let result = QueryExecutor::execute(&PreparedQuery::all(), corpus());
        assert_eq!(result.len(), 5);
        assert_eq!(result.scanned, 6);
        assert!(!result.ids().contains(&"doc3"));
    }

    #[test]
    fn test_filter_sort_skip_limit() {
        let query = PreparedQuery::all()
            .with_predicate(Predicate::gte("n", json!(2)))
            .with_sort(SortSpec::desc("n"))
            .with_skip(1)
            .with_limit(2);

        let result = QueryExecutor::execute(&query, corpus());
        assert_eq!(result.ids(), vec!["doc5", "doc4"]);
        assert_eq!(result.matched, 4);
    }

    #[test]
    fn test_count_ignores_paging() {
        let docs = corpus();
        let query = PreparedQuery::all().filter_eq("even", json!(true)).with_limit(1);
        assert_eq!(QueryExecutor::count(&query, &docs), 3);
    }
}
