//! Revision history - ordered lineage of one document
//!
//! Adapted from the version chain model: every document owns exactly one
//! linear chain, oldest first. Each appended revision must sit exactly one
//! height above the current head.

use serde::{Deserialize, Serialize};

use super::errors::{RevisionError, RevisionResult};
use super::revision::Revision;

/// Linear lineage of a document's revisions, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionHistory {
    document_id: String,
    revisions: Vec<Revision>,
}

impl RevisionHistory {
    /// Create an empty history
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            revisions: Vec::new(),
        }
    }

    /// Document id this lineage belongs to
    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    /// Append a revision. It must extend the current head by exactly one.
    pub fn push(&mut self, revision: Revision) -> RevisionResult<()> {
        let expected = self.revisions.last().map(|r| r.height() + 1).unwrap_or(1);
        if revision.height() != expected {
            return Err(RevisionError::NonMonotonic {
                attempted: revision.to_string(),
                head: self
                    .current()
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "<none>".to_string()),
            });
        }
        self.revisions.push(revision);
        Ok(())
    }

    /// Current (latest) revision
    pub fn current(&self) -> Option<&Revision> {
        self.revisions.last()
    }

    /// All revisions, oldest first
    pub fn revisions(&self) -> &[Revision] {
        &self.revisions
    }

    pub fn len(&self) -> usize {
        self.revisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }

    pub fn contains(&self, revision: &Revision) -> bool {
        self.position(revision).is_some()
    }

    /// Revision this one was derived from
    pub fn parent_of(&self, revision: &Revision) -> Option<&Revision> {
        match self.position(revision) {
            Some(idx) if idx > 0 => self.revisions.get(idx - 1),
            _ => None,
        }
    }

    /// True iff `candidate` appears strictly after `ancestor` in this lineage.
    ///
    /// Revisions unknown to this history are never descendants.
    pub fn is_descendant(&self, candidate: &Revision, ancestor: &Revision) -> bool {
        match (self.position(candidate), self.position(ancestor)) {
            (Some(c), Some(a)) => c > a,
            _ => false,
        }
    }

    fn position(&self, revision: &Revision) -> Option<usize> {
        // Heights are dense from 1, so the index is known up front
        let idx = usize::try_from(revision.height()).ok()?.checked_sub(1)?;
        match self.revisions.get(idx) {
            Some(r) if r == revision => Some(idx),
            _ => None,
        }
    }
}
