//! Revision manager - derives and compares revisions
//!
//! The hash of a new revision is the SHA-256 (lowercase hex) of:
//! - the parent revision string (empty for a first revision)
//! - a newline
//! - the compact JSON encoding of the revision body
//!
//! `serde_json` object maps are key-sorted, so the encoding is canonical
//! and equal content under the same parent always yields the same hash.

use std::cmp::Ordering;

use serde_json::Value;
use sha2::{Digest, Sha256};

use super::errors::{RevisionError, RevisionResult};
use super::history::RevisionHistory;
use super::revision::Revision;

/// Stateless revision derivation and comparison
pub struct RevisionManager;

impl RevisionManager {
    /// Derive the revision that follows `parent` for the given body.
    ///
    /// Height is parent height + 1, or 1 when there is no parent.
    pub fn next(parent: Option<&Revision>, body: &Value) -> RevisionResult<Revision> {
        let height = match parent {
            None => 1,
            Some(p) => p
                .height()
                .checked_add(1)
                .ok_or(RevisionError::HeightOverflow(p.height()))?,
        };
        Ok(Revision::from_parts_unchecked(
            height,
            Self::content_hash(parent, body),
        ))
    }

    /// Content hash for a body under a parent
    pub fn content_hash(parent: Option<&Revision>, body: &Value) -> String {
        let mut hasher = Sha256::new();
        if let Some(p) = parent {
            hasher.update(p.to_string().as_bytes());
        }
        hasher.update(b"\n");
        hasher.update(body.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Total order over revisions: height, then hash
    pub fn compare(a: &Revision, b: &Revision) -> Ordering {
        a.cmp(b)
    }

    /// Deterministic winner between two revisions of the same document
    pub fn winner<'a>(a: &'a Revision, b: &'a Revision) -> &'a Revision {
        match Self::compare(a, b) {
            Ordering::Less => b,
            _ => a,
        }
    }

    /// True iff `candidate` descends from `ancestor` in the given lineage
    pub fn is_descendant(
        history: &RevisionHistory,
        candidate: &Revision,
        ancestor: &Revision,
    ) -> bool {
        history.is_descendant(candidate, ancestor)
    }
}
