//! Precondition check shared by document and local writes.

use crate::revision::{Precondition, Revision};

/// How a write whose precondition holds applies to the stored state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Insert,
    Update,
}

/// Check a write's precondition against the stored current revision.
///
/// Returns the conflict reason when it does not hold. A stored revision
/// of a tombstoned document still counts as existing.
pub fn check_precondition(
    previous: &Precondition,
    stored: Option<&Revision>,
) -> Result<WriteKind, String> {
    match (previous, stored) {
        (Precondition::NewDocument, None) => Ok(WriteKind::Insert),
        (Precondition::NewDocument, Some(current)) => Err(format!(
            "document already exists at revision {}",
            current
        )),
        (Precondition::UpdateOf(expected), None) => Err(format!(
            "previous revision {} given for a document that does not exist",
            expected
        )),
        (Precondition::UpdateOf(expected), Some(current)) if expected == current => {
            Ok(WriteKind::Update)
        }
        (Precondition::UpdateOf(expected), Some(current)) => Err(format!(
            "previous revision {} does not match current revision {}",
            expected, current
        )),
    }
}
