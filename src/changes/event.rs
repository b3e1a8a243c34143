//! # Change Events
//!
//! One event per committed document write.

use serde::{Deserialize, Serialize};

use crate::document::RxDocumentData;
use crate::revision::Revision;

/// Kind of change a committed write represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeOperation {
    Insert,
    Update,
    Delete,
}

impl ChangeOperation {
    /// Classify a write from the version it replaced and the new state.
    ///
    /// Reviving a tombstone counts as an insert.
    pub fn classify(previous: Option<&RxDocumentData>, document: &RxDocumentData) -> Self {
        if document.is_deleted() {
            Self::Delete
        } else if previous.map(|p| p.is_deleted()).unwrap_or(true) {
            Self::Insert
        } else {
            Self::Update
        }
    }
}

/// A sequenced change of one collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Position in the collection's change log, starting at 1
    pub sequence: u64,
    /// Document id
    pub id: String,
    /// Collection name
    pub collection: String,
    pub operation: ChangeOperation,
    /// Committed version
    pub document_data: RxDocumentData,
    /// Version this write replaced
    pub previous_document_data: Option<RxDocumentData>,
}

impl ChangeEvent {
    pub fn new(
        sequence: u64,
        collection: impl Into<String>,
        document_data: RxDocumentData,
        previous_document_data: Option<RxDocumentData>,
    ) -> Self {
        Self {
            sequence,
            id: document_data.id.clone(),
            collection: collection.into(),
            operation: ChangeOperation::classify(previous_document_data.as_ref(), &document_data),
            document_data,
            previous_document_data,
        }
    }

    /// Revision the event committed
    pub fn revision(&self) -> &Revision {
        &self.document_data.revision
    }
}
