//! # Local Documents
//!
//! Per-instance documents that never replicate. They carry revisions and
//! conflict detection but are not sequenced, not schema-checked and carry
//! no attachments.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::data::{DocumentMeta, DocumentState};
use crate::revision::{Precondition, Revision};

/// A committed local document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalDocumentData {
    pub id: String,
    pub data: Value,
    pub revision: Revision,
    #[serde(default)]
    pub state: DocumentState,
    pub meta: DocumentMeta,
}

impl LocalDocumentData {
    pub fn is_deleted(&self) -> bool {
        self.state.is_deleted()
    }
}

/// Incoming local document write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalDocumentWriteData {
    pub id: String,
    pub data: Value,
    #[serde(default)]
    pub state: DocumentState,
    #[serde(default, rename = "previous_revision")]
    pub previous: Precondition,
}

impl LocalDocumentWriteData {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
            state: DocumentState::Active,
            previous: Precondition::NewDocument,
        }
    }

    pub fn with_previous(mut self, revision: Revision) -> Self {
        self.previous = Precondition::UpdateOf(revision);
        self
    }

    pub fn tombstoned(mut self) -> Self {
        self.state = DocumentState::Tombstoned;
        self
    }
}

pub(crate) fn local_revision_body(data: &Value, state: DocumentState) -> Value {
    json!({
        "data": data,
        "deleted": state.is_deleted(),
    })
}
