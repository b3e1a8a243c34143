//! # Document Data
//!
//! Stored form and write form of a collection document.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::attachment::{AttachmentData, AttachmentWrite};
use crate::revision::{Precondition, Revision};

/// Lifecycle state of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    #[default]
    Active,
    /// Deleted but retained so the deletion can replicate
    Tombstoned,
}

impl DocumentState {
    pub fn is_deleted(&self) -> bool {
        matches!(self, Self::Tombstoned)
    }
}

/// Storage-maintained metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub last_write_time: DateTime<Utc>,
}

impl DocumentMeta {
    pub fn now() -> Self {
        Self {
            last_write_time: Utc::now(),
        }
    }
}

/// A committed document version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RxDocumentData {
    pub id: String,
    pub data: Value,
    pub revision: Revision,
    #[serde(default)]
    pub state: DocumentState,
    #[serde(default)]
    pub attachments: BTreeMap<String, AttachmentData>,
    pub meta: DocumentMeta,
}

impl RxDocumentData {
    pub fn is_deleted(&self) -> bool {
        self.state.is_deleted()
    }

    /// Write that updates this version, carrying every attachment as a stub
    pub fn to_write(&self) -> RxDocumentWriteData {
        RxDocumentWriteData {
            id: self.id.clone(),
            data: self.data.clone(),
            state: self.state,
            attachments: self
                .attachments
                .iter()
                .map(|(id, meta)| (id.clone(), AttachmentWrite::Stub(meta.clone())))
                .collect(),
            previous: Precondition::UpdateOf(self.revision.clone()),
        }
    }
}

/// Incoming document write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RxDocumentWriteData {
    pub id: String,
    pub data: Value,
    #[serde(default)]
    pub state: DocumentState,
    #[serde(default)]
    pub attachments: BTreeMap<String, AttachmentWrite>,
    /// Revision the writer believes is current
    #[serde(default, rename = "previous_revision")]
    pub previous: Precondition,
}

impl RxDocumentWriteData {
    /// Insert of a new document
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
            state: DocumentState::Active,
            attachments: BTreeMap::new(),
            previous: Precondition::NewDocument,
        }
    }

    pub fn with_previous(mut self, revision: Revision) -> Self {
        self.previous = Precondition::UpdateOf(revision);
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_attachment(mut self, id: impl Into<String>, write: AttachmentWrite) -> Self {
        self.attachments.insert(id.into(), write);
        self
    }

    pub fn without_attachment(mut self, id: &str) -> Self {
        self.attachments.remove(id);
        self
    }

    pub fn tombstoned(mut self) -> Self {
        self.state = DocumentState::Tombstoned;
        self
    }
}

/// Body hashed into a document revision
pub(crate) fn revision_body(
    data: &Value,
    state: DocumentState,
    attachments: &BTreeMap<String, AttachmentData>,
) -> Value {
    json!({
        "data": data,
        "deleted": state.is_deleted(),
        "attachments": attachments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_builder() {
        let rev = Revision::parse("1-abc").unwrap();
        let write = RxDocumentWriteData::new("a", json!({"x": 1}))
            .with_previous(rev.clone())
            .with_attachment("f", AttachmentWrite::payload("text/plain", b"x".to_vec()))
            .tombstoned();

        assert_eq!(write.previous, Precondition::UpdateOf(rev));
        assert!(write.state.is_deleted());
        assert_eq!(write.attachments.len(), 1);
    }

    #[test]
    fn test_to_write_uses_stubs() {
        let mut attachments = BTreeMap::new();
        attachments.insert(
            "f".to_string(),
            AttachmentData::for_payload("text/plain", b"data"),
        );
        let doc = RxDocumentData {
            id: "a".into(),
            data: json!({"x": 1}),
            revision: Revision::parse("2-abc").unwrap(),
            state: DocumentState::Active,
            attachments,
            meta: DocumentMeta::now(),
        };

        let write = doc.to_write();
        assert!(write.attachments["f"].is_stub());
        assert_eq!(write.previous.revision(), Some(&doc.revision));
    }

    #[test]
    fn test_write_deserializes_with_defaults() {
        let write: RxDocumentWriteData =
            serde_json::from_value(json!({"id": "a", "data": {"n": 1}})).unwrap();
        assert_eq!(write.previous, Precondition::NewDocument);
        assert_eq!(write.state, DocumentState::Active);

        let write: RxDocumentWriteData = serde_json::from_value(
            json!({"id": "a", "data": {}, "previous_revision": "1-new"}),
        )
        .unwrap();
        assert_eq!(write.previous, Precondition::NewDocument);
    }

    #[test]
    fn test_revision_body_reflects_state() {
        let attachments = BTreeMap::new();
        let live = revision_body(&json!({"a": 1}), DocumentState::Active, &attachments);
        let dead = revision_body(&json!({"a": 1}), DocumentState::Tombstoned, &attachments);
        assert_ne!(live, dead);
    }
}
