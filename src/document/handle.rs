//! # Document Handle
//!
//! Explicit `{id, revision, instance}` value for attachment operations on
//! one document. Writes go through the instance against the handle's
//! revision and fail with a revision conflict once it is stale.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::data::RxDocumentData;
use crate::attachment::{AttachmentData, AttachmentPut};
use crate::errors::{StorageError, StorageResult};
use crate::instance::StorageInstance;
use crate::revision::Revision;

/// Handle on one document at a known revision
#[derive(Debug, Clone)]
pub struct DocumentHandle {
    id: String,
    revision: Revision,
    instance: Arc<StorageInstance>,
}

impl DocumentHandle {
    pub(crate) fn new(id: String, revision: Revision, instance: Arc<StorageInstance>) -> Self {
        Self {
            id,
            revision,
            instance,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Revision the handle's writes are made against
    pub fn revision(&self) -> &Revision {
        &self.revision
    }

    pub fn instance(&self) -> &Arc<StorageInstance> {
        &self.instance
    }

    /// Current stored version
    pub fn data(&self) -> StorageResult<RxDocumentData> {
        self.instance.live_document(&self.id)
    }

    /// Move the handle to the current stored revision
    pub fn refresh(&mut self) -> StorageResult<&Revision> {
        self.revision = self.data()?.revision;
        Ok(&self.revision)
    }

    /// Attachment metadata at the handle's revision
    pub fn attachments(&self) -> StorageResult<BTreeMap<String, AttachmentData>> {
        let current = self.data()?;
        self.ensure_current(&current)?;
        Ok(current.attachments)
    }

    pub fn get_attachment(&self, attachment_id: &str) -> StorageResult<Vec<u8>> {
        self.instance.get_attachment(&self.id, attachment_id)
    }

    /// Store an attachment; the handle advances to the new revision
    pub fn put_attachment(&mut self, put: AttachmentPut, skip_if_same: bool) -> StorageResult<AttachmentData> {
        let (document, meta) =
            self.instance
                .put_attachment_at(&self.id, Some(&self.revision), put, skip_if_same)?;
        self.revision = document.revision;
        Ok(meta)
    }

    /// Remove an attachment; the handle advances to the new revision
    pub fn remove_attachment(&mut self, attachment_id: &str) -> StorageResult<()> {
        let document = self
            .instance
            .remove_attachment_at(&self.id, Some(&self.revision), attachment_id)?;
        self.revision = document.revision;
        Ok(())
    }

    fn ensure_current(&self, current: &RxDocumentData) -> StorageResult<()> {
        if current.revision != self.revision {
            return Err(StorageError::RevisionConflict {
                document_id: self.id.clone(),
                reason: format!(
                    "handle revision {} is behind current revision {}",
                    self.revision, current.revision
                ),
            });
        }
        Ok(())
    }
}
