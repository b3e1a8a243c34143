//! # Bulk Write Coordinator
//!
//! Per-document write state machine:
//!
//! 1. Check the precondition against the stored current revision (409 on mismatch)
//! 2. Check attachment stubs against stored metadata (400 on mismatch)
//! 3. Resolve attachments and derive the new revision
//! 4. Write new attachment blobs
//! 5. Sequence and commit the document with its change event
//! 6. Delete blobs the new revision no longer references
//!
//! Documents of one batch are independent. Per-document failures land in
//! the response; only structural failures are raised out of the call.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info};

use super::locks::DocumentLocks;
use super::precondition::check_precondition;
use super::response::{
    BulkWriteError, LocalBulkWriteError, LocalBulkWriteResponse, RxBulkWriteError,
    RxBulkWriteResponse, STATUS_CONFLICT, STATUS_INVALID,
};
use crate::attachment::AttachmentStore;
use crate::backend::DocumentBackend;
use crate::changes::{ChangeEvent, ChangeSequencer};
use crate::document::{
    local_revision_body, revision_body, DocumentMeta, LocalDocumentData, LocalDocumentWriteData,
    RxDocumentData, RxDocumentWriteData,
};
use crate::errors::{StorageError, StorageResult};
use crate::observability::StorageMetrics;
use crate::revision::RevisionManager;
use crate::schema::{RxJsonSchema, SchemaValidator};

/// Applies bulk writes to one collection
#[derive(Debug)]
pub struct BulkWriteCoordinator {
    collection: String,
    backend: Arc<dyn DocumentBackend>,
    attachments: AttachmentStore,
    sequencer: Arc<ChangeSequencer>,
    metrics: Arc<StorageMetrics>,
    /// None when schema validation is disabled
    schema: Option<RxJsonSchema>,
    locks: DocumentLocks,
    local_locks: DocumentLocks,
}

impl BulkWriteCoordinator {
    pub fn new(
        collection: impl Into<String>,
        backend: Arc<dyn DocumentBackend>,
        attachments: AttachmentStore,
        sequencer: Arc<ChangeSequencer>,
        metrics: Arc<StorageMetrics>,
        schema: Option<RxJsonSchema>,
    ) -> Self {
        Self {
            collection: collection.into(),
            backend,
            attachments,
            sequencer,
            metrics,
            schema,
            locks: DocumentLocks::new(),
            local_locks: DocumentLocks::new(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Apply a batch of document writes.
    ///
    /// The whole batch is validated before any document is applied. Fails
    /// outright on duplicate ids, malformed bodies, schema violations and
    /// backend failures; a backend failure midway leaves the documents
    /// applied before it committed.
    pub fn bulk_write(
        &self,
        writes: Vec<RxDocumentWriteData>,
        skip_if_same: bool,
    ) -> StorageResult<RxBulkWriteResponse> {
        self.validate_batch(&writes)?;

        let mut response = RxBulkWriteResponse::new();
        for write in writes {
            match self.write_one(write, skip_if_same)? {
                Ok(document) => {
                    response.success.insert(document.id.clone(), document);
                }
                Err(error) => {
                    response.error.insert(error.document_id.clone(), error);
                }
            }
        }

        if !response.error.is_empty() {
            info!(
                target: "rxstorage::bulk",
                collection = %self.collection,
                succeeded = response.success.len(),
                failed = response.error.len(),
                "bulk write partially rejected"
            );
        }
        Ok(response)
    }

    /// Apply a batch of local document writes
    pub fn bulk_write_local(
        &self,
        writes: Vec<LocalDocumentWriteData>,
    ) -> StorageResult<LocalBulkWriteResponse> {
        let mut seen = HashSet::new();
        for write in &writes {
            check_id(&write.id, &mut seen)?;
            if !write.data.is_object() {
                return Err(StorageError::invalid_request(format!(
                    "Local document {} body must be a JSON object",
                    write.id
                )));
            }
        }

        let mut response = LocalBulkWriteResponse::new();
        for write in writes {
            match self.write_local_one(write)? {
                Ok(document) => {
                    response.success.insert(document.id.clone(), document);
                }
                Err(error) => {
                    response.error.insert(error.document_id.clone(), error);
                }
            }
        }
        Ok(response)
    }

    fn validate_batch(&self, writes: &[RxDocumentWriteData]) -> StorageResult<()> {
        let mut seen = HashSet::new();
        for write in writes {
            check_id(&write.id, &mut seen)?;
            if !write.data.is_object() {
                return Err(StorageError::invalid_request(format!(
                    "Document {} body must be a JSON object",
                    write.id
                )));
            }

            if let Some(schema) = &self.schema {
                let validator = SchemaValidator::new(schema);
                let schema_error = |source| StorageError::Schema {
                    document_id: write.id.clone(),
                    source,
                };
                validator
                    .validate_attachments(!write.attachments.is_empty())
                    .map_err(schema_error)?;
                // Tombstones keep whatever body they carry
                if !write.state.is_deleted() {
                    validator.validate(&write.data).map_err(schema_error)?;
                }
            }
        }
        Ok(())
    }

    /// Apply one write under its document lock.
    ///
    /// The outer result carries call-level failures, the inner one the
    /// per-document outcome.
    fn write_one(
        &self,
        write: RxDocumentWriteData,
        skip_if_same: bool,
    ) -> StorageResult<Result<RxDocumentData, RxBulkWriteError>> {
        let _guard = self.locks.lock(&write.id);
        let stored = self.backend.get(&write.id)?;

        if let Err(reason) = check_precondition(&write.previous, stored.as_ref().map(|d| &d.revision)) {
            self.metrics.increment_conflicts();
            debug!(target: "rxstorage::bulk", document_id = %write.id, %reason, "revision conflict");
            return Ok(Err(rejected(STATUS_CONFLICT, write, stored, reason)));
        }

        let empty = BTreeMap::new();
        let prior = stored.as_ref().map_or(&empty, |d| &d.attachments);
        if let Err(e) = AttachmentStore::check_stubs(prior, &write.attachments) {
            self.metrics.increment_invalid_writes();
            return Ok(Err(rejected(STATUS_INVALID, write, stored, e.to_string())));
        }

        let plan = self
            .attachments
            .plan(&write.id, prior, &write.attachments, skip_if_same);

        let body = revision_body(&write.data, write.state, plan.resolved());
        let revision = RevisionManager::next(stored.as_ref().map(|d| &d.revision), &body)?;

        if let Err(e) = self.attachments.apply(&plan) {
            self.attachments.abort(&plan);
            return Err(e.into());
        }

        let document = RxDocumentData {
            id: write.id.clone(),
            data: write.data.clone(),
            revision,
            state: write.state,
            attachments: plan.resolved().clone(),
            meta: DocumentMeta::now(),
        };

        let committed = self.sequencer.assign(|sequence| {
            let event = ChangeEvent::new(sequence, self.collection.as_str(), document, stored);
            self.backend.commit(&event)?;
            Ok::<_, StorageError>(event)
        });
        let event = match committed {
            Ok(event) => event,
            Err(e) => {
                self.attachments.abort(&plan);
                return Err(e);
            }
        };

        // Superseded keys include every attachment the write dropped
        let removed = self.attachments.finalize(&write.id, &plan);

        self.metrics.increment_documents_written();
        self.metrics.increment_events_published();
        self.metrics.add_blobs_written(plan.writes().len() as u64);
        self.metrics.add_blob_writes_skipped(plan.skipped() as u64);
        self.metrics.add_blobs_removed(removed as u64);

        debug!(
            target: "rxstorage::bulk",
            collection = %self.collection,
            document_id = %event.id,
            revision = %event.document_data.revision,
            sequence = event.sequence,
            operation = ?event.operation,
            "document committed"
        );
        Ok(Ok(event.document_data))
    }

    fn write_local_one(
        &self,
        write: LocalDocumentWriteData,
    ) -> StorageResult<Result<LocalDocumentData, LocalBulkWriteError>> {
        let _guard = self.local_locks.lock(&write.id);
        let stored = self.backend.local_get(&write.id)?;

        if let Err(reason) = check_precondition(&write.previous, stored.as_ref().map(|d| &d.revision)) {
            self.metrics.increment_conflicts();
            return Ok(Err(rejected(STATUS_CONFLICT, write, stored, reason)));
        }

        let body = local_revision_body(&write.data, write.state);
        let revision = RevisionManager::next(stored.as_ref().map(|d| &d.revision), &body)?;
        let document = LocalDocumentData {
            id: write.id,
            data: write.data,
            revision,
            state: write.state,
            meta: DocumentMeta::now(),
        };
        self.backend.local_put(&document)?;
        self.metrics.increment_local_documents_written();

        debug!(
            target: "rxstorage::bulk",
            collection = %self.collection,
            document_id = %document.id,
            revision = %document.revision,
            "local document committed"
        );
        Ok(Ok(document))
    }
}

fn check_id<'a>(id: &'a str, seen: &mut HashSet<&'a str>) -> StorageResult<()> {
    if id.is_empty() {
        return Err(StorageError::invalid_request("Document id must not be empty"));
    }
    if !seen.insert(id) {
        return Err(StorageError::DuplicateDocumentId(id.to_string()));
    }
    Ok(())
}

fn rejected<D, W>(status: u16, write: W, stored: Option<D>, reason: String) -> BulkWriteError<D, W>
where
    W: HasDocumentId,
{
    BulkWriteError {
        status,
        document_id: write.document_id().to_string(),
        write,
        document_in_db: stored,
        reason,
    }
}

trait HasDocumentId {
    fn document_id(&self) -> &str;
}

impl HasDocumentId for RxDocumentWriteData {
    fn document_id(&self) -> &str {
        &self.id
    }
}

impl HasDocumentId for LocalDocumentWriteData {
    fn document_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::{AttachmentWrite, MemoryBlobBackend};
    use crate::backend::MemoryDocumentBackend;
    use crate::changes::ChangeStreamOptions;
    use crate::revision::Revision;
    use crate::schema::FieldDef;
    use serde_json::json;

    struct Fixture {
        coordinator: BulkWriteCoordinator,
        backend: Arc<MemoryDocumentBackend>,
        blobs: Arc<MemoryBlobBackend>,
        sequencer: Arc<ChangeSequencer>,
        metrics: Arc<StorageMetrics>,
    }

    fn fixture(schema: Option<RxJsonSchema>) -> Fixture {
        let backend = Arc::new(MemoryDocumentBackend::new());
        let blobs = Arc::new(MemoryBlobBackend::new());
        let sequencer = Arc::new(ChangeSequencer::new(0));
        let metrics = Arc::new(StorageMetrics::new());
        let coordinator = BulkWriteCoordinator::new(
            "humans",
            backend.clone(),
            AttachmentStore::new(blobs.clone()),
            sequencer.clone(),
            metrics.clone(),
            schema,
        );
        Fixture {
            coordinator,
            backend,
            blobs,
            sequencer,
            metrics,
        }
    }

    fn insert(f: &Fixture, id: &str, data: serde_json::Value) -> RxDocumentData {
        let mut response = f
            .coordinator
            .bulk_write(vec![RxDocumentWriteData::new(id, data)], true)
            .unwrap();
        response.success.remove(id).unwrap()
    }

    #[test]
    fn test_insert_update_and_stale_update() {
        let f = fixture(None);
        let first = insert(&f, "a", json!({"n": 1}));
        assert_eq!(first.revision.height(), 1);

        let update = first.to_write().with_data(json!({"n": 2}));
        let response = f.coordinator.bulk_write(vec![update], true).unwrap();
        let second = &response.success["a"];
        assert_eq!(second.revision.height(), 2);

        let stale = RxDocumentWriteData::new("a", json!({"n": 3})).with_previous(first.revision.clone());
        let response = f.coordinator.bulk_write(vec![stale.clone()], true).unwrap();
        let error = &response.error["a"];
        assert_eq!(error.status, STATUS_CONFLICT);
        assert_eq!(error.write, stale);
        assert_eq!(error.document_in_db.as_ref().unwrap().revision, second.revision);

        assert_eq!(f.backend.get("a").unwrap().unwrap().data, json!({"n": 2}));
        assert_eq!(f.sequencer.last_sequence(), 2);
        assert_eq!(f.metrics.conflicts(), 1);
    }

    #[test]
    fn test_conflict_does_not_affect_other_documents() {
        let f = fixture(None);
        insert(&f, "a", json!({}));

        let writes = vec![
            RxDocumentWriteData::new("a", json!({"again": true})),
            RxDocumentWriteData::new("b", json!({})),
        ];
        let response = f.coordinator.bulk_write(writes, true).unwrap();
        assert!(response.error.contains_key("a"));
        assert!(response.success.contains_key("b"));
        assert_eq!(response.len(), 2);
    }

    #[test]
    fn test_update_of_unknown_id_conflicts() {
        let f = fixture(None);
        let write = RxDocumentWriteData::new("ghost", json!({}))
            .with_previous(Revision::parse("1-abc").unwrap());
        let response = f.coordinator.bulk_write(vec![write], true).unwrap();
        assert_eq!(response.error["ghost"].status, STATUS_CONFLICT);
        assert!(response.error["ghost"].document_in_db.is_none());
        assert_eq!(f.sequencer.last_sequence(), 0);
    }

    #[test]
    fn test_duplicate_ids_fail_the_batch() {
        let f = fixture(None);
        let writes = vec![
            RxDocumentWriteData::new("a", json!({})),
            RxDocumentWriteData::new("a", json!({})),
        ];
        assert!(matches!(
            f.coordinator.bulk_write(writes, true),
            Err(StorageError::DuplicateDocumentId(_))
        ));
        assert!(f.backend.get("a").unwrap().is_none());
    }

    #[test]
    fn test_schema_violation_fails_before_any_write() {
        let schema = RxJsonSchema::new(0, BTreeMap::new()).with_field("name", FieldDef::required_string());
        let f = fixture(Some(schema));
        let writes = vec![
            RxDocumentWriteData::new("ok", json!({"name": "x"})),
            RxDocumentWriteData::new("bad", json!({"name": 7})),
        ];
        let err = f.coordinator.bulk_write(writes, true).unwrap_err();
        assert!(matches!(err, StorageError::Schema { ref document_id, .. } if document_id == "bad"));
        assert!(f.backend.get("ok").unwrap().is_none());
    }

    #[test]
    fn test_attachments_rejected_without_schema_support() {
        let f = fixture(Some(RxJsonSchema::new(0, BTreeMap::new())));
        let write = RxDocumentWriteData::new("a", json!({}))
            .with_attachment("f", AttachmentWrite::payload("text/plain", b"x".to_vec()));
        assert!(matches!(
            f.coordinator.bulk_write(vec![write], true),
            Err(StorageError::Schema { .. })
        ));
    }

    #[test]
    fn test_mismatched_stub_is_invalid() {
        let f = fixture(None);
        let write = RxDocumentWriteData::new("a", json!({}))
            .with_attachment("f", AttachmentWrite::payload("text/plain", b"x".to_vec()));
        let doc = f.coordinator.bulk_write(vec![write], true).unwrap().success.remove("a").unwrap();

        let mut meta = doc.attachments["f"].clone();
        meta.length += 1;
        let bad = doc.to_write().with_attachment("f", AttachmentWrite::Stub(meta));
        let response = f.coordinator.bulk_write(vec![bad], true).unwrap();
        assert_eq!(response.error["a"].status, STATUS_INVALID);
        assert_eq!(f.backend.get("a").unwrap().unwrap().revision, doc.revision);
    }

    #[test]
    fn test_removed_attachment_blob_is_deleted() {
        let f = fixture(None);
        let write = RxDocumentWriteData::new("a", json!({}))
            .with_attachment("f", AttachmentWrite::payload("text/plain", b"x".to_vec()));
        let doc = f.coordinator.bulk_write(vec![write], true).unwrap().success.remove("a").unwrap();
        assert_eq!(f.blobs.len(), 1);

        let without = doc.to_write().without_attachment("f");
        let response = f.coordinator.bulk_write(vec![without], true).unwrap();
        assert!(response.success["a"].attachments.is_empty());
        assert!(f.blobs.is_empty());
        assert_eq!(f.metrics.snapshot().blobs_removed, 1);
    }

    #[test]
    fn test_commit_publishes_event() {
        let f = fixture(None);
        let mut stream = f
            .sequencer
            .subscribe::<(), _>(ChangeStreamOptions::ongoing(), |_| Ok(Vec::new()))
            .unwrap();
        insert(&f, "a", json!({}));

        let event = stream.try_next().unwrap();
        assert_eq!(event.sequence, 1);
        assert_eq!(event.collection, "humans");
    }

    #[test]
    fn test_local_documents() {
        let f = fixture(Some(RxJsonSchema::new(0, BTreeMap::new())));
        let response = f
            .coordinator
            .bulk_write_local(vec![LocalDocumentWriteData::new("cfg", json!({"any": "shape"}))])
            .unwrap();
        let doc = &response.success["cfg"];
        assert_eq!(doc.revision.height(), 1);

        let stale = LocalDocumentWriteData::new("cfg", json!({}));
        let response = f.coordinator.bulk_write_local(vec![stale]).unwrap();
        assert_eq!(response.error["cfg"].status, STATUS_CONFLICT);

        // Local writes are not sequenced
        assert_eq!(f.sequencer.last_sequence(), 0);
    }
}
