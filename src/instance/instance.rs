//! # Storage Instance
//!
//! Binds the revision, attachment, sequencing and bulk write machinery to
//! one collection over one backend. Every operation fails with `Closed`
//! once the instance has been closed.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use super::params::{InstanceOptions, StorageInstanceCreationParams};
use crate::attachment::{AttachmentData, AttachmentPut, AttachmentStore, AttachmentWrite, BlobBackend};
use crate::backend::DocumentBackend;
use crate::bulk::{BulkWriteCoordinator, LocalBulkWriteResponse, RxBulkWriteResponse};
use crate::changes::{ChangeEvent, ChangeOrder, ChangeSequencer, ChangeStream, ChangeStreamOnceOptions, ChangeStreamOptions};
use crate::document::{DocumentHandle, LocalDocumentData, LocalDocumentWriteData, RxDocumentData, RxDocumentWriteData};
use crate::errors::{StorageError, StorageResult};
use crate::observability::StorageMetrics;
use crate::query::{PreparedQuery, QueryExecutor, QueryResult};
use crate::revision::{Revision, RevisionHistory, RevisionManager};
use crate::schema::RxJsonSchema;

/// One open collection
#[derive(Debug)]
pub struct StorageInstance {
    database_name: String,
    collection_name: String,
    schema: RxJsonSchema,
    options: InstanceOptions,
    backend: Arc<dyn DocumentBackend>,
    attachments: AttachmentStore,
    sequencer: Arc<ChangeSequencer>,
    coordinator: BulkWriteCoordinator,
    metrics: Arc<StorageMetrics>,
    closed: AtomicBool,
}

impl StorageInstance {
    /// Open a collection over the given backends.
    ///
    /// Sequencing continues after the backend's last committed event.
    pub fn open(
        params: StorageInstanceCreationParams,
        backend: Arc<dyn DocumentBackend>,
        blobs: Arc<dyn BlobBackend>,
    ) -> StorageResult<Self> {
        params.validate()?;
        let StorageInstanceCreationParams {
            database_name,
            collection_name,
            schema,
            options,
        } = params;

        let last_sequence = backend.last_sequence()?;
        let attachments = AttachmentStore::new(blobs);
        let sequencer = Arc::new(ChangeSequencer::new(last_sequence));
        let metrics = Arc::new(StorageMetrics::new());
        let coordinator = BulkWriteCoordinator::new(
            collection_name.clone(),
            Arc::clone(&backend),
            attachments.clone(),
            Arc::clone(&sequencer),
            Arc::clone(&metrics),
            options.validate_schema.then(|| schema.clone()),
        );

        info!(
            target: "rxstorage::instance",
            database = %database_name,
            collection = %collection_name,
            schema_version = schema.version,
            last_sequence,
            "storage instance opened"
        );

        Ok(Self {
            database_name,
            collection_name,
            schema,
            options,
            backend,
            attachments,
            sequencer,
            coordinator,
            metrics,
            closed: AtomicBool::new(false),
        })
    }

    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    pub fn schema(&self) -> &RxJsonSchema {
        &self.schema
    }

    pub fn options(&self) -> &InstanceOptions {
        &self.options
    }

    /// Highest committed change sequence
    pub fn last_sequence(&self) -> u64 {
        self.sequencer.last_sequence()
    }

    // ==================
    // Writes
    // ==================

    /// Write a batch of documents. See [`BulkWriteCoordinator::bulk_write`].
    pub fn bulk_write(&self, writes: Vec<RxDocumentWriteData>) -> StorageResult<RxBulkWriteResponse> {
        self.ensure_open()?;
        self.coordinator
            .bulk_write(writes, self.options.skip_if_same_attachments)
    }

    /// Write a batch of local documents
    pub fn bulk_write_local(
        &self,
        writes: Vec<LocalDocumentWriteData>,
    ) -> StorageResult<LocalBulkWriteResponse> {
        self.ensure_open()?;
        self.coordinator.bulk_write_local(writes)
    }

    // ==================
    // Reads
    // ==================

    /// Current versions of the given ids, in request order. Missing ids are skipped.
    pub fn find_documents_by_id<S: AsRef<str>>(
        &self,
        ids: &[S],
        with_deleted: bool,
    ) -> StorageResult<Vec<RxDocumentData>> {
        self.ensure_open()?;
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(doc) = self.backend.get(id.as_ref())? {
                if with_deleted || !doc.is_deleted() {
                    found.push(doc);
                }
            }
        }
        Ok(found)
    }

    /// Current versions of the given local documents, in request order
    pub fn find_local_documents_by_id<S: AsRef<str>>(
        &self,
        ids: &[S],
        with_deleted: bool,
    ) -> StorageResult<Vec<LocalDocumentData>> {
        self.ensure_open()?;
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(doc) = self.backend.local_get(id.as_ref())? {
                if with_deleted || !doc.is_deleted() {
                    found.push(doc);
                }
            }
        }
        Ok(found)
    }

    /// Run a prepared query over live documents
    pub fn query(&self, query: &PreparedQuery) -> StorageResult<QueryResult> {
        self.ensure_open()?;
        let documents = self.backend.scan()?;
        self.metrics.increment_queries();
        Ok(QueryExecutor::execute(query, documents))
    }

    /// Number of live documents matching the selector, ignoring skip and limit
    pub fn count(&self, query: &PreparedQuery) -> StorageResult<usize> {
        self.ensure_open()?;
        let documents = self.backend.scan()?;
        self.metrics.increment_queries();
        Ok(QueryExecutor::count(query, &documents))
    }

    /// Revision lineage of a document, tombstones included
    pub fn revision_history(&self, document_id: &str) -> StorageResult<RevisionHistory> {
        self.ensure_open()?;
        self.backend
            .revision_history(document_id)?
            .ok_or_else(|| StorageError::not_found(document_id))
    }

    /// True iff `candidate` descends from `ancestor` in the document's lineage
    pub fn is_descendant(
        &self,
        document_id: &str,
        candidate: &Revision,
        ancestor: &Revision,
    ) -> StorageResult<bool> {
        let history = self.revision_history(document_id)?;
        Ok(RevisionManager::is_descendant(&history, candidate, ancestor))
    }

    // ==================
    // Change stream
    // ==================

    /// Live change stream.
    ///
    /// With a start sequence, every committed event above it is delivered
    /// first, then live events follow without gap or duplicate.
    pub fn change_stream(&self, options: ChangeStreamOptions) -> StorageResult<ChangeStream> {
        self.ensure_open()?;
        self.sequencer
            .subscribe(options, |start| self.backend.events_after(start, None))
    }

    /// Bounded historical read of the change log
    pub fn change_stream_once(&self, options: ChangeStreamOnceOptions) -> StorageResult<Vec<ChangeEvent>> {
        self.ensure_open()?;
        match options.order {
            ChangeOrder::Asc => self.backend.events_after(options.start_sequence, options.limit),
            ChangeOrder::Desc => self.backend.events_before(options.start_sequence, options.limit),
        }
    }

    // ==================
    // Attachments
    // ==================

    /// Store an attachment on a live document with a write against its
    /// current revision
    pub fn put_attachment(
        &self,
        document_id: &str,
        put: AttachmentPut,
        skip_if_same: bool,
    ) -> StorageResult<AttachmentData> {
        self.put_attachment_at(document_id, None, put, skip_if_same)
            .map(|(_, meta)| meta)
    }

    /// Read and verify an attachment payload
    pub fn get_attachment(&self, document_id: &str, attachment_id: &str) -> StorageResult<Vec<u8>> {
        self.ensure_open()?;
        let document = self.live_document(document_id)?;
        let meta = attachment_meta(&document, attachment_id)?;
        Ok(self.attachments.read(document_id, attachment_id, meta)?)
    }

    /// Remove an attachment with a write against the document's current revision
    pub fn remove_attachment(&self, document_id: &str, attachment_id: &str) -> StorageResult<()> {
        self.remove_attachment_at(document_id, None, attachment_id)
            .map(|_| ())
    }

    /// Attachment metadata of a live document
    pub fn list_attachments(&self, document_id: &str) -> StorageResult<BTreeMap<String, AttachmentData>> {
        self.ensure_open()?;
        Ok(self.live_document(document_id)?.attachments)
    }

    pub(crate) fn put_attachment_at(
        &self,
        document_id: &str,
        expected: Option<&Revision>,
        put: AttachmentPut,
        skip_if_same: bool,
    ) -> StorageResult<(RxDocumentData, AttachmentData)> {
        let AttachmentPut {
            id: attachment_id,
            content_type,
            data,
        } = put;
        let document = self.write_current(document_id, expected, skip_if_same, |write| {
            write.with_attachment(
                attachment_id.as_str(),
                AttachmentWrite::Payload { content_type, data },
            )
        })?;
        let meta = attachment_meta(&document, &attachment_id)?.clone();
        Ok((document, meta))
    }

    pub(crate) fn remove_attachment_at(
        &self,
        document_id: &str,
        expected: Option<&Revision>,
        attachment_id: &str,
    ) -> StorageResult<RxDocumentData> {
        self.ensure_open()?;
        attachment_meta(&self.live_document(document_id)?, attachment_id)?;
        self.write_current(document_id, expected, self.options.skip_if_same_attachments, |write| {
            write.without_attachment(attachment_id)
        })
    }

    /// Rewrite the live document through the bulk write path.
    ///
    /// With `expected`, the write conflicts unless it is the stored
    /// revision. Conflicts surface as errors here, not as response entries.
    fn write_current<F>(
        &self,
        document_id: &str,
        expected: Option<&Revision>,
        skip_if_same: bool,
        change: F,
    ) -> StorageResult<RxDocumentData>
    where
        F: FnOnce(RxDocumentWriteData) -> RxDocumentWriteData,
    {
        self.ensure_open()?;
        let current = self.live_document(document_id)?;
        if let Some(expected) = expected {
            if *expected != current.revision {
                self.metrics.increment_conflicts();
                return Err(StorageError::RevisionConflict {
                    document_id: document_id.to_string(),
                    reason: format!(
                        "previous revision {} does not match current revision {}",
                        expected, current.revision
                    ),
                });
            }
        }

        let write = change(current.to_write());
        let mut response = self.coordinator.bulk_write(vec![write], skip_if_same)?;
        if let Some(document) = response.success.remove(document_id) {
            return Ok(document);
        }
        match response.error.remove(document_id) {
            Some(error) if error.is_conflict() => Err(StorageError::RevisionConflict {
                document_id: document_id.to_string(),
                reason: error.reason,
            }),
            Some(error) => Err(StorageError::invalid_request(error.reason)),
            None => Err(StorageError::not_found(document_id)),
        }
    }

    // ==================
    // Documents
    // ==================

    /// Handle on a live document at its current revision
    pub fn document(self: &Arc<Self>, document_id: &str) -> StorageResult<DocumentHandle> {
        self.ensure_open()?;
        let document = self.live_document(document_id)?;
        Ok(DocumentHandle::new(document.id, document.revision, Arc::clone(self)))
    }

    /// Current version of a document; missing and tombstoned documents are NotFound
    pub(crate) fn live_document(&self, document_id: &str) -> StorageResult<RxDocumentData> {
        match self.backend.get(document_id)? {
            Some(document) if !document.is_deleted() => Ok(document),
            _ => Err(StorageError::not_found(document_id)),
        }
    }

    // ==================
    // Lifecycle
    // ==================

    pub fn metrics(&self) -> &StorageMetrics {
        &self.metrics
    }

    /// Close the instance and end every change stream. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.sequencer.close();
        if let Err(e) = self.backend.close() {
            warn!(
                target: "rxstorage::instance",
                database = %self.database_name,
                collection = %self.collection_name,
                error = %e,
                "backend close failed"
            );
        }
        info!(
            target: "rxstorage::instance",
            database = %self.database_name,
            collection = %self.collection_name,
            "storage instance closed"
        );
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.is_closed() {
            return Err(StorageError::Closed(format!(
                "{}/{}",
                self.database_name, self.collection_name
            )));
        }
        Ok(())
    }
}

fn attachment_meta<'a>(
    document: &'a RxDocumentData,
    attachment_id: &str,
) -> StorageResult<&'a AttachmentData> {
    document
        .attachments
        .get(attachment_id)
        .ok_or_else(|| StorageError::AttachmentNotFound {
            document_id: document.id.clone(),
            attachment_id: attachment_id.to_string(),
        })
}
