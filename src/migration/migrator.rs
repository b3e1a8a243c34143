//! # Document Migrator
//!
//! Moves documents from a source collection into a target collection:
//! pre hooks -> transform -> write -> post hooks, per document. A failure
//! at any stage is fatal for that document only; backend failures abort
//! the whole run.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use super::hooks::{HookError, HookResult, MigrationDocument, MigrationHooks, MigrationResult, MigrationStage};
use crate::attachment::AttachmentWrite;
use crate::document::{RxDocumentData, RxDocumentWriteData};
use crate::errors::{StorageError, StorageResult};
use crate::instance::StorageInstance;
use crate::query::PreparedQuery;

/// Outcome of one migration run
#[derive(Debug, Default)]
pub struct MigrationReport {
    /// Ids committed into the target
    pub migrated: Vec<String>,
    /// Ids the transform chose not to carry over
    pub dropped: Vec<String>,
    pub failures: BTreeMap<String, StorageError>,
}

impl MigrationReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Drives documents into a target instance through injected hooks
pub struct DocumentMigrator<'a> {
    target: &'a StorageInstance,
    hooks: Vec<Arc<dyn MigrationHooks>>,
}

impl<'a> DocumentMigrator<'a> {
    pub fn new(target: &'a StorageInstance) -> Self {
        Self {
            target,
            hooks: Vec::new(),
        }
    }

    /// Add hooks; they run in registration order
    pub fn with_hooks(mut self, hooks: Arc<dyn MigrationHooks>) -> Self {
        self.hooks.push(hooks);
        self
    }

    /// Every live document of `source` with its attachment payloads
    pub fn collect_source(source: &StorageInstance) -> StorageResult<Vec<MigrationDocument>> {
        let live = source.query(&PreparedQuery::all())?;
        let mut documents = Vec::with_capacity(live.len());
        for doc in live.documents {
            let mut attachments = BTreeMap::new();
            for (attachment_id, meta) in &doc.attachments {
                let data = source.get_attachment(&doc.id, attachment_id)?;
                attachments.insert(
                    attachment_id.clone(),
                    AttachmentWrite::payload(meta.content_type.clone(), data),
                );
            }
            documents.push(MigrationDocument {
                id: doc.id,
                data: doc.data,
                attachments,
                source_revision: doc.revision,
            });
        }
        Ok(documents)
    }

    /// Migrate `source_docs` into the target.
    ///
    /// `transform` maps a body to its new shape, or to `None` to drop the
    /// document.
    pub fn migrate<F>(
        &self,
        source_docs: Vec<MigrationDocument>,
        source_collection: &str,
        mut transform: F,
    ) -> StorageResult<MigrationReport>
    where
        F: FnMut(Value) -> HookResult<Option<Value>>,
    {
        let mut report = MigrationReport::default();

        for mut document in source_docs {
            let id = document.id.clone();
            match self.migrate_one(&mut document, source_collection, &mut transform) {
                Ok(Some(_)) => report.migrated.push(id),
                Ok(None) => report.dropped.push(id),
                Err(e) if is_document_fatal(&e) => {
                    warn!(target: "rxstorage::migration", document_id = %id, error = %e, "document migration failed");
                    report.failures.insert(id, e);
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            target: "rxstorage::migration",
            source_collection,
            target_collection = self.target.collection_name(),
            migrated = report.migrated.len(),
            dropped = report.dropped.len(),
            failed = report.failures.len(),
            "migration finished"
        );
        Ok(report)
    }

    fn migrate_one<F>(
        &self,
        document: &mut MigrationDocument,
        source_collection: &str,
        transform: &mut F,
    ) -> StorageResult<Option<RxDocumentData>>
    where
        F: FnMut(Value) -> HookResult<Option<Value>>,
    {
        for hooks in &self.hooks {
            hooks
                .pre_migrate_document(document, source_collection)
                .map_err(|e| hook_failure(&document.id, MigrationStage::Pre, e))?;
        }

        let data = match transform(document.data.clone())
            .map_err(|e| hook_failure(&document.id, MigrationStage::Transform, e))?
        {
            Some(data) => data,
            None => return Ok(None),
        };

        let mut write = RxDocumentWriteData::new(document.id.clone(), data);
        write.attachments = document.attachments.clone();
        let mut response = self.target.bulk_write(vec![write])?;
        let committed = match response.success.remove(&document.id) {
            Some(committed) => committed,
            None => {
                let reason = response
                    .error
                    .remove(&document.id)
                    .map(|e| e.reason)
                    .unwrap_or_else(|| "write was not acknowledged".to_string());
                return Err(StorageError::MigrationHookFailure {
                    document_id: document.id.clone(),
                    stage: MigrationStage::Write,
                    reason,
                });
            }
        };

        let result = MigrationResult {
            source_collection: source_collection.to_string(),
            target_collection: self.target.collection_name().to_string(),
            source_revision: document.source_revision.clone(),
            document: committed,
        };
        for hooks in &self.hooks {
            hooks
                .post_migrate_document(&result)
                .map_err(|e| hook_failure(&document.id, MigrationStage::Post, e))?;
        }
        Ok(Some(result.document))
    }
}

fn hook_failure(document_id: &str, stage: MigrationStage, error: HookError) -> StorageError {
    StorageError::MigrationHookFailure {
        document_id: document_id.to_string(),
        stage,
        reason: error.0,
    }
}

/// Errors that end one document's migration but not the run
fn is_document_fatal(error: &StorageError) -> bool {
    matches!(
        error,
        StorageError::MigrationHookFailure { .. }
            | StorageError::Schema { .. }
            | StorageError::InvalidRequest(_)
    )
}
