//! Migration hook seam

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::attachment::AttachmentWrite;
use crate::document::RxDocumentData;
use crate::revision::Revision;

/// Point in a document's migration at which it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStage {
    Pre,
    Transform,
    Write,
    Post,
}

impl fmt::Display for MigrationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pre => "pre_migrate_document",
            Self::Transform => "transform",
            Self::Write => "write",
            Self::Post => "post_migrate_document",
        };
        f.write_str(name)
    }
}

/// Failure raised by a hook or a transform
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct HookError(pub String);

impl HookError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

pub type HookResult<T> = Result<T, HookError>;

/// A source document on its way to the target collection.
///
/// Attachments carry full payloads so hooks may rewrite them.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationDocument {
    pub id: String,
    pub data: Value,
    pub attachments: BTreeMap<String, AttachmentWrite>,
    /// Revision in the source collection
    pub source_revision: Revision,
}

/// A document committed into the target collection
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationResult {
    pub source_collection: String,
    pub target_collection: String,
    pub source_revision: Revision,
    pub document: RxDocumentData,
}

/// Extension points around each migrated document.
///
/// Both hooks default to accepting the document unchanged.
pub trait MigrationHooks: Send + Sync {
    /// Called before the transform; may rewrite the document
    fn pre_migrate_document(
        &self,
        _document: &mut MigrationDocument,
        _source_collection: &str,
    ) -> HookResult<()> {
        Ok(())
    }

    /// Called after the migrated document committed
    fn post_migrate_document(&self, _result: &MigrationResult) -> HookResult<()> {
        Ok(())
    }
}
