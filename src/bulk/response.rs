//! # Bulk Write Response
//!
//! One response shape for both document kinds.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::document::{LocalDocumentData, LocalDocumentWriteData, RxDocumentData, RxDocumentWriteData};

/// Status of a write whose precondition did not hold
pub const STATUS_CONFLICT: u16 = 409;

/// Status of a write that was malformed for the stored document
pub const STATUS_INVALID: u16 = 400;

/// Per-document failure of a bulk write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkWriteError<D, W> {
    pub status: u16,
    pub document_id: String,
    /// The write request as submitted
    pub write: W,
    /// Stored current version, when one exists
    pub document_in_db: Option<D>,
    pub reason: String,
}

impl<D, W> BulkWriteError<D, W> {
    pub fn is_conflict(&self) -> bool {
        self.status == STATUS_CONFLICT
    }
}

/// Outcome of a bulk write. Every submitted id lands in exactly one map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkWriteResponse<D, W> {
    pub success: BTreeMap<String, D>,
    pub error: BTreeMap<String, BulkWriteError<D, W>>,
}

// Manual impl: a derive would require `D: Default, W: Default`
impl<D, W> Default for BulkWriteResponse<D, W> {
    fn default() -> Self {
        Self {
            success: BTreeMap::new(),
            error: BTreeMap::new(),
        }
    }
}

impl<D, W> BulkWriteResponse<D, W> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_complete_success(&self) -> bool {
        self.error.is_empty()
    }

    /// Number of documents the response accounts for
    pub fn len(&self) -> usize {
        self.success.len() + self.error.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub type RxBulkWriteResponse = BulkWriteResponse<RxDocumentData, RxDocumentWriteData>;
pub type RxBulkWriteError = BulkWriteError<RxDocumentData, RxDocumentWriteData>;
pub type LocalBulkWriteResponse = BulkWriteResponse<LocalDocumentData, LocalDocumentWriteData>;
pub type LocalBulkWriteError = BulkWriteError<LocalDocumentData, LocalDocumentWriteData>;
