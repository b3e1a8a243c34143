//! # Document Backends
//!
//! Persistence for committed documents, their change events, revision
//! lineages and local documents.
//!
//! ## Invariants
//!
//! - `commit` makes the document version and its change event visible
//!   together, or not at all
//! - Event sequences are gapless and strictly increasing
//! - A committed version is durable before `commit` returns (file backend)
//! - At most one open backend writes a collection directory (file backend)

mod file;
mod log;
mod memory;
mod record;
mod state;

pub use file::FileDocumentBackend;
pub use log::{LogReader, LogSink, LogWriter};
pub use memory::MemoryDocumentBackend;
pub use record::{compute_checksum, verify_checksum, LogRecord, RecordKind};

use crate::changes::ChangeEvent;
use crate::document::{LocalDocumentData, RxDocumentData};
use crate::errors::StorageResult;
use crate::revision::RevisionHistory;

/// Backend trait for document persistence
pub trait DocumentBackend: Send + Sync + std::fmt::Debug {
    /// Current version of a document, tombstones included
    fn get(&self, id: &str) -> StorageResult<Option<RxDocumentData>>;

    /// Every current document version, tombstones included, ordered by id
    fn scan(&self) -> StorageResult<Vec<RxDocumentData>>;

    /// Persist the event's document version and the event itself atomically
    fn commit(&self, event: &ChangeEvent) -> StorageResult<()>;

    /// Events with sequence above `sequence`, ascending
    fn events_after(&self, sequence: u64, limit: Option<usize>) -> StorageResult<Vec<ChangeEvent>>;

    /// Events with sequence below `sequence`, descending
    fn events_before(&self, sequence: u64, limit: Option<usize>) -> StorageResult<Vec<ChangeEvent>>;

    /// Highest committed sequence, 0 when empty
    fn last_sequence(&self) -> StorageResult<u64>;

    /// Revision lineage of a document
    fn revision_history(&self, id: &str) -> StorageResult<Option<RevisionHistory>>;

    /// Current version of a local document
    fn local_get(&self, id: &str) -> StorageResult<Option<LocalDocumentData>>;

    /// Replace a local document
    fn local_put(&self, document: &LocalDocumentData) -> StorageResult<()>;

    /// Release resources held for writing. Later writes fail.
    fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}
