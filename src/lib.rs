//! rxstorage - storage contract of a local-first reactive document database
//!
//! Revisioned documents with optimistic concurrency, bulk writes with
//! per-document outcomes, content-addressed attachments and a gapless,
//! resumable change stream, over pluggable backends.

pub mod attachment;
pub mod backend;
pub mod bulk;
pub mod changes;
pub mod cli;
pub mod document;
pub mod errors;
pub mod instance;
pub mod migration;
pub mod observability;
pub mod query;
pub mod revision;
pub mod schema;

pub use bulk::{BulkWriteError, BulkWriteResponse, LocalBulkWriteResponse, RxBulkWriteResponse};
pub use changes::{ChangeEvent, ChangeOperation, ChangeStream, ChangeStreamOnceOptions, ChangeStreamOptions};
pub use document::{DocumentHandle, DocumentState, RxDocumentData, RxDocumentWriteData};
pub use errors::{StorageError, StorageResult};
pub use instance::{FileStorage, InstanceOptions, MemoryStorage, RxStorage, StorageInstance, StorageInstanceCreationParams};
pub use revision::{Precondition, Revision};
