//! # Attachments
//!
//! Binary blobs owned by a document and versioned with its revision.
//!
//! ## Invariants
//!
//! - Metadata is stored with the document, payloads in a blob backend
//! - Blobs are written before the document commit that references them
//! - Superseded blobs are removed after the commit (best effort)
//! - An identical payload is not rewritten when skip-if-same is enabled

mod backend;
mod errors;
mod local;
mod memory;
mod store;
mod types;

pub use backend::BlobBackend;
pub use errors::{AttachmentError, AttachmentResult};
pub use local::LocalBlobBackend;
pub use memory::MemoryBlobBackend;
pub use store::{blob_key, AttachmentPlan, AttachmentStore, BlobWrite};
pub use types::{compute_digest, AttachmentData, AttachmentPut, AttachmentWrite};
