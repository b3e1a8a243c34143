//! # Revisions
//!
//! Every committed document version carries a revision `<height>-<hash>`.
//!
//! ## Invariants
//!
//! - Height of a new revision = parent height + 1 (1 for a new document)
//! - Hash is derived from the parent revision and the document content
//! - Revisions are totally ordered: height, then hash
//! - A document has exactly one current revision

mod errors;
mod history;
mod manager;
#[allow(clippy::module_inception)]
mod revision;

pub use errors::{RevisionError, RevisionResult};
pub use history::RevisionHistory;
pub use manager::RevisionManager;
pub use revision::{Precondition, Revision, NEW_DOCUMENT_SENTINEL};
