//! # Documents
//!
//! Collection documents, local documents and document handles.

mod data;
mod handle;
mod local;

pub use data::{DocumentMeta, DocumentState, RxDocumentData, RxDocumentWriteData};
pub use handle::DocumentHandle;
pub use local::{LocalDocumentData, LocalDocumentWriteData};

pub(crate) use data::revision_body;
pub(crate) use local::local_revision_body;
