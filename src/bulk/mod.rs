//! # Bulk Writes
//!
//! Partial success is the normal outcome of a bulk write: every submitted
//! document ends up either in `success` or in `error`, never both.

mod coordinator;
mod locks;
mod precondition;
mod response;

pub use coordinator::BulkWriteCoordinator;
pub use locks::{DocumentLockGuard, DocumentLocks};
pub use precondition::{check_precondition, WriteKind};
pub use response::{
    BulkWriteError, BulkWriteResponse, LocalBulkWriteError, LocalBulkWriteResponse,
    RxBulkWriteError, RxBulkWriteResponse, STATUS_CONFLICT, STATUS_INVALID,
};
