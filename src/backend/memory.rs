//! # In-Memory Document Backend

use std::sync::RwLock;

use super::state::BackendState;
use super::DocumentBackend;
use crate::changes::ChangeEvent;
use crate::document::{LocalDocumentData, RxDocumentData};
use crate::errors::{StorageError, StorageResult};
use crate::revision::RevisionHistory;

/// Volatile backend. State lives as long as the value.
#[derive(Debug, Default)]
pub struct MemoryDocumentBackend {
    state: RwLock<BackendState>,
}

impl MemoryDocumentBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> StorageError {
    StorageError::backend_unavailable("Lock poisoned")
}

impl DocumentBackend for MemoryDocumentBackend {
    fn get(&self, id: &str) -> StorageResult<Option<RxDocumentData>> {
        Ok(self.state.read().map_err(|_| poisoned())?.get(id))
    }

    fn scan(&self) -> StorageResult<Vec<RxDocumentData>> {
        Ok(self.state.read().map_err(|_| poisoned())?.scan())
    }

    fn commit(&self, event: &ChangeEvent) -> StorageResult<()> {
        self.state
            .write()
            .map_err(|_| poisoned())?
            .apply(event.clone())
    }

    fn events_after(&self, sequence: u64, limit: Option<usize>) -> StorageResult<Vec<ChangeEvent>> {
        Ok(self
            .state
            .read()
            .map_err(|_| poisoned())?
            .events_after(sequence, limit))
    }

    fn events_before(&self, sequence: u64, limit: Option<usize>) -> StorageResult<Vec<ChangeEvent>> {
        Ok(self
            .state
            .read()
            .map_err(|_| poisoned())?
            .events_before(sequence, limit))
    }

    fn last_sequence(&self) -> StorageResult<u64> {
        Ok(self.state.read().map_err(|_| poisoned())?.last_sequence())
    }

    fn revision_history(&self, id: &str) -> StorageResult<Option<RevisionHistory>> {
        Ok(self.state.read().map_err(|_| poisoned())?.revision_history(id))
    }

    fn local_get(&self, id: &str) -> StorageResult<Option<LocalDocumentData>> {
        Ok(self.state.read().map_err(|_| poisoned())?.local_get(id))
    }

    fn local_put(&self, document: &LocalDocumentData) -> StorageResult<()> {
        self.state
            .write()
            .map_err(|_| poisoned())?
            .local_put(document.clone());
        Ok(())
    }
}
