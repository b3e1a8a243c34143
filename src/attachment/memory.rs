//! # In-Memory Blob Backend

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use super::backend::BlobBackend;
use super::errors::{AttachmentError, AttachmentResult};

/// In-memory blob backend.
///
/// Counts writes so callers can observe when blob I/O was skipped.
#[derive(Debug, Default)]
pub struct MemoryBlobBackend {
    blobs: RwLock<BTreeMap<String, Vec<u8>>>,
    writes: AtomicU64,
}

impl MemoryBlobBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of successful writes
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Number of stored blobs
    pub fn len(&self) -> usize {
        self.blobs.read().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> AttachmentError {
    AttachmentError::Internal("Lock poisoned".to_string())
}

impl BlobBackend for MemoryBlobBackend {
    fn write(&self, key: &str, data: &[u8]) -> AttachmentResult<()> {
        let mut blobs = self.blobs.write().map_err(|_| poisoned())?;
        blobs.insert(key.to_string(), data.to_vec());
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn read(&self, key: &str) -> AttachmentResult<Vec<u8>> {
        let blobs = self.blobs.read().map_err(|_| poisoned())?;
        blobs
            .get(key)
            .cloned()
            .ok_or_else(|| AttachmentError::BlobNotFound(key.to_string()))
    }

    fn delete(&self, key: &str) -> AttachmentResult<()> {
        let mut blobs = self.blobs.write().map_err(|_| poisoned())?;
        blobs
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| AttachmentError::BlobNotFound(key.to_string()))
    }

    fn exists(&self, key: &str) -> AttachmentResult<bool> {
        let blobs = self.blobs.read().map_err(|_| poisoned())?;
        Ok(blobs.contains_key(key))
    }

    fn list(&self, prefix: &str) -> AttachmentResult<Vec<String>> {
        let blobs = self.blobs.read().map_err(|_| poisoned())?;
        let dir = format!("{}/", prefix);
        Ok(blobs
            .keys()
            .filter(|k| k.starts_with(&dir) && !k[dir.len()..].contains('/'))
            .cloned()
            .collect())
    }
}
