//! Storage metrics
//!
//! - Counters only, monotonic
//! - Reset only when the instance is opened
//! - Thread-safe, lock-free

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters of one storage instance.
///
/// Uses Relaxed ordering: values are exact once writers quiesce, which is
/// all a snapshot promises.
#[derive(Debug, Default)]
pub struct StorageMetrics {
    /// Document versions committed
    documents_written: AtomicU64,
    /// Writes rejected with a revision conflict
    conflicts: AtomicU64,
    /// Writes rejected for a malformed attachment stub
    invalid_writes: AtomicU64,
    /// Attachment blobs written
    blobs_written: AtomicU64,
    /// Attachment payloads not rewritten because the digest matched
    blob_writes_skipped: AtomicU64,
    /// Superseded attachment blobs removed
    blobs_removed: AtomicU64,
    /// Change events published
    events_published: AtomicU64,
    /// Local document versions committed
    local_documents_written: AtomicU64,
    /// Queries and counts executed
    queries_executed: AtomicU64,
}

/// Point-in-time copy of every counter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub documents_written: u64,
    pub conflicts: u64,
    pub invalid_writes: u64,
    pub blobs_written: u64,
    pub blob_writes_skipped: u64,
    pub blobs_removed: u64,
    pub events_published: u64,
    pub local_documents_written: u64,
    pub queries_executed: u64,
}

impl StorageMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    // Write path

    pub fn increment_documents_written(&self) {
        self.documents_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_conflicts(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_invalid_writes(&self) {
        self.invalid_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_events_published(&self) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_local_documents_written(&self) {
        self.local_documents_written.fetch_add(1, Ordering::Relaxed);
    }

    // Attachments

    pub fn add_blobs_written(&self, count: u64) {
        self.blobs_written.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_blob_writes_skipped(&self, count: u64) {
        self.blob_writes_skipped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_blobs_removed(&self, count: u64) {
        self.blobs_removed.fetch_add(count, Ordering::Relaxed);
    }

    // Reads

    pub fn increment_queries(&self) {
        self.queries_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn documents_written(&self) -> u64 {
        self.documents_written.load(Ordering::Relaxed)
    }

    pub fn conflicts(&self) -> u64 {
        self.conflicts.load(Ordering::Relaxed)
    }

    /// Copy every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_written: self.documents_written.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            invalid_writes: self.invalid_writes.load(Ordering::Relaxed),
            blobs_written: self.blobs_written.load(Ordering::Relaxed),
            blob_writes_skipped: self.blob_writes_skipped.load(Ordering::Relaxed),
            blobs_removed: self.blobs_removed.load(Ordering::Relaxed),
            events_published: self.events_published.load(Ordering::Relaxed),
            local_documents_written: self.local_documents_written.load(Ordering::Relaxed),
            queries_executed: self.queries_executed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_counters_start_at_zero() {
        assert_eq!(StorageMetrics::new().snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_increments() {
        let metrics = StorageMetrics::new();
        metrics.increment_documents_written();
        metrics.increment_conflicts();
        metrics.add_blobs_written(3);
        metrics.add_blob_writes_skipped(2);

        let snap = metrics.snapshot();
        assert_eq!(snap.documents_written, 1);
        assert_eq!(snap.conflicts, 1);
        assert_eq!(snap.blobs_written, 3);
        assert_eq!(snap.blob_writes_skipped, 2);
    }

    #[test]
    fn test_concurrent_increments() {
        let metrics = Arc::new(StorageMetrics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        m.increment_queries();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(metrics.snapshot().queries_executed, 8000);
    }
}
