//! Per-document write locks.
//!
//! Writes to distinct ids proceed in parallel; writes to the same id
//! serialize so the second one observes the first one's revision.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex, PoisonError};

/// Set of document ids currently being written
#[derive(Debug, Default)]
pub struct DocumentLocks {
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

impl DocumentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `id` is free, then hold it until the guard drops
    pub fn lock(&self, id: &str) -> DocumentLockGuard<'_> {
        // The set is only mutated by insert/remove, so a poisoned lock is consistent
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        while held.contains(id) {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        held.insert(id.to_string());
        DocumentLockGuard {
            locks: self,
            id: id.to_string(),
        }
    }

    /// Number of ids currently held
    pub fn held(&self) -> usize {
        self.held.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Releases a document lock on drop
#[derive(Debug)]
pub struct DocumentLockGuard<'a> {
    locks: &'a DocumentLocks,
    id: String,
}

impl Drop for DocumentLockGuard<'_> {
    fn drop(&mut self) {
        let mut held = self.locks.held.lock().unwrap_or_else(PoisonError::into_inner);
        held.remove(&self.id);
        self.locks.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_guard_releases_on_drop() {
        let locks = DocumentLocks::new();
        {
            let _a = locks.lock("a");
            let _b = locks.lock("b");
            assert_eq!(locks.held(), 2);
        }
        assert_eq!(locks.held(), 0);
    }

    #[test]
    fn test_same_id_serializes() {
        let locks = Arc::new(DocumentLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                thread::spawn(move || {
                    for _ in 0..50 {
                        let _guard = locks.lock("doc");
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(now, Ordering::SeqCst);
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }
}
