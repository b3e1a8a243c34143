//! # Change Sequencer
//!
//! Assigns gapless, strictly increasing sequence numbers to committed
//! writes and fans events out to live subscribers.
//!
//! ## Invariants
//!
//! - A sequence number is consumed only when its commit succeeds
//! - Events reach every subscriber in sequence order
//! - A resumable subscription observes every event after its start
//!   sequence exactly once: replay and registration happen under the
//!   same lock that serializes commits

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tracing::trace;

use super::event::ChangeEvent;
use super::options::ChangeStreamOptions;
use super::stream::ChangeStream;
use super::subscription::{DispatchResult, SubscriptionRegistry};

/// Sequence authority and live fan-out for one collection
#[derive(Debug)]
pub struct ChangeSequencer {
    /// Highest committed sequence. Held for the whole commit.
    commit_lock: Mutex<u64>,
    /// Mirror of the committed sequence for lock-free reads
    last_sequence: AtomicU64,
    registry: Arc<SubscriptionRegistry>,
    closed: AtomicBool,
}

impl Default for ChangeSequencer {
    fn default() -> Self {
        Self::new(0)
    }
}

impl ChangeSequencer {
    /// Create a sequencer continuing after `last_committed`
    pub fn new(last_committed: u64) -> Self {
        Self {
            commit_lock: Mutex::new(last_committed),
            last_sequence: AtomicU64::new(last_committed),
            registry: Arc::new(SubscriptionRegistry::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Highest committed sequence (0 when nothing was committed)
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence.load(Ordering::Acquire)
    }

    /// Run `commit` with the next sequence number.
    ///
    /// `commit` must persist the document and its event atomically. The
    /// number is consumed and the event published only if it succeeds.
    pub fn assign<E, F>(&self, commit: F) -> Result<ChangeEvent, E>
    where
        F: FnOnce(u64) -> Result<ChangeEvent, E>,
    {
        // The guarded counter is only advanced after a successful commit,
        // so a poisoned lock still holds a consistent value
        let mut last = self.commit_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let sequence = *last + 1;

        let event = commit(sequence)?;
        debug_assert_eq!(event.sequence, sequence);

        *last = sequence;
        self.last_sequence.store(sequence, Ordering::Release);

        let dispatched = self.publish(&event);
        trace!(
            target: "rxstorage::changes",
            sequence,
            document_id = %event.id,
            delivered = dispatched.delivered,
            "change published"
        );
        Ok(event)
    }

    /// Open a live stream.
    ///
    /// With a start sequence, `backlog` is called with it and must return
    /// every committed event above it in ascending order. Those events are
    /// queued ahead of any live event.
    pub fn subscribe<E, F>(&self, options: ChangeStreamOptions, backlog: F) -> Result<ChangeStream, E>
    where
        F: FnOnce(u64) -> Result<Vec<ChangeEvent>, E>,
    {
        let _commits = self.commit_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (tx, rx) = mpsc::unbounded_channel();

        if let Some(start) = options.start_sequence {
            for event in backlog(start)? {
                // Receiver is held locally, so the send cannot fail
                let _ = tx.send(event);
            }
        }

        if self.closed.load(Ordering::Acquire) {
            // Sender dropped here: the stream yields the backlog, then ends
            return Ok(ChangeStream::new(uuid::Uuid::nil(), rx, Arc::downgrade(&self.registry)));
        }

        let id = self.registry.register(tx);
        Ok(ChangeStream::new(id, rx, Arc::downgrade(&self.registry)))
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    /// End every live stream and refuse new registrations
    pub fn close(&self) {
        let _commits = self.commit_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.closed.store(true, Ordering::Release);
        self.registry.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn publish(&self, event: &ChangeEvent) -> DispatchResult {
        self.registry.publish(event)
    }
}
