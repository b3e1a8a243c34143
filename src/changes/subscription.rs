//! # Subscription Registry
//!
//! Live change stream senders, keyed by subscription id.

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::mpsc;
use uuid::Uuid;

use super::event::ChangeEvent;

/// Event sender for a subscription
pub type EventSender = mpsc::UnboundedSender<ChangeEvent>;

/// Event receiver for a subscription
pub type EventReceiver = mpsc::UnboundedReceiver<ChangeEvent>;

/// Result of publishing one event
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchResult {
    /// Subscribers the event was queued for
    pub delivered: usize,
    /// Subscribers whose receiver was gone (removed)
    pub failed: usize,
}

/// Registry of live subscriptions
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    senders: RwLock<HashMap<Uuid, EventSender>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sender and return its subscription id
    pub fn register(&self, sender: EventSender) -> Uuid {
        let id = Uuid::new_v4();
        if let Ok(mut senders) = self.senders.write() {
            senders.insert(id, sender);
        }
        id
    }

    /// Remove a subscription
    pub fn unsubscribe(&self, id: &Uuid) -> bool {
        self.senders
            .write()
            .map(|mut s| s.remove(id).is_some())
            .unwrap_or(false)
    }

    /// Queue an event for every subscriber. Never blocks.
    pub fn publish(&self, event: &ChangeEvent) -> DispatchResult {
        let mut result = DispatchResult::default();
        let mut dead = Vec::new();

        if let Ok(senders) = self.senders.read() {
            for (id, sender) in senders.iter() {
                match sender.send(event.clone()) {
                    Ok(()) => result.delivered += 1,
                    Err(_) => {
                        result.failed += 1;
                        dead.push(*id);
                    }
                }
            }
        }

        if !dead.is_empty() {
            if let Ok(mut senders) = self.senders.write() {
                for id in &dead {
                    senders.remove(id);
                }
            }
        }

        result
    }

    /// Drop every sender, ending all streams
    pub fn clear(&self) {
        if let Ok(mut senders) = self.senders.write() {
            senders.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.senders.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
