//! # Change Stream
//!
//! Receiving end of a subscription. Implements `futures_util::Stream`;
//! dropping it unsubscribes.

use std::pin::Pin;
use std::sync::Weak;
use std::task::{Context, Poll};

use futures_util::Stream;
use uuid::Uuid;

use super::event::ChangeEvent;
use super::subscription::{EventReceiver, SubscriptionRegistry};

/// Ordered stream of change events
#[derive(Debug)]
pub struct ChangeStream {
    id: Uuid,
    receiver: EventReceiver,
    registry: Weak<SubscriptionRegistry>,
}

impl ChangeStream {
    pub(crate) fn new(id: Uuid, receiver: EventReceiver, registry: Weak<SubscriptionRegistry>) -> Self {
        Self {
            id,
            receiver,
            registry,
        }
    }

    /// Subscription id
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next event if one is already queued
    pub fn try_next(&mut self) -> Option<ChangeEvent> {
        self.receiver.try_recv().ok()
    }

    /// Wait for the next event. `None` once the instance is closed.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.receiver.recv().await
    }

    /// Drain every queued event without waiting
    pub fn drain(&mut self) -> Vec<ChangeEvent> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}

impl Stream for ChangeStream {
    type Item = ChangeEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl Drop for ChangeStream {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unsubscribe(&self.id);
        }
    }
}
