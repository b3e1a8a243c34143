//! # Changes
//!
//! Sequenced change events for one collection.
//!
//! - `ChangeSequencer` assigns sequence numbers inside the commit
//! - `ChangeStream` delivers live events, optionally after a replay
//! - Historical queries are served by the document backend's event log

mod event;
mod options;
mod sequencer;
mod stream;
mod subscription;

pub use event::{ChangeEvent, ChangeOperation};
pub use options::{ChangeOrder, ChangeStreamOnceOptions, ChangeStreamOptions};
pub use sequencer::ChangeSequencer;
pub use stream::ChangeStream;
pub use subscription::{DispatchResult, EventReceiver, EventSender, SubscriptionRegistry};
