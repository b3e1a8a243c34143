//! Change stream options

use serde::{Deserialize, Serialize};

/// Options for an ongoing change stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStreamOptions {
    /// Replay every event after this sequence before delivering live events.
    /// `None` delivers only events committed after subscription.
    #[serde(default)]
    pub start_sequence: Option<u64>,
}

impl ChangeStreamOptions {
    /// Only future events
    pub fn ongoing() -> Self {
        Self::default()
    }

    /// Events after `sequence`, then live
    pub fn resume_after(sequence: u64) -> Self {
        Self {
            start_sequence: Some(sequence),
        }
    }
}

/// Direction of a historical query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOrder {
    #[default]
    Asc,
    Desc,
}

/// Options for a one-shot historical query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStreamOnceOptions {
    /// Exclusive bound: `Asc` returns sequences above it, `Desc` below it
    pub start_sequence: u64,
    #[serde(default)]
    pub order: ChangeOrder,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl ChangeStreamOnceOptions {
    pub fn asc(start_sequence: u64) -> Self {
        Self {
            start_sequence,
            order: ChangeOrder::Asc,
            limit: None,
        }
    }

    pub fn desc(start_sequence: u64) -> Self {
        Self {
            start_sequence,
            order: ChangeOrder::Desc,
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
