//! # Observability
//!
//! Per-instance counters. Log output goes through `tracing`.

mod metrics;

pub use metrics::{MetricsSnapshot, StorageMetrics};
