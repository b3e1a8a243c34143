//! # Storage Instances
//!
//! A storage instance is the per-collection facade a backend plugs into.
//! `RxStorage` factories open instances over memory or the filesystem.

#[allow(clippy::module_inception)]
mod instance;
mod params;
mod storage;

pub use instance::StorageInstance;
pub use params::{InstanceOptions, StorageInstanceCreationParams};
pub use storage::{FileStorage, MemoryStorage, RxStorage};
