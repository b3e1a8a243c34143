//! # Storage Factories
//!
//! An `RxStorage` opens collection instances over one kind of backend.
//!
//! A factory hands out at most one live instance per collection. Opening a
//! collection that is already open returns the same instance, so every
//! writer goes through one sequencer and one set of document locks.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};

use tracing::debug;

use super::instance::StorageInstance;
use super::params::StorageInstanceCreationParams;
use crate::attachment::{LocalBlobBackend, MemoryBlobBackend};
use crate::backend::{FileDocumentBackend, MemoryDocumentBackend};
use crate::errors::{StorageError, StorageResult};

/// Factory of storage instances
pub trait RxStorage: Send + Sync {
    /// Short storage name for diagnostics
    fn name(&self) -> &'static str;

    /// Open the collection described by `params`
    fn create_storage_instance(
        &self,
        params: StorageInstanceCreationParams,
    ) -> StorageResult<Arc<StorageInstance>>;
}

type CollectionKey = (String, String);

/// Live instances by (database, collection)
#[derive(Debug, Default)]
struct InstanceRegistry {
    open: Mutex<HashMap<CollectionKey, Weak<StorageInstance>>>,
}

impl InstanceRegistry {
    /// Return the live instance of the collection, or create one.
    ///
    /// The registry lock is held across `create`, so two concurrent opens of
    /// one collection cannot both build an instance.
    fn open_or_create<F>(
        &self,
        params: StorageInstanceCreationParams,
        create: F,
    ) -> StorageResult<Arc<StorageInstance>>
    where
        F: FnOnce(StorageInstanceCreationParams) -> StorageResult<StorageInstance>,
    {
        let key = (params.database_name.clone(), params.collection_name.clone());
        let mut open = self
            .open
            .lock()
            .map_err(|_| StorageError::backend_unavailable("Lock poisoned"))?;

        if let Some(existing) = open.get(&key).and_then(Weak::upgrade) {
            if !existing.is_closed() {
                if existing.schema() != &params.schema || *existing.options() != params.options {
                    return Err(StorageError::InvalidRequest(format!(
                        "collection {}/{} is already open with a different schema or options",
                        key.0, key.1
                    )));
                }
                debug!(
                    target: "rxstorage::instance",
                    database = %key.0,
                    collection = %key.1,
                    "returning existing storage instance"
                );
                return Ok(existing);
            }
        }

        let instance = Arc::new(create(params)?);
        open.retain(|_, weak| weak.strong_count() > 0);
        open.insert(key, Arc::downgrade(&instance));
        Ok(instance)
    }
}

type MemoryCollection = (Arc<MemoryDocumentBackend>, Arc<MemoryBlobBackend>);

/// Volatile storage.
///
/// Collections live as long as the factory. Reopening a collection sees
/// the documents, events and attachments written through earlier instances.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    collections: Mutex<HashMap<CollectionKey, MemoryCollection>>,
    instances: InstanceRegistry,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RxStorage for MemoryStorage {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn create_storage_instance(
        &self,
        params: StorageInstanceCreationParams,
    ) -> StorageResult<Arc<StorageInstance>> {
        params.validate()?;
        self.instances.open_or_create(params, |params| {
            let key = (params.database_name.clone(), params.collection_name.clone());
            let (documents, blobs) = self
                .collections
                .lock()
                .map_err(|_| StorageError::backend_unavailable("Lock poisoned"))?
                .entry(key)
                .or_insert_with(|| {
                    (
                        Arc::new(MemoryDocumentBackend::new()),
                        Arc::new(MemoryBlobBackend::new()),
                    )
                })
                .clone();
            StorageInstance::open(params, documents, blobs)
        })
    }
}

/// Durable storage under a root directory.
///
/// Layout: `<root>/<database>/<collection>/{.lock, changes.log, local.log, attachments/}`
///
/// Within a process, instances are shared through the factory. Across
/// processes, the collection lock file admits one opener at a time.
#[derive(Debug)]
pub struct FileStorage {
    root: PathBuf,
    instances: InstanceRegistry,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            instances: InstanceRegistry::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one collection
    pub fn collection_dir(&self, database_name: &str, collection_name: &str) -> PathBuf {
        self.root.join(database_name).join(collection_name)
    }
}

impl RxStorage for FileStorage {
    fn name(&self) -> &'static str {
        "file"
    }

    fn create_storage_instance(
        &self,
        params: StorageInstanceCreationParams,
    ) -> StorageResult<Arc<StorageInstance>> {
        params.validate()?;
        self.instances.open_or_create(params, |params| {
            let dir = self.collection_dir(&params.database_name, &params.collection_name);
            let documents = Arc::new(FileDocumentBackend::open(&dir)?);
            let blobs = Arc::new(LocalBlobBackend::new(dir.join("attachments")));
            StorageInstance::open(params, documents, blobs)
        })
    }
}
