//! # File Document Backend
//!
//! Durable backend over two append-only logs in one directory:
//!
//! - `changes.log` holds every change event; the latest event per
//!   document is its current version
//! - `local.log` holds local document versions; latest wins
//!
//! Both logs are replayed on open. Any checksum failure or out-of-order
//! record aborts the open with `StorageError::Corruption`.
//!
//! The directory is guarded by an exclusive `.lock` file held from open
//! until close, so at most one backend appends to the logs at a time.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, RwLock};

use fs2::FileExt;
use tracing::{info, warn};

use super::log::{LogReader, LogWriter};
use super::record::{LogRecord, RecordKind};
use super::state::BackendState;
use super::DocumentBackend;
use crate::changes::ChangeEvent;
use crate::document::{LocalDocumentData, RxDocumentData};
use crate::errors::{StorageError, StorageResult};
use crate::revision::RevisionHistory;

const CHANGES_LOG: &str = "changes.log";
const LOCAL_LOG: &str = "local.log";
const LOCK_FILE: &str = ".lock";

/// Log-structured file backend
#[derive(Debug)]
pub struct FileDocumentBackend {
    dir: PathBuf,
    /// Held while open; `None` once closed
    lock: Mutex<Option<File>>,
    state: RwLock<BackendState>,
    changes: Mutex<LogWriter>,
    local: Mutex<LogWriter>,
}

impl FileDocumentBackend {
    /// Open or create the backend in `dir`, replaying existing logs.
    pub fn open(dir: impl AsRef<Path>) -> StorageResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        let lock = acquire_lock(&dir)?;

        let changes_path = dir.join(CHANGES_LOG);
        let local_path = dir.join(LOCAL_LOG);
        let mut state = BackendState::default();

        let mut events = 0usize;
        if let Some(mut reader) = LogReader::open(&changes_path)? {
            while let Some(record) = reader.read_next()? {
                expect_kind(&record, RecordKind::ChangeEvent, &changes_path)?;
                state.apply(record.decode::<ChangeEvent>()?)?;
                events += 1;
            }
        }

        let mut locals = 0usize;
        if let Some(mut reader) = LogReader::open(&local_path)? {
            while let Some(record) = reader.read_next()? {
                expect_kind(&record, RecordKind::LocalDocument, &local_path)?;
                state.local_put(record.decode::<LocalDocumentData>()?);
                locals += 1;
            }
        }

        info!(
            target: "rxstorage::backend",
            dir = %dir.display(),
            events,
            local_records = locals,
            last_sequence = state.last_sequence(),
            "file backend replayed"
        );

        Ok(Self {
            lock: Mutex::new(Some(lock)),
            changes: Mutex::new(LogWriter::open(&changes_path)?),
            local: Mutex::new(LogWriter::open(&local_path)?),
            state: RwLock::new(state),
            dir,
        })
    }

    /// Directory holding the logs
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Guard over the directory lock; fails once the backend is closed
    fn writable(&self) -> StorageResult<MutexGuard<'_, Option<File>>> {
        let lock = self.lock.lock().map_err(|_| poisoned())?;
        if lock.is_none() {
            return Err(StorageError::backend_unavailable(format!(
                "{}: backend is closed",
                self.dir.display()
            )));
        }
        Ok(lock)
    }
}

fn acquire_lock(dir: &Path) -> StorageResult<File> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(dir.join(LOCK_FILE))?;
    FileExt::try_lock_exclusive(&file).map_err(|_| {
        StorageError::backend_unavailable(format!(
            "collection at '{}' is already in use",
            dir.display()
        ))
    })?;
    Ok(file)
}

fn expect_kind(record: &LogRecord, kind: RecordKind, path: &Path) -> StorageResult<()> {
    if record.kind != kind {
        return Err(StorageError::corruption(format!(
            "{}: unexpected {:?} record",
            path.display(),
            record.kind
        )));
    }
    Ok(())
}

fn poisoned() -> StorageError {
    StorageError::backend_unavailable("Lock poisoned")
}

impl DocumentBackend for FileDocumentBackend {
    fn get(&self, id: &str) -> StorageResult<Option<RxDocumentData>> {
        Ok(self.state.read().map_err(|_| poisoned())?.get(id))
    }

    fn scan(&self) -> StorageResult<Vec<RxDocumentData>> {
        Ok(self.state.read().map_err(|_| poisoned())?.scan())
    }

    fn commit(&self, event: &ChangeEvent) -> StorageResult<()> {
        let _lock = self.writable()?;
        let mut state = self.state.write().map_err(|_| poisoned())?;
        state.validate(event)?;

        // Durable before visible
        let record = LogRecord::change_event(event)?;
        self.changes
            .lock()
            .map_err(|_| poisoned())?
            .append(&record)?;

        state.apply(event.clone())
    }

    fn events_after(&self, sequence: u64, limit: Option<usize>) -> StorageResult<Vec<ChangeEvent>> {
        Ok(self
            .state
            .read()
            .map_err(|_| poisoned())?
            .events_after(sequence, limit))
    }

    fn events_before(&self, sequence: u64, limit: Option<usize>) -> StorageResult<Vec<ChangeEvent>> {
        Ok(self
            .state
            .read()
            .map_err(|_| poisoned())?
            .events_before(sequence, limit))
    }

    fn last_sequence(&self) -> StorageResult<u64> {
        Ok(self.state.read().map_err(|_| poisoned())?.last_sequence())
    }

    fn revision_history(&self, id: &str) -> StorageResult<Option<RevisionHistory>> {
        Ok(self.state.read().map_err(|_| poisoned())?.revision_history(id))
    }

    fn local_get(&self, id: &str) -> StorageResult<Option<LocalDocumentData>> {
        Ok(self.state.read().map_err(|_| poisoned())?.local_get(id))
    }

    fn local_put(&self, document: &LocalDocumentData) -> StorageResult<()> {
        let _lock = self.writable()?;
        let mut state = self.state.write().map_err(|_| poisoned())?;
        let record = LogRecord::local_document(document)?;
        self.local.lock().map_err(|_| poisoned())?.append(&record)?;
        state.local_put(document.clone());
        Ok(())
    }

    fn close(&self) -> StorageResult<()> {
        let mut lock = self.lock.lock().map_err(|_| poisoned())?;
        if let Some(file) = lock.take() {
            if let Err(e) = FileExt::unlock(&file) {
                warn!(target: "rxstorage::backend", dir = %self.dir.display(), error = %e, "failed to unlock collection");
            }
        }
        Ok(())
    }
}
