//! Append-only log files
//!
//! - Every append is fsynced before it returns
//! - Records are never rewritten in place; a failed append is cut off
//!   before the error is returned
//! - Every read validates the record checksum; any failure is corruption

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{error, warn};

use super::record::LogRecord;
use crate::errors::{StorageError, StorageResult};

/// Byte sink a log writer appends to
pub trait LogSink: Write + Send + fmt::Debug {
    /// Flush written bytes to stable storage
    fn sync(&mut self) -> io::Result<()>;

    /// Cut the sink back to `len` bytes
    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl LogSink for File {
    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)?;
        self.sync_data()
    }
}

/// Appends records to a log file.
///
/// A failed append is rolled back to the record start, so the log never
/// holds a record its caller saw fail. When the rollback fails too, the
/// writer refuses every later append.
#[derive(Debug)]
pub struct LogWriter<S: LogSink = File> {
    path: PathBuf,
    sink: S,
    current_offset: u64,
    failed: bool,
}

impl LogWriter<File> {
    /// Opens or creates the log file, creating parent directories.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;
        let current_offset = file.metadata()?.len();

        Ok(Self::with_sink(path, file, current_offset))
    }
}

impl<S: LogSink> LogWriter<S> {
    /// Writer over `sink`, which already holds `current_offset` bytes
    pub fn with_sink(path: &Path, sink: S, current_offset: u64) -> Self {
        Self {
            path: path.to_path_buf(),
            sink,
            current_offset,
            failed: false,
        }
    }

    /// Append a record and fsync. Returns the record's offset.
    pub fn append(&mut self, record: &LogRecord) -> StorageResult<u64> {
        if self.failed {
            return Err(StorageError::backend_unavailable(format!(
                "{}: log writer failed, reopen required",
                self.path.display()
            )));
        }

        let bytes = record.serialize();
        let offset = self.current_offset;

        let written = self
            .sink
            .write_all(&bytes)
            .and_then(|_| self.sink.flush())
            .and_then(|_| self.sink.sync());
        if let Err(e) = written {
            match self.sink.truncate(offset) {
                Ok(()) => {
                    warn!(target: "rxstorage::backend", path = %self.path.display(), offset, error = %e, "log append rolled back");
                }
                Err(rollback) => {
                    self.failed = true;
                    error!(
                        target: "rxstorage::backend",
                        path = %self.path.display(),
                        offset,
                        error = %e,
                        rollback_error = %rollback,
                        "log append could not be rolled back"
                    );
                }
            }
            return Err(e.into());
        }

        self.current_offset += bytes.len() as u64;
        Ok(offset)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current_offset(&self) -> u64 {
        self.current_offset
    }

    /// True once a rollback failed
    pub fn is_failed(&self) -> bool {
        self.failed
    }
}

/// Sequential reader over a log file
pub struct LogReader {
    path: PathBuf,
    reader: BufReader<File>,
    current_offset: u64,
    file_size: u64,
}

impl LogReader {
    /// Opens a log file for reading. A missing file reads as empty.
    pub fn open(path: &Path) -> StorageResult<Option<Self>> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let file_size = file.metadata()?.len();

        Ok(Some(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            current_offset: 0,
            file_size,
        }))
    }

    pub fn current_offset(&self) -> u64 {
        self.current_offset
    }

    pub fn has_more(&self) -> bool {
        self.current_offset < self.file_size
    }

    /// Read the next record, or `None` at end of file.
    pub fn read_next(&mut self) -> StorageResult<Option<LogRecord>> {
        if !self.has_more() {
            return Ok(None);
        }

        let mut len_buf = [0u8; 4];
        self.reader
            .read_exact(&mut len_buf)
            .map_err(|e| self.corruption("Failed to read record length", e))?;
        let record_length = u32::from_le_bytes(len_buf) as usize;

        if record_length < 4 || (record_length as u64) > self.file_size - self.current_offset {
            return Err(StorageError::corruption(format!(
                "{}: record at offset {} has invalid length {}",
                self.path.display(),
                self.current_offset,
                record_length
            )));
        }

        let mut buf = vec![0u8; record_length];
        buf[..4].copy_from_slice(&len_buf);
        if record_length > 4 {
            self.reader
                .read_exact(&mut buf[4..])
                .map_err(|e| self.corruption("Failed to read record", e))?;
        }

        let (record, consumed) =
            LogRecord::deserialize(&buf).map_err(|e| self.corruption("Invalid record", e))?;
        self.current_offset += consumed as u64;
        Ok(Some(record))
    }

    /// Read every remaining record
    pub fn read_all(&mut self) -> StorageResult<Vec<LogRecord>> {
        let mut records = Vec::new();
        while let Some(record) = self.read_next()? {
            records.push(record);
        }
        Ok(records)
    }

    fn corruption(&self, context: &str, e: std::io::Error) -> StorageError {
        StorageError::corruption(format!(
            "{}: {} at offset {}: {}",
            self.path.display(),
            context,
            self.current_offset,
            e
        ))
    }
}
