//! # Local Filesystem Blob Backend

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use uuid::Uuid;

use super::backend::BlobBackend;
use super::errors::{AttachmentError, AttachmentResult};

/// Local filesystem blob backend.
///
/// Writes go to a temporary sibling file which is fsynced and then renamed
/// into place, so a reader never observes a partially written blob.
#[derive(Debug)]
pub struct LocalBlobBackend {
    root: PathBuf,
}

impl LocalBlobBackend {
    /// Create a new local backend rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, key: &str) -> AttachmentResult<PathBuf> {
        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if key.is_empty() || !safe {
            return Err(AttachmentError::InvalidPath(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

fn io_error(e: std::io::Error) -> AttachmentError {
    AttachmentError::Io(e.to_string())
}

impl BlobBackend for LocalBlobBackend {
    fn write(&self, key: &str, data: &[u8]) -> AttachmentResult<()> {
        let full_path = self.full_path(key)?;

        // Create parent directories
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        let tmp_path = full_path.with_extension(format!("tmp-{}", Uuid::new_v4()));
        let result = fs::File::create(&tmp_path)
            .and_then(|mut file| {
                file.write_all(data)?;
                file.sync_all()
            })
            .and_then(|_| fs::rename(&tmp_path, &full_path));

        if let Err(e) = result {
            let _ = fs::remove_file(&tmp_path);
            return Err(io_error(e));
        }
        Ok(())
    }

    fn read(&self, key: &str) -> AttachmentResult<Vec<u8>> {
        let full_path = self.full_path(key)?;

        fs::read(&full_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AttachmentError::BlobNotFound(key.to_string())
            } else {
                io_error(e)
            }
        })
    }

    fn delete(&self, key: &str) -> AttachmentResult<()> {
        let full_path = self.full_path(key)?;

        fs::remove_file(&full_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AttachmentError::BlobNotFound(key.to_string())
            } else {
                io_error(e)
            }
        })
    }

    fn exists(&self, key: &str) -> AttachmentResult<bool> {
        Ok(self.full_path(key)?.is_file())
    }

    fn list(&self, prefix: &str) -> AttachmentResult<Vec<String>> {
        let full_path = self.full_path(prefix)?;
        let mut results = Vec::new();

        if full_path.is_dir() {
            for entry in fs::read_dir(&full_path).map_err(io_error)? {
                let entry = entry.map_err(io_error)?;
                if !entry.path().is_file() {
                    continue;
                }
                if let Some(name) = entry.file_name().to_str() {
                    // In-flight temporaries are not blobs
                    if name.contains(".tmp-") {
                        continue;
                    }
                    results.push(format!("{}/{}", prefix, name));
                }
            }
        }

        results.sort();
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_read() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBlobBackend::new(temp.path());

        backend.write("doc/att/abc", b"hello").unwrap();
        let data = backend.read("doc/att/abc").unwrap();
        assert_eq!(data, b"hello");
    }

    #[test]
    fn test_overwrite() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBlobBackend::new(temp.path());

        backend.write("k", b"one").unwrap();
        backend.write("k", b"two").unwrap();
        assert_eq!(backend.read("k").unwrap(), b"two");
    }

    #[test]
    fn test_delete() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBlobBackend::new(temp.path());

        backend.write("delete/me", b"bye").unwrap();
        assert!(backend.exists("delete/me").unwrap());

        backend.delete("delete/me").unwrap();
        assert!(!backend.exists("delete/me").unwrap());
        assert!(matches!(
            backend.delete("delete/me"),
            Err(AttachmentError::BlobNotFound(_))
        ));
    }

    #[test]
    fn test_not_found() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBlobBackend::new(temp.path());

        let result = backend.read("nonexistent");
        assert!(matches!(result, Err(AttachmentError::BlobNotFound(_))));
    }

    #[test]
    fn test_rejects_escaping_paths() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBlobBackend::new(temp.path());

        assert!(matches!(
            backend.write("../outside", b"x"),
            Err(AttachmentError::InvalidPath(_))
        ));
        assert!(matches!(
            backend.read("/etc/passwd"),
            Err(AttachmentError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_list_prefix() {
        let temp = TempDir::new().unwrap();
        let backend = LocalBlobBackend::new(temp.path());

        backend.write("doc/att/d1", b"1").unwrap();
        backend.write("doc/att/d2", b"2").unwrap();
        backend.write("doc/other/d3", b"3").unwrap();

        let keys = backend.list("doc/att").unwrap();
        assert_eq!(keys, vec!["doc/att/d1".to_string(), "doc/att/d2".to_string()]);
        assert!(backend.list("missing").unwrap().is_empty());
    }
}
