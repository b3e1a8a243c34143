//! # Blob Backend Trait

use super::errors::AttachmentResult;

/// Byte-level storage for attachment payloads.
///
/// Keys are `/`-separated and never contain `..` components.
pub trait BlobBackend: Send + Sync + std::fmt::Debug {
    /// Write data under key, replacing any previous content
    fn write(&self, key: &str, data: &[u8]) -> AttachmentResult<()>;

    /// Read data under key
    fn read(&self, key: &str) -> AttachmentResult<Vec<u8>>;

    /// Delete blob at key
    fn delete(&self, key: &str) -> AttachmentResult<()>;

    /// Check if key exists
    fn exists(&self, key: &str) -> AttachmentResult<bool>;

    /// List keys directly under prefix
    fn list(&self, prefix: &str) -> AttachmentResult<Vec<String>>;
}
