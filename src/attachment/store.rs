//! # Attachment Store
//!
//! Resolves the attachment map of an incoming write against the stored
//! document and drives blob I/O around the commit:
//!
//! 1. `plan` - validate stubs, compute digests, decide which blobs to write
//! 2. `apply` - write new blobs before the document commit
//! 3. `finalize` - delete superseded blobs after the commit
//! 4. `abort` - delete freshly written blobs when the commit failed
//!
//! Blob keys are `<document_id>/<attachment_id>/<digest>`, so a commit
//! never overwrites a blob that the stored revision still references.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::sync::Arc;

use tracing::{debug, warn};

use super::backend::BlobBackend;
use super::errors::{AttachmentError, AttachmentResult};
use super::types::{compute_digest, AttachmentData, AttachmentWrite};

/// Blob write scheduled by a plan
#[derive(Debug)]
pub struct BlobWrite<'a> {
    pub key: String,
    pub data: &'a [u8],
    /// False when the key is already referenced by the stored revision
    fresh: bool,
}

/// Outcome of resolving an incoming attachment map
#[derive(Debug, Default)]
pub struct AttachmentPlan<'a> {
    resolved: BTreeMap<String, AttachmentData>,
    writes: Vec<BlobWrite<'a>>,
    superseded: Vec<String>,
    skipped: usize,
}

impl<'a> AttachmentPlan<'a> {
    /// Attachment metadata the new revision will carry
    pub fn resolved(&self) -> &BTreeMap<String, AttachmentData> {
        &self.resolved
    }

    pub fn into_resolved(self) -> BTreeMap<String, AttachmentData> {
        self.resolved
    }

    pub fn writes(&self) -> &[BlobWrite<'a>] {
        &self.writes
    }

    /// Blob keys that become unreferenced once the new revision commits
    pub fn superseded(&self) -> &[String] {
        &self.superseded
    }

    /// Payload writes skipped because the stored digest already matched
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

/// Attachment store over a blob backend
#[derive(Debug, Clone)]
pub struct AttachmentStore {
    backend: Arc<dyn BlobBackend>,
}

impl AttachmentStore {
    pub fn new(backend: Arc<dyn BlobBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn BlobBackend> {
        &self.backend
    }

    /// Check that every stub in `incoming` matches stored metadata exactly.
    pub fn check_stubs(
        prior: &BTreeMap<String, AttachmentData>,
        incoming: &BTreeMap<String, AttachmentWrite>,
    ) -> AttachmentResult<()> {
        for (attachment_id, write) in incoming {
            if let AttachmentWrite::Stub(meta) = write {
                match prior.get(attachment_id) {
                    Some(stored) if stored == meta => {}
                    Some(_) => {
                        return Err(AttachmentError::InvalidStub {
                            attachment_id: attachment_id.clone(),
                            reason: "stub does not match stored metadata".to_string(),
                        })
                    }
                    None => {
                        return Err(AttachmentError::InvalidStub {
                            attachment_id: attachment_id.clone(),
                            reason: "stub references an attachment that is not stored"
                                .to_string(),
                        })
                    }
                }
            }
        }
        Ok(())
    }

    /// Resolve `incoming` against `prior`.
    ///
    /// Stubs must already have passed `check_stubs`. Attachments present in
    /// `prior` but absent from `incoming` are removed by the new revision.
    pub fn plan<'a>(
        &self,
        document_id: &str,
        prior: &BTreeMap<String, AttachmentData>,
        incoming: &'a BTreeMap<String, AttachmentWrite>,
        skip_if_same: bool,
    ) -> AttachmentPlan<'a> {
        let mut plan = AttachmentPlan::default();
        let prior_keys: BTreeSet<String> = prior
            .iter()
            .map(|(id, meta)| blob_key(document_id, id, &meta.digest))
            .collect();

        for (attachment_id, write) in incoming {
            match write {
                AttachmentWrite::Stub(meta) => {
                    plan.resolved.insert(attachment_id.clone(), meta.clone());
                }
                AttachmentWrite::Payload { content_type, data } => {
                    let meta = AttachmentData {
                        content_type: content_type.clone(),
                        digest: compute_digest(data),
                        length: data.len() as u64,
                    };
                    let stored = prior.get(attachment_id);

                    if skip_if_same && stored.map(|s| s.digest == meta.digest).unwrap_or(false) {
                        plan.skipped += 1;
                    } else {
                        let key = blob_key(document_id, attachment_id, &meta.digest);
                        plan.writes.push(BlobWrite {
                            fresh: !prior_keys.contains(&key),
                            key,
                            data: data.as_slice(),
                        });
                    }

                    if let Some(stored) = stored {
                        if stored.digest != meta.digest {
                            plan.superseded
                                .push(blob_key(document_id, attachment_id, &stored.digest));
                        }
                    }
                    plan.resolved.insert(attachment_id.clone(), meta);
                }
            }
        }

        for (attachment_id, stored) in prior {
            if !incoming.contains_key(attachment_id) {
                plan.superseded
                    .push(blob_key(document_id, attachment_id, &stored.digest));
            }
        }

        plan
    }

    /// Write every scheduled blob. Independent blobs are written in parallel.
    pub fn apply(&self, plan: &AttachmentPlan<'_>) -> AttachmentResult<()> {
        match plan.writes.as_slice() {
            [] => Ok(()),
            [single] => self.backend.write(&single.key, single.data),
            writes => std::thread::scope(|scope| {
                let handles: Vec<_> = writes
                    .iter()
                    .map(|w| scope.spawn(move || self.backend.write(&w.key, w.data)))
                    .collect();

                let mut first_error = None;
                for handle in handles {
                    let result = handle.join().unwrap_or_else(|_| {
                        Err(AttachmentError::Internal("blob writer panicked".to_string()))
                    });
                    if let Err(e) = result {
                        first_error.get_or_insert(e);
                    }
                }
                first_error.map_or(Ok(()), Err)
            }),
        }
    }

    /// Remove blobs written by `apply` that no committed revision references.
    pub fn abort(&self, plan: &AttachmentPlan<'_>) {
        for write in plan.writes.iter().filter(|w| w.fresh) {
            match self.backend.delete(&write.key) {
                Ok(()) | Err(AttachmentError::BlobNotFound(_)) => {}
                Err(e) => {
                    warn!(target: "rxstorage::attachment", key = %write.key, error = %e, "failed to remove blob of aborted write");
                }
            }
        }
    }

    /// Delete blobs the committed revision no longer references.
    ///
    /// Failures leave orphans behind but never fail the write. Returns the
    /// number of blobs removed.
    pub fn finalize(&self, document_id: &str, plan: &AttachmentPlan<'_>) -> usize {
        let mut removed = 0;
        for key in &plan.superseded {
            match self.backend.delete(key) {
                Ok(()) => removed += 1,
                Err(AttachmentError::BlobNotFound(_)) => {}
                Err(e) => {
                    warn!(target: "rxstorage::attachment", document_id, key = %key, error = %e, "orphaned attachment blob");
                }
            }
        }
        if removed > 0 {
            debug!(target: "rxstorage::attachment", document_id, removed, "removed superseded blobs");
        }
        removed
    }

    /// Read a payload and verify it against its stored digest
    pub fn read(
        &self,
        document_id: &str,
        attachment_id: &str,
        meta: &AttachmentData,
    ) -> AttachmentResult<Vec<u8>> {
        let key = blob_key(document_id, attachment_id, &meta.digest);
        let data = self.backend.read(&key)?;
        let actual = compute_digest(&data);
        if actual != meta.digest {
            return Err(AttachmentError::DigestMismatch {
                key,
                expected: meta.digest.clone(),
                actual,
            });
        }
        Ok(data)
    }
}

/// Blob key for one attachment version
pub fn blob_key(document_id: &str, attachment_id: &str, digest: &str) -> String {
    format!("{}/{}", attachment_prefix(document_id, attachment_id), digest)
}

fn attachment_prefix(document_id: &str, attachment_id: &str) -> String {
    format!("{}/{}", encode_component(document_id), encode_component(attachment_id))
}

/// Percent-encode everything outside `[A-Za-z0-9_-]` so ids map to safe path segments
fn encode_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        if b.is_ascii_alphanumeric() || b == b'_' || b == b'-' {
            out.push(b as char);
        } else {
            let _ = write!(out, "%{:02X}", b);
        }
    }
    if out.is_empty() {
        out.push('%');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::MemoryBlobBackend;

    fn store() -> (AttachmentStore, Arc<MemoryBlobBackend>) {
        let backend = Arc::new(MemoryBlobBackend::new());
        (AttachmentStore::new(backend.clone()), backend)
    }

    fn incoming(entries: Vec<(&str, AttachmentWrite)>) -> BTreeMap<String, AttachmentWrite> {
        entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn test_blob_key_encoding() {
        assert_eq!(blob_key("doc1", "photo", "abc"), "doc1/photo/abc");
        assert_eq!(blob_key("a/b", "x.png", "d"), "a%2Fb/x%2Epng/d");
        assert_eq!(blob_key("..", "", "d"), "%2E%2E/%/d");
    }

    #[test]
    fn test_plan_new_payload() {
        let (store, _) = store();
        let prior = BTreeMap::new();
        let writes = incoming(vec![("a", AttachmentWrite::payload("text/plain", b"hi".to_vec()))]);

        let plan = store.plan("doc", &prior, &writes, true);
        assert_eq!(plan.writes().len(), 1);
        assert!(plan.superseded().is_empty());
        assert_eq!(plan.resolved()["a"].length, 2);
    }

    #[test]
    fn test_plan_skips_identical_payload() {
        let (store, _) = store();
        let mut prior = BTreeMap::new();
        prior.insert("a".to_string(), AttachmentData::for_payload("text/plain", b"hi"));
        let writes = incoming(vec![("a", AttachmentWrite::payload("text/plain", b"hi".to_vec()))]);

        let plan = store.plan("doc", &prior, &writes, true);
        assert!(plan.writes().is_empty());
        assert_eq!(plan.skipped(), 1);

        let plan = store.plan("doc", &prior, &writes, false);
        assert_eq!(plan.writes().len(), 1);
        assert_eq!(plan.skipped(), 0);
    }

    #[test]
    fn test_plan_supersedes_changed_and_removed() {
        let (store, _) = store();
        let mut prior = BTreeMap::new();
        prior.insert("a".to_string(), AttachmentData::for_payload("text/plain", b"old"));
        prior.insert("b".to_string(), AttachmentData::for_payload("text/plain", b"gone"));
        let writes = incoming(vec![("a", AttachmentWrite::payload("text/plain", b"new".to_vec()))]);

        let plan = store.plan("doc", &prior, &writes, true);
        assert_eq!(plan.superseded().len(), 2);
        assert!(!plan.resolved().contains_key("b"));
    }

    #[test]
    fn test_check_stubs() {
        let mut prior = BTreeMap::new();
        let meta = AttachmentData::for_payload("text/plain", b"x");
        prior.insert("a".to_string(), meta.clone());

        let ok = incoming(vec![("a", AttachmentWrite::Stub(meta.clone()))]);
        assert!(AttachmentStore::check_stubs(&prior, &ok).is_ok());

        let mut changed = meta.clone();
        changed.length = 99;
        let bad = incoming(vec![("a", AttachmentWrite::Stub(changed))]);
        assert!(matches!(
            AttachmentStore::check_stubs(&prior, &bad),
            Err(AttachmentError::InvalidStub { .. })
        ));

        let unknown = incoming(vec![("z", AttachmentWrite::Stub(meta))]);
        assert!(AttachmentStore::check_stubs(&prior, &unknown).is_err());
    }

    #[test]
    fn test_apply_parallel_and_read_back() {
        let (store, backend) = store();
        let prior = BTreeMap::new();
        let writes = incoming(vec![
            ("a", AttachmentWrite::payload("text/plain", b"one".to_vec())),
            ("b", AttachmentWrite::payload("text/plain", b"two".to_vec())),
            ("c", AttachmentWrite::payload("text/plain", b"three".to_vec())),
        ]);

        let plan = store.plan("doc", &prior, &writes, true);
        store.apply(&plan).unwrap();
        assert_eq!(backend.write_count(), 3);

        let meta = plan.resolved()["b"].clone();
        assert_eq!(store.read("doc", "b", &meta).unwrap(), b"two");
    }

    #[test]
    fn test_abort_keeps_referenced_blobs() {
        let (store, backend) = store();
        let meta = AttachmentData::for_payload("text/plain", b"same");
        backend.write(&blob_key("doc", "a", &meta.digest), b"same").unwrap();

        let mut prior = BTreeMap::new();
        prior.insert("a".to_string(), meta);
        let writes = incoming(vec![
            ("a", AttachmentWrite::payload("text/plain", b"same".to_vec())),
            ("b", AttachmentWrite::payload("text/plain", b"new".to_vec())),
        ]);

        let plan = store.plan("doc", &prior, &writes, false);
        store.apply(&plan).unwrap();
        store.abort(&plan);

        assert_eq!(backend.len(), 1);
    }

    #[test]
    fn test_read_detects_digest_mismatch() {
        let (store, backend) = store();
        let meta = AttachmentData::for_payload("text/plain", b"original");
        backend.write(&blob_key("doc", "a", &meta.digest), b"tampered").unwrap();

        assert!(matches!(
            store.read("doc", "a", &meta),
            Err(AttachmentError::DigestMismatch { .. })
        ));
    }
}
