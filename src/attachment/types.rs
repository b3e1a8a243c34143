//! # Attachment Types

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Stored metadata for one attachment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttachmentData {
    /// MIME type supplied by the writer
    pub content_type: String,
    /// SHA-256 of the payload, lowercase hex
    pub digest: String,
    /// Payload size in bytes
    pub length: u64,
}

impl AttachmentData {
    /// Build metadata for a payload
    pub fn for_payload(content_type: impl Into<String>, data: &[u8]) -> Self {
        Self {
            content_type: content_type.into(),
            digest: compute_digest(data),
            length: data.len() as u64,
        }
    }
}

/// Attachment entry of an incoming write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttachmentWrite {
    /// Keep the stored attachment as is
    Stub(AttachmentData),
    /// Store new content
    Payload {
        content_type: String,
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
    },
}

impl AttachmentWrite {
    pub fn payload(content_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self::Payload {
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    pub fn is_stub(&self) -> bool {
        matches!(self, Self::Stub(_))
    }
}

impl From<AttachmentData> for AttachmentWrite {
    fn from(meta: AttachmentData) -> Self {
        Self::Stub(meta)
    }
}

/// Single attachment put against a document's current revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentPut {
    pub id: String,
    pub content_type: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl AttachmentPut {
    pub fn new(
        id: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            id: id.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }
}

/// Calculate SHA-256 digest of a payload
pub fn compute_digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_sha256_hex() {
        let digest = compute_digest(b"hello world");
        assert_eq!(
            digest,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_metadata_for_payload() {
        let meta = AttachmentData::for_payload("text/plain", b"abc");
        assert_eq!(meta.length, 3);
        assert_eq!(meta.digest, compute_digest(b"abc"));
    }

    #[test]
    fn test_payload_serializes_as_base64() {
        let write = AttachmentWrite::payload("text/plain", b"hi".to_vec());
        let json = serde_json::to_value(&write).unwrap();
        assert_eq!(json["kind"], "payload");
        assert_eq!(json["data"], "aGk=");

        let back: AttachmentWrite = serde_json::from_value(json).unwrap();
        assert_eq!(back, write);
    }

    #[test]
    fn test_stub_deserializes() {
        let json = serde_json::json!({
            "kind": "stub",
            "content_type": "image/png",
            "digest": "abc",
            "length": 10
        });
        let write: AttachmentWrite = serde_json::from_value(json).unwrap();
        assert!(write.is_stub());
    }
}
