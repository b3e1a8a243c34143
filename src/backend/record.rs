//! Log record format
//!
//! ```text
//! +------------------+
//! | Record Length    | (u32 LE, whole record)
//! +------------------+
//! | Record Kind      | (u8)
//! +------------------+
//! | Payload          | (JSON bytes)
//! +------------------+
//! | Checksum         | (u32 LE)
//! +------------------+
//! ```
//!
//! Checksum is CRC32 over all bytes except the checksum itself.

use std::io;

use crc32fast::Hasher;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::changes::{ChangeEvent, ChangeOperation};
use crate::document::{LocalDocumentData, RxDocumentData};
use crate::errors::StorageResult;

/// Length + kind + checksum
const MIN_RECORD_SIZE: usize = 4 + 1 + 4;

/// Computes a CRC32 checksum over the provided data.
pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Verifies that the computed checksum matches the expected checksum.
pub fn verify_checksum(data: &[u8], expected: u32) -> bool {
    compute_checksum(data) == expected
}

/// What a record payload holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordKind {
    ChangeEvent = 1,
    LocalDocument = 2,
}

impl RecordKind {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::ChangeEvent),
            2 => Some(Self::LocalDocument),
            _ => None,
        }
    }
}

/// Change event payload. The replaced version is not written; replay
/// recovers it from the document's preceding event.
#[derive(Serialize)]
struct PersistedChangeEvent<'a> {
    sequence: u64,
    id: &'a str,
    collection: &'a str,
    operation: ChangeOperation,
    document_data: &'a RxDocumentData,
}

impl<'a> From<&'a ChangeEvent> for PersistedChangeEvent<'a> {
    fn from(event: &'a ChangeEvent) -> Self {
        Self {
            sequence: event.sequence,
            id: &event.id,
            collection: &event.collection,
            operation: event.operation,
            document_data: &event.document_data,
        }
    }
}

/// One framed log record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub kind: RecordKind,
    pub payload: Vec<u8>,
}

impl LogRecord {
    pub fn change_event(event: &ChangeEvent) -> StorageResult<Self> {
        Ok(Self {
            kind: RecordKind::ChangeEvent,
            payload: serde_json::to_vec(&PersistedChangeEvent::from(event))?,
        })
    }

    pub fn local_document(document: &LocalDocumentData) -> StorageResult<Self> {
        Ok(Self {
            kind: RecordKind::LocalDocument,
            payload: serde_json::to_vec(document)?,
        })
    }

    /// Decode the JSON payload
    pub fn decode<T: DeserializeOwned>(&self) -> StorageResult<T> {
        Ok(serde_json::from_slice(&self.payload)?)
    }

    /// Serialize the complete record to bytes.
    pub fn serialize(&self) -> Vec<u8> {
        let record_length = (MIN_RECORD_SIZE + self.payload.len()) as u32;

        let mut record = Vec::with_capacity(record_length as usize);
        record.extend_from_slice(&record_length.to_le_bytes());
        record.push(self.kind as u8);
        record.extend_from_slice(&self.payload);

        let checksum = compute_checksum(&record);
        record.extend_from_slice(&checksum.to_le_bytes());
        record
    }

    /// Deserialize a record from bytes, verifying checksum.
    ///
    /// Returns the record and the number of bytes consumed.
    pub fn deserialize(data: &[u8]) -> io::Result<(Self, usize)> {
        if data.len() < MIN_RECORD_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Record too short",
            ));
        }

        let record_length = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;

        if record_length < MIN_RECORD_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid record length: {}", record_length),
            ));
        }

        if data.len() < record_length {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "Record truncated: expected {} bytes, got {}",
                    record_length,
                    data.len()
                ),
            ));
        }

        let checksum_offset = record_length - 4;
        let stored_checksum = u32::from_le_bytes([
            data[checksum_offset],
            data[checksum_offset + 1],
            data[checksum_offset + 2],
            data[checksum_offset + 3],
        ]);

        if !verify_checksum(&data[..checksum_offset], stored_checksum) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Checksum mismatch: computed {:08x}, stored {:08x}",
                    compute_checksum(&data[..checksum_offset]),
                    stored_checksum
                ),
            ));
        }

        let kind = RecordKind::from_u8(data[4]).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unknown record kind: {}", data[4]),
            )
        })?;

        Ok((
            Self {
                kind,
                payload: data[5..checksum_offset].to_vec(),
            },
            record_length,
        ))
    }
}
