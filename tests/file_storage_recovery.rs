//! File Storage Recovery Tests
//!
//! - Committed documents, events and attachments survive reopen
//! - Sequencing continues after the last durable event
//! - Corrupted logs fail open instead of being silently skipped

use std::fs;
use std::sync::Arc;

use rxstorage::attachment::{AttachmentPut, AttachmentWrite};
use rxstorage::backend::FileDocumentBackend;
use rxstorage::document::LocalDocumentWriteData;
use rxstorage::schema::{FieldDef, RxJsonSchema};
use rxstorage::{
    ChangeStreamOnceOptions, ChangeStreamOptions, FileStorage, RxDocumentWriteData, RxStorage,
    StorageError, StorageInstanceCreationParams,
};
use serde_json::json;
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

fn params() -> StorageInstanceCreationParams {
    StorageInstanceCreationParams::new("appdb", "notes", RxJsonSchema::permissive())
}

fn create_temp_data_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

// =============================================================================
// Reopen
// =============================================================================

#[test]
fn test_documents_survive_reopen() {
    let temp = create_temp_data_dir();
    let storage = FileStorage::new(temp.path());

    let revision = {
        let instance = storage.create_storage_instance(params()).unwrap();
        let doc = instance
            .bulk_write(vec![RxDocumentWriteData::new("n1", json!({"text": "hello"}))
                .with_attachment("img", AttachmentWrite::payload("image/png", vec![7u8; 32]))])
            .unwrap()
            .success
            .remove("n1")
            .unwrap();
        let doc = instance
            .bulk_write(vec![doc.to_write().with_data(json!({"text": "hello again"}))])
            .unwrap()
            .success
            .remove("n1")
            .unwrap();
        instance
            .bulk_write_local(vec![LocalDocumentWriteData::new("cursor", json!({"at": 2}))])
            .unwrap();
        instance.close();
        doc.revision
    };

    let instance = storage.create_storage_instance(params()).unwrap();
    assert_eq!(instance.last_sequence(), 2);

    let doc = instance.find_documents_by_id(&["n1"], false).unwrap().remove(0);
    assert_eq!(doc.revision, revision);
    assert_eq!(doc.data, json!({"text": "hello again"}));
    assert_eq!(instance.get_attachment("n1", "img").unwrap(), vec![7u8; 32]);
    assert_eq!(instance.revision_history("n1").unwrap().len(), 2);

    let local = instance
        .find_local_documents_by_id(&["cursor"], false)
        .unwrap();
    assert_eq!(local[0].data, json!({"at": 2}));

    // Sequencing continues
    instance
        .bulk_write(vec![RxDocumentWriteData::new("n2", json!({}))])
        .unwrap();
    let events = instance
        .change_stream_once(ChangeStreamOnceOptions::asc(0))
        .unwrap();
    let sequences: Vec<u64> = events.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3]);
}

#[test]
fn test_stale_write_is_rejected_after_reopen() {
    let temp = create_temp_data_dir();
    let storage = FileStorage::new(temp.path());

    let first = {
        let instance = storage.create_storage_instance(params()).unwrap();
        let first = instance
            .bulk_write(vec![RxDocumentWriteData::new("n1", json!({"v": 1}))])
            .unwrap()
            .success
            .remove("n1")
            .unwrap();
        instance
            .bulk_write(vec![first.to_write().with_data(json!({"v": 2}))])
            .unwrap();
        first
    };

    let instance = storage.create_storage_instance(params()).unwrap();
    let response = instance
        .bulk_write(vec![first.to_write().with_data(json!({"v": 3}))])
        .unwrap();
    assert_eq!(response.error["n1"].status, 409);
}

#[tokio::test]
async fn test_resume_after_reopen() {
    let temp = create_temp_data_dir();
    let storage = FileStorage::new(temp.path());
    {
        let instance = storage.create_storage_instance(params()).unwrap();
        for id in ["a", "b", "c"] {
            instance
                .bulk_write(vec![RxDocumentWriteData::new(id, json!({}))])
                .unwrap();
        }
    }

    let instance = storage.create_storage_instance(params()).unwrap();
    let mut stream = instance
        .change_stream(ChangeStreamOptions::resume_after(1))
        .unwrap();
    let replayed: Vec<String> = stream.drain().into_iter().map(|e| e.id).collect();
    assert_eq!(replayed, vec!["b", "c"]);
}

#[test]
fn test_attachment_put_and_remove_persist() {
    let temp = create_temp_data_dir();
    let storage = FileStorage::new(temp.path());
    {
        let instance = storage.create_storage_instance(params()).unwrap();
        instance
            .bulk_write(vec![RxDocumentWriteData::new("n1", json!({}))])
            .unwrap();
        instance
            .put_attachment("n1", AttachmentPut::new("a", "text/plain", b"keep".to_vec()), true)
            .unwrap();
        instance
            .put_attachment("n1", AttachmentPut::new("b", "text/plain", b"drop".to_vec()), true)
            .unwrap();
        instance.remove_attachment("n1", "b").unwrap();
    }

    let instance = storage.create_storage_instance(params()).unwrap();
    let attachments = instance.list_attachments("n1").unwrap();
    assert_eq!(attachments.keys().collect::<Vec<_>>(), vec!["a"]);
    assert_eq!(instance.get_attachment("n1", "a").unwrap(), b"keep");

    let blob_dir = storage
        .collection_dir("appdb", "notes")
        .join("attachments")
        .join("n1")
        .join("b");
    let leftovers = fs::read_dir(&blob_dir).map(|d| d.count()).unwrap_or(0);
    assert_eq!(leftovers, 0);
}

// =============================================================================
// Exclusive Access
// =============================================================================

#[test]
fn test_open_collection_is_shared() {
    let temp = create_temp_data_dir();
    let storage = FileStorage::new(temp.path());

    {
        let a = storage.create_storage_instance(params()).unwrap();
        let b = storage.create_storage_instance(params()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        a.bulk_write(vec![RxDocumentWriteData::new("x", json!({}))])
            .unwrap();
        let response = b
            .bulk_write(vec![RxDocumentWriteData::new("y", json!({}))])
            .unwrap();
        assert!(response.is_complete_success());
    }

    let instance = storage.create_storage_instance(params()).unwrap();
    let events = instance
        .change_stream_once(ChangeStreamOnceOptions::asc(0))
        .unwrap();
    let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["x", "y"]);
}

#[test]
fn test_second_opener_of_directory_is_rejected() {
    let temp = create_temp_data_dir();
    let storage = FileStorage::new(temp.path());
    let instance = storage.create_storage_instance(params()).unwrap();
    instance
        .bulk_write(vec![RxDocumentWriteData::new("x", json!({}))])
        .unwrap();

    // Another factory stands in for another process
    let other = FileStorage::new(temp.path());
    assert!(matches!(
        other.create_storage_instance(params()),
        Err(StorageError::BackendUnavailable(_))
    ));
    assert!(matches!(
        FileDocumentBackend::open(storage.collection_dir("appdb", "notes")),
        Err(StorageError::BackendUnavailable(_))
    ));

    // The rejected openers appended nothing
    drop(instance);
    let reopened = other.create_storage_instance(params()).unwrap();
    assert_eq!(reopened.last_sequence(), 1);
}

#[test]
fn test_close_releases_collection() {
    let temp = create_temp_data_dir();
    let storage = FileStorage::new(temp.path());

    let closed = storage.create_storage_instance(params()).unwrap();
    closed
        .bulk_write(vec![RxDocumentWriteData::new("x", json!({}))])
        .unwrap();
    closed.close();

    let reopened = storage.create_storage_instance(params()).unwrap();
    assert!(!Arc::ptr_eq(&closed, &reopened));
    reopened
        .bulk_write(vec![RxDocumentWriteData::new("y", json!({}))])
        .unwrap();
    assert_eq!(reopened.last_sequence(), 2);
    assert!(matches!(
        closed.bulk_write(vec![RxDocumentWriteData::new("z", json!({}))]),
        Err(StorageError::Closed(_))
    ));
}

#[test]
fn test_reopen_with_different_schema_while_open_is_rejected() {
    let temp = create_temp_data_dir();
    let storage = FileStorage::new(temp.path());
    let _open = storage.create_storage_instance(params()).unwrap();

    let strict = RxJsonSchema::new(1, Default::default()).with_field("text", FieldDef::required_string());
    let result = storage.create_storage_instance(StorageInstanceCreationParams::new("appdb", "notes", strict));
    assert!(matches!(result, Err(StorageError::InvalidRequest(_))));
}

// =============================================================================
// Corruption
// =============================================================================

#[test]
fn test_corrupted_change_log_fails_open() {
    let temp = create_temp_data_dir();
    let storage = FileStorage::new(temp.path());
    {
        let instance = storage.create_storage_instance(params()).unwrap();
        instance
            .bulk_write(vec![RxDocumentWriteData::new("n1", json!({"text": "x"}))])
            .unwrap();
    }

    let log = storage.collection_dir("appdb", "notes").join("changes.log");
    let mut bytes = fs::read(&log).unwrap();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0xFF;
    fs::write(&log, bytes).unwrap();

    let result = storage.create_storage_instance(params());
    assert!(matches!(result, Err(StorageError::Corruption(_))));
}

#[test]
fn test_schema_is_enforced_on_file_storage() {
    let temp = create_temp_data_dir();
    let storage = FileStorage::new(temp.path());
    let schema = RxJsonSchema::new(1, Default::default()).with_field("text", FieldDef::required_string());
    let instance = storage
        .create_storage_instance(StorageInstanceCreationParams::new("appdb", "strict", schema))
        .unwrap();

    let result = instance.bulk_write(vec![RxDocumentWriteData::new("n1", json!({"text": 1}))]);
    assert!(matches!(result, Err(StorageError::Schema { .. })));
    assert_eq!(instance.last_sequence(), 0);
}
