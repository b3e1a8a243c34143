//! CLI command implementations
//!
//! Each command opens the configured collection, runs one operation and
//! writes its outcome to stdout. Storage errors of the operation are
//! reported as `{"status":"error"}` lines; only configuration, input and
//! open failures end the process with an error.

use std::sync::Arc;

use crate::attachment::AttachmentPut;
use crate::changes::ChangeStreamOnceOptions;
use crate::document::{LocalDocumentWriteData, RxDocumentWriteData};
use crate::errors::StorageResult;
use crate::instance::{FileStorage, RxStorage, StorageInstance};
use crate::query::PreparedQuery;

use super::args::Command;
use super::config::StorageConfig;
use super::errors::CliResult;
use super::io::{read_bytes, read_lines, read_request, write_bytes, write_error, write_response};

/// Open the collection named by the configuration
pub fn open_instance(config: &StorageConfig) -> CliResult<Arc<StorageInstance>> {
    let storage = FileStorage::new(config.data_path());
    Ok(storage.create_storage_instance(config.creation_params()?)?)
}

/// Run one command against an open instance
pub fn run_command(instance: &StorageInstance, cmd: Command) -> CliResult<()> {
    match cmd {
        Command::BulkWrite => {
            let writes: Vec<RxDocumentWriteData> = read_lines()?;
            respond(instance.bulk_write(writes))
        }
        Command::BulkWriteLocal => {
            let writes: Vec<LocalDocumentWriteData> = read_lines()?;
            respond(instance.bulk_write_local(writes))
        }
        Command::Query { count } => {
            let query: PreparedQuery = read_request()?;
            if count {
                respond(instance.count(&query))
            } else {
                respond(instance.query(&query))
            }
        }
        Command::Changes { since, order, limit } => {
            let options = ChangeStreamOnceOptions {
                start_sequence: since,
                order: order.into(),
                limit,
            };
            respond(instance.change_stream_once(options))
        }
        Command::Get { ids, with_deleted } => {
            respond(instance.find_documents_by_id(ids.as_slice(), with_deleted))
        }
        Command::Attachment {
            document_id,
            attachment_id,
        } => match instance.get_attachment(&document_id, &attachment_id) {
            Ok(data) => write_bytes(&data),
            Err(e) => write_error(e.code(), &e.to_string()),
        },
        Command::PutAttachment {
            document_id,
            attachment_id,
            content_type,
        } => {
            let data = read_bytes()?;
            let put = AttachmentPut::new(attachment_id, content_type, data);
            let skip_if_same = instance.options().skip_if_same_attachments;
            respond(instance.put_attachment(&document_id, put, skip_if_same))
        }
        Command::History { document_id } => respond(instance.revision_history(&document_id)),
    }
}

fn respond<T: serde::Serialize>(result: StorageResult<T>) -> CliResult<()> {
    match result {
        Ok(data) => write_response(&data),
        Err(e) => write_error(e.code(), &e.to_string()),
    }
}
