//! In-memory materialization shared by both backends.
//!
//! The file backend rebuilds this from its logs on open.
//!
//! Each committed version is held once, inside its change event. Current
//! documents and the version an event replaced are looked up by sequence.

use std::collections::{BTreeMap, HashMap};

use crate::changes::ChangeEvent;
use crate::document::{LocalDocumentData, RxDocumentData};
use crate::errors::{StorageError, StorageResult};
use crate::revision::RevisionHistory;

#[derive(Debug)]
struct StoredEvent {
    /// Event with `previous_document_data` cleared
    event: ChangeEvent,
    /// Sequence of the event that committed the replaced version
    previous_sequence: Option<u64>,
}

#[derive(Debug, Default)]
pub(crate) struct BackendState {
    /// Sequence of each document's current version, ordered by id
    heads: BTreeMap<String, u64>,
    histories: HashMap<String, RevisionHistory>,
    /// Ascending by sequence, starting at 1
    events: Vec<StoredEvent>,
    local: BTreeMap<String, LocalDocumentData>,
}

impl BackendState {
    pub fn last_sequence(&self) -> u64 {
        self.events.last().map(|e| e.event.sequence).unwrap_or(0)
    }

    /// Check that an event can be applied without breaking sequence or lineage
    pub fn validate(&self, event: &ChangeEvent) -> StorageResult<()> {
        let expected = self.last_sequence() + 1;
        if event.sequence != expected {
            return Err(StorageError::corruption(format!(
                "Out of order change event: sequence {}, expected {}",
                event.sequence, expected
            )));
        }

        let head = self
            .histories
            .get(&event.id)
            .and_then(|h| h.current())
            .map(|r| r.height())
            .unwrap_or(0);
        if event.revision().height() != head + 1 {
            return Err(StorageError::corruption(format!(
                "Revision {} of document {} does not extend height {}",
                event.revision(),
                event.id,
                head
            )));
        }
        Ok(())
    }

    pub fn apply(&mut self, mut event: ChangeEvent) -> StorageResult<()> {
        self.validate(&event)?;

        self.histories
            .entry(event.id.clone())
            .or_insert_with(|| RevisionHistory::new(event.id.clone()))
            .push(event.revision().clone())
            .map_err(|e| StorageError::corruption(e.to_string()))?;

        let previous_sequence = self.heads.insert(event.id.clone(), event.sequence);
        event.previous_document_data = None;
        self.events.push(StoredEvent {
            event,
            previous_sequence,
        });
        Ok(())
    }

    fn stored(&self, sequence: u64) -> Option<&StoredEvent> {
        let index = usize::try_from(sequence.checked_sub(1)?).ok()?;
        self.events.get(index)
    }

    fn version(&self, sequence: u64) -> Option<&RxDocumentData> {
        self.stored(sequence).map(|s| &s.event.document_data)
    }

    fn materialize(&self, stored: &StoredEvent) -> ChangeEvent {
        let mut event = stored.event.clone();
        event.previous_document_data = stored
            .previous_sequence
            .and_then(|s| self.version(s))
            .cloned();
        event
    }

    pub fn get(&self, id: &str) -> Option<RxDocumentData> {
        self.heads.get(id).and_then(|&s| self.version(s)).cloned()
    }

    pub fn scan(&self) -> Vec<RxDocumentData> {
        self.heads
            .values()
            .filter_map(|&s| self.version(s))
            .cloned()
            .collect()
    }

    pub fn events_after(&self, sequence: u64, limit: Option<usize>) -> Vec<ChangeEvent> {
        let start = self.events.partition_point(|e| e.event.sequence <= sequence);
        self.events[start..]
            .iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|e| self.materialize(e))
            .collect()
    }

    pub fn events_before(&self, sequence: u64, limit: Option<usize>) -> Vec<ChangeEvent> {
        let end = self.events.partition_point(|e| e.event.sequence < sequence);
        self.events[..end]
            .iter()
            .rev()
            .take(limit.unwrap_or(usize::MAX))
            .map(|e| self.materialize(e))
            .collect()
    }

    pub fn revision_history(&self, id: &str) -> Option<RevisionHistory> {
        self.histories.get(id).cloned()
    }

    pub fn local_get(&self, id: &str) -> Option<LocalDocumentData> {
        self.local.get(id).cloned()
    }

    pub fn local_put(&mut self, document: LocalDocumentData) {
        self.local.insert(document.id.clone(), document);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentMeta, DocumentState};
    use crate::revision::Revision;
    use serde_json::json;

    fn event(sequence: u64, id: &str, rev: &str) -> ChangeEvent {
        let doc = RxDocumentData {
            id: id.to_string(),
            data: json!({"n": sequence}),
            revision: Revision::parse(rev).unwrap(),
            state: DocumentState::Active,
            attachments: BTreeMap::new(),
            meta: DocumentMeta::now(),
        };
        ChangeEvent::new(sequence, "test", doc, None)
    }

    fn populated() -> BackendState {
        let mut state = BackendState::default();
        state.apply(event(1, "a", "1-a")).unwrap();
        state.apply(event(2, "b", "1-b")).unwrap();
        state.apply(event(3, "a", "2-a")).unwrap();
        state.apply(event(4, "c", "1-c")).unwrap();
        state.apply(event(5, "b", "2-b")).unwrap();
        state
    }

    #[test]
    fn test_rejects_sequence_gap() {
        let mut state = BackendState::default();
        assert!(matches!(
            state.apply(event(2, "a", "1-a")),
            Err(StorageError::Corruption(_))
        ));
    }

    #[test]
    fn test_rejects_lineage_gap() {
        let mut state = BackendState::default();
        state.apply(event(1, "a", "1-a")).unwrap();
        assert!(state.apply(event(2, "a", "3-a")).is_err());
        assert_eq!(state.last_sequence(), 1);
    }

    #[test]
    fn test_events_after_and_before() {
        let state = populated();
        let after: Vec<u64> = state.events_after(3, None).iter().map(|e| e.sequence).collect();
        assert_eq!(after, vec![4, 5]);

        let before: Vec<u64> = state.events_before(3, None).iter().map(|e| e.sequence).collect();
        assert_eq!(before, vec![2, 1]);

        let limited: Vec<u64> = state.events_after(0, Some(2)).iter().map(|e| e.sequence).collect();
        assert_eq!(limited, vec![1, 2]);

        assert!(state.events_after(5, None).is_empty());
        assert!(state.events_before(1, None).is_empty());
    }

    #[test]
    fn test_previous_version_is_derived() {
        let state = populated();
        let events = state.events_after(0, None);

        assert!(events[0].previous_document_data.is_none());
        let replaced = events[2].previous_document_data.as_ref().unwrap();
        assert_eq!(replaced.revision.to_string(), "1-a");
        assert_eq!(replaced, &events[0].document_data);

        let latest = &state.events_before(6, Some(1))[0];
        assert_eq!(latest.sequence, 5);
        assert_eq!(
            latest.previous_document_data.as_ref().unwrap().revision.to_string(),
            "1-b"
        );
    }

    #[test]
    fn test_current_version_and_history() {
        let state = populated();
        assert_eq!(state.get("a").unwrap().revision.to_string(), "2-a");
        assert_eq!(state.revision_history("a").unwrap().len(), 2);
        assert_eq!(state.scan().len(), 3);
    }
}
