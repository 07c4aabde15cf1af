use super::{sort_newest_first, RecordDraft, VerificationStore};
use crate::models::VerificationRecord;
use crate::utils::VerifyError;
use chrono::Utc;
use std::sync::Mutex;

/// Process-local history. Lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<VerificationRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

impl VerificationStore for MemoryStore {
    fn record(&self, draft: RecordDraft) -> Result<VerificationRecord, VerifyError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| VerifyError::DatabaseError("history lock poisoned".to_string()))?;

        let id = records.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        let record = draft.into_record(id, Utc::now());
        records.push(record.clone());
        Ok(record)
    }

    fn history(&self) -> Result<Vec<VerificationRecord>, VerifyError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| VerifyError::DatabaseError("history lock poisoned".to_string()))?
            .clone();
        sort_newest_first(&mut records);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClassifierLabel, ExtractedFields, VerificationVerdict};

    fn draft(document_id: &str) -> RecordDraft {
        RecordDraft {
            document_id: document_id.to_string(),
            digest: "ab".to_string(),
            label: ClassifierLabel::Fake,
            class_name: "fake".to_string(),
            confidence: 0.5,
            fields: ExtractedFields::unknown(),
            verdict: VerificationVerdict::Accepted,
        }
    }

    #[test]
    fn test_ids_increase_and_history_is_newest_first() {
        let store = MemoryStore::new();
        assert!(store.history().unwrap().is_empty());

        let first = store.record(draft("first.png")).unwrap();
        let second = store.record(draft("second.png")).unwrap();
        assert_eq!((first.id, second.id), (1, 2));

        let history = store.history().unwrap();
        assert_eq!(history[0].document_id, "second.png");
        assert_eq!(history[1].document_id, "first.png");
    }
}
