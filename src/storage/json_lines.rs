use super::{sort_newest_first, RecordDraft, VerificationStore};
use crate::models::VerificationRecord;
use crate::utils::VerifyError;
use chrono::Utc;
use log::{info, warn};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::PathBuf;
use std::sync::Mutex;

/// Append-only history file, one JSON record per line.
#[derive(Debug)]
pub struct JsonLinesStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesStore {
    /// Creates the parent directory if needed. The file itself appears on first write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, VerifyError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                VerifyError::DatabaseError(format!("Failed to create {:?}: {}", parent, e))
            })?;
        }
        info!("Verification history at {:?}", path);

        Ok(JsonLinesStore {
            path,
            write_lock: Mutex::new(()),
        })
    }

    fn read_all(&self) -> Result<Vec<VerificationRecord>, VerifyError> {
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(VerifyError::DatabaseError(format!(
                    "Failed to open {:?}: {}",
                    self.path, e
                )))
            }
        };

        let mut records = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| {
                VerifyError::DatabaseError(format!("Failed to read {:?}: {}", self.path, e))
            })?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<VerificationRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping malformed history line {}: {}", index + 1, e),
            }
        }
        Ok(records)
    }
}

impl VerificationStore for JsonLinesStore {
    fn record(&self, draft: RecordDraft) -> Result<VerificationRecord, VerifyError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| VerifyError::DatabaseError("history lock poisoned".to_string()))?;

        let id = self.read_all()?.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        let record = draft.into_record(id, Utc::now());

        let line = serde_json::to_string(&record).map_err(|e| {
            VerifyError::DatabaseError(format!("Failed to serialize record: {}", e))
        })?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                VerifyError::DatabaseError(format!("Failed to open {:?}: {}", self.path, e))
            })?;
        writeln!(file, "{}", line).map_err(|e| {
            VerifyError::DatabaseError(format!("Failed to append to {:?}: {}", self.path, e))
        })?;

        info!("Stored result {} for {}", record.id, record.document_id);
        Ok(record)
    }

    fn history(&self) -> Result<Vec<VerificationRecord>, VerifyError> {
        let mut records = self.read_all()?;
        sort_newest_first(&mut records);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClassifierLabel, ExtractedFields, FieldValue, VerificationVerdict};

    fn draft(document_id: &str, verdict: VerificationVerdict) -> RecordDraft {
        RecordDraft {
            document_id: document_id.to_string(),
            digest: "cafe".to_string(),
            label: ClassifierLabel::Real,
            class_name: "Real".to_string(),
            confidence: 0.934,
            fields: ExtractedFields {
                identity_number: FieldValue::known("482177301956"),
                ..ExtractedFields::unknown()
            },
            verdict,
        }
    }

    #[test]
    fn test_history_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history").join("results.jsonl");

        let store = JsonLinesStore::open(&path).unwrap();
        assert!(store.history().unwrap().is_empty());
        store.record(draft("one.png", VerificationVerdict::Verified)).unwrap();
        store.record(draft("two.png", VerificationVerdict::Accepted)).unwrap();

        let reopened = JsonLinesStore::open(&path).unwrap();
        let history = reopened.history().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, 2);
        assert_eq!(history[0].document_id, "two.png");
        assert_eq!(history[1].verdict, VerificationVerdict::Verified);
        assert_eq!(history[1].confidence, 0.93);
        assert_eq!(history[1].class_name, "Real");
        assert_eq!(
            history[1].fields.identity_number,
            FieldValue::known("482177301956")
        );
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.jsonl");
        let store = JsonLinesStore::open(&path).unwrap();
        store.record(draft("ok.png", VerificationVerdict::Accepted)).unwrap();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{not json").unwrap();

        let history = store.history().unwrap();
        assert_eq!(history.len(), 1);
        let next = store.record(draft("next.png", VerificationVerdict::Accepted)).unwrap();
        assert_eq!(next.id, 2);
    }

    #[test]
    fn test_write_failure_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes every append fail.
        let store = JsonLinesStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.record(draft("x.png", VerificationVerdict::Accepted)),
            Err(VerifyError::DatabaseError(_))
        ));
    }
}
