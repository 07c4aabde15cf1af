// Verification history. Writes are best-effort from the pipeline's point of view.

pub mod json_lines;
pub mod memory;

pub use json_lines::JsonLinesStore;
pub use memory::MemoryStore;

use crate::models::{ClassifierLabel, ExtractedFields, VerificationRecord, VerificationVerdict};
use crate::utils::VerifyError;
use chrono::{DateTime, Utc};

/// Persistence collaborator: one write per completed run, full history on demand.
pub trait VerificationStore: Send + Sync {
    /// Stores the draft, assigning an id and the write timestamp.
    fn record(&self, draft: RecordDraft) -> Result<VerificationRecord, VerifyError>;

    /// Every stored record, newest first.
    fn history(&self) -> Result<Vec<VerificationRecord>, VerifyError>;
}

/// A record before the store has stamped it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDraft {
    pub document_id: String,
    pub digest: String,
    pub label: ClassifierLabel,
    pub class_name: String,
    pub confidence: f32,
    pub fields: ExtractedFields,
    pub verdict: VerificationVerdict,
}

impl RecordDraft {
    pub fn into_record(self, id: u64, timestamp: DateTime<Utc>) -> VerificationRecord {
        VerificationRecord {
            id,
            document_id: self.document_id,
            digest: self.digest,
            label: self.label,
            class_name: self.class_name,
            confidence: round_confidence(self.confidence),
            fields: self.fields,
            verdict: self.verdict,
            timestamp,
        }
    }
}

/// Confidence is kept to two decimals in the history.
pub fn round_confidence(confidence: f32) -> f32 {
    (confidence * 100.0).round() / 100.0
}

pub(crate) fn sort_newest_first(records: &mut [VerificationRecord]) {
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
}
