use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rendering of a field the pipeline could not resolve.
pub const UNKNOWN_FIELD: &str = "N/A";

/// A single extracted slot: either a recognized value or the explicit unknown sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldValue {
    Known(String),
    #[default]
    Unknown,
}

impl FieldValue {
    pub fn known(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.trim().is_empty() {
            FieldValue::Unknown
        } else {
            FieldValue::Known(value)
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, FieldValue::Known(_))
    }

    pub fn as_known(&self) -> Option<&str> {
        match self {
            FieldValue::Known(value) => Some(value),
            FieldValue::Unknown => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FieldValue::Known(value) => write!(f, "{}", value),
            FieldValue::Unknown => write!(f, "{}", UNKNOWN_FIELD),
        }
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        if value == UNKNOWN_FIELD {
            FieldValue::Unknown
        } else {
            FieldValue::known(value)
        }
    }
}

impl From<FieldValue> for String {
    fn from(value: FieldValue) -> Self {
        value.to_string()
    }
}

impl From<Option<String>> for FieldValue {
    fn from(value: Option<String>) -> Self {
        value.map(FieldValue::known).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Canonicalizes `M`, `F`, `MALE` and `FEMALE` in any case.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_uppercase().as_str() {
            "M" | "MALE" => Some(Gender::Male),
            "F" | "FEMALE" => Some(Gender::Female),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Personal data read off the printed side of the card. All four slots are always present.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExtractedFields {
    #[serde(rename = "Name")]
    pub name: FieldValue,
    #[serde(rename = "DOB")]
    pub date_of_birth: FieldValue,
    #[serde(rename = "Gender")]
    pub gender: FieldValue,
    #[serde(rename = "AadhaarNumber")]
    pub identity_number: FieldValue,
}

impl ExtractedFields {
    pub fn unknown() -> Self {
        ExtractedFields::default()
    }

    pub fn known_count(&self) -> usize {
        [&self.name, &self.date_of_birth, &self.gender, &self.identity_number]
            .iter()
            .filter(|field| field.is_known())
            .count()
    }
}

impl fmt::Display for ExtractedFields {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Name: {}, DOB: {}, Gender: {}, AadhaarNumber: {}",
            self.name, self.date_of_birth, self.gender, self.identity_number
        )
    }
}

/// OCR output restricted to `[A-Za-z0-9/:- ]`, one entry per non-empty line.
///
/// Lines never contain control characters or consecutive spaces, and never start or end
/// with whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CharacterStream {
    lines: Vec<String>,
}

impl CharacterStream {
    pub fn empty() -> Self {
        CharacterStream::default()
    }

    /// Cleans raw recognizer output into a stream.
    pub fn parse(raw: &str) -> Self {
        let lines = raw
            .split('\n')
            .map(Self::clean_line)
            .filter(|line| !line.is_empty())
            .collect();
        CharacterStream { lines }
    }

    fn clean_line(line: &str) -> String {
        let mut cleaned = String::with_capacity(line.len());
        let mut pending_space = false;

        for c in line.chars() {
            if Self::is_allowed(c) && c != ' ' {
                if pending_space && !cleaned.is_empty() {
                    cleaned.push(' ');
                }
                pending_space = false;
                cleaned.push(c);
            } else {
                pending_space = true;
            }
        }

        cleaned
    }

    fn is_allowed(c: char) -> bool {
        c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | ':' | ' ')
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Authenticity label emitted by the external detection model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierLabel {
    Real,
    Fake,
    Undetected,
}

impl ClassifierLabel {
    /// Case-insensitive. Anything other than `real` or `fake` is `Undetected`.
    pub fn parse(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "real" => ClassifierLabel::Real,
            "fake" => ClassifierLabel::Fake,
            _ => ClassifierLabel::Undetected,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClassifierLabel::Real => "real",
            ClassifierLabel::Fake => "fake",
            ClassifierLabel::Undetected => "undetected",
        }
    }
}

impl fmt::Display for ClassifierLabel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One detection. `class_name` is the class exactly as the model named it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: ClassifierLabel,
    pub class_name: String,
    pub confidence: f32,
}

impl Detection {
    pub fn new(label: ClassifierLabel, confidence: f32) -> Self {
        Detection::with_class_name(label, label.as_str(), confidence)
    }

    /// Parses the model's class name, keeping it for the audit trail.
    pub fn from_class_name(class_name: &str, confidence: f32) -> Self {
        Detection::with_class_name(ClassifierLabel::parse(class_name), class_name, confidence)
    }

    fn with_class_name(label: ClassifierLabel, class_name: &str, confidence: f32) -> Self {
        Detection {
            label,
            class_name: class_name.to_string(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// What the pipeline assumes when the model reports nothing.
    pub fn none() -> Self {
        Detection::new(ClassifierLabel::Undetected, 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationVerdict {
    Verified,
    Accepted,
    Rejected,
}

impl VerificationVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationVerdict::Verified => "Verified",
            VerificationVerdict::Accepted => "Accepted",
            VerificationVerdict::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for VerificationVerdict {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One persisted verification run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub id: u64,
    pub document_id: String,
    pub digest: String,
    pub label: ClassifierLabel,
    pub class_name: String,
    pub confidence: f32,
    pub fields: ExtractedFields,
    pub verdict: VerificationVerdict,
    pub timestamp: DateTime<Utc>,
}

/// Result handed back to the caller of a verification run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationReport {
    pub document_id: String,
    pub digest: String,
    pub detection: Detection,
    pub fields: ExtractedFields,
    pub identity_number_valid: bool,
    pub verdict: VerificationVerdict,
    pub persisted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_collapses_whitespace_and_keeps_lines() {
        let stream = CharacterStream::parse("  JOHN\t\tDOE  \r\n\n DOB:  01/02/1990 \nMALE");
        assert_eq!(stream.lines(), &["JOHN DOE", "DOB: 01/02/1990", "MALE"]);
    }

    #[test]
    fn test_stream_strips_unsupported_glyphs() {
        let stream = CharacterStream::parse("भारत सरकार\nGOVERNMENT OF INDIA.\n|||");
        assert_eq!(stream.lines(), &["GOVERNMENT OF INDIA"]);
        assert!(CharacterStream::parse("  \n\t\n").is_empty());
    }

    #[test]
    fn test_field_value_sentinel_round_trips_as_text() {
        let fields = ExtractedFields {
            name: FieldValue::known("JOHN DOE"),
            ..ExtractedFields::unknown()
        };
        let json = serde_json::to_string(&fields).unwrap();
        assert_eq!(
            json,
            r#"{"Name":"JOHN DOE","DOB":"N/A","Gender":"N/A","AadhaarNumber":"N/A"}"#
        );
        let parsed: ExtractedFields = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, fields);
        assert_eq!(parsed.known_count(), 1);
    }

    #[test]
    fn test_label_parsing_ignores_case() {
        assert_eq!(ClassifierLabel::parse("REAL"), ClassifierLabel::Real);
        assert_eq!(ClassifierLabel::parse("Fake"), ClassifierLabel::Fake);
        assert_eq!(ClassifierLabel::parse(" real "), ClassifierLabel::Undetected);
        assert_eq!(ClassifierLabel::parse("true"), ClassifierLabel::Undetected);
        assert_eq!(ClassifierLabel::parse(""), ClassifierLabel::Undetected);
    }

    #[test]
    fn test_detection_keeps_model_class_name() {
        let tampered = Detection::from_class_name("tampered", 0.91);
        assert_eq!(tampered.label, ClassifierLabel::Undetected);
        assert_eq!(tampered.class_name, "tampered");
        assert_eq!(Detection::from_class_name("REAL", 0.5).label, ClassifierLabel::Real);
        assert_eq!(Detection::new(ClassifierLabel::Fake, 0.3).class_name, "fake");
    }

    #[test]
    fn test_gender_tokens() {
        assert_eq!(Gender::from_token("m"), Some(Gender::Male));
        assert_eq!(Gender::from_token("Female"), Some(Gender::Female));
        assert_eq!(Gender::from_token("X"), None);
    }
}
