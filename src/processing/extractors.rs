// Field extraction for the printed side of an Aadhaar card.
// Every field takes the first match in document order; misses fall back to the sentinel.

use crate::models::{CharacterStream, ExtractedFields, FieldValue, Gender};
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref IDENTITY_NUMBER_PATTERN: Regex =
        Regex::new(r"\b[0-9]{4} ?[0-9]{4} ?[0-9]{4}\b").unwrap();

    static ref LABELED_DOB_PATTERN: Regex =
        Regex::new(r"(?i)(?:DOB[: ]*|Date[: ]*of[: ]*Birth[: ]*)([0-9]{2}[/-][0-9]{2}[/-][0-9]{4})").unwrap();

    static ref BARE_DATE_PATTERN: Regex =
        Regex::new(r"\b[0-9]{2}[/-][0-9]{2}[/-][0-9]{4}\b").unwrap();

    static ref GENDER_PATTERN: Regex =
        Regex::new(r"(?i)\b(MALE|FEMALE|M|F)\b").unwrap();
}

/// Substrings that mark the line carrying date of birth or gender.
const INDICATOR_TOKENS: [&str; 4] = ["dob", "birth", "male", "female"];

/// Header text printed above the holder's name.
const BOILERPLATE_TOKENS: [&str; 4] = ["india", "aadhaar", "uidai", "government"];

/// How picky the positional name heuristic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameFilter {
    /// Reject only boilerplate header lines.
    #[default]
    Standard,
    /// Also reject lines with digits or fewer than two letters.
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub name_filter: NameFilter,
}

pub struct FieldExtractor {
    config: ExtractorConfig,
}

impl FieldExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        FieldExtractor { config }
    }

    pub fn extract(&self, stream: &CharacterStream) -> ExtractedFields {
        if stream.is_empty() {
            return ExtractedFields::unknown();
        }

        let text = stream.text();
        let fields = ExtractedFields {
            name: self.extract_name(stream.lines()).into(),
            date_of_birth: Self::extract_date_of_birth(&text).into(),
            gender: Self::extract_gender(&text)
                .map(|gender| FieldValue::known(gender.as_str()))
                .unwrap_or_default(),
            identity_number: Self::extract_identity_number(&text).into(),
        };

        debug!("Extracted fields: {}", fields);
        fields
    }

    /// First 12-digit run, grouped 4-4-4 with optional single spaces. Spaces are removed.
    pub fn extract_identity_number(text: &str) -> Option<String> {
        IDENTITY_NUMBER_PATTERN
            .find(text)
            .map(|matched| matched.as_str().replace(' ', ""))
    }

    /// A labeled date wins over any bare date, wherever each appears.
    pub fn extract_date_of_birth(text: &str) -> Option<String> {
        if let Some(captures) = LABELED_DOB_PATTERN.captures(text) {
            if let Some(date) = captures.get(1) {
                return Some(date.as_str().to_string());
            }
        }

        BARE_DATE_PATTERN
            .find(text)
            .map(|matched| matched.as_str().to_string())
    }

    pub fn extract_gender(text: &str) -> Option<Gender> {
        GENDER_PATTERN
            .find(text)
            .and_then(|matched| Gender::from_token(matched.as_str()))
    }

    /// The line right above the first date-of-birth/gender line, unless it is card boilerplate.
    pub fn extract_name(&self, lines: &[String]) -> Option<String> {
        let indicator_index = lines.iter().position(|line| {
            let lower = line.to_lowercase();
            INDICATOR_TOKENS.iter().any(|token| lower.contains(token))
        })?;

        if indicator_index == 0 {
            return None;
        }

        let candidate = lines[indicator_index - 1].trim();
        if self.accepts_name(candidate) {
            Some(candidate.to_string())
        } else {
            debug!("Rejected name candidate: {}", candidate);
            None
        }
    }

    fn accepts_name(&self, candidate: &str) -> bool {
        let lower = candidate.to_lowercase();
        if candidate.is_empty() || BOILERPLATE_TOKENS.iter().any(|token| lower.contains(token)) {
            return false;
        }

        match self.config.name_filter {
            NameFilter::Standard => true,
            NameFilter::Strict => {
                let letters = candidate.chars().filter(|c| c.is_ascii_alphabetic()).count();
                letters >= 2 && !candidate.chars().any(|c| c.is_ascii_digit())
            }
        }
    }
}

impl Default for FieldExtractor {
    fn default() -> Self {
        FieldExtractor::new(ExtractorConfig::default())
    }
}
