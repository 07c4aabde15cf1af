use crate::models::{ExtractedFields, FieldValue};

pub const IDENTITY_NUMBER_LENGTH: usize = 12;

pub struct FormatValidator;

impl FormatValidator {
    pub fn validate(fields: &ExtractedFields) -> bool {
        Self::validate_identity_number(&fields.identity_number)
    }

    /// The sentinel never validates.
    pub fn validate_identity_number(value: &FieldValue) -> bool {
        value.as_known().map_or(false, Self::validate_format)
    }

    /// Exactly twelve ASCII digits once internal spaces are removed.
    pub fn validate_format(value: &str) -> bool {
        let compact: String = value.chars().filter(|c| *c != ' ').collect();
        compact.len() == IDENTITY_NUMBER_LENGTH && compact.chars().all(|c| c.is_ascii_digit())
    }
}
