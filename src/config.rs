use crate::processing::{ExtractorConfig, IntakeConfig, NormalizerConfig, OcrConfig};
use crate::utils::VerifyError;
use crate::verification::VerdictPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything the verifier can be tuned with. Missing keys fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    pub normalizer: NormalizerConfig,
    pub ocr: OcrConfig,
    pub extractor: ExtractorConfig,
    pub intake: IntakeConfig,
    pub verdict: VerdictPolicy,
}

impl VerifierConfig {
    pub fn from_json(json: &str) -> Result<Self, VerifyError> {
        let config: VerifierConfig = serde_json::from_str(json)
            .map_err(|e| VerifyError::ConfigError(format!("Invalid configuration: {}", e)))?;
        config.check()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, VerifyError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            VerifyError::ConfigError(format!("Failed to read {:?}: {}", path, e))
        })?;
        Self::from_json(&json)
    }

    fn check(&self) -> Result<(), VerifyError> {
        if self.normalizer.block_size < 3 || self.normalizer.block_size % 2 == 0 {
            return Err(VerifyError::ConfigError(format!(
                "normalizer.block_size must be odd and at least 3, got {}",
                self.normalizer.block_size
            )));
        }
        if self.normalizer.min_width == 0 {
            return Err(VerifyError::ConfigError(
                "normalizer.min_width must be positive".to_string(),
            ));
        }
        if self.ocr.languages.trim().is_empty() {
            return Err(VerifyError::ConfigError("ocr.languages is empty".to_string()));
        }
        if self.ocr.timeout_ms == 0 {
            return Err(VerifyError::ConfigError(
                "ocr.timeout_ms must be positive".to_string(),
            ));
        }
        if let VerdictPolicy::RejectForgeries { min_confidence } = self.verdict {
            if !(0.0..=1.0).contains(&min_confidence) {
                return Err(VerifyError::ConfigError(format!(
                    "verdict.min_confidence must be within [0, 1], got {}",
                    min_confidence
                )));
            }
        }
        Ok(())
    }
}
