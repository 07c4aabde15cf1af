use crate::config::VerifierConfig;
use crate::models::*;
use crate::processing::*;
use crate::storage::{RecordDraft, VerificationStore};
use crate::utils::VerifyError;
use crate::validation::FormatValidator;
use crate::verification::{classify, Classifier, VerdictResolver};
use log::{error, info, warn};
use std::path::Path;
use std::sync::Arc;

/// Runs one document through normalization, OCR, extraction, validation and the verdict rule.
pub struct DocumentVerifier {
    intake: DocumentIntake,
    normalizer: ImageNormalizer,
    recognizer: TextRecognizer,
    extractor: FieldExtractor,
    resolver: VerdictResolver,
    classifier: Box<dyn Classifier>,
    store: Option<Arc<dyn VerificationStore>>,
}

impl DocumentVerifier {
    /// Verifier backed by the Tesseract engine.
    pub fn new(config: VerifierConfig, classifier: Box<dyn Classifier>) -> Self {
        Self::with_engine(config, Arc::new(TesseractEngine), classifier)
    }

    pub fn with_engine(
        config: VerifierConfig,
        engine: Arc<dyn TextEngine>,
        classifier: Box<dyn Classifier>,
    ) -> Self {
        DocumentVerifier {
            intake: DocumentIntake::new(config.intake),
            normalizer: ImageNormalizer::new(config.normalizer),
            recognizer: TextRecognizer::new(config.ocr, engine),
            extractor: FieldExtractor::new(config.extractor),
            resolver: VerdictResolver::new(config.verdict),
            classifier,
            store: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn VerificationStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn verify_file(&self, path: &Path) -> Result<VerificationReport, VerifyError> {
        let upload = self.intake.accept_path(path)?;
        Ok(self.verify(&upload))
    }

    pub fn verify_upload(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<VerificationReport, VerifyError> {
        let upload = self.intake.accept(filename, bytes)?;
        Ok(self.verify(&upload))
    }

    /// Every failure past intake degrades to unknown values, so this always yields a verdict.
    pub fn verify(&self, upload: &Upload) -> VerificationReport {
        info!("Verifying {}", upload.document_id);

        // Step 1-3: image to typed fields
        let fields = self.extract_fields(&upload.bytes);

        // Step 4: surface format of the identity number
        let identity_number_valid = FormatValidator::validate(&fields);

        // Step 5: authenticity signal
        let detection = classify(self.classifier.as_ref(), &upload.bytes);

        // Step 6: fuse
        let verdict =
            self.resolver
                .resolve(detection.label, detection.confidence, identity_number_valid);
        info!(
            "{}: label={} confidence={:.2} number_valid={} verdict={}",
            upload.document_id, detection.label, detection.confidence, identity_number_valid, verdict
        );

        let persisted = self.persist(upload, &detection, &fields, verdict);

        VerificationReport {
            document_id: upload.document_id.clone(),
            digest: upload.digest.clone(),
            detection,
            fields,
            identity_number_valid,
            verdict,
            persisted,
        }
    }

    pub fn extract_fields(&self, image_bytes: &[u8]) -> ExtractedFields {
        let raster = match self.normalizer.normalize(image_bytes) {
            Ok(raster) => Some(raster),
            Err(e) => {
                warn!("{}", e);
                None
            }
        };

        let stream = self.recognizer.recognize(raster.as_ref());
        let fields = self.extractor.extract(&stream);
        info!("Extracted {} of 4 fields", fields.known_count());
        fields
    }

    pub fn history(&self) -> Result<Vec<VerificationRecord>, VerifyError> {
        match &self.store {
            Some(store) => store.history(),
            None => Ok(Vec::new()),
        }
    }

    fn persist(
        &self,
        upload: &Upload,
        detection: &Detection,
        fields: &ExtractedFields,
        verdict: VerificationVerdict,
    ) -> bool {
        let Some(store) = &self.store else {
            return false;
        };

        let draft = RecordDraft {
            document_id: upload.document_id.clone(),
            digest: upload.digest.clone(),
            label: detection.label,
            class_name: detection.class_name.clone(),
            confidence: detection.confidence,
            fields: fields.clone(),
            verdict,
        };

        match store.record(draft) {
            Ok(_) => true,
            Err(e) => {
                error!("Error storing verification result for {}: {}", upload.document_id, e);
                false
            }
        }
    }
}
